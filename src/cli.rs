//! CLI surface (spec §6): every flag the engine accepts, built with clap's
//! builder API in the same style as the teacher's `main.rs`.

use clap::{Arg, ArgAction, Command};

pub fn build_command() -> Command {
    command!()
        .about("Apply a diff file to originals")
        .arg(
            Arg::new("strip")
                .help("Strip the smallest prefix containing N leading slashes from filenames")
                .short('p')
                .long("strip")
                .value_name("N")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("fuzz")
                .help("Set the maximum fuzz factor")
                .short('F')
                .long("fuzz")
                .value_name("N")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("ignore-whitespace")
                .help("Ignore whitespace differences")
                .short('l')
                .long("ignore-whitespace")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("context")
                .help("Interpret the patch as a context diff")
                .short('c')
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ed")
                .help("Interpret the patch as an ed script")
                .short('e')
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("normal")
                .help("Interpret the patch as a normal diff")
                .short('n')
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("unified")
                .help("Interpret the patch as a unified diff")
                .short('u')
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("forward")
                .help("Ignore patches that appear to be reversed or already applied")
                .short('N')
                .long("forward")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("reverse")
                .help("Assume patches were created with old and new files swapped")
                .short('R')
                .long("reverse")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("input")
                .help("Read patch from FILE instead of stdin")
                .short('i')
                .long("input")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("output")
                .help("Output patched files to FILE")
                .short('o')
                .long("output")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("reject-file")
                .help("Output rejects to FILE")
                .short('r')
                .long("reject-file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("ifdef")
                .help("Make merged if-then-else output using SYM")
                .short('D')
                .long("ifdef")
                .value_name("SYM"),
        )
        .arg(
            Arg::new("remove-empty-files")
                .help("Remove output files that become empty after patching")
                .short('E')
                .long("remove-empty-files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("set-utc")
                .help("Set times of patched files, assuming diff uses UTC")
                .short('Z')
                .long("set-utc")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("set-time")
                .help("Set times of patched files, assuming diff uses local time")
                .short('T')
                .long("set-time")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("backup")
                .help("Back up the original contents of each file")
                .short('b')
                .long("backup")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("backup-if-mismatch")
                .long("backup-if-mismatch")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-backup-if-mismatch")
                .long("no-backup-if-mismatch")
                .action(ArgAction::SetTrue)
                .conflicts_with("backup-if-mismatch"),
        )
        .arg(
            Arg::new("version-control")
                .help("Select backup-naming policy")
                .short('V')
                .long("version-control")
                .value_name("STYLE")
                .value_parser(["simple", "numbered", "existing", "t", "nil", "never"]),
        )
        .arg(
            Arg::new("prefix")
                .help("Prepend PFX to backup file names")
                .short('B')
                .value_name("PFX"),
        )
        .arg(
            Arg::new("basename-prefix")
                .help("Prepend PFX to the backup file's basename")
                .short('Y')
                .value_name("PFX"),
        )
        .arg(
            Arg::new("suffix")
                .help("Append SFX to backup file names")
                .short('z')
                .value_name("SFX"),
        )
        .arg(
            Arg::new("get")
                .help("Control checkout of RCS/SCCS/ClearCase files")
                .short('g')
                .long("get")
                .value_name("N")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("batch")
                .help("Assume -t for reject/reverse decisions, skip confirmations")
                .short('t')
                .long("batch")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("force")
                .help("Assume patches are not reversed and apply even if mismatched")
                .short('f')
                .long("force")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .help("Work silently unless an error occurs")
                .short('s')
                .long("quiet")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .help("Display more diagnostics")
                .long("verbose")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .help("Print what would be done, without changing any files")
                .long("dry-run")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("posix")
                .help("Conform more strictly to the POSIX standard")
                .long("posix")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("directory")
                .help("Change the working directory before applying")
                .short('d')
                .long("directory")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("reject-format")
                .help("Force the reject file format")
                .long("reject-format")
                .value_name("FORMAT")
                .value_parser(["context", "unified"]),
        )
        .arg(
            Arg::new("binary")
                .help("Read and write data in binary mode")
                .long("binary")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("read-only")
                .help("How to handle read-only input files")
                .long("read-only")
                .value_name("BEHAVIOR")
                .value_parser(["ignore", "warn", "fail"]),
        )
        .arg(
            Arg::new("follow-symlinks")
                .help("Follow symlinks when resolving patch target paths")
                .long("follow-symlinks")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quoting-style")
                .help("Select the quoting style for filenames in diagnostics")
                .long("quoting-style")
                .value_name("STYLE"),
        )
        .arg(
            Arg::new("merge")
                .help("Merge using conflict markers instead of rejecting")
                .long("merge")
                .value_name("STYLE")
                .value_parser(["merge", "diff3"])
                .num_args(0..=1)
                .default_missing_value("merge"),
        )
        .arg(
            Arg::new("gen-completions")
                .help("Generate completions")
                .long("gen-completions")
                .value_parser(["bash", "fish", "zsh", "powershell", "elvish", "nushell"]),
        )
        .arg(
            Arg::new("origfile")
                .help("The file to patch")
                .value_name("ORIGFILE"),
        )
        .arg(
            Arg::new("patchfile")
                .help("The patch to apply")
                .value_name("PATCHFILE"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_without_panicking() {
        build_command().debug_assert();
    }

    #[test]
    fn parses_short_flags() {
        let matches = build_command()
            .try_get_matches_from(["rpatch", "-p1", "-F2", "-R", "orig", "patch"])
            .unwrap();
        assert_eq!(matches.get_one::<usize>("strip").copied(), Some(1));
        assert_eq!(matches.get_one::<u64>("fuzz").copied(), Some(2));
        assert!(matches.get_flag("reverse"));
        assert_eq!(matches.get_one::<String>("origfile").map(String::as_str), Some("orig"));
    }

    #[test]
    fn merge_defaults_to_merge_style_when_bare() {
        let matches = build_command()
            .try_get_matches_from(["rpatch", "--merge"])
            .unwrap();
        assert_eq!(matches.get_one::<String>("merge").map(String::as_str), Some("merge"));
    }
}
