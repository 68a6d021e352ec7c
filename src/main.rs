#[macro_use]
extern crate clap;

#[macro_use]
extern crate slog;

use clap_complete::{generate, Shell};
use slog::Drain;
use std::io;

use rpatch::backup_naming::{BackupNameOverride, VersionControl};
use rpatch::merge::MergeStyle;
use rpatch::policy::ReadOnlyPolicy;

fn main() {
    let command = rpatch::cli::build_command();
    let mut command_clone = command.clone();
    let args = command.get_matches();

    if let Some(shell) = args.get_one::<String>("gen-completions") {
        let app_name = "rpatch";
        match shell.as_str() {
            "bash" => generate(Shell::Bash, &mut command_clone, app_name, &mut io::stdout()),
            "fish" => generate(Shell::Fish, &mut command_clone, app_name, &mut io::stdout()),
            "zsh" => generate(Shell::Zsh, &mut command_clone, app_name, &mut io::stdout()),
            "powershell" => generate(
                Shell::PowerShell,
                &mut command_clone,
                app_name,
                &mut io::stdout(),
            ),
            "elvish" => generate(Shell::Elvish, &mut command_clone, app_name, &mut io::stdout()),
            "nushell" => generate(
                clap_complete_nushell::Nushell,
                &mut command_clone,
                app_name,
                &mut io::stdout(),
            ),
            _ => unreachable!(),
        }
        return;
    }

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog::LevelFilter::new(
        drain,
        if args.get_flag("verbose") {
            slog::Level::Debug
        } else {
            slog::Level::Info
        },
    )
    .fuse();
    let mut logger = slog::Logger::root(drain, o!());
    if args.get_flag("verbose") {
        logger = logger.new(o!(
            "module" => slog::FnValue(|record| record.module()),
            "line" => slog::FnValue(|record| record.line()),
        ));
    }

    let read_only = args
        .get_one::<String>("read-only")
        .and_then(|s| ReadOnlyPolicy::parse(s))
        .unwrap_or(ReadOnlyPolicy::Warn);

    let version_control = args
        .get_one::<String>("version-control")
        .and_then(|s| VersionControl::parse(s))
        .unwrap_or_else(rpatch::config::version_control);

    let merge = args.get_one::<String>("merge").map(|s| match s.as_str() {
        "diff3" => MergeStyle::Diff3,
        _ => MergeStyle::Merge,
    });

    let backup_override = BackupNameOverride {
        prefix: args.get_one::<String>("prefix").cloned(),
        basename_prefix: args.get_one::<String>("basename-prefix").cloned(),
        suffix: args.get_one::<String>("suffix").cloned(),
    };

    let directory = args
        .get_one::<String>("directory")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let patchfile = args.get_one::<String>("patchfile").map(String::as_str);
    let input = args
        .get_one::<String>("input")
        .map(String::as_str)
        .or(patchfile);

    let config = rpatch::Config {
        strip: args.get_one::<usize>("strip").copied(),
        fuzz: args.get_one::<u64>("fuzz").copied(),
        ignore_whitespace: args.get_flag("ignore-whitespace"),
        forward_only: args.get_flag("forward"),
        reverse: args.get_flag("reverse"),
        orig_file: args.get_one::<String>("origfile").map(String::as_str),
        input,
        output: args.get_one::<String>("output").map(String::as_str),
        reject_file: args.get_one::<String>("reject-file").map(String::as_str),
        ifdef_symbol: args.get_one::<String>("ifdef").map(String::as_str),
        remove_empty_files: args.get_flag("remove-empty-files"),
        backup: args.get_flag("backup") || args.get_flag("backup-if-mismatch"),
        version_control,
        backup_override,
        simple_backup_suffix: rpatch::config::simple_backup_suffix(),
        batch: args.get_flag("batch"),
        force: args.get_flag("force"),
        quiet: args.get_flag("quiet"),
        dry_run: args.get_flag("dry-run"),
        directory,
        reject_format: args.get_one::<String>("reject-format").map(String::as_str),
        read_only,
        follow_symlinks: args.get_flag("follow-symlinks"),
        merge,
        logger: &logger,
    };

    match rpatch::run(&config) {
        Ok(code) => {
            drop(logger);
            std::process::exit(code);
        }
        Err(e) => {
            crit!(logger, "patch run failed"; "err" => e.to_string());
            drop(logger);
            std::process::exit(2);
        }
    }
}
