//! End-to-end walkthroughs (spec §8 S1-S6), driven through the public
//! `rpatch::run` entry point the way an actual CLI invocation would.

use std::fs;
use std::path::{Path, PathBuf};

use rpatch::backup_naming::{BackupNameOverride, VersionControl};
use rpatch::merge::MergeStyle;
use rpatch::policy::ReadOnlyPolicy;
use rpatch::Config;

fn logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

fn base_config<'a>(directory: PathBuf, patch_path: &'a str, logger: &'a slog::Logger) -> Config<'a> {
    Config {
        strip: None,
        fuzz: None,
        ignore_whitespace: false,
        forward_only: false,
        reverse: false,
        orig_file: None,
        input: Some(patch_path),
        output: None,
        reject_file: None,
        ifdef_symbol: None,
        remove_empty_files: false,
        backup: false,
        version_control: VersionControl::Existing,
        backup_override: BackupNameOverride::default(),
        simple_backup_suffix: String::new(),
        batch: false,
        force: false,
        quiet: false,
        dry_run: false,
        directory,
        reject_format: None,
        read_only: ReadOnlyPolicy::Warn,
        follow_symlinks: false,
        merge: None,
        logger,
    }
}

fn write_patch(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn s1_unified_clean_apply() {
    let log = logger();
    let workspace = tempfile::tempdir().unwrap();
    let patches = tempfile::tempdir().unwrap();
    fs::write(workspace.path().join("f"), b"A\nB\nC\nD\n").unwrap();

    let patch_path = write_patch(
        patches.path(),
        "s1.patch",
        b"--- f\n+++ f\n@@ -1,4 +1,4 @@\n A\n-B\n+B'\n C\n D\n",
    );
    let patch_path_str = patch_path.to_str().unwrap();

    let config = base_config(workspace.path().to_path_buf(), patch_path_str, &log);
    let code = rpatch::run(&config).unwrap();

    assert_eq!(code, 0);
    assert_eq!(fs::read(workspace.path().join("f")).unwrap(), b"A\nB'\nC\nD\n");
    assert!(!workspace.path().join("f.rej").exists());
}

#[test]
fn s2_fuzz_offset_and_shift() {
    let log = logger();

    // direct case: claimed position already matches the input exactly.
    {
        let workspace = tempfile::tempdir().unwrap();
        let patches = tempfile::tempdir().unwrap();
        fs::write(workspace.path().join("f"), b"X\nA\nB\nC\nD\nY\n").unwrap();
        let patch_path = write_patch(
            patches.path(),
            "s2a.patch",
            b"--- f\n+++ f\n@@ -2,4 +2,4 @@\n A\n-B\n+B'\n C\n D\n",
        );
        let patch_path_str = patch_path.to_str().unwrap();
        let config = base_config(workspace.path().to_path_buf(), patch_path_str, &log);
        let code = rpatch::run(&config).unwrap();
        assert_eq!(code, 0);
        assert_eq!(
            fs::read(workspace.path().join("f")).unwrap(),
            b"X\nA\nB'\nC\nD\nY\n"
        );
    }

    // shifted case: input has an extra leading line, so the hunk's claimed
    // position is off by one and the locator must scan for the offset.
    {
        let workspace = tempfile::tempdir().unwrap();
        let patches = tempfile::tempdir().unwrap();
        fs::write(workspace.path().join("f"), b"Z\nX\nA\nB\nC\nD\nY\n").unwrap();
        let patch_path = write_patch(
            patches.path(),
            "s2b.patch",
            b"--- f\n+++ f\n@@ -2,4 +2,4 @@\n A\n-B\n+B'\n C\n D\n",
        );
        let patch_path_str = patch_path.to_str().unwrap();
        let config = base_config(workspace.path().to_path_buf(), patch_path_str, &log);
        let code = rpatch::run(&config).unwrap();
        assert_eq!(code, 0);
        assert_eq!(
            fs::read(workspace.path().join("f")).unwrap(),
            b"Z\nX\nA\nB'\nC\nD\nY\n"
        );
    }
}

#[test]
fn s3_reverse_detected_and_assumed() {
    let log = logger();
    let workspace = tempfile::tempdir().unwrap();
    let patches = tempfile::tempdir().unwrap();
    // The *original* file, same as S1's starting point.
    fs::write(workspace.path().join("f"), b"A\nB\nC\nD\n").unwrap();

    // The output-to-input direction of S1's patch: old side declares B',
    // new side declares B. Forward application fails against this input;
    // the swapped orientation matches.
    let patch_path = write_patch(
        patches.path(),
        "s3.patch",
        b"--- f\n+++ f\n@@ -1,4 +1,4 @@\n A\n-B'\n+B\n C\n D\n",
    );
    let patch_path_str = patch_path.to_str().unwrap();

    let mut config = base_config(workspace.path().to_path_buf(), patch_path_str, &log);
    config.batch = true;
    let code = rpatch::run(&config).unwrap();

    assert_eq!(code, 0);
    assert_eq!(fs::read(workspace.path().join("f")).unwrap(), b"A\nB'\nC\nD\n");
}

#[test]
fn s4_reject_on_mismatch() {
    let log = logger();
    let workspace = tempfile::tempdir().unwrap();
    let patches = tempfile::tempdir().unwrap();
    fs::write(workspace.path().join("f"), b"A\nZ\nC\nD\n").unwrap();

    let patch_path = write_patch(
        patches.path(),
        "s4.patch",
        b"--- f\n+++ f\n@@ -1,4 +1,4 @@\n A\n-B\n+B'\n C\n D\n",
    );
    let patch_path_str = patch_path.to_str().unwrap();

    let config = base_config(workspace.path().to_path_buf(), patch_path_str, &log);
    let code = rpatch::run(&config).unwrap();

    assert_eq!(code, 1);
    assert_eq!(fs::read(workspace.path().join("f")).unwrap(), b"A\nZ\nC\nD\n");
    let reject = fs::read_to_string(workspace.path().join("f.rej")).unwrap();
    assert!(reject.contains("@@ -1,4 +1,4 @@"));
    assert!(reject.contains("-B"));
    assert!(reject.contains("+B'"));
}

#[test]
fn s5_merge_conflict_markers() {
    let log = logger();
    let workspace = tempfile::tempdir().unwrap();
    let patches = tempfile::tempdir().unwrap();
    fs::write(workspace.path().join("f"), b"A\nB2\nC\nD\n").unwrap();

    let patch_path = write_patch(
        patches.path(),
        "s5.patch",
        b"--- f\n+++ f\n@@ -1,4 +1,4 @@\n A\n-B\n+B'\n C\n D\n",
    );
    let patch_path_str = patch_path.to_str().unwrap();

    let mut config = base_config(workspace.path().to_path_buf(), patch_path_str, &log);
    config.merge = Some(MergeStyle::Merge);
    let code = rpatch::run(&config).unwrap();

    assert_eq!(code, 1);
    assert_eq!(
        fs::read(workspace.path().join("f")).unwrap(),
        b"A\n<<<<<<<\nB2\n=======\nB'\n>>>>>>>\nC\nD\n"
    );
}

#[cfg(unix)]
#[test]
fn s6_git_rename_with_mode_change() {
    use std::os::unix::fs::PermissionsExt;

    let log = logger();
    let workspace = tempfile::tempdir().unwrap();
    let patches = tempfile::tempdir().unwrap();
    let x_path = workspace.path().join("x");
    fs::write(&x_path, b"#!/bin/sh\necho hi\n").unwrap();
    fs::set_permissions(&x_path, fs::Permissions::from_mode(0o644)).unwrap();

    let patch_path = write_patch(
        patches.path(),
        "s6.patch",
        b"diff --git a/x b/y\nrename from x\nrename to y\nold mode 100644\nnew mode 100755\n",
    );
    let patch_path_str = patch_path.to_str().unwrap();

    let config = base_config(workspace.path().to_path_buf(), patch_path_str, &log);
    let code = rpatch::run(&config).unwrap();

    assert_eq!(code, 0);
    assert!(!x_path.exists());
    let y_path = workspace.path().join("y");
    assert!(y_path.exists());
    let mode = fs::metadata(&y_path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}
