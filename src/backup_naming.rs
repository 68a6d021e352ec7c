//! Backup file naming (spec §6): `-B`/`-Y`/`-z` prefix/basename-prefix/suffix
//! composition, plus the simple/numbered/existing backup-type policies.

use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VersionControl {
    Simple,
    Numbered,
    Existing,
}

impl VersionControl {
    /// `VERSION_CONTROL`/`PATCH_VERSION_CONTROL` accept GNU's traditional
    /// aliases (`t`/`nil` for numbered, `never`/`simple` for simple).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "simple" | "never" => Some(VersionControl::Simple),
            "numbered" | "t" => Some(VersionControl::Numbered),
            "existing" | "nil" => Some(VersionControl::Existing),
            _ => None,
        }
    }
}

/// Explicit `-B`/`-Y`/`-z` overrides. Any field left `None` falls back to
/// the backup-type policy.
#[derive(Clone, Debug, Default)]
pub struct BackupNameOverride {
    pub prefix: Option<String>,
    pub basename_prefix: Option<String>,
    pub suffix: Option<String>,
}

/// Computes the backup path for `target`, given any explicit overrides, the
/// backup-type policy, and (for `existing`) whether a numbered backup of
/// this file already exists on disk.
pub fn backup_path(
    target: &Path,
    overrides: &BackupNameOverride,
    policy: VersionControl,
    simple_suffix: &str,
    existing_numbered: impl Fn(&Path) -> Vec<u32>,
) -> PathBuf {
    if overrides.prefix.is_some() || overrides.basename_prefix.is_some() || overrides.suffix.is_some()
    {
        let dir = target.parent().unwrap_or_else(|| Path::new(""));
        let base = target.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let mut out = PathBuf::new();
        if let Some(prefix) = &overrides.prefix {
            out.push(prefix);
        }
        out.push(dir);
        let basename_prefix = overrides.basename_prefix.as_deref().unwrap_or("");
        let suffix = overrides.suffix.as_deref().unwrap_or("");
        let file_name = format!("{basename_prefix}{base}{suffix}");
        out.push(file_name);
        return out;
    }

    match policy {
        VersionControl::Simple => simple_backup(target, simple_suffix),
        VersionControl::Numbered => numbered_backup(target, &existing_numbered(target)),
        VersionControl::Existing => {
            let existing = existing_numbered(target);
            if existing.is_empty() {
                simple_backup(target, simple_suffix)
            } else {
                numbered_backup(target, &existing)
            }
        }
    }
}

fn simple_backup(target: &Path, suffix: &str) -> PathBuf {
    let suffix = if suffix.is_empty() { ".orig" } else { suffix };
    let mut out = target.as_os_str().to_owned();
    out.push(suffix);
    PathBuf::from(out)
}

fn numbered_backup(target: &Path, existing: &[u32]) -> PathBuf {
    let next = existing.iter().copied().max().unwrap_or(0) + 1;
    let mut out = target.as_os_str().to_owned();
    out.push(format!(".~{next}~"));
    PathBuf::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_policy_appends_orig() {
        let p = backup_path(
            Path::new("foo.c"),
            &BackupNameOverride::default(),
            VersionControl::Simple,
            "",
            |_| vec![],
        );
        assert_eq!(p, PathBuf::from("foo.c.orig"));
    }

    #[test]
    fn simple_policy_honors_env_suffix() {
        let p = backup_path(
            Path::new("foo.c"),
            &BackupNameOverride::default(),
            VersionControl::Simple,
            ".bak",
            |_| vec![],
        );
        assert_eq!(p, PathBuf::from("foo.c.bak"));
    }

    #[test]
    fn numbered_policy_increments() {
        let p = backup_path(
            Path::new("foo.c"),
            &BackupNameOverride::default(),
            VersionControl::Numbered,
            "",
            |_| vec![1, 2],
        );
        assert_eq!(p, PathBuf::from("foo.c.~3~"));
    }

    #[test]
    fn existing_policy_falls_back_to_simple_when_none_present() {
        let p = backup_path(
            Path::new("foo.c"),
            &BackupNameOverride::default(),
            VersionControl::Existing,
            "",
            |_| vec![],
        );
        assert_eq!(p, PathBuf::from("foo.c.orig"));
    }

    #[test]
    fn existing_policy_uses_numbered_when_present() {
        let p = backup_path(
            Path::new("foo.c"),
            &BackupNameOverride::default(),
            VersionControl::Existing,
            "",
            |_| vec![1],
        );
        assert_eq!(p, PathBuf::from("foo.c.~2~"));
    }

    #[test]
    fn explicit_overrides_compose() {
        let overrides = BackupNameOverride {
            prefix: Some("/backups/".into()),
            basename_prefix: Some("pre-".into()),
            suffix: Some(".bak".into()),
        };
        let p = backup_path(
            Path::new("src/foo.c"),
            &overrides,
            VersionControl::Simple,
            "",
            |_| vec![],
        );
        assert_eq!(p, PathBuf::from("/backups/src/pre-foo.c.bak"));
    }
}
