//! Environment-variable configuration layer (SPEC_FULL Configuration): one
//! constant plus one accessor per knob, the same shape as the teacher's
//! git-config layer, reading `std::env::var` instead of `repo.config()`.

use crate::backup_naming::VersionControl;

pub const SIMPLE_BACKUP_SUFFIX_VAR: &str = "SIMPLE_BACKUP_SUFFIX";
pub const SIMPLE_BACKUP_SUFFIX_DEFAULT: &str = "";

pub const VERSION_CONTROL_VAR: &str = "PATCH_VERSION_CONTROL";
pub const VERSION_CONTROL_FALLBACK_VAR: &str = "VERSION_CONTROL";

pub const QUOTING_STYLE_VAR: &str = "QUOTING_STYLE";
pub const QUOTING_STYLE_DEFAULT: &str = "shell";

pub const POSIXLY_CORRECT_VAR: &str = "POSIXLY_CORRECT";

pub const PATCH_GET_VAR: &str = "PATCH_GET";

pub fn simple_backup_suffix() -> String {
    std::env::var(SIMPLE_BACKUP_SUFFIX_VAR).unwrap_or_else(|_| SIMPLE_BACKUP_SUFFIX_DEFAULT.into())
}

/// `PATCH_VERSION_CONTROL` takes precedence over `VERSION_CONTROL`
/// (GNU patch's own order); neither set falls back to `Existing`, patch's
/// historical default.
pub fn version_control() -> VersionControl {
    std::env::var(VERSION_CONTROL_VAR)
        .ok()
        .or_else(|| std::env::var(VERSION_CONTROL_FALLBACK_VAR).ok())
        .and_then(|v| VersionControl::parse(&v))
        .unwrap_or(VersionControl::Existing)
}

pub fn quoting_style() -> String {
    std::env::var(QUOTING_STYLE_VAR).unwrap_or_else(|_| QUOTING_STYLE_DEFAULT.into())
}

pub fn posixly_correct() -> bool {
    std::env::var(POSIXLY_CORRECT_VAR).is_ok()
}

/// Nonzero or non-numeric values both mean "get enabled"; `PATCH_GET`
/// unset defaults to "ask" which this crate treats as disabled, since
/// prompting is out of scope (spec §1).
pub fn patch_get_enabled() -> bool {
    match std::env::var(PATCH_GET_VAR) {
        Ok(v) => v != "0",
        Err(_) => false,
    }
}

/// Whether the environment looks like a Perforce workspace, checked only to
/// decide whether the RCS/Perforce checkout collaborator should be
/// consulted at all (spec §1 Non-goals: the checkout helpers themselves
/// stay external).
pub fn perforce_workspace_detected() -> bool {
    std::env::var("P4PORT").is_ok() || std::env::var("P4CONFIG").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn version_control_prefers_patch_specific_var() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(VERSION_CONTROL_VAR, "numbered");
        std::env::set_var(VERSION_CONTROL_FALLBACK_VAR, "simple");
        assert_eq!(version_control(), VersionControl::Numbered);
        std::env::remove_var(VERSION_CONTROL_VAR);
        std::env::remove_var(VERSION_CONTROL_FALLBACK_VAR);
    }

    #[test]
    fn version_control_defaults_to_existing() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var(VERSION_CONTROL_VAR);
        std::env::remove_var(VERSION_CONTROL_FALLBACK_VAR);
        assert_eq!(version_control(), VersionControl::Existing);
    }

    #[test]
    fn patch_get_treats_zero_as_disabled() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(PATCH_GET_VAR, "0");
        assert!(!patch_get_enabled());
        std::env::remove_var(PATCH_GET_VAR);
    }
}
