//! Non-interactive policy resolver (spec §7, SUPPLEMENTED): stands in for
//! the out-of-scope terminal-prompting collaborator by turning
//! `{batch, force}` flag combinations into a fixed decision.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadOnlyPolicy {
    Ignore,
    Warn,
    Fail,
}

impl ReadOnlyPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ignore" => Some(ReadOnlyPolicy::Ignore),
            "warn" => Some(ReadOnlyPolicy::Warn),
            "fail" => Some(ReadOnlyPolicy::Fail),
            _ => None,
        }
    }
}

/// The flags that drive every non-interactive decision in this module.
#[derive(Clone, Copy, Debug, Default)]
pub struct PolicyFlags {
    pub batch: bool,
    pub force: bool,
    pub forward_only: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReverseDecision {
    /// `-N`: skip this hunk/file entirely, do not apply swapped.
    Skip,
    /// `-f`: apply in the original (unswapped) orientation anyway.
    ApplyUnswapped,
    /// `-t`, or no conflicting flag: assume the swap and apply reversed.
    AssumeSwap,
}

/// Spec §7 kind 4: "Per flags: `-N` skip, `-f` apply anyway unswapped, `-t`
/// assume swap, else prompt." Since prompting is out of scope, "else" also
/// assumes the swap, matching GNU patch's `--batch` default.
pub fn resolve_reverse(flags: PolicyFlags) -> ReverseDecision {
    if flags.forward_only {
        ReverseDecision::Skip
    } else if flags.force {
        ReverseDecision::ApplyUnswapped
    } else {
        ReverseDecision::AssumeSwap
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrereqDecision {
    WarnAndContinue,
    Abort,
}

/// Spec §7 kind 3: "If `--force`, warn and continue; if `--batch`, abort;
/// else prompt." Non-interactively, the unprompted case defaults to the
/// same abort `--batch` uses, since proceeding silently on an unconfirmed
/// mismatch would violate the exact wording "abort" just as readily as
/// prompting would have risked.
pub fn resolve_prereq_mismatch(flags: PolicyFlags) -> PrereqDecision {
    if flags.force {
        PrereqDecision::WarnAndContinue
    } else {
        PrereqDecision::Abort
    }
}

/// Spec §7 kind 5, applied directly: `Ignore` proceeds silently, `Warn`
/// proceeds after logging, `Fail` latches `skip_rest_of_patch`.
pub fn resolve_read_only(policy: ReadOnlyPolicy) -> ReadOnlyDecision {
    match policy {
        ReadOnlyPolicy::Ignore => ReadOnlyDecision::Proceed,
        ReadOnlyPolicy::Warn => ReadOnlyDecision::ProceedWithWarning,
        ReadOnlyPolicy::Fail => ReadOnlyDecision::SkipRestOfEntry,
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadOnlyDecision {
    Proceed,
    ProceedWithWarning,
    SkipRestOfEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_respects_forward_only_over_force() {
        let flags = PolicyFlags {
            forward_only: true,
            force: true,
            batch: false,
        };
        assert_eq!(resolve_reverse(flags), ReverseDecision::Skip);
    }

    #[test]
    fn reverse_defaults_to_assume_swap() {
        assert_eq!(resolve_reverse(PolicyFlags::default()), ReverseDecision::AssumeSwap);
    }

    #[test]
    fn prereq_force_warns_instead_of_aborting() {
        let flags = PolicyFlags { force: true, ..Default::default() };
        assert_eq!(resolve_prereq_mismatch(flags), PrereqDecision::WarnAndContinue);
    }

    #[test]
    fn read_only_fail_latches_skip() {
        assert_eq!(
            resolve_read_only(ReadOnlyPolicy::Fail),
            ReadOnlyDecision::SkipRestOfEntry
        );
    }
}
