//! The closed error taxonomy from spec §7, modeled as a typed enum so the
//! orchestrator can match on kind instead of string-sniffing a message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    /// Syntactically broken header, impossible counts, missing separator,
    /// unexpected marker. Fatal for the current patch entry only.
    #[error("patch file line {line}: {reason}")]
    MalformedPatch { line: u64, reason: String },

    /// No position found at the permitted fuzz. The hunk is rejected, not
    /// fatal to the rest of the patch entry.
    #[error("hunk #{hunk} FAILED at {line}")]
    HunkMismatch { hunk: u64, line: u64 },

    /// The `Prereq:` revision string was not found in the input.
    #[error("this file doesn't appear to be the {prereq} version -- patching anyway")]
    PrereqMismatch { prereq: String },

    /// The first hunk only matched after the sides were swapped.
    #[error("Reversed (or previously applied) patch detected! Assuming -R.")]
    ReverseDetected,

    /// The target file is read-only and `--read-only=fail` (or the default
    /// `warn` escalated by policy) is in effect.
    #[error("{path}: Permission denied")]
    ReadOnlyInput { path: String },

    /// The safe-path gateway refused a patch-supplied path.
    #[error("{path}: unsafe path ({reason})")]
    PathUnsafe { path: String, reason: &'static str },

    /// Read/write/rename failure. Fatal; triggers cleanup.
    #[error("{0}")]
    Io(String),

    /// An internal invariant was violated — a programming error, not a user
    /// mistake. Fatal.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PatchError {
    pub fn from_io(err: std::io::Error) -> Self {
        PatchError::Io(err.to_string())
    }

    /// Maps an error to the process exit code from spec §6: 0 is reserved
    /// for "every hunk applied"; this only ever produces 1 or 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            PatchError::HunkMismatch { .. } => 1,
            _ => 2,
        }
    }

    /// Whether this failure should latch `skip_rest_of_patch` for the
    /// current patch-file entry (spec §7 propagation policy).
    pub fn skips_rest_of_entry(&self) -> bool {
        matches!(
            self,
            PatchError::ReadOnlyInput { .. } | PatchError::PathUnsafe { .. }
        )
    }
}
