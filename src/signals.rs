//! Signal-deferred critical sections (spec §5): a scoped guard standing in
//! for `defer_signals`/`undefer_signals`, plus the volatile marker the
//! fatal-exit path reads to decide what to unlink.
//!
//! Real `sigprocmask`-based blocking is out of scope for a portable crate;
//! this models the nesting-counter contract and the marker the cleanup
//! path depends on, see DESIGN.md.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

static DEFER_DEPTH: AtomicUsize = AtomicUsize::new(0);

/// Acquiring a guard increments the nesting counter; dropping it (on every
/// exit path, including unwinding) decrements it. Only the outermost guard
/// going away actually unblocks anything in a real signal-blocking
/// implementation.
pub struct SignalGuard {
    _private: (),
}

impl SignalGuard {
    pub fn acquire() -> Self {
        DEFER_DEPTH.fetch_add(1, Ordering::SeqCst);
        SignalGuard { _private: () }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        DEFER_DEPTH.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn defer_depth() -> usize {
    DEFER_DEPTH.load(Ordering::SeqCst)
}

/// One temp file the fatal-exit path may need to unlink. `exists` is the
/// volatile marker from spec §5/§9: set true only once the file is known to
/// be on disk, so a signal arriving mid-creation never attempts to unlink a
/// half-made path.
struct TrackedTemp {
    path: PathBuf,
    exists: AtomicBool,
}

/// The set of temp files currently at risk, walked by the fatal handler
/// without allocating (spec §5: "without allocating"). A `Mutex<Vec<_>>` is
/// the honest approximation available without raw signal-handler access;
/// see DESIGN.md for why this crate does not install a real handler.
static TRACKED: Mutex<Vec<TrackedTemp>> = Mutex::new(Vec::new());

/// Registers a temp file as existing; returns a token used to untrack it
/// once it has been renamed or removed through the ordinary path.
pub fn track_temp(path: PathBuf) -> usize {
    let mut guard = TRACKED.lock().unwrap();
    guard.push(TrackedTemp {
        path,
        exists: AtomicBool::new(true),
    });
    guard.len() - 1
}

pub fn untrack_temp(token: usize) {
    if let Some(entry) = TRACKED.lock().unwrap().get(token) {
        entry.exists.store(false, Ordering::SeqCst);
    }
}

/// The cleanup pipeline `fatal_exit` runs: unlinks every tracked temp file
/// still marked as existing. Called from ordinary error handling in this
/// crate (see `orchestrator::PatchEngine::fatal_exit`), not from inside an
/// actual signal handler.
pub fn run_cleanup() {
    let guard = TRACKED.lock().unwrap();
    for entry in guard.iter() {
        if entry.exists.load(Ordering::SeqCst) {
            let _ = std::fs::remove_file(&entry.path);
            entry.exists.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_nest_and_unwind() {
        assert_eq!(defer_depth(), 0);
        let outer = SignalGuard::acquire();
        assert_eq!(defer_depth(), 1);
        {
            let _inner = SignalGuard::acquire();
            assert_eq!(defer_depth(), 2);
        }
        assert_eq!(defer_depth(), 1);
        drop(outer);
        assert_eq!(defer_depth(), 0);
    }

    #[test]
    fn untracked_temp_is_not_removed_by_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch");
        std::fs::write(&path, b"x").unwrap();
        let token = track_temp(path.clone());
        untrack_temp(token);
        run_cleanup();
        assert!(path.exists());
    }
}
