//! Backup/file-id registry (spec §4.2): tracks `(device, inode) -> status`
//! so a file is backed up only on its first modification and deletions can
//! be deferred across a concatenated patch stream.

use std::collections::HashMap;
use std::path::PathBuf;

/// A file's identity, used instead of its path so hardlinks and renames
/// within one run still resolve to the same registry entry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FileId {
    pub device: u64,
    pub inode: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Created,
    Overwritten,
    DeleteLater,
}

struct Entry {
    status: Status,
    queued_output: bool,
}

struct PendingDelete {
    path: PathBuf,
    id: FileId,
    backup: bool,
}

/// `insert`/`lookup`/`set_queued_output`/`delete_later` as specified. Not
/// `Sync`; the orchestrator owns one registry per run on its single thread.
#[derive(Default)]
pub struct Registry {
    entries: HashMap<FileId, Entry>,
    pending_deletes: Vec<PendingDelete>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn insert(&mut self, id: FileId, status: Status) {
        match self.entries.get_mut(&id) {
            Some(entry) => entry.status = status,
            None => {
                self.entries.insert(
                    id,
                    Entry {
                        status,
                        queued_output: false,
                    },
                );
            }
        }
    }

    pub fn lookup(&self, id: FileId) -> Option<Status> {
        self.entries.get(&id).map(|e| e.status)
    }

    pub fn set_queued_output(&mut self, id: FileId, queued: bool) {
        self.entries.entry(id).or_insert(Entry {
            status: Status::Created,
            queued_output: false,
        }).queued_output = queued;
    }

    pub fn has_queued_output(&self, id: FileId) -> bool {
        self.entries.get(&id).map(|e| e.queued_output).unwrap_or(false)
    }

    /// Appends `path` to the ordered delete-later list. A later `insert`
    /// with status `Created` for the same id turns the delete into a no-op
    /// (the file was re-created in the same run).
    pub fn delete_later(&mut self, path: PathBuf, id: FileId, backup: bool) {
        self.insert(id, Status::DeleteLater);
        self.pending_deletes.push(PendingDelete { path, id, backup });
    }

    /// Runs at end-of-run: returns the paths still mapped to `DeleteLater`,
    /// in enqueue order, each paired with whether a backup should be made
    /// before unlinking. Paths re-created since their `delete_later` call
    /// (status moved off `DeleteLater`) are skipped.
    pub fn drain_pending_deletes(&mut self) -> Vec<(PathBuf, bool)> {
        let entries = &self.entries;
        self.pending_deletes
            .drain(..)
            .filter(|pd| entries.get(&pd.id).map(|e| e.status) == Some(Status::DeleteLater))
            .map(|pd| (pd.path, pd.backup))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> FileId {
        FileId { device: 1, inode: n }
    }

    #[test]
    fn first_touch_then_overwrite_transitions() {
        let mut reg = Registry::new();
        assert_eq!(reg.lookup(id(1)), None);
        reg.insert(id(1), Status::Created);
        assert_eq!(reg.lookup(id(1)), Some(Status::Created));
        reg.insert(id(1), Status::Overwritten);
        assert_eq!(reg.lookup(id(1)), Some(Status::Overwritten));
    }

    #[test]
    fn deferred_delete_skipped_if_recreated() {
        let mut reg = Registry::new();
        reg.delete_later(PathBuf::from("a"), id(2), false);
        reg.insert(id(2), Status::Created);
        assert!(reg.drain_pending_deletes().is_empty());
    }

    #[test]
    fn deferred_delete_survives_if_untouched() {
        let mut reg = Registry::new();
        reg.delete_later(PathBuf::from("a"), id(3), true);
        let pending = reg.drain_pending_deletes();
        assert_eq!(pending, vec![(PathBuf::from("a"), true)]);
    }

    #[test]
    fn queued_output_roundtrips() {
        let mut reg = Registry::new();
        assert!(!reg.has_queued_output(id(4)));
        reg.set_queued_output(id(4), true);
        assert!(reg.has_queued_output(id(4)));
    }
}
