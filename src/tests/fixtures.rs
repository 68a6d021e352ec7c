//! Plain-file/patch test fixtures (replaces the teacher's git-repo-based
//! `repo_utils.rs`, since this crate has no repository to fix up, only a
//! working directory of ordinary files).

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// A scratch working directory holding the "original" files a patch will
/// be applied against.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Workspace {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn write_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let full = self.dir.path().join(relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(&full, contents).expect("write fixture file");
        full
    }

    pub fn read_file(&self, relative: &str) -> Vec<u8> {
        fs::read(self.dir.path().join(relative)).expect("read fixture file")
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.dir.path().join(relative).exists()
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_roundtrips_a_file() {
        let ws = Workspace::new();
        ws.write_file("a/b.txt", b"hello\n");
        assert_eq!(ws.read_file("a/b.txt"), b"hello\n");
        assert!(ws.exists("a/b.txt"));
        assert!(!ws.exists("a/missing.txt"));
    }
}
