//! Safe-path gateway (spec §4.1): resolves a user-supplied relative path
//! without letting it escape the working directory, simplified to a
//! component-walk over `std::fs` (no `*at()` primitives, see DESIGN.md).

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use crate::error::PatchError;

/// How many path components may be walked before giving up with `ELOOP`.
const MAX_COMPONENTS: usize = 1024;

/// Caches the canonical resolution of directory paths already walked, in
/// lieu of the original's directory-handle LRU (spec §4.1: "An LRU cache
/// holds up to `RLIMIT_NOFILE / 4` open directory handles").
pub struct SafePathGateway {
    root: PathBuf,
    follow_symlinks: bool,
    cache: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl SafePathGateway {
    pub fn new(root: PathBuf, follow_symlinks: bool) -> Self {
        SafePathGateway {
            root,
            follow_symlinks,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves `user_path` (relative to the gateway's root) to an absolute
    /// path guaranteed to stay under the root, rejecting `..` escapes and
    /// out-of-tree symlink targets.
    pub fn resolve(&self, user_path: &Path) -> Result<PathBuf, PatchError> {
        if user_path.is_absolute() {
            return Err(PatchError::PathUnsafe {
                path: user_path.display().to_string(),
                reason: "absolute paths are not accepted from patch content",
            });
        }

        let mut current = self.root.clone();
        let mut steps = 0usize;
        let mut pending: Vec<Component> = user_path.components().rev().collect();

        while let Some(component) = pending.pop() {
            steps += 1;
            if steps > MAX_COMPONENTS {
                return Err(PatchError::PathUnsafe {
                    path: user_path.display().to_string(),
                    reason: "ELOOP: too many path components",
                });
            }
            match component {
                Component::CurDir => continue,
                Component::ParentDir => {
                    if current == self.root {
                        return Err(PatchError::PathUnsafe {
                            path: user_path.display().to_string(),
                            reason: "EXDEV: .. escapes the working tree",
                        });
                    }
                    current.pop();
                }
                Component::Normal(name) => {
                    current.push(name);
                    if let Some(resolved) = self.try_cached(&current) {
                        current = resolved;
                        continue;
                    }
                    if self.follow_symlinks {
                        if let Ok(meta) = fs::symlink_metadata(&current) {
                            if meta.file_type().is_symlink() {
                                current = self.splice_symlink(&current, user_path)?;
                            }
                        }
                    }
                    self.cache_insert(&current);
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PatchError::PathUnsafe {
                        path: user_path.display().to_string(),
                        reason: "absolute component in patch-supplied path",
                    });
                }
            }
        }

        Ok(current)
    }

    fn try_cached(&self, path: &Path) -> Option<PathBuf> {
        self.cache.lock().unwrap().get(path).cloned()
    }

    fn cache_insert(&self, path: &Path) {
        self.cache
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), path.to_path_buf());
    }

    fn splice_symlink(&self, path: &Path, original: &Path) -> Result<PathBuf, PatchError> {
        let target = fs::read_link(path).map_err(PatchError::from_io)?;
        if target.is_absolute() {
            let canon = target.canonicalize().map_err(PatchError::from_io)?;
            let root_canon = self.root.canonicalize().map_err(PatchError::from_io)?;
            if !canon.starts_with(&root_canon) {
                return Err(PatchError::PathUnsafe {
                    path: original.display().to_string(),
                    reason: "EXDEV: absolute symlink escapes the working tree",
                });
            }
            return Ok(canon);
        }
        let mut spliced = path.parent().unwrap_or(&self.root).to_path_buf();
        spliced.push(target);
        self.resolve(
            spliced
                .strip_prefix(&self.root)
                .unwrap_or(&spliced)
                .as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolves_nested_relative_path() {
        let dir = tempdir().unwrap();
        let gw = SafePathGateway::new(dir.path().to_path_buf(), false);
        let resolved = gw.resolve(Path::new("a/b/c.txt")).unwrap();
        assert_eq!(resolved, dir.path().join("a/b/c.txt"));
    }

    #[test]
    fn rejects_parent_escape() {
        let dir = tempdir().unwrap();
        let gw = SafePathGateway::new(dir.path().to_path_buf(), false);
        assert!(gw.resolve(Path::new("../escape.txt")).is_err());
    }

    #[test]
    fn rejects_absolute_input() {
        let dir = tempdir().unwrap();
        let gw = SafePathGateway::new(dir.path().to_path_buf(), false);
        assert!(gw.resolve(Path::new("/etc/passwd")).is_err());
    }
}
