//! Cache keys and the entries stored under them.

use bytes::Bytes;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::timer::TaskHandle;

/// A file path used as a cache key.
///
/// Keys are compared on their lexically normalized form: `.` components are
/// dropped and `..` removes the preceding component, so `a/./b/../c.txt` and
/// `a/c.txt` name the same entry. `..` at the root stays at the root; leading
/// `..` of a relative path is kept. The filesystem is never consulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(PathBuf);

impl CacheKey {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(normalize(path.as_ref()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`.
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for CacheKey {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<&Path> for CacheKey {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for CacheKey {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&str> for CacheKey {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for CacheKey {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

/// A cached file body and the bookkeeping for its expiration.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    /// File contents captured at insertion.
    pub(crate) value: Bytes,

    /// Distinguishes this entry from any later entry under the same key.
    pub(crate) generation: u64,

    /// The pending expiration task.
    pub(crate) timer: TaskHandle,
}

impl Entry {
    pub(crate) fn new(value: Bytes, generation: u64, timer: TaskHandle) -> Self {
        Self {
            value,
            generation,
            timer,
        }
    }

    /// Whether an expiration fired for `generation` targets this entry.
    pub(crate) fn is_generation(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalizes_dot_components() {
        assert_eq!(CacheKey::new("content/./a.txt"), CacheKey::new("content/a.txt"));
        assert_eq!(
            CacheKey::new("content/sub/../a.txt"),
            CacheKey::new("content/a.txt")
        );
    }

    #[test]
    fn test_key_keeps_leading_parent_dirs() {
        assert_eq!(CacheKey::new("../a.txt").as_path(), Path::new("../a.txt"));
        assert_eq!(CacheKey::new("../../a.txt").as_path(), Path::new("../../a.txt"));
        assert_eq!(CacheKey::new("a/../../b.txt").as_path(), Path::new("../b.txt"));
    }

    #[test]
    fn test_key_parent_of_root_is_root() {
        assert_eq!(CacheKey::new("/../a.txt"), CacheKey::new("/a.txt"));
        assert_eq!(CacheKey::new("/srv/../../a.txt"), CacheKey::new("/a.txt"));
    }

    #[test]
    fn test_distinct_paths_are_distinct_keys() {
        assert_ne!(CacheKey::new("a.txt"), CacheKey::new("b.txt"));
        assert_ne!(CacheKey::new("/srv/a.txt"), CacheKey::new("srv/a.txt"));
    }

    #[test]
    fn test_key_conversions() {
        let from_str: CacheKey = "a/b.txt".into();
        let from_buf: CacheKey = PathBuf::from("a/b.txt").into();
        assert_eq!(from_str, from_buf);
        assert_eq!(from_str.to_string(), Path::new("a/b.txt").display().to_string());
    }

    #[test]
    fn test_entry_generation_check() {
        let ids = crate::timer::TaskIds::default();
        let entry = Entry::new(Bytes::from("v1"), 7, ids.next());
        assert!(entry.is_generation(7));
        assert!(!entry.is_generation(8));
        assert_eq!(entry.value, Bytes::from("v1"));
    }
}
