// src/fs/mock.rs

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{EntryKind, FileSystem};

/// In-memory tree used by tests.
///
/// Parent directories are created implicitly when a file or directory is
/// added. Paths are used verbatim; tests should stick to absolute paths.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, EntryKind>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.lock();
        if let Some(parent) = path.parent() {
            Self::ensure_dirs(&mut entries, parent);
        }
        entries.insert(path.to_path_buf(), EntryKind::File);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.lock();
        Self::ensure_dirs(&mut entries, path.as_ref());
    }

    /// Add a symlink entry. Its target is not modelled: `stat` reports it as
    /// a file and `read_dir` refuses it.
    pub fn add_symlink(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.lock();
        if let Some(parent) = path.parent() {
            Self::ensure_dirs(&mut entries, parent);
        }
        entries.insert(path.to_path_buf(), EntryKind::Symlink);
    }

    /// Remove a path and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.lock().retain(|p, _| !p.starts_with(path));
    }

    fn ensure_dirs(entries: &mut BTreeMap<PathBuf, EntryKind>, dir: &Path) {
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            entries.insert(ancestor.to_path_buf(), EntryKind::Dir);
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, EntryKind>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("not found: {path:?}"))
}

impl FileSystem for MockFileSystem {
    fn stat(&self, path: &Path) -> io::Result<EntryKind> {
        match self.symlink_stat(path)? {
            EntryKind::Symlink => Ok(EntryKind::File),
            kind => Ok(kind),
        }
    }

    fn symlink_stat(&self, path: &Path) -> io::Result<EntryKind> {
        self.lock().get(path).copied().ok_or_else(|| not_found(path))
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        if self.lock().contains_key(path) {
            Ok(path.to_path_buf())
        } else {
            Err(not_found(path))
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = self.lock();
        match entries.get(path) {
            Some(EntryKind::Dir) => Ok(entries
                .keys()
                .filter(|p| p.parent() == Some(path))
                .cloned()
                .collect()),
            Some(EntryKind::File | EntryKind::Symlink) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("not a directory: {path:?}"),
            )),
            None => Err(not_found(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_are_created_and_removal_is_recursive() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/src/main.rs");
        fs.add_file("/proj/README.md");

        assert_eq!(fs.stat(Path::new("/proj/src")).unwrap(), EntryKind::Dir);
        let mut top = fs.read_dir(Path::new("/proj")).unwrap();
        top.sort();
        assert_eq!(
            top,
            vec![PathBuf::from("/proj/README.md"), PathBuf::from("/proj/src")]
        );

        fs.remove("/proj/src");
        assert!(fs.stat(Path::new("/proj/src/main.rs")).is_err());
        assert_eq!(fs.read_dir(Path::new("/proj")).unwrap().len(), 1);
    }
}
