// src/fs/mod.rs

//! Filesystem access used by watch-root classification and directory
//! snapshots.
//!
//! Everything goes through [`FileSystem`] so snapshot and classification logic
//! can be exercised against [`mock::MockFileSystem`] in tests.

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod mock;

/// What a path points at, as far as watching is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Only reported by [`FileSystem::symlink_stat`].
    Symlink,
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Classify a path. Fails if the path does not exist or can't be read.
    fn stat(&self, path: &Path) -> io::Result<EntryKind>;

    /// Classify a path without following a final symlink.
    fn symlink_stat(&self, path: &Path) -> io::Result<EntryKind>;

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Return the entries of a directory as full paths.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn stat(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = fs::metadata(path)?;
        if meta.is_dir() {
            Ok(EntryKind::Dir)
        } else {
            Ok(EntryKind::File)
        }
    }

    fn symlink_stat(&self, path: &Path) -> io::Result<EntryKind> {
        let file_type = fs::symlink_metadata(path)?.file_type();
        Ok(if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        })
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            entries.push(entry?.path());
        }
        Ok(entries)
    }
}
