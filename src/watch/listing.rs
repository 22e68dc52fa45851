// src/watch/listing.rs

//! Recursive directory snapshots.
//!
//! A [`DirListing`] holds, behind a read/write lock, a map from every
//! absolute directory path under a root to the files it directly contains.
//! The watch loop reads it to build a registration; [`DirListing::reload`]
//! replaces it wholesale after a change. Readers never observe a half-built
//! tree.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, trace};

use crate::errors::{DevloopError, Result};
use crate::fs::{EntryKind, FileSystem};
use crate::watch::patterns::{relative_str, NameMapper, PathFilter};

/// A file inside a snapshot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Output name produced by the listing's [`NameMapper`].
    pub name: String,
    /// Name of the file on disk.
    pub real: String,
}

/// Directory path -> files directly inside it.
pub type Tree = BTreeMap<PathBuf, Vec<DirEntry>>;

pub struct DirListing {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    filter: PathFilter,
    mapper: NameMapper,
    tree: RwLock<Tree>,
}

impl fmt::Debug for DirListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirListing")
            .field("root", &self.root)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl DirListing {
    /// Walk `root` and build the initial snapshot.
    pub fn list(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        filter: PathFilter,
        mapper: NameMapper,
    ) -> Result<Self> {
        let root = root.into();
        let tree = walk(fs.as_ref(), &root, &filter, &mapper)?;
        debug!(root = ?root, dirs = tree.len(), "directory listing built");

        Ok(Self {
            root,
            fs,
            filter,
            mapper,
            tree: RwLock::new(tree),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-walk the root and swap in the new tree.
    ///
    /// The walk happens before the write lock is taken; the lock is only held
    /// for the swap. On failure the previous tree is kept.
    pub fn reload(&self) -> Result<()> {
        let fresh = walk(self.fs.as_ref(), &self.root, &self.filter, &self.mapper)?;
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        *tree = fresh;
        trace!(root = ?self.root, dirs = tree.len(), "directory listing reloaded");
        Ok(())
    }

    /// Clone of the current tree.
    pub fn snapshot(&self) -> Tree {
        self.tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every directory plus every file in the current tree, as absolute
    /// paths. Directories come first in each group.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        self.visit_paths(|path| out.push(path.to_path_buf()));
        out
    }

    /// Call `visit` for every directory and file while holding the read
    /// lock. A concurrent reload waits until the visit is done.
    pub fn visit_paths(&self, mut visit: impl FnMut(&Path)) {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        for (dir, files) in tree.iter() {
            visit(dir);
            for entry in files {
                visit(&dir.join(&entry.real));
            }
        }
    }

    /// Whether the current tree lists `path` as a file.
    pub fn contains_file(&self, path: &Path) -> bool {
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            return false;
        };
        let name = name.to_string_lossy();
        self.tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dir)
            .is_some_and(|files| files.iter().any(|entry| entry.real == name))
    }
}

fn walk(fs: &dyn FileSystem, root: &Path, filter: &PathFilter, mapper: &NameMapper) -> Result<Tree> {
    let mut tree = Tree::new();

    let root_entries = fs.read_dir(root).map_err(|source| DevloopError::Stat {
        path: root.to_path_buf(),
        source,
    })?;

    let mut stack = vec![(root.to_path_buf(), root_entries)];

    while let Some((dir, children)) = stack.pop() {
        let mut files = Vec::new();

        for child in children {
            // Paths outside the root cannot come out of read_dir, so None
            // only happens for the root itself.
            let rel = relative_str(root, &child).unwrap_or_default();
            if !filter.allows(&rel) {
                trace!(path = %rel, "excluded from listing");
                continue;
            }

            // Links are listed as files and never descended into, so a link
            // cycle cannot make the walk fail.
            match fs.symlink_stat(&child) {
                Ok(EntryKind::Dir) => match fs.read_dir(&child) {
                    Ok(grandchildren) => stack.push((child, grandchildren)),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        debug!(path = ?child, "directory vanished during walk");
                    }
                    Err(e) => return Err(e.into()),
                },
                Ok(EntryKind::File | EntryKind::Symlink) => {
                    let real = child
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    files.push(DirEntry {
                        name: mapper(&real),
                        real,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = ?child, "entry vanished during walk");
                }
                Err(e) => return Err(e.into()),
            }
        }

        files.sort_by(|a, b| a.real.cmp(&b.real));
        tree.insert(dir, files);
    }

    Ok(tree)
}
