// src/watch/target.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::{DevloopError, Result};
use crate::fs::{EntryKind, FileSystem};
use crate::watch::listing::DirListing;
use crate::watch::patterns::{NameMapper, PathFilter};

/// A watch root after classification.
#[derive(Debug, Clone)]
pub enum WatchTarget {
    File(PathBuf),
    Dir(Arc<DirListing>),
}

impl WatchTarget {
    /// Stat `path` and build the matching target.
    ///
    /// Directories get an initial snapshot. The path is canonicalized first so
    /// registered paths line up with what the backend reports.
    pub fn classify(
        fs: &Arc<dyn FileSystem>,
        path: &Path,
        filter: &PathFilter,
        mapper: &NameMapper,
    ) -> Result<Self> {
        let stat_err = |source| DevloopError::Stat {
            path: path.to_path_buf(),
            source,
        };

        let kind = fs.stat(path).map_err(stat_err)?;
        let path = fs.canonicalize(path).map_err(stat_err)?;

        match kind {
            EntryKind::File | EntryKind::Symlink => {
                debug!(path = ?path, "watch root is a file");
                Ok(WatchTarget::File(path))
            }
            EntryKind::Dir => {
                debug!(path = ?path, "watch root is a directory");
                let listing = DirListing::list(Arc::clone(fs), path, filter.clone(), Arc::clone(mapper))?;
                Ok(WatchTarget::Dir(Arc::new(listing)))
            }
        }
    }

    pub fn listing(&self) -> Option<&Arc<DirListing>> {
        match self {
            WatchTarget::Dir(listing) => Some(listing),
            WatchTarget::File(_) => None,
        }
    }
}

/// The classified roots of one session: directories with their snapshots and
/// a flat list of files.
#[derive(Debug, Clone, Default)]
pub struct WatchTargets {
    pub dirs: Vec<Arc<DirListing>>,
    pub files: Vec<PathBuf>,
}

impl WatchTargets {
    pub fn push(&mut self, target: WatchTarget) {
        match target {
            WatchTarget::File(path) => self.files.push(path),
            WatchTarget::Dir(listing) => self.dirs.push(listing),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }

    /// Visit every path that belongs in a registration: each directory
    /// snapshot (under its read lock), then the flat file list.
    pub fn visit_paths(&self, mut visit: impl FnMut(&Path)) {
        for dir in &self.dirs {
            dir.visit_paths(&mut visit);
        }
        for file in &self.files {
            visit(file);
        }
    }
}
