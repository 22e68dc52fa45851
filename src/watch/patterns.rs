// src/watch/patterns.rs

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Directories that are never worth watching in a development tree.
pub const DEFAULT_EXCLUDES: &[&str] = &["**/.git", "**/target", "**/node_modules"];

/// Maps a real file name to the name exposed by a directory snapshot.
pub type NameMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Identity mapper.
pub fn identity_mapper() -> NameMapper {
    Arc::new(|name: &str| name.to_string())
}

/// Decides which paths under a watch root make it into a snapshot.
///
/// Patterns are matched against the path relative to the root, with forward
/// slashes (e.g. `"src/main.rs"`). An excluded directory is pruned together
/// with everything below it.
#[derive(Clone)]
pub struct PathFilter {
    exclude_set: Option<GlobSet>,
    patterns: Vec<String>,
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathFilter")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl PathFilter {
    /// A filter that accepts everything.
    pub fn allow_all() -> Self {
        Self {
            exclude_set: None,
            patterns: Vec::new(),
        }
    }

    /// Compile a filter from exclude globs.
    ///
    /// If `with_defaults` is true, [`DEFAULT_EXCLUDES`] are appended.
    pub fn from_excludes(patterns: &[String], with_defaults: bool) -> Result<Self> {
        let mut all: Vec<String> = patterns.to_vec();
        if with_defaults {
            all.extend(DEFAULT_EXCLUDES.iter().map(|s| s.to_string()));
        }

        if all.is_empty() {
            return Ok(Self::allow_all());
        }

        let exclude_set = build_globset(&all).context("building exclude globset")?;
        Ok(Self {
            exclude_set: Some(exclude_set),
            patterns: all,
        })
    }

    /// Returns true if `rel_path` (relative to the watch root) should be kept.
    pub fn allows(&self, rel_path: &str) -> bool {
        match &self.exclude_set {
            Some(set) => !set.is_match(rel_path),
            None => true,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_excludes_prune_vcs_and_build_dirs() {
        let filter = PathFilter::from_excludes(&[], true).unwrap();
        assert!(!filter.allows(".git"));
        assert!(!filter.allows("web/node_modules"));
        assert!(!filter.allows("target"));
        assert!(filter.allows("src/main.rs"));
    }

    #[test]
    fn user_patterns_are_applied() {
        let filter = PathFilter::from_excludes(&["**/*.tmp".to_string()], false).unwrap();
        assert!(!filter.allows("a/b/c.tmp"));
        assert!(filter.allows("a/b/c.rs"));
        assert!(filter.allows(".git"));
    }

    #[test]
    fn invalid_glob_is_rejected() {
        assert!(PathFilter::from_excludes(&["a/[".to_string()], false).is_err());
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/proj");
        assert_eq!(
            relative_str(root, Path::new("/proj/src/lib.rs")).as_deref(),
            Some("src/lib.rs")
        );
        assert_eq!(relative_str(root, Path::new("/other/x")), None);
    }
}
