// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Classifying watch roots into files and directory snapshots.
//! - Keeping directory snapshots current (`listing`).
//! - Running the watch-reload loop that turns OS notifications into a
//!   stream of [`WatchMessage`]s (`session`).
//!
//! It does **not** know about builds or processes; the engine decides what a
//! change means.

pub mod listing;
pub mod notifier;
pub mod patterns;
pub mod session;
pub mod sink;
pub mod target;

pub use listing::{DirEntry, DirListing, Tree};
pub use notifier::{Notifier, NotifyHandle, RecommendedNotifier};
pub use patterns::{identity_mapper, NameMapper, PathFilter, DEFAULT_EXCLUDES};
pub use session::{
    is_change, spawn_watch, spawn_watch_set, SessionCanceller, WatchBackend, WatchConfig, WatchOptions,
    WatchRoots, WatchSession,
};
pub use sink::{CloseNotify, WatchEvent, WatchMessage, WatchSink};
pub use target::{WatchTarget, WatchTargets};
