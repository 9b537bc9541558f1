//! Watch mode for automatic rebuilds on file changes
//!
//! Provides a single debounced file-system watcher rooted at the service
//! root, plus the change classification the pipeline's watch loop uses to
//! dispatch rebuilds. Rebuilds are serialized by construction: the loop
//! blocks on the next batch and runs its rebuild to completion before
//! accepting another; batches that pile up in the meantime are drained and
//! collapsed into one follow-up pass.

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind, Debouncer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

use crate::{BUILD_FOLDER, DEPLOY_FOLDER};

/// Debounce window for change batches.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Error during watch mode
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize file watcher
    WatcherInit(notify::Error),
    /// Failed to add watch path
    WatchPath(notify::Error),
    /// Channel receive error
    Channel(String),
    /// Watch session could not be set up
    Setup(String),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::WatcherInit(e) => write!(f, "Failed to initialize file watcher: {}", e),
            WatchError::WatchPath(e) => write!(f, "Failed to watch path: {}", e),
            WatchError::Channel(msg) => write!(f, "Watch channel error: {}", msg),
            WatchError::Setup(msg) => write!(f, "Failed to set up watch session: {}", msg),
        }
    }
}

impl std::error::Error for WatchError {}

/// What a batch of file changes asks the watch loop to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// A watched source file changed
    pub source: bool,
    /// A schema file changed
    pub schema: bool,
}

impl ChangeSet {
    /// Check if the batch contained nothing relevant.
    pub fn is_empty(&self) -> bool {
        !self.source && !self.schema
    }
}

/// Classifies changed paths against the watched source set.
///
/// Paths under the build and deploy directories are never relevant;
/// compiler output must not retrigger builds.
#[derive(Debug)]
pub struct ChangeClassifier {
    ignored: Vec<PathBuf>,
    sources: HashSet<PathBuf>,
}

impl ChangeClassifier {
    /// Create a classifier for a service root and its resolved source files.
    pub fn new(root: &Path, source_files: &[PathBuf]) -> Self {
        // The watcher may report paths through a symlinked parent, so both
        // the raw and the canonicalized prefixes are ignored.
        let mut ignored = Vec::new();
        for root in [root.to_path_buf(), normalize(root)] {
            for folder in [BUILD_FOLDER, DEPLOY_FOLDER] {
                let dir = root.join(folder);
                if !ignored.contains(&dir) {
                    ignored.push(dir);
                }
            }
        }
        let sources = source_files
            .iter()
            .map(|file| {
                if file.is_absolute() {
                    normalize(file)
                } else {
                    normalize(&root.join(file))
                }
            })
            .collect();
        Self { ignored, sources }
    }

    /// Collapse a batch of changed paths into at most one rebuild of each
    /// kind. Any number of source changes in a batch still yields a single
    /// source rebuild.
    pub fn classify(&self, paths: &[PathBuf]) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for path in paths {
            let normalized = normalize(path);
            if self
                .ignored
                .iter()
                .any(|dir| path.starts_with(dir) || normalized.starts_with(dir))
            {
                continue;
            }
            if is_schema_file(&normalized) {
                changes.schema = true;
            } else if self.sources.contains(&normalized) {
                changes.source = true;
            }
        }
        changes
    }
}

/// Check if a path is a schema file.
pub fn is_schema_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("gql") | Some("graphql")
    )
}

/// Paths reported by the watcher may differ from configured ones through
/// symlinked parents; compare canonicalized where possible.
fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// A debounced recursive watcher over the service root.
pub struct FileWatcher {
    // Held so the watcher thread stays alive for the session
    _debouncer: Debouncer<RecommendedWatcher>,
    rx: Receiver<DebounceEventResult>,
}

impl FileWatcher {
    /// Start watching `root` recursively with the given debounce window.
    pub fn new(root: &Path, debounce: Duration) -> Result<Self, WatchError> {
        let (tx, rx) = channel();
        let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;
        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(WatchError::WatchPath)?;
        Ok(Self { _debouncer: debouncer, rx })
    }

    /// Block until the next batch of debounced change paths.
    ///
    /// Watcher-reported errors are logged and skipped; only a closed channel
    /// ends the session.
    pub fn next_batch(&self) -> Result<Vec<PathBuf>, WatchError> {
        loop {
            match self.rx.recv() {
                Ok(Ok(events)) => return Ok(event_paths(events)),
                Ok(Err(error)) => {
                    eprintln!("Watch error: {:?}", error);
                }
                Err(e) => return Err(WatchError::Channel(e.to_string())),
            }
        }
    }

    /// Collect every batch that arrived without blocking.
    ///
    /// Used after a rebuild to collapse changes that landed mid-rebuild
    /// into one follow-up pass instead of queueing them.
    pub fn drain(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            if let Ok(events) = result {
                paths.extend(event_paths(events));
            }
        }
        paths
    }
}

fn event_paths(events: Vec<notify_debouncer_mini::DebouncedEvent>) -> Vec<PathBuf> {
    events
        .into_iter()
        .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
        .map(|e| e.path)
        .collect()
}
