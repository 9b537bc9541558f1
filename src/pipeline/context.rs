//! Pipeline context: service, paths and build state.

use crate::functions::Service;
use crate::{BUILD_FOLDER, DEPLOY_FOLDER};
use std::path::{Path, PathBuf};

/// Context owned by one pipeline instance.
///
/// The watching flag and the original/substituted root pair live here, on
/// the orchestrator instance, with a single logical owner, never as
/// ambient globals.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Active service root; substituted with the build directory while the
    /// pipeline runs
    root: PathBuf,
    /// Original service root, captured on first compile
    original_root: Option<PathBuf>,
    /// Whether a watch session has been started
    watching: bool,
    /// The service manifest
    service: Service,
    /// Selected function, narrowing the working set to one deployable unit
    selection: Option<String>,
}

impl PipelineContext {
    /// Create a context for a service rooted at `root`.
    pub fn new(service: Service, root: PathBuf) -> Self {
        Self { root, original_root: None, watching: false, service, selection: None }
    }

    /// Narrow the working set to a single function.
    pub fn with_function(mut self, name: Option<String>) -> Self {
        self.selection = name;
        self
    }

    /// The selected function, if any.
    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// The service manifest.
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Mutable access to the service manifest.
    pub fn service_mut(&mut self) -> &mut Service {
        &mut self.service
    }

    /// The active root: the original service root before the first compile,
    /// the isolated build directory afterwards.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The original service root regardless of substitution.
    pub fn original_root(&self) -> &Path {
        self.original_root.as_deref().unwrap_or(&self.root)
    }

    /// The isolated build directory under the original root.
    pub fn build_dir(&self) -> PathBuf {
        self.original_root().join(BUILD_FOLDER)
    }

    /// The deployment output directory, a sibling of the build directory.
    pub fn deploy_dir(&self) -> PathBuf {
        self.original_root().join(DEPLOY_FOLDER)
    }

    /// Whether the build directory is currently substituted as the root.
    pub fn is_substituted(&self) -> bool {
        self.original_root.is_some()
    }

    /// Substitute the build directory for the service root.
    ///
    /// Captures the original root on first call so that downstream packaging
    /// operates on the isolated build directory instead of the source tree.
    /// Later calls are no-ops.
    pub fn substitute_build_root(&mut self) {
        if self.original_root.is_none() {
            let original = std::mem::replace(&mut self.root, PathBuf::new());
            self.root = original.join(BUILD_FOLDER);
            self.original_root = Some(original);
        }
    }

    /// Restore the original service root.
    ///
    /// Returns `true` on the one call that actually restores; the root is
    /// only ever restored once.
    pub fn restore_root(&mut self) -> bool {
        match self.original_root.take() {
            Some(original) => {
                self.root = original;
                true
            }
            None => false,
        }
    }

    /// Whether a watch session is active.
    pub fn is_watching(&self) -> bool {
        self.watching
    }

    /// Enter the watching state.
    ///
    /// Returns `false` if a watch session was already started; at most one
    /// session exists per context lifetime.
    pub fn begin_watching(&mut self) -> bool {
        if self.watching {
            return false;
        }
        self.watching = true;
        true
    }

    /// Resolve a path relative to the original service root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.original_root().join(path)
        }
    }
}
