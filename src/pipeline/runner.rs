//! Pipeline orchestration.
//!
//! One orchestrator instance owns the build state for a process: stages run
//! strictly in sequence, a failed stage stops everything after it, and
//! `cleanup` is the only place the root substitution is ever reverted.

use crate::config::{load_generates, resolve_api_config, resolve_compiler_options};
use crate::functions::{Service, ServiceError};
use crate::pipeline::artifacts::relocate_artifacts;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::staging::{self, StagingError};
use crate::report::{ConsoleReporter, NullReporter, Reporter};
use crate::toolchain::{expand_schema_globs, CompileError, GenerationError, InvokeError, Toolchain};
use crate::watch::{ChangeClassifier, FileWatcher, WatchError, DEFAULT_DEBOUNCE_MS};
use crate::{BUILD_FOLDER, SCHEMA_GLOBS};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

static QUIET: NullReporter = NullReporter;

/// How the pipeline is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One-shot development build
    Run,
    /// Development build, then rebuild on changes until the process exits
    Watch,
    /// Packaging build producing a self-contained artifact
    PackageForDeploy,
}

/// Error during a pipeline run.
#[derive(Debug)]
pub enum PipelineError {
    /// Spec, route or schema type generation failed
    Generation(GenerationError),
    /// Compilation failed
    Compile(CompileError),
    /// Extras or dependency staging failed
    Staging(StagingError),
    /// The service manifest is unusable
    Service(ServiceError),
    /// IO error
    Io(io::Error),
    /// Watch session failed
    Watch(WatchError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Surface the originating stage's message, not a wrapper
        match self {
            PipelineError::Generation(e) => write!(f, "{}", e),
            PipelineError::Compile(e) => write!(f, "{}", e),
            PipelineError::Staging(e) => write!(f, "{}", e),
            PipelineError::Service(e) => write!(f, "{}", e),
            PipelineError::Io(e) => write!(f, "{}", e),
            PipelineError::Watch(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<GenerationError> for PipelineError {
    fn from(e: GenerationError) -> Self {
        PipelineError::Generation(e)
    }
}

impl From<CompileError> for PipelineError {
    fn from(e: CompileError) -> Self {
        PipelineError::Compile(e)
    }
}

impl From<StagingError> for PipelineError {
    fn from(e: StagingError) -> Self {
        PipelineError::Staging(e)
    }
}

impl From<ServiceError> for PipelineError {
    fn from(e: ServiceError) -> Self {
        PipelineError::Service(e)
    }
}

impl From<io::Error> for PipelineError {
    fn from(e: io::Error) -> Self {
        PipelineError::Io(e)
    }
}

impl From<WatchError> for PipelineError {
    fn from(e: WatchError) -> Self {
        PipelineError::Watch(e)
    }
}

/// The rebuild a watch session runs on source changes.
enum RebuildAction<'a> {
    /// Re-run the compile stage
    Compile,
    /// Re-invoke the deployable unit
    Invoke(&'a mut dyn FnMut() -> Result<(), InvokeError>),
}

/// The pipeline orchestrator.
///
/// Constructed once per process; owns the watching flag and the root-path
/// substitution for its lifetime.
pub struct Pipeline<T: Toolchain> {
    context: PipelineContext,
    toolchain: T,
    reporter: Box<dyn Reporter>,
    emitted: Vec<PathBuf>,
}

impl<T: Toolchain> Pipeline<T> {
    /// Create a pipeline for a service rooted at `root`.
    pub fn new(service: Service, root: PathBuf, toolchain: T) -> Self {
        Self {
            context: PipelineContext::new(service, root),
            toolchain,
            reporter: Box::new(ConsoleReporter::new()),
            emitted: Vec::new(),
        }
    }

    /// Replace the progress reporter.
    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Narrow the working set to a single function.
    pub fn with_function(mut self, name: Option<String>) -> Self {
        self.context = self.context.with_function(name);
        self
    }

    /// The pipeline context.
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    #[cfg(test)]
    pub(crate) fn context_mut(&mut self) -> &mut PipelineContext {
        &mut self.context
    }

    /// Files emitted by the most recent compile, in order. Hosts use this
    /// for cache invalidation before re-invoking a function.
    pub fn emitted_files(&self) -> &[PathBuf] {
        &self.emitted
    }

    /// Run the full pipeline.
    ///
    /// `RunMode::Watch` blocks after the initial build, rebuilding on
    /// changes until the process exits. `RunMode::PackageForDeploy` stages
    /// a full dependency copy; the host calls [`Pipeline::cleanup`] once it
    /// has produced the packaged output.
    pub fn run(&mut self, mode: RunMode) -> Result<(), PipelineError> {
        self.generate_spec_and_routes()?;
        self.generate_schema_types()?;
        self.compile()?;
        self.copy_extras()?;
        self.stage_dependencies(mode == RunMode::PackageForDeploy)?;
        if mode == RunMode::Watch {
            self.watch_all()?;
        }
        Ok(())
    }

    /// Generate the API spec document, then the routing glue code.
    ///
    /// Sequential on purpose: route generation may depend on files spec
    /// generation assumes exist. Either failure aborts the pipeline; no
    /// retries, since generation is deterministic over source content.
    pub fn generate_spec_and_routes(&mut self) -> Result<(), PipelineError> {
        self.reporter.log("Generating API spec and routes...");

        let root = self.context.original_root().to_path_buf();
        let options = resolve_compiler_options(&root, self.config_reporter());
        let resolved = resolve_api_config(&root, self.config_reporter());
        let ignore = resolved.ignore_paths.unwrap_or_default();

        self.toolchain.generate_spec(&resolved.spec, &options, &ignore)?;
        self.toolchain.generate_routes(&resolved.routes, &options, &ignore)?;

        self.reporter.log("API spec and route generation complete");
        Ok(())
    }

    /// Generate types from the service's schema files.
    pub fn generate_schema_types(&mut self) -> Result<(), PipelineError> {
        self.reporter.log("Generating schema types...");

        let root = self.context.original_root().to_path_buf();
        let patterns: Vec<String> = SCHEMA_GLOBS.iter().map(|g| (*g).to_string()).collect();
        let globs = expand_schema_globs(&root, &patterns);
        let generates = load_generates(&root);

        self.toolchain.generate_schema_types(&globs, &generates, true)?;

        self.reporter.log("Schema type generation complete");
        Ok(())
    }

    /// Compile the working set's root files into the build directory.
    ///
    /// The first invocation captures the original root and substitutes the
    /// isolated build directory, so every later packaging step operates on
    /// the build directory instead of the source tree. The compiler's
    /// output directory is forced there regardless of configuration.
    pub fn compile(&mut self) -> Result<Vec<PathBuf>, PipelineError> {
        let selection = self.context.selection().map(str::to_string);
        self.context.service_mut().prepare(selection.as_deref())?;

        self.reporter.log("Compiling service...");

        self.context.substitute_build_root();

        let root = self.context.original_root().to_path_buf();
        let mut options = resolve_compiler_options(&root, self.config_reporter());
        options.out_dir = PathBuf::from(BUILD_FOLDER);

        let root_files = self.context.service().root_files(selection.as_deref())?;
        let emitted = self.toolchain.compile(&root_files, &options)?;

        self.reporter.log("Compilation complete");
        self.emitted = emitted.clone();
        Ok(emitted)
    }

    /// Copy the service's extra include patterns into the build directory.
    pub fn copy_extras(&mut self) -> Result<(), PipelineError> {
        let include = self.context.service().package.include.clone();
        if include.is_empty() {
            return Ok(());
        }
        self.reporter.log("Copying extras...");
        staging::copy_extras(self.context.original_root(), &self.context.build_dir(), &include)?;
        Ok(())
    }

    /// Stage the dependency tree and manifest into the build directory.
    pub fn stage_dependencies(&mut self, packaging: bool) -> Result<(), PipelineError> {
        self.reporter.log("Staging dependencies...");
        staging::stage_dependencies(
            self.context.original_root(),
            &self.context.build_dir(),
            packaging,
        )?;
        Ok(())
    }

    /// Relocate packaged artifacts, restore the original root and remove
    /// the build directory.
    ///
    /// Relocation must happen first: its source path lives under the
    /// substituted root. The root is restored at most once; calling
    /// `cleanup` again is harmless.
    pub fn cleanup(&mut self) -> Result<(), PipelineError> {
        self.reporter.log("Moving artifacts and cleaning up...");
        relocate_artifacts(&mut self.context)?;

        if self.context.restore_root() {
            let build_dir = self.context.build_dir();
            match fs::remove_dir_all(&build_dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(PipelineError::Io(e)),
            }
        }
        Ok(())
    }

    /// Watch sources and schema files, recompiling on change.
    ///
    /// Blocks until the process exits. Starting a second session on the
    /// same pipeline is a logged no-op.
    pub fn watch_all(&mut self) -> Result<(), WatchError> {
        self.watch_loop(RebuildAction::Compile)
    }

    /// Watch sources and schema files, re-invoking the selected function
    /// on source changes.
    pub fn watch_function<F>(&mut self, mut on_invoke: F) -> Result<(), WatchError>
    where
        F: FnMut() -> Result<(), InvokeError>,
    {
        self.watch_loop(RebuildAction::Invoke(&mut on_invoke))
    }

    fn watch_loop(&mut self, mut action: RebuildAction<'_>) -> Result<(), WatchError> {
        if !self.context.begin_watching() {
            self.reporter.log("Watch session already active, ignoring");
            return Ok(());
        }

        let root = self.context.original_root().to_path_buf();
        let selection = self.context.selection().map(str::to_string);
        let sources = self
            .context
            .service()
            .root_files(selection.as_deref())
            .map_err(|e| WatchError::Setup(e.to_string()))?;
        let classifier = ChangeClassifier::new(&root, &sources);
        let watcher = FileWatcher::new(&root, Duration::from_millis(DEFAULT_DEBOUNCE_MS))?;

        self.reporter.log("Watching for changes...");

        loop {
            let mut batch = watcher.next_batch()?;
            loop {
                let changes = classifier.classify(&batch);
                if changes.is_empty() {
                    break;
                }

                if changes.schema {
                    // Rebuild failures keep the session alive
                    if let Err(e) = self.generate_schema_types() {
                        self.reporter.error(&format!("Schema type generation failed: {}", e));
                    }
                }
                if changes.source {
                    let result = match &mut action {
                        RebuildAction::Compile => {
                            self.compile().map(|_| ()).map_err(|e| e.to_string())
                        }
                        RebuildAction::Invoke(invoke) => invoke().map_err(|e| e.to_string()),
                    };
                    if let Err(message) = result {
                        self.reporter.error(&format!("Rebuild failed: {}", message));
                    }
                }
                self.reporter.log("Waiting for changes...");

                // Changes that landed mid-rebuild collapse into one
                // follow-up pass; they are never queued.
                batch = watcher.drain();
                if batch.is_empty() {
                    break;
                }
            }
        }
    }

    /// Config resolvers stay quiet during watch rebuilds.
    fn config_reporter(&self) -> &dyn Reporter {
        if self.context.is_watching() {
            &QUIET
        } else {
            self.reporter.as_ref()
        }
    }
}
