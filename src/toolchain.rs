//! Collaborator contracts for the generators and the compiler.
//!
//! The pipeline treats spec/route generation, schema type generation and
//! compilation as pure functions with defined inputs and failure signals;
//! this module defines that seam. `CommandToolchain` is the CLI adapter's
//! implementation, running the commands configured in the service manifest.

use crate::config::{CompilerOptions, GeneratesMap, RoutesConfig, SpecConfig};
use crate::functions::ToolsConfig;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;

/// Spec, route or schema-type generator failure. Fatal to the pipeline.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct GenerationError(pub String);

/// Compiler failure. Fatal to the pipeline.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CompileError(pub String);

/// Local function invocation failure. Logged by watch loops, fatal to a
/// one-shot invoke.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct InvokeError(pub String);

/// The external collaborators the pipeline sequences.
pub trait Toolchain {
    /// Generate the API spec document.
    fn generate_spec(
        &self,
        config: &SpecConfig,
        options: &CompilerOptions,
        ignore_paths: &[String],
    ) -> Result<(), GenerationError>;

    /// Generate the HTTP routing glue code.
    fn generate_routes(
        &self,
        config: &RoutesConfig,
        options: &CompilerOptions,
        ignore_paths: &[String],
    ) -> Result<(), GenerationError>;

    /// Generate types from the discovered schema files.
    fn generate_schema_types(
        &self,
        schema_globs: &[String],
        generates: &GeneratesMap,
        force_overwrite: bool,
    ) -> Result<(), GenerationError>;

    /// Compile the root file set; returns the emitted files in order.
    fn compile(
        &self,
        root_files: &[PathBuf],
        options: &CompilerOptions,
    ) -> Result<Vec<PathBuf>, CompileError>;
}

/// Toolchain running external commands configured in `service.json`.
///
/// Stage inputs are passed as `STG_*` environment variables holding JSON;
/// the compile command reports emitted files on stdout, one per line.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    tools: ToolsConfig,
    cwd: PathBuf,
}

impl CommandToolchain {
    /// Create a toolchain running commands in the given working directory.
    pub fn new(tools: ToolsConfig, cwd: PathBuf) -> Self {
        Self { tools, cwd }
    }

    /// Run the configured invoke command for a function.
    pub fn invoke(&self, function: &str) -> Result<(), InvokeError> {
        let command = self
            .tools
            .invoke
            .as_deref()
            .ok_or_else(|| InvokeError("no invoke command configured".to_string()))?;
        let output = self
            .run(command, &[("STG_FUNCTION", function.to_string())])
            .map_err(|e| InvokeError(e.to_string()))?;
        check_status(&output).map_err(InvokeError)
    }

    fn run(&self, command: &str, envs: &[(&str, String)]) -> std::io::Result<Output> {
        let mut cmd = shell_command(command);
        cmd.current_dir(&self.cwd);
        for (key, value) in envs {
            cmd.env(key, value);
        }
        cmd.output()
    }

    fn run_checked(&self, command: &str, envs: &[(&str, String)]) -> Result<Output, String> {
        let output = self.run(command, envs).map_err(|e| e.to_string())?;
        check_status(&output)?;
        Ok(output)
    }
}

fn shell_command(command: &str) -> Command {
    #[cfg(unix)]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
}

fn check_status(output: &Output) -> Result<(), String> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        Err(format!("command exited with {}", output.status))
    } else {
        Err(stderr.to_string())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

impl Toolchain for CommandToolchain {
    fn generate_spec(
        &self,
        config: &SpecConfig,
        options: &CompilerOptions,
        ignore_paths: &[String],
    ) -> Result<(), GenerationError> {
        let envs = [
            ("STG_SPEC_CONFIG", to_json(config).map_err(GenerationError)?),
            ("STG_COMPILER_OPTIONS", to_json(options).map_err(GenerationError)?),
            ("STG_IGNORE_PATHS", to_json(&ignore_paths).map_err(GenerationError)?),
        ];
        self.run_checked(&self.tools.spec, &envs).map(|_| ()).map_err(GenerationError)
    }

    fn generate_routes(
        &self,
        config: &RoutesConfig,
        options: &CompilerOptions,
        ignore_paths: &[String],
    ) -> Result<(), GenerationError> {
        let envs = [
            ("STG_ROUTES_CONFIG", to_json(config).map_err(GenerationError)?),
            ("STG_COMPILER_OPTIONS", to_json(options).map_err(GenerationError)?),
            ("STG_IGNORE_PATHS", to_json(&ignore_paths).map_err(GenerationError)?),
        ];
        self.run_checked(&self.tools.routes, &envs).map(|_| ()).map_err(GenerationError)
    }

    fn generate_schema_types(
        &self,
        schema_globs: &[String],
        generates: &GeneratesMap,
        force_overwrite: bool,
    ) -> Result<(), GenerationError> {
        let envs = [
            ("STG_SCHEMA_GLOBS", to_json(&schema_globs).map_err(GenerationError)?),
            ("STG_GENERATES", to_json(generates).map_err(GenerationError)?),
            ("STG_FORCE_OVERWRITE", force_overwrite.to_string()),
        ];
        self.run_checked(&self.tools.schema_types, &envs).map(|_| ()).map_err(GenerationError)
    }

    fn compile(
        &self,
        root_files: &[PathBuf],
        options: &CompilerOptions,
    ) -> Result<Vec<PathBuf>, CompileError> {
        let envs = [
            ("STG_ROOT_FILES", to_json(&root_files).map_err(CompileError)?),
            ("STG_COMPILER_OPTIONS", to_json(options).map_err(CompileError)?),
        ];
        let output = self.run_checked(&self.tools.compile, &envs).map_err(CompileError)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().map(str::trim).filter(|l| !l.is_empty()).map(PathBuf::from).collect())
    }
}

/// Expand the schema glob patterns under a root directory.
///
/// Missing matches are not an error; the generator receives whatever exists.
pub fn expand_schema_globs(root: &Path, patterns: &[String]) -> Vec<String> {
    patterns.iter().map(|p| format!("{}/{}", root.display(), p)).collect()
}
