//! Service manifest: deployable functions and their packaging rules.
//!
//! `service.json` is the host-owned description of the service: its
//! functions (one per deployable unit), service-level packaging config, and
//! the collaborator commands used by the CLI adapter. Unlike the generation
//! configs, a broken manifest is an error: the pipeline cannot guess what
//! to package.

use crate::{OWN_MODULE_PATH, SERVICE_FILE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Service manifest loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    /// File I/O error
    #[error("Failed to read {SERVICE_FILE}: {0}")]
    Io(#[from] std::io::Error),
    /// JSON-with-comments parsing error
    #[error("Failed to parse {SERVICE_FILE}: {0}")]
    Parse(String),
    /// Parsed document does not match the expected shape
    #[error("{SERVICE_FILE} has an unexpected shape: {0}")]
    Shape(#[from] serde_json::Error),
    /// A selected function does not exist in the manifest
    #[error("Function '{0}' is not defined in {SERVICE_FILE}")]
    UnknownFunction(String),
}

/// Service-level packaging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageConfig {
    /// Extra include glob patterns copied into the build directory
    pub include: Vec<String>,
    /// Package each function as its own artifact
    pub individually: bool,
    /// Aggregate artifact path, set by the packaging step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

/// Per-function packaging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionPackage {
    /// Include glob patterns for this function's artifact
    pub include: Vec<String>,
    /// Exclude glob patterns for this function's artifact
    pub exclude: Vec<String>,
    /// Artifact path, set by the packaging step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

/// One deployable unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionDescriptor {
    /// Entry-point source file for this function
    pub entry: PathBuf,
    /// Packaging rules for this function
    pub package: FunctionPackage,
}

/// Collaborator commands for the CLI host adapter.
///
/// Each command is run with the stage's inputs in its environment; the
/// compile command reports emitted files on stdout, one per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    /// Spec generator command
    pub spec: String,
    /// Route generator command
    pub routes: String,
    /// Schema type generator command
    pub schema_types: String,
    /// Compiler command
    pub compile: String,
    /// Local invocation command, used by `invoke`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoke: Option<String>,
}

/// The service manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    /// Service name
    pub service: String,
    /// Service-level packaging configuration
    pub package: PackageConfig,
    /// Deployable functions by name
    pub functions: BTreeMap<String, FunctionDescriptor>,
    /// Collaborator commands for the CLI adapter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsConfig>,
}

impl Service {
    /// Names of the functions in the working set.
    ///
    /// A selection narrows the set to one function; `None` means all.
    pub fn function_names(&self, selection: Option<&str>) -> Result<Vec<String>, ServiceError> {
        match selection {
            Some(name) => {
                if self.functions.contains_key(name) {
                    Ok(vec![name.to_string()])
                } else {
                    Err(ServiceError::UnknownFunction(name.to_string()))
                }
            }
            None => Ok(self.functions.keys().cloned().collect()),
        }
    }

    /// Normalize packaging rules before compilation.
    ///
    /// Every function in the working set ends up with this tool's own module
    /// path in its exclude list, exactly once.
    pub fn prepare(&mut self, selection: Option<&str>) -> Result<(), ServiceError> {
        for name in self.function_names(selection)? {
            let function = self.functions.get_mut(&name).ok_or_else(|| {
                ServiceError::UnknownFunction(name.clone())
            })?;
            let mut exclude = std::mem::take(&mut function.package.exclude);
            exclude.push(OWN_MODULE_PATH.to_string());
            function.package.exclude = uniq(exclude);
        }
        Ok(())
    }

    /// Root source files for the working set, in function order, deduplicated.
    pub fn root_files(&self, selection: Option<&str>) -> Result<Vec<PathBuf>, ServiceError> {
        let mut files = Vec::new();
        for name in self.function_names(selection)? {
            let entry = &self.functions[&name].entry;
            if !files.contains(entry) {
                files.push(entry.clone());
            }
        }
        Ok(files)
    }
}

/// Order-preserving dedup, keeping the first occurrence.
fn uniq(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

/// Load the service manifest from a service root.
pub fn load_service(root: &Path) -> Result<Service, ServiceError> {
    let text = fs::read_to_string(root.join(SERVICE_FILE))?;
    let value: serde_json::Value =
        json5::from_str(&text).map_err(|e| ServiceError::Parse(e.to_string()))?;
    Ok(serde_json::from_value(value)?)
}
