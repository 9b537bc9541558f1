//! Configuration schema types for `apigen.json` and `compiler.json`
//!
//! Defines the resolved shapes handed to the generator and compiler
//! collaborators. Field names follow the on-disk camelCase keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Keys that may appear at the top level of `apigen.json` and are applied to
/// both the spec and the routes config, overriding their individual
/// overrides.
pub const SHARED_CONFIG_KEYS: &[&str] = &["entryFile", "additionalProperties", "controllerGlobs"];

/// Policy for request/response properties not declared in the API spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdditionalProperties {
    /// Reject the payload outright
    Reject,
    /// Strip undeclared properties and continue
    SilentlyRemoveExtras,
    /// Raise an error naming the extra properties
    Throw,
}

impl Default for AdditionalProperties {
    fn default() -> Self {
        Self::SilentlyRemoveExtras
    }
}

/// One security scheme entry in the generated spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityDefinition {
    /// Scheme type, e.g. `apiKey`
    #[serde(rename = "type")]
    pub scheme: String,
    /// Header or parameter name carrying the credential
    pub name: String,
    /// Where the credential is read from, e.g. `header`
    #[serde(rename = "in")]
    pub location: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Config for API spec generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecConfig {
    /// Root source file from which controller discovery begins
    pub entry_file: String,
    /// Glob patterns identifying controller modules
    pub controller_globs: Vec<String>,
    /// Policy for undeclared payload properties
    pub additional_properties: AdditionalProperties,
    /// Directory the spec document is written to
    pub output_directory: PathBuf,
    /// Spec document version
    pub spec_version: u32,
    /// Security schemes included in the spec
    pub security_definitions: BTreeMap<String, SecurityDefinition>,
}

impl Default for SpecConfig {
    fn default() -> Self {
        let mut security_definitions = BTreeMap::new();
        security_definitions.insert(
            "api_key".to_string(),
            SecurityDefinition {
                scheme: "apiKey".to_string(),
                name: "x-api-key".to_string(),
                location: "header".to_string(),
                description: Some("API Key".to_string()),
            },
        );
        Self {
            entry_file: default_entry_file(),
            controller_globs: default_controller_globs(),
            additional_properties: AdditionalProperties::default(),
            output_directory: PathBuf::from("build"),
            spec_version: 3,
            security_definitions,
        }
    }
}

/// Config for route glue-code generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutesConfig {
    /// Root source file from which controller discovery begins
    pub entry_file: String,
    /// Glob patterns identifying controller modules
    pub controller_globs: Vec<String>,
    /// Policy for undeclared payload properties
    pub additional_properties: AdditionalProperties,
    /// Directory the generated routes are written to
    pub routes_dir: PathBuf,
    /// Module implementing request authentication
    pub authentication_module: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            entry_file: default_entry_file(),
            controller_globs: default_controller_globs(),
            additional_properties: AdditionalProperties::default(),
            routes_dir: PathBuf::from("build"),
            authentication_module: "api/middleware/auth.ts".to_string(),
        }
    }
}

fn default_entry_file() -> String {
    "api/App.ts".to_string()
}

fn default_controller_globs() -> Vec<String> {
    vec!["**/*.controller.ts".to_string()]
}

/// Compiler options handed to the compile collaborator.
///
/// Settings other than the output directory are passed through verbatim;
/// the compile stage only ever forces `outDir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    /// Directory emitted files are written to
    pub out_dir: PathBuf,
    /// Remaining compiler settings, passed through untouched
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { out_dir: PathBuf::from("build"), settings: serde_json::Map::new() }
    }
}

/// Generation-target mapping consumed verbatim by the schema type generator.
pub type GeneratesMap = serde_json::Map<String, serde_json::Value>;
