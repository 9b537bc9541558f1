//! Stagehand - build and staging pipeline for deployable services
//!
//! This library provides functionality to:
//! - Resolve API spec/route generation configs from a project config file
//! - Sequence generation, schema typegen and compilation stages
//! - Stage runtime dependencies and extras into an isolated build directory
//! - Relocate packaged artifacts and watch sources for incremental rebuilds

pub mod cli;
pub mod config;
pub mod functions;
pub mod pipeline;
pub mod report;
pub mod toolchain;
pub mod watch;

/// Isolated build directory, created under the service root.
pub const BUILD_FOLDER: &str = ".build";
/// Deployment output directory, a sibling of the build directory under the
/// service root.
pub const DEPLOY_FOLDER: &str = ".deploy";
/// Project config file for spec/route generation (JSON with comments).
pub const API_CONFIG_FILE: &str = "apigen.json";
/// Secondary config file for schema type generation (YAML).
pub const CODEGEN_CONFIG_FILE: &str = "codegen.yml";
/// Compiler options file (JSON with comments).
pub const COMPILER_CONFIG_FILE: &str = "compiler.json";
/// Service manifest describing deployable functions.
pub const SERVICE_FILE: &str = "service.json";
/// Runtime dependency tree staged into the build directory.
pub const MODULES_DIR: &str = "modules";
/// Dependency manifest staged alongside the tree.
pub const MANIFEST_FILE: &str = "manifest.json";
/// This tool's own entry in the dependency tree; always excluded from
/// function packages.
pub const OWN_MODULE_PATH: &str = "modules/stagehand";
/// Glob patterns locating schema files, rooted at the service root.
pub const SCHEMA_GLOBS: &[&str] = &["**/*.gql", "**/*.graphql"];
