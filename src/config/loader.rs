//! Config resolution for `apigen.json`, `compiler.json` and `codegen.yml`
//!
//! All three resolvers recover locally: a missing or malformed file falls
//! back to defaults and is reported, never surfaced as a failure. Only the
//! generator and compiler invocations that consume the resolved configs may
//! fail hard.

use crate::config::schema::{
    CompilerOptions, GeneratesMap, RoutesConfig, SpecConfig, SHARED_CONFIG_KEYS,
};
use crate::report::Reporter;
use crate::{API_CONFIG_FILE, CODEGEN_CONFIG_FILE, COMPILER_CONFIG_FILE};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Configuration loading error
///
/// Internal to the resolvers; callers only ever see the fallback defaults.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// JSON-with-comments parsing error
    #[error("Failed to parse config: {0}")]
    Parse(String),
    /// Parsed document does not match the expected shape
    #[error("Config has an unexpected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Resolved spec/routes configuration triple.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedApiConfig {
    /// Config for the spec generator
    pub spec: SpecConfig,
    /// Config for the routes generator
    pub routes: RoutesConfig,
    /// Paths excluded from controller discovery
    pub ignore_paths: Option<Vec<String>>,
}

/// Resolve the spec and routes configs for a service root.
///
/// Starts from hardcoded defaults. If `apigen.json` exists and parses, its
/// `spec` and `routes` sub-objects are overlaid onto the respective configs,
/// then any shared top-level keys are overlaid onto **both**; shared keys
/// always win last. A missing or malformed file yields the defaults.
pub fn resolve_api_config(root: &Path, reporter: &dyn Reporter) -> ResolvedApiConfig {
    let path = root.join(API_CONFIG_FILE);
    if path.exists() {
        if let Ok(resolved) = try_resolve_api_config(&path) {
            reporter.log(&format!("Using local {} config...", API_CONFIG_FILE));
            return resolved;
        }
    }
    reporter.log(&format!("No {} config found, using defaults...", API_CONFIG_FILE));
    ResolvedApiConfig::default()
}

fn try_resolve_api_config(path: &Path) -> Result<ResolvedApiConfig, ConfigError> {
    let text = fs::read_to_string(path)?;
    let file: Value = json5::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let mut spec_value = serde_json::to_value(SpecConfig::default())?;
    let mut routes_value = serde_json::to_value(RoutesConfig::default())?;

    if let Some(section) = file.get("spec") {
        merge_object(&mut spec_value, section);
    }
    if let Some(section) = file.get("routes") {
        merge_object(&mut routes_value, section);
    }

    // Shared keys override the sub-object overrides on both configs.
    for key in SHARED_CONFIG_KEYS {
        if let Some(shared) = file.get(*key) {
            if !shared.is_null() {
                set_key(&mut spec_value, key, shared.clone());
                set_key(&mut routes_value, key, shared.clone());
            }
        }
    }

    let ignore_paths = match file.get("ignore") {
        Some(value) if !value.is_null() => Some(serde_json::from_value(value.clone())?),
        _ => None,
    };

    Ok(ResolvedApiConfig {
        spec: serde_json::from_value(spec_value)?,
        routes: serde_json::from_value(routes_value)?,
        ignore_paths,
    })
}

/// Shallow-merge the keys of `overlay` into `base`.
fn merge_object(base: &mut Value, overlay: &Value) {
    if let (Some(base), Some(overlay)) = (base.as_object_mut(), overlay.as_object()) {
        for (key, value) in overlay {
            base.insert(key.clone(), value.clone());
        }
    }
}

fn set_key(base: &mut Value, key: &str, value: Value) {
    if let Some(map) = base.as_object_mut() {
        map.insert(key.to_string(), value);
    }
}

/// Resolve compiler options for a service root.
///
/// Reads the `compilerOptions` key of `compiler.json` (JSON with comments).
/// A missing or malformed file yields the defaults.
pub fn resolve_compiler_options(root: &Path, reporter: &dyn Reporter) -> CompilerOptions {
    let path = root.join(COMPILER_CONFIG_FILE);
    if let Ok(Some(options)) = try_load_compiler_options(&path) {
        reporter.log(&format!("Using local {} config...", COMPILER_CONFIG_FILE));
        return options;
    }
    reporter.log(&format!("No {} config found, using defaults...", COMPILER_CONFIG_FILE));
    CompilerOptions::default()
}

fn try_load_compiler_options(path: &Path) -> Result<Option<CompilerOptions>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    let file: Value = json5::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    match file.get("compilerOptions") {
        Some(section) if !section.is_null() => Ok(Some(serde_json::from_value(section.clone())?)),
        _ => Ok(None),
    }
}

/// Load the schema-codegen `generates` mapping for a service root.
///
/// Reads `codegen.yml` if present. An absent file, unparseable document or
/// missing `generates` key all yield an empty mapping, never an error.
pub fn load_generates(root: &Path) -> GeneratesMap {
    let path = root.join(CODEGEN_CONFIG_FILE);
    let Ok(text) = fs::read_to_string(&path) else {
        return GeneratesMap::new();
    };
    let Ok(doc) = serde_yaml::from_str::<Value>(&text) else {
        return GeneratesMap::new();
    };
    match doc.get("generates").and_then(Value::as_object) {
        Some(map) => map.clone(),
        None => GeneratesMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AdditionalProperties;
    use crate::report::NullReporter;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_config(dir: &Path, name: &str, content: &str) {
        File::create(dir.join(name)).unwrap().write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let resolved = resolve_api_config(temp.path(), &NullReporter);
        assert_eq!(resolved, ResolvedApiConfig::default());
        assert_eq!(resolved.spec.entry_file, "api/App.ts");
        assert_eq!(resolved.spec.additional_properties, AdditionalProperties::SilentlyRemoveExtras);
    }

    #[test]
    fn test_malformed_file_falls_back_silently() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), API_CONFIG_FILE, "this is not json {{{");

        let resolved = resolve_api_config(temp.path(), &NullReporter);
        assert_eq!(resolved, ResolvedApiConfig::default());
    }

    #[test]
    fn test_json_with_comments() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            API_CONFIG_FILE,
            r#"{
                // spec generator settings
                "spec": {
                    "outputDirectory": "out", /* block comment */
                },
            }"#,
        );

        let resolved = resolve_api_config(temp.path(), &NullReporter);
        assert_eq!(resolved.spec.output_directory, PathBuf::from("out"));
    }

    #[test]
    fn test_spec_override_does_not_leak_into_routes() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), API_CONFIG_FILE, r#"{"spec": {"entryFile": "src/Spec.ts"}}"#);

        let resolved = resolve_api_config(temp.path(), &NullReporter);
        assert_eq!(resolved.spec.entry_file, "src/Spec.ts");
        // Overrides are not shared unless declared at the top level
        assert_eq!(resolved.routes.entry_file, "api/App.ts");
    }

    #[test]
    fn test_top_level_shared_key_wins_last() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            API_CONFIG_FILE,
            r#"{
                "entryFile": "src/Shared.ts",
                "spec": {"entryFile": "src/Spec.ts"},
                "routes": {"entryFile": "src/Routes.ts"}
            }"#,
        );

        let resolved = resolve_api_config(temp.path(), &NullReporter);
        assert_eq!(resolved.spec.entry_file, "src/Shared.ts");
        assert_eq!(resolved.routes.entry_file, "src/Shared.ts");
    }

    #[test]
    fn test_shared_controller_globs_apply_to_both() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            API_CONFIG_FILE,
            r#"{"controllerGlobs": ["api/**/*.ctrl.ts"]}"#,
        );

        let resolved = resolve_api_config(temp.path(), &NullReporter);
        assert_eq!(resolved.spec.controller_globs, vec!["api/**/*.ctrl.ts"]);
        assert_eq!(resolved.routes.controller_globs, vec!["api/**/*.ctrl.ts"]);
    }

    #[test]
    fn test_routes_dir_override_keeps_spec_output() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), API_CONFIG_FILE, r#"{"routes": {"routesDir": "out"}}"#);

        let resolved = resolve_api_config(temp.path(), &NullReporter);
        assert_eq!(resolved.routes.routes_dir, PathBuf::from("out"));
        assert_eq!(resolved.spec.output_directory, PathBuf::from("build"));
    }

    #[test]
    fn test_ignore_paths() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), API_CONFIG_FILE, r#"{"ignore": ["**/internal/**"]}"#);

        let resolved = resolve_api_config(temp.path(), &NullReporter);
        assert_eq!(resolved.ignore_paths, Some(vec!["**/internal/**".to_string()]));
    }

    #[test]
    fn test_invalid_policy_value_reads_as_malformed() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), API_CONFIG_FILE, r#"{"additionalProperties": "ignore"}"#);

        // A closed enum rejects the value, which makes the whole file
        // malformed: full fallback to defaults.
        let resolved = resolve_api_config(temp.path(), &NullReporter);
        assert_eq!(resolved, ResolvedApiConfig::default());
    }

    #[test]
    fn test_compiler_options_from_file() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            COMPILER_CONFIG_FILE,
            r#"{
                // compiler settings
                "compilerOptions": {"outDir": "dist", "strict": true}
            }"#,
        );

        let options = resolve_compiler_options(temp.path(), &NullReporter);
        assert_eq!(options.out_dir, PathBuf::from("dist"));
        assert_eq!(options.settings.get("strict"), Some(&serde_json::Value::Bool(true)));
    }

    #[test]
    fn test_compiler_options_malformed_falls_back() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), COMPILER_CONFIG_FILE, "{{{");

        let options = resolve_compiler_options(temp.path(), &NullReporter);
        assert_eq!(options, CompilerOptions::default());
    }

    #[test]
    fn test_compiler_options_missing_key_falls_back() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), COMPILER_CONFIG_FILE, r#"{"include": ["api"]}"#);

        let options = resolve_compiler_options(temp.path(), &NullReporter);
        assert_eq!(options, CompilerOptions::default());
    }

    #[test]
    fn test_generates_absent_file_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(load_generates(temp.path()).is_empty());
    }

    #[test]
    fn test_generates_from_yaml() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            CODEGEN_CONFIG_FILE,
            "generates:\n  api/types.ts:\n    plugins:\n      - typescript\n",
        );

        let generates = load_generates(temp.path());
        assert!(generates.contains_key("api/types.ts"));
    }

    #[test]
    fn test_generates_missing_key_is_empty() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), CODEGEN_CONFIG_FILE, "schema: api/schema.graphql\n");

        assert!(load_generates(temp.path()).is_empty());
    }

    #[test]
    fn test_generates_unparseable_is_empty() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), CODEGEN_CONFIG_FILE, ":\n\t- not yaml");

        assert!(load_generates(temp.path()).is_empty());
    }
}
