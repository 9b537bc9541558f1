//! Staging of extras and runtime dependencies into the build directory.
//!
//! Extras are copied, never overwritten. Dependencies are linked in
//! development (iteration speed) and fully copied when packaging (the
//! artifact must be self-contained); the two strategies are exclusive.

use crate::{MANIFEST_FILE, MODULES_DIR};
use glob::glob;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Error during extras or dependency staging.
#[derive(Debug)]
pub enum StagingError {
    /// Invalid include glob pattern
    InvalidPattern(String, glob::PatternError),
    /// IO error
    Io(io::Error),
    /// Symlink creation failed for a reason other than missing privilege
    Link(PathBuf, io::Error),
}

impl std::fmt::Display for StagingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StagingError::InvalidPattern(pattern, err) => {
                write!(f, "Invalid include pattern '{}': {}", pattern, err)
            }
            StagingError::Io(err) => write!(f, "IO error during staging: {}", err),
            StagingError::Link(path, err) => {
                write!(f, "Failed to link {}: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for StagingError {}

impl From<io::Error> for StagingError {
    fn from(err: io::Error) -> Self {
        StagingError::Io(err)
    }
}

/// Copy files matching the include patterns into the build directory.
///
/// Relative path structure is preserved under `build_dir`; intermediate
/// directories are created; an existing destination is never overwritten.
/// No patterns is a no-op, not an error.
pub fn copy_extras(root: &Path, build_dir: &Path, include: &[String]) -> Result<(), StagingError> {
    for pattern in include {
        let full_pattern = root.join(pattern);
        let pattern_str = full_pattern.to_string_lossy();
        let paths = glob(&pattern_str)
            .map_err(|e| StagingError::InvalidPattern(pattern.clone(), e))?;

        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    eprintln!("Warning: error reading path: {}", e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let destination = build_dir.join(relative);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            if !destination.exists() {
                fs::copy(&path, &destination)?;
            }
        }
    }
    Ok(())
}

/// Stage the dependency tree and manifest into the build directory.
///
/// Packaging: any existing tree entry at the destination is removed, then
/// the tree and manifest are fully copied. Development: tree and manifest
/// are each linked independently, only if not already present.
pub fn stage_dependencies(
    root: &Path,
    build_dir: &Path,
    packaging: bool,
) -> Result<(), StagingError> {
    let modules_src = root.join(MODULES_DIR);
    let modules_dst = build_dir.join(MODULES_DIR);
    let manifest_src = root.join(MANIFEST_FILE);
    let manifest_dst = build_dir.join(MANIFEST_FILE);

    fs::create_dir_all(build_dir)?;

    if packaging {
        remove_entry(&modules_dst)?;
        copy_dir_all(&modules_src, &modules_dst)?;
        fs::copy(&manifest_src, &manifest_dst)?;
        return Ok(());
    }

    // exists() follows links; a dangling link still occupies the path, so
    // presence is checked on the entry itself.
    if fs::symlink_metadata(&modules_dst).is_err() {
        link_or_copy(&modules_src, &modules_dst)?;
    }
    if fs::symlink_metadata(&manifest_dst).is_err() {
        link_or_copy(&manifest_src, &manifest_dst)?;
    }
    Ok(())
}

/// Remove a file, directory or symlink if present.
fn remove_entry(path: &Path) -> Result<(), StagingError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => {
            if metadata.file_type().is_dir() {
                fs::remove_dir_all(path)?;
            } else {
                fs::remove_file(path)?;
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StagingError::Io(e)),
    }
}

/// Attempt to symlink `src` at `dst`, copying instead if link creation is
/// denied for lack of privilege. Any other failure propagates.
fn link_or_copy(src: &Path, dst: &Path) -> Result<(), StagingError> {
    match make_symlink(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            if src.is_dir() {
                copy_dir_all(src, dst)
            } else {
                fs::copy(src, dst).map(|_| ()).map_err(StagingError::Io)
            }
        }
        Err(e) => Err(StagingError::Link(dst.to_path_buf(), e)),
    }
}

#[cfg(unix)]
fn make_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn make_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

/// Recursively copy a directory, following symlinks.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<(), StagingError> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let to = dst.join(entry.file_name());
        if path.is_dir() {
            copy_dir_all(&path, &to)?;
        } else {
            fs::copy(&path, &to)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(&path).unwrap().write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_copy_extras_no_patterns_is_noop() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join(".build");

        copy_extras(temp.path(), &build, &[]).unwrap();
        assert!(!build.exists());
    }

    #[test]
    fn test_copy_extras_preserves_structure() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join(".build");
        create_file(temp.path(), "assets/templates/mail.html", "<html>");

        copy_extras(temp.path(), &build, &["assets/**/*.html".to_string()]).unwrap();
        assert!(build.join("assets/templates/mail.html").exists());
    }

    #[test]
    fn test_copy_extras_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join(".build");
        create_file(temp.path(), "data/seed.json", "new");
        create_file(&build, "data/seed.json", "old");

        copy_extras(temp.path(), &build, &["data/*.json".to_string()]).unwrap();
        let content = fs::read_to_string(build.join("data/seed.json")).unwrap();
        assert_eq!(content, "old");
    }

    #[test]
    fn test_copy_extras_idempotent() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join(".build");
        create_file(temp.path(), "static/logo.svg", "<svg/>");

        let include = vec!["static/*.svg".to_string()];
        copy_extras(temp.path(), &build, &include).unwrap();
        let first = fs::metadata(build.join("static/logo.svg")).unwrap().modified().unwrap();

        copy_extras(temp.path(), &build, &include).unwrap();
        let second = fs::metadata(build.join("static/logo.svg")).unwrap().modified().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_copy_extras_skips_directories() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join(".build");
        fs::create_dir_all(temp.path().join("assets/empty")).unwrap();
        create_file(temp.path(), "assets/a.txt", "a");

        copy_extras(temp.path(), &build, &["assets/*".to_string()]).unwrap();
        assert!(build.join("assets/a.txt").exists());
        assert!(!build.join("assets/empty").exists());
    }

    #[test]
    fn test_copy_extras_invalid_pattern() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join(".build");

        let result = copy_extras(temp.path(), &build, &["[".to_string()]);
        assert!(matches!(result, Err(StagingError::InvalidPattern(_, _))));
    }

    #[cfg(unix)]
    #[test]
    fn test_stage_dependencies_dev_links() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join(".build");
        fs::create_dir_all(&build).unwrap();
        create_file(temp.path(), "modules/lib/index.js", "{}");
        create_file(temp.path(), "manifest.json", "{}");

        stage_dependencies(temp.path(), &build, false).unwrap();

        let modules = build.join(MODULES_DIR);
        assert!(fs::symlink_metadata(&modules).unwrap().file_type().is_symlink());
        assert!(modules.join("lib/index.js").exists());
        assert!(fs::symlink_metadata(build.join(MANIFEST_FILE))
            .unwrap()
            .file_type()
            .is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn test_stage_dependencies_dev_skips_existing() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join(".build");
        create_file(temp.path(), "modules/lib/index.js", "{}");
        create_file(temp.path(), "manifest.json", "{}");
        // Pre-existing real copies must be left alone
        create_file(&build, "manifest.json", "existing");
        fs::create_dir_all(build.join(MODULES_DIR)).unwrap();

        stage_dependencies(temp.path(), &build, false).unwrap();

        assert!(!fs::symlink_metadata(build.join(MODULES_DIR)).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(build.join(MANIFEST_FILE)).unwrap(), "existing");
    }

    #[cfg(unix)]
    #[test]
    fn test_stage_dependencies_packaging_replaces_link_with_copy() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join(".build");
        fs::create_dir_all(&build).unwrap();
        create_file(temp.path(), "modules/lib/index.js", "{}");
        create_file(temp.path(), "manifest.json", "{}");

        // A prior development run left a link behind
        stage_dependencies(temp.path(), &build, false).unwrap();
        assert!(fs::symlink_metadata(build.join(MODULES_DIR)).unwrap().file_type().is_symlink());

        stage_dependencies(temp.path(), &build, true).unwrap();

        let modules = build.join(MODULES_DIR);
        assert!(!fs::symlink_metadata(&modules).unwrap().file_type().is_symlink());
        assert!(modules.join("lib/index.js").exists());
        assert!(build.join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_stage_dependencies_packaging_is_full_copy() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join(".build");
        fs::create_dir_all(&build).unwrap();
        create_file(temp.path(), "modules/a/deep/file.js", "x");
        create_file(temp.path(), "modules/b.js", "y");
        create_file(temp.path(), "manifest.json", "{}");

        stage_dependencies(temp.path(), &build, true).unwrap();

        assert!(build.join("modules/a/deep/file.js").exists());
        assert!(build.join("modules/b.js").exists());
        assert!(build.join("manifest.json").exists());
    }

    #[test]
    fn test_stage_dependencies_packaging_missing_tree_fails() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join(".build");
        fs::create_dir_all(&build).unwrap();

        let result = stage_dependencies(temp.path(), &build, true);
        assert!(matches!(result, Err(StagingError::Io(_))));
    }

    #[test]
    fn test_copy_dir_all_nested() {
        let temp = TempDir::new().unwrap();
        create_file(temp.path(), "src/a/b/c.txt", "deep");

        let dst = temp.path().join("dst");
        copy_dir_all(&temp.path().join("src"), &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("a/b/c.txt")).unwrap(), "deep");
    }

    #[test]
    fn test_remove_entry_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        remove_entry(&temp.path().join("absent")).unwrap();
    }
}
