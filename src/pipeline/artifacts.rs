//! Relocation of packaged artifacts out of the build directory.

use crate::pipeline::context::PipelineContext;
use crate::pipeline::staging::{copy_dir_all, StagingError};
use crate::DEPLOY_FOLDER;
use std::path::{Path, PathBuf};

/// Move packaged output from the build directory to the deployment
/// directory next to the original root, and point the affected artifact
/// paths at the relocated files (base names preserved).
///
/// Must run while the build root substitution is still in effect: the
/// staged output lives under the substituted root.
pub fn relocate_artifacts(ctx: &mut PipelineContext) -> Result<(), StagingError> {
    let staged = ctx.build_dir().join(DEPLOY_FOLDER);
    let deploy_dir = ctx.deploy_dir();

    if staged.exists() {
        copy_dir_all(&staged, &deploy_dir)?;
    }

    match ctx.selection().map(str::to_string) {
        Some(name) => {
            if let Some(function) = ctx.service_mut().functions.get_mut(&name) {
                rewrite(&mut function.package.artifact, &deploy_dir);
            }
        }
        None if ctx.service().package.individually => {
            for function in ctx.service_mut().functions.values_mut() {
                rewrite(&mut function.package.artifact, &deploy_dir);
            }
        }
        None => {
            rewrite(&mut ctx.service_mut().package.artifact, &deploy_dir);
        }
    }
    Ok(())
}

/// Point an artifact path at the deployment directory, keeping only the
/// file's base name. Absent artifacts stay absent.
fn rewrite(artifact: &mut Option<PathBuf>, deploy_dir: &Path) {
    if let Some(name) = artifact.as_ref().and_then(|path| path.file_name()) {
        *artifact = Some(deploy_dir.join(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{FunctionDescriptor, Service};
    use crate::BUILD_FOLDER;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn service_with_artifacts() -> Service {
        let mut service = Service::default();
        for name in ["api", "worker"] {
            let mut function = FunctionDescriptor::default();
            function.package.artifact =
                Some(PathBuf::from(format!(".build/.deploy/{}.zip", name)));
            service.functions.insert(name.to_string(), function);
        }
        service
    }

    fn substituted_context(service: Service, root: &Path) -> PipelineContext {
        let mut ctx = PipelineContext::new(service, root.to_path_buf());
        ctx.substitute_build_root();
        ctx
    }

    #[test]
    fn test_relocates_staged_output() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join(BUILD_FOLDER).join(DEPLOY_FOLDER);
        fs::create_dir_all(&staged).unwrap();
        fs::write(staged.join("api.zip"), b"zip").unwrap();

        let mut ctx = substituted_context(Service::default(), temp.path());
        relocate_artifacts(&mut ctx).unwrap();

        assert!(temp.path().join(DEPLOY_FOLDER).join("api.zip").exists());
    }

    #[test]
    fn test_missing_staged_output_is_tolerated() {
        let temp = TempDir::new().unwrap();
        let mut ctx = substituted_context(Service::default(), temp.path());
        relocate_artifacts(&mut ctx).unwrap();
    }

    #[test]
    fn test_individually_rewrites_every_function() {
        let temp = TempDir::new().unwrap();
        let mut service = service_with_artifacts();
        service.package.individually = true;

        let mut ctx = substituted_context(service, temp.path());
        relocate_artifacts(&mut ctx).unwrap();

        let deploy = temp.path().join(DEPLOY_FOLDER);
        for name in ["api", "worker"] {
            let artifact = ctx.service().functions[name].package.artifact.as_ref().unwrap();
            assert_eq!(artifact, &deploy.join(format!("{}.zip", name)));
        }
    }

    #[test]
    fn test_single_function_selection() {
        let temp = TempDir::new().unwrap();
        let mut ctx =
            substituted_context(service_with_artifacts(), temp.path()).with_function(Some("api".to_string()));
        relocate_artifacts(&mut ctx).unwrap();

        let deploy = temp.path().join(DEPLOY_FOLDER);
        assert_eq!(
            ctx.service().functions["api"].package.artifact.as_ref().unwrap(),
            &deploy.join("api.zip")
        );
        // The unselected function keeps its staged path
        assert_eq!(
            ctx.service().functions["worker"].package.artifact.as_ref().unwrap(),
            &PathBuf::from(".build/.deploy/worker.zip")
        );
    }

    #[test]
    fn test_aggregate_artifact_rewrite() {
        let temp = TempDir::new().unwrap();
        let mut service = Service::default();
        service.package.artifact = Some(PathBuf::from(".build/.deploy/orders.zip"));

        let mut ctx = substituted_context(service, temp.path());
        relocate_artifacts(&mut ctx).unwrap();

        assert_eq!(
            ctx.service().package.artifact.as_ref().unwrap(),
            &temp.path().join(DEPLOY_FOLDER).join("orders.zip")
        );
    }

    #[test]
    fn test_absent_artifact_stays_absent() {
        let temp = TempDir::new().unwrap();
        let mut ctx = substituted_context(Service::default(), temp.path());
        relocate_artifacts(&mut ctx).unwrap();
        assert!(ctx.service().package.artifact.is_none());
    }
}
