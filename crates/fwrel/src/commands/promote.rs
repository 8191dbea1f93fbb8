//! `fwrel promote`

use super::{CommandContext, render, strip_version_prefix};
use crate::cli::CliError;
use crate::retry::with_retry;
use fwrel_release::{DryRun, FirmwareVersion, PromoteRequest, ReleasePromoter, VersionId};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Arguments of `fwrel promote`.
#[derive(Debug, Clone, Copy)]
pub struct PromoteArgs<'a> {
    /// PCB version the build targets.
    pub current: &'a str,
    /// Oldest PCB version the build supports.
    pub breaking: &'a str,
    /// Firmware version, optionally `v`-prefixed.
    pub fw_version: &'a str,
    /// Module name.
    pub module: &'a str,
    /// Bypass staging.
    pub force_latest: bool,
    /// Firmware image; `<module>.zip` when absent.
    pub artifact: Option<&'a Path>,
    /// Compute and print without writing.
    pub dry_run: bool,
}

impl PromoteArgs<'_> {
    fn artifact_path(&self) -> PathBuf {
        self.artifact
            .map_or_else(|| PathBuf::from(format!("{}.zip", self.module)), Path::to_path_buf)
    }

    fn request(&self) -> Result<PromoteRequest, CliError> {
        let current = VersionId::parse(self.current)?;
        let breaking = VersionId::parse(self.breaking)?;
        let firmware = FirmwareVersion::parse(strip_version_prefix(self.fw_version))?;
        Ok(PromoteRequest::new(self.module, current, breaking, firmware)
            .with_force_stable(self.force_latest))
    }
}

fn read_artifact(path: &Path, dry_run: bool) -> Result<Vec<u8>, CliError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if dry_run && e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Artifact not found, continuing dry run without it");
            Ok(Vec::new())
        }
        Err(e) => Err(CliError::config_with_help(
            format!("Failed to read artifact {}: {e}", path.display()),
            "Pass --artifact or run from the directory containing <module>.zip",
        )),
    }
}

/// Uploads a firmware build and stages it (or makes it stable with
/// `--force_latest`) for every registered PCB version it supports.
///
/// # Errors
///
/// Returns a precondition error for invalid or unregistered versions, a
/// configuration error if the artifact cannot be read, and a store error if
/// an upload or the manifest save fails.
pub fn execute_promote(ctx: &CommandContext, args: &PromoteArgs<'_>) -> Result<String, CliError> {
    let request = args.request()?;
    let artifact_path = args.artifact_path();
    let artifact = read_artifact(&artifact_path, args.dry_run)?;
    info!(
        module = args.module,
        firmware = %request.firmware,
        artifact = %artifact_path.display(),
        size = artifact.len(),
        force_stable = request.force_stable,
        "Promoting firmware build"
    );

    let promoter =
        ReleasePromoter::new(ctx.open_transport()?).with_dry_run(DryRun::from(args.dry_run));
    let report = with_retry(&ctx.retry(), || promoter.promote(&request, &artifact))?;
    render(&report, ctx.json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FwrelConfig;
    use fwrel_release::{BlobTransport, DirTransport, ManifestStore};
    use tempfile::TempDir;

    fn setup(temp: &TempDir) -> (CommandContext, PathBuf) {
        let store = temp.path().join("store");
        let promoter = ReleasePromoter::new(DirTransport::new(&store));
        promoter
            .register("AC", &[VersionId::new(1, 0, 0), VersionId::new(1, 1, 0)])
            .unwrap();
        let artifact = temp.path().join("AC.zip");
        std::fs::write(&artifact, b"image").unwrap();
        let ctx = CommandContext::new(FwrelConfig::default().with_store_dir(Some(store)), false);
        (ctx, artifact)
    }

    fn args<'a>(artifact: &'a Path, dry_run: bool) -> PromoteArgs<'a> {
        PromoteArgs {
            current: "v1.1",
            breaking: "v1.0",
            fw_version: "v2.0.0",
            module: "AC",
            force_latest: false,
            artifact: Some(artifact),
            dry_run,
        }
    }

    #[test]
    fn test_promote_stages_all_affected() {
        let temp = TempDir::new().unwrap();
        let (ctx, artifact) = setup(&temp);

        let out = execute_promote(&ctx, &args(&artifact, false)).unwrap();
        assert!(out.contains("Staged FW 2.0.0 for PCB 1.1.0"));
        assert!(out.contains("Staged FW 2.0.0 for PCB 1.0.0"));

        let transport = DirTransport::new(temp.path().join("store"));
        assert_eq!(transport.get("AC-1.0.0-2.0.0").unwrap().bytes, b"image");
        assert_eq!(transport.get("AC-1.1.0-staging").unwrap().bytes, b"image");
        let loaded = ManifestStore::new(transport).load("AC").unwrap();
        assert_eq!(loaded.manifest.staging_for("1.0.0"), ["2.0.0"]);
    }

    #[test]
    fn test_dry_run_without_artifact_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let (ctx, _) = setup(&temp);
        let missing = temp.path().join("missing.zip");

        let out = execute_promote(&ctx, &args(&missing, true)).unwrap();
        assert!(out.starts_with("[dry-run] "));

        let transport = DirTransport::new(temp.path().join("store"));
        assert!(transport.get("AC-1.1.0-staging").is_err());
    }

    #[test]
    fn test_missing_artifact_is_config_error() {
        let temp = TempDir::new().unwrap();
        let (ctx, _) = setup(&temp);
        let missing = temp.path().join("missing.zip");
        let err = execute_promote(&ctx, &args(&missing, false)).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_default_artifact_path() {
        let promote = PromoteArgs {
            artifact: None,
            ..args(Path::new("unused"), false)
        };
        assert_eq!(promote.artifact_path(), PathBuf::from("AC.zip"));
    }
}
