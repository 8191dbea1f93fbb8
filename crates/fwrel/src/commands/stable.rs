//! `fwrel stable`

use super::{CommandContext, render, strip_version_prefix};
use crate::cli::CliError;
use crate::retry::with_retry;
use fwrel_release::{DryRun, FirmwareVersion, ReleasePromoter, StableRequest, VersionId};

/// Arguments of `fwrel stable`.
#[derive(Debug, Clone, Copy)]
pub struct StableArgs<'a> {
    /// PCB version the staged build was released for.
    pub current: &'a str,
    /// Oldest PCB version the build supports.
    pub breaking: &'a str,
    /// Module name.
    pub module: &'a str,
    /// Staged firmware version, optionally `v`-prefixed.
    pub target: &'a str,
    /// Compute and print without writing.
    pub dry_run: bool,
}

/// Moves a staged build to stable for every PCB version it supports.
///
/// # Errors
///
/// Returns a precondition error if the target is not staged or not ahead of
/// stable, and a store error if an artifact is missing or a write fails.
pub fn execute_stable(ctx: &CommandContext, args: &StableArgs<'_>) -> Result<String, CliError> {
    let request = StableRequest::new(
        args.module,
        VersionId::parse(args.current)?,
        VersionId::parse(args.breaking)?,
        FirmwareVersion::parse(strip_version_prefix(args.target))?,
    );

    let promoter =
        ReleasePromoter::new(ctx.open_transport()?).with_dry_run(DryRun::from(args.dry_run));
    let report = with_retry(&ctx.retry(), || promoter.promote_staging_to_stable(&request))?;
    render(&report, ctx.json)
}
