//! `fwrel register`

use super::{CommandContext, render};
use crate::cli::CliError;
use crate::retry::with_retry;
use fwrel_release::{PcbVersionFile, ReleasePromoter, VersionId};
use std::path::Path;
use tracing::info;

/// Registers the latest PCB version from `pcb_file` plus `extra` versions.
///
/// # Errors
///
/// Returns a precondition error for an unreadable file or invalid version,
/// and a store error if the manifest cannot be loaded or saved.
pub fn execute_register(
    ctx: &CommandContext,
    pcb_file: &Path,
    extra: &[String],
    module: &str,
) -> Result<String, CliError> {
    let file = PcbVersionFile::load(pcb_file)?;
    info!(module, pcb_file = %pcb_file.display(), %file, "Read PCB version file");

    let mut versions = vec![file.latest];
    for version in extra {
        versions.push(VersionId::parse(version)?);
    }

    let promoter = ReleasePromoter::new(ctx.open_transport()?);
    let report = with_retry(&ctx.retry(), || promoter.register(module, &versions))?;
    render(&report, ctx.json)
}
