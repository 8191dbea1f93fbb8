//! `fwrel staging`

use super::{CommandContext, render};
use crate::cli::CliError;
use fwrel_release::{ManifestStore, ModuleStaging, all_staging, module_staging};
use serde::Serialize;
use std::fmt;

/// Staging state for the requested modules.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct StagingReport(pub Vec<ModuleStaging>);

impl fmt::Display for StagingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for module in &self.0 {
            write!(f, "{module}")?;
        }
        Ok(())
    }
}

/// Lists the staging candidates of `module`, or of every module in the
/// naming map.
///
/// # Errors
///
/// Returns a store error if the naming map cannot be fetched. Per-module
/// failures are part of the report.
pub fn execute_staging(ctx: &CommandContext, module: Option<&str>) -> Result<String, CliError> {
    let store = ManifestStore::new(ctx.open_transport()?);
    let report = match module {
        Some(module) => StagingReport(vec![module_staging(&store, module)]),
        None => StagingReport(all_staging(&store)?),
    };
    render(&report, ctx.json)
}
