//! Pending staging candidates across modules.

use crate::artifact::{NAMING_MAP_BLOB, parse_naming_map};
use crate::error::{Error, Result};
use crate::manifest::ManifestStore;
use crate::transport::BlobTransport;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Staging candidates for one PCB version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PcbStaging {
    /// Manifest key.
    pub pcb: String,
    /// Candidates in the order they were staged.
    pub firmware: Vec<String>,
}

/// Staging state of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleStaging {
    /// At least one PCB has candidates.
    Pending {
        /// Module name
        module: String,
        /// PCBs with a non-empty candidate list
        pcbs: Vec<PcbStaging>,
    },
    /// Nothing staged.
    Empty {
        /// Module name
        module: String,
    },
    /// The manifest could not be fetched.
    Failed {
        /// Module name
        module: String,
        /// Why the fetch failed
        error: String,
    },
}

impl ModuleStaging {
    /// The module this entry describes.
    #[must_use]
    pub fn module(&self) -> &str {
        match self {
            Self::Pending { module, .. } | Self::Empty { module } | Self::Failed { module, .. } => {
                module
            }
        }
    }
}

impl fmt::Display for ModuleStaging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending { module, pcbs } => {
                writeln!(f, "Staging versions for {module}:")?;
                for pcb in pcbs {
                    writeln!(f, "  PCB v{}:", pcb.pcb)?;
                    for fw in &pcb.firmware {
                        writeln!(f, "    FW v{fw}")?;
                    }
                }
                Ok(())
            }
            Self::Empty { module } => writeln!(f, "No staging versions for {module}"),
            Self::Failed { module, .. } => {
                writeln!(f, "Failed to get the PCB versions for {module}")
            }
        }
    }
}

/// Staging state of one module.
///
/// A missing manifest reports as [`ModuleStaging::Empty`]; a store failure
/// reports as [`ModuleStaging::Failed`] rather than an error.
pub fn module_staging<T: BlobTransport>(store: &ManifestStore<T>, module: &str) -> ModuleStaging {
    let loaded = match store.load(module) {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!(module, error = %e, "Failed to load manifest");
            return ModuleStaging::Failed {
                module: module.to_string(),
                error: e.to_string(),
            };
        }
    };

    let pcbs: Vec<PcbStaging> = loaded
        .manifest
        .staging_versions
        .iter()
        .filter(|(_, firmware)| !firmware.is_empty())
        .map(|(pcb, firmware)| PcbStaging {
            pcb: pcb.clone(),
            firmware: firmware.clone(),
        })
        .collect();

    if pcbs.is_empty() {
        ModuleStaging::Empty {
            module: module.to_string(),
        }
    } else {
        ModuleStaging::Pending {
            module: module.to_string(),
            pcbs,
        }
    }
}

/// Module names listed in the store's naming map.
///
/// # Errors
///
/// Returns a store error if the naming map cannot be fetched.
pub fn list_modules<T: BlobTransport>(transport: &T) -> Result<Vec<String>> {
    let blob = transport
        .get(NAMING_MAP_BLOB)
        .map_err(|e| e.into_error(NAMING_MAP_BLOB))?;
    let contents = String::from_utf8(blob.bytes).map_err(|e| {
        Error::store_unavailable(NAMING_MAP_BLOB, format!("naming map is not UTF-8: {e}"))
    })?;
    Ok(parse_naming_map(&contents))
}

/// Staging state of every module in the naming map.
///
/// # Errors
///
/// Fails only if the naming map itself cannot be fetched; per-module
/// failures are reported inline.
pub fn all_staging<T: BlobTransport>(store: &ManifestStore<T>) -> Result<Vec<ModuleStaging>> {
    let modules = list_modules(store.transport())?;
    Ok(modules
        .iter()
        .map(|module| module_staging(store, module))
        .collect())
}
