//! Firmware release state for PCB-versioned modules.
//!
//! This crate tracks which firmware build each PCB hardware revision of a
//! module should run. Builds are first staged as release candidates and
//! later promoted to stable; one build can serve a contiguous range of PCB
//! revisions.
//!
//! # Features
//!
//! - **Compatibility Resolution**: A build declares its `breaking..=current`
//!   PCB range; every registered revision in range is updated together
//! - **Staging Workflow**: Candidates accumulate per PCB until one is marked
//!   stable, which prunes everything it supersedes
//! - **Pure Transforms**: Every operation is computed from the manifest
//!   before anything is written, so failures leave stored state untouched
//! - **Conditional Writes**: Manifest saves carry the version tag seen at
//!   load, so concurrent writers are detected rather than overwritten
//!
//! # Architecture
//!
//! - [`version`] - PCB and firmware version identifiers
//! - [`manifest`] - the per-module manifest document and its store
//! - [`resolver`] - which PCB revisions a build serves
//! - [`promoter`] - the staging/stable state machine and its executor
//! - [`transport`] - the blob container abstraction
//! - [`pcb_file`] - PCB version files shipped with firmware sources
//! - [`staging`] - staging reports across modules
//!
//! # Example
//!
//! ```rust
//! use fwrel_release::{
//!     FirmwareVersion, MemoryTransport, PromoteRequest, ReleasePromoter, VersionId,
//! };
//!
//! let promoter = ReleasePromoter::new(MemoryTransport::new());
//! let pcb = VersionId::parse("v1.0")?;
//! promoter.register("AC", &[pcb.clone()])?;
//!
//! let request = PromoteRequest::new("AC", pcb.clone(), pcb, FirmwareVersion::parse("2.0.0")?);
//! let report = promoter.promote(&request, b"firmware image")?;
//! assert!(report.manifest_saved);
//! # Ok::<(), fwrel_release::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod artifact;
pub mod error;
pub mod manifest;
pub mod pcb_file;
pub mod plan;
pub mod promoter;
pub mod resolver;
pub mod staging;
pub mod transport;
pub mod version;

// Re-export main types
pub use artifact::{Channel, NAMING_MAP_BLOB, alias_blob_name, versioned_blob_name};
pub use error::{Error, Result};
pub use manifest::{LoadedManifest, ManifestStore, ReleaseManifest, manifest_blob_name};
pub use pcb_file::{PcbField, PcbVersionFile, VersionPart};
pub use plan::{BlobOp, DryRun, ReleaseAction, ReleasePlan, ReleaseReport, Transition};
pub use promoter::{
    PromoteRequest, ReleasePromoter, StableRequest, is_staging_ahead_of_stable, plan_promote,
    plan_register, plan_stable,
};
pub use resolver::{affected_pcb_keys, affected_pcb_versions};
pub use staging::{ModuleStaging, PcbStaging, all_staging, list_modules, module_staging};
pub use transport::{
    Blob, BlobTransport, DirTransport, MemoryTransport, TransportError, WriteCondition,
};
pub use version::{FirmwareVersion, PcbRecord, VersionId};
