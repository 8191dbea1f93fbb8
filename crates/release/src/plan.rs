//! Planned state changes and blob operations.
//!
//! Release operations never touch the store directly. They compute a
//! [`Transition`] (the next manifest plus a [`ReleasePlan`]) from the current
//! manifest, and the promoter executes the plan afterwards. This keeps each
//! operation a pure, repeatable transform over manifest state.

use crate::manifest::ReleaseManifest;
use serde::Serialize;
use std::fmt;

/// Whether side effects are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DryRun {
    /// Execute uploads and save the manifest.
    #[default]
    No,
    /// Compute and report only.
    Yes,
}

impl DryRun {
    /// Returns `true` for [`DryRun::Yes`].
    #[must_use]
    pub const fn is_dry_run(self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl From<bool> for DryRun {
    fn from(value: bool) -> Self {
        if value { Self::Yes } else { Self::No }
    }
}

/// A manifest state change, reported per PCB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReleaseAction {
    /// A PCB version was added to the registry.
    PcbRegistered {
        /// Manifest key
        pcb: String,
    },
    /// A PCB version was already registered.
    PcbAlreadyRegistered {
        /// Manifest key
        pcb: String,
    },
    /// The staging pointer moved to `firmware` and it became a candidate.
    StagingAdvanced {
        /// Manifest key
        pcb: String,
        /// New staging firmware
        firmware: String,
    },
    /// The staging pointer was left alone because it is already ahead.
    StagingKept {
        /// Manifest key
        pcb: String,
        /// Rejected firmware
        firmware: String,
        /// Firmware that stays staged
        staged: String,
    },
    /// The stable pointer was set.
    StableSet {
        /// Manifest key
        pcb: String,
        /// New stable firmware
        firmware: String,
        /// Previous stable firmware
        previous: Option<String>,
    },
    /// Superseded candidates were removed from staging.
    StagingPruned {
        /// Manifest key
        pcb: String,
        /// Removed firmware versions
        removed: Vec<String>,
    },
}

impl fmt::Display for ReleaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PcbRegistered { pcb } => write!(f, "Registered PCB {pcb}"),
            Self::PcbAlreadyRegistered { pcb } => {
                write!(f, "Skipping PCB {pcb}, version already exists")
            }
            Self::StagingAdvanced { pcb, firmware } => {
                write!(f, "Staged FW {firmware} for PCB {pcb}")
            }
            Self::StagingKept {
                pcb,
                firmware,
                staged,
            } => write!(
                f,
                "Kept staging FW {staged} for PCB {pcb} (FW {firmware} is older)"
            ),
            Self::StableSet {
                pcb,
                firmware,
                previous: Some(previous),
            } => write!(
                f,
                "Moved Beta {firmware} to stable for PCB {pcb} (was {previous})"
            ),
            Self::StableSet { pcb, firmware, .. } => {
                write!(f, "Moved Beta {firmware} to stable for PCB {pcb}")
            }
            Self::StagingPruned { pcb, removed } => write!(
                f,
                "Removed {} from staging for PCB {pcb}",
                removed.join(", ")
            ),
        }
    }
}

/// A blob write the plan requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BlobOp {
    /// Upload the local build artifact under `blob`.
    UploadArtifact {
        /// Destination blob
        blob: String,
    },
    /// Copy an existing blob.
    Copy {
        /// Source blob
        from: String,
        /// Destination blob
        to: String,
    },
}

impl fmt::Display for BlobOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UploadArtifact { blob } => write!(f, "upload artifact -> {blob}"),
            Self::Copy { from, to } => write!(f, "copy {from} -> {to}"),
        }
    }
}

/// State changes and blob writes computed by one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleasePlan {
    /// Manifest changes, in the order they were applied.
    pub actions: Vec<ReleaseAction>,
    /// Version-qualified blob writes, performed before the manifest save.
    pub blob_ops: Vec<BlobOp>,
    /// Alias rewrites, performed only once the manifest save succeeded.
    pub alias_ops: Vec<BlobOp>,
}

impl ReleasePlan {
    /// Whether any blob op needs the local build artifact.
    #[must_use]
    pub fn needs_artifact(&self) -> bool {
        self.blob_ops
            .iter()
            .chain(&self.alias_ops)
            .any(|op| matches!(op, BlobOp::UploadArtifact { .. }))
    }
}

/// The outcome of a pure release transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Manifest after the operation.
    pub manifest: ReleaseManifest,
    /// What changed and what must be written.
    pub plan: ReleasePlan,
}

/// Report from an executed (or dry-run) operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    /// Module operated on.
    pub module: String,
    /// Manifest changes.
    pub actions: Vec<ReleaseAction>,
    /// Version-qualified blob writes performed (or that would be performed).
    pub blob_ops: Vec<BlobOp>,
    /// Alias rewrites performed (or that would be performed).
    pub alias_ops: Vec<BlobOp>,
    /// Whether the manifest was uploaded.
    pub manifest_saved: bool,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl ReleaseReport {
    /// Builds a report from an executed plan.
    #[must_use]
    pub fn new(
        module: impl Into<String>,
        plan: ReleasePlan,
        manifest_saved: bool,
        dry_run: DryRun,
    ) -> Self {
        Self {
            module: module.into(),
            actions: plan.actions,
            blob_ops: plan.blob_ops,
            alias_ops: plan.alias_ops,
            manifest_saved,
            dry_run: dry_run.is_dry_run(),
        }
    }
}

impl fmt::Display for ReleaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        for action in &self.actions {
            writeln!(f, "{prefix}{action}")?;
        }
        for op in self.blob_ops.iter().chain(&self.alias_ops) {
            writeln!(f, "{prefix}{op}")?;
        }
        if self.actions.is_empty() && self.blob_ops.is_empty() && self.alias_ops.is_empty() {
            writeln!(f, "{prefix}Nothing to do for {}", self.module)?;
        }
        Ok(())
    }
}
