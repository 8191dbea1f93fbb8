//! Error types for release-state operations.

use miette::Diagnostic;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for release operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving compatibility or mutating release state.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A PCB or firmware version string is malformed.
    #[error("Invalid version '{input}': {reason}")]
    #[diagnostic(
        code(fwrel::release::invalid_version),
        help("Versions are dot-separated integers such as 1.2 or v1.2.3")
    )]
    InvalidVersion {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// A PCB version is referenced before it was registered for the module.
    #[error("{role} PCB version {version} is not registered for module '{module}'")]
    #[diagnostic(
        code(fwrel::release::unknown_version),
        help("Register the PCB version first with 'fwrel register'")
    )]
    UnknownVersion {
        /// Module whose manifest was consulted
        module: String,
        /// The missing version (canonical form)
        version: String,
        /// Which argument referenced it ("current" or "breaking")
        role: &'static str,
    },

    /// The blob store could not be reached or rejected the request.
    #[error("Blob store unavailable while accessing '{name}': {message}")]
    #[diagnostic(
        code(fwrel::release::store_unavailable),
        help("Check network connectivity and that AZURE_BLOB_QUERYSTRING grants access")
    )]
    StoreUnavailable {
        /// Blob name being accessed
        name: String,
        /// Transport-level detail
        message: String,
    },

    /// A blob store request exceeded its time budget.
    #[error("Blob store timed out after {timeout:?} while accessing '{name}'")]
    #[diagnostic(code(fwrel::release::store_timeout))]
    StoreTimeout {
        /// Blob name being accessed
        name: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// Another writer replaced the manifest between load and save.
    #[error("Manifest '{name}' was modified concurrently")]
    #[diagnostic(
        code(fwrel::release::store_conflict),
        help("Re-run the command; the operation is safe to repeat")
    )]
    StoreConflict {
        /// Manifest blob name
        name: String,
    },

    /// The requested firmware is not among the staging candidates.
    #[error("Target staging release {target} does not exist for PCB version {pcb}")]
    #[diagnostic(
        code(fwrel::release::target_not_staged),
        help("List pending candidates with 'fwrel staging -m <module>'")
    )]
    TargetNotStaged {
        /// PCB version (manifest key)
        pcb: String,
        /// Requested firmware version
        target: String,
    },

    /// Promotion would not move the stable pointer forward.
    #[error(
        "Staging version {target} is not ahead of stable version {stable} for PCB {pcb} - update aborted"
    )]
    #[diagnostic(code(fwrel::release::not_ahead_of_stable))]
    NotAheadOfStable {
        /// PCB version (manifest key)
        pcb: String,
        /// Requested firmware version
        target: String,
        /// Current stable firmware version
        stable: String,
    },

    /// A build artifact expected in the store does not exist.
    #[error("Artifact '{name}' does not exist in the blob store")]
    #[diagnostic(code(fwrel::release::artifact_not_found))]
    ArtifactNotFound {
        /// Blob name
        name: String,
    },

    /// The stored manifest is not valid JSON of the expected shape.
    #[error("Manifest '{name}' is corrupt: {source}")]
    #[diagnostic(
        code(fwrel::release::manifest_corrupt),
        help("Inspect the blob manually; fwrel will not overwrite a manifest it cannot read")
    )]
    ManifestCorrupt {
        /// Manifest blob name
        name: String,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// The PCB version file is missing required information.
    #[error("PCB version file error: {message}")]
    #[diagnostic(
        code(fwrel::release::pcb_file),
        help("Expected either two 'vX.Y' lines or LATEST_/BREAKING_ MAJOR/MINOR defines")
    )]
    PcbFile {
        /// The error message
        message: String,
        /// The file that was read
        path: Option<PathBuf>,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(fwrel::release::config), help("{help}"))]
    Config {
        /// The error message
        message: String,
        /// Help text for the user
        help: String,
    },

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(fwrel::release::io))]
    Io(#[from] std::io::Error),

    /// Wrapped JSON error.
    #[error("JSON error: {0}")]
    #[diagnostic(code(fwrel::release::json))]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new invalid version error.
    #[must_use]
    pub fn invalid_version(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVersion {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a new unknown version error.
    #[must_use]
    pub fn unknown_version(
        module: impl Into<String>,
        version: impl Into<String>,
        role: &'static str,
    ) -> Self {
        Self::UnknownVersion {
            module: module.into(),
            version: version.into(),
            role,
        }
    }

    /// Create a new store unavailable error.
    #[must_use]
    pub fn store_unavailable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a new target not staged error.
    #[must_use]
    pub fn target_not_staged(pcb: impl Into<String>, target: impl Into<String>) -> Self {
        Self::TargetNotStaged {
            pcb: pcb.into(),
            target: target.into(),
        }
    }

    /// Create a new not ahead of stable error.
    #[must_use]
    pub fn not_ahead_of_stable(
        pcb: impl Into<String>,
        target: impl Into<String>,
        stable: impl Into<String>,
    ) -> Self {
        Self::NotAheadOfStable {
            pcb: pcb.into(),
            target: target.into(),
            stable: stable.into(),
        }
    }

    /// Create a new PCB version file error.
    #[must_use]
    pub fn pcb_file(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::PcbFile {
            message: message.into(),
            path,
        }
    }

    /// Create a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Whether the failure came from the blob store rather than from the request.
    #[must_use]
    pub const fn is_store_error(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. }
                | Self::StoreTimeout { .. }
                | Self::StoreConflict { .. }
                | Self::ArtifactNotFound { .. }
                | Self::ManifestCorrupt { .. }
        )
    }

    /// Whether re-running the full load→mutate→save cycle may succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::StoreConflict { .. })
    }
}
