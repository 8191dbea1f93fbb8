//! Blob transports.
//!
//! This module defines the [`BlobTransport`] trait through which the manifest
//! store and artifact publishing reach the remote blob container.
//!
//! # Architecture
//!
//! The release crate provides:
//! - [`BlobTransport`] trait - get/put a named blob
//! - [`Blob`] - fetched bytes plus the store's version tag
//! - [`WriteCondition`] - optional precondition for a put
//! - [`TransportError`] - the not-found / conflict / failure split
//!
//! Implementations:
//! - [`MemoryTransport`] - in-process map, used by tests and dry runs
//! - [`DirTransport`] - a local directory standing in for the container
//! - `fwrel::http::HttpTransport` - the Azure-style HTTP container
//!
//! # Example
//!
//! ```rust
//! use fwrel_release::transport::{BlobTransport, MemoryTransport, WriteCondition};
//!
//! let transport = MemoryTransport::new();
//! transport.put("AC-1.0.0-latest", b"firmware", &WriteCondition::None).unwrap();
//! assert_eq!(transport.get("AC-1.0.0-latest").unwrap().bytes, b"firmware");
//! ```

mod dir;
mod memory;

pub use dir::DirTransport;
pub use memory::MemoryTransport;

use crate::error::Error;
use std::time::Duration;
use thiserror::Error;

/// A fetched blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Blob contents.
    pub bytes: Vec<u8>,
    /// Opaque version tag (HTTP ETag) if the store reports one.
    pub etag: Option<String>,
}

impl Blob {
    /// Creates a blob without a version tag.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, etag: None }
    }

    /// Sets the version tag.
    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// Precondition attached to a put.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WriteCondition {
    /// Unconditional overwrite.
    #[default]
    None,
    /// Only write if the blob still carries this version tag.
    IfMatch(String),
    /// Only write if the blob does not exist yet.
    IfAbsent,
}

/// Failure modes of a transport call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The blob does not exist.
    #[error("blob not found")]
    NotFound,
    /// A [`WriteCondition`] was not met.
    #[error("write precondition failed")]
    PreconditionFailed,
    /// The request exceeded its time budget.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Any other failure (network, authentication, server error).
    #[error("{0}")]
    Unavailable(String),
}

impl TransportError {
    /// Convert into the crate error for an access to `name`.
    ///
    /// `NotFound` on this path means the caller required the blob to exist.
    #[must_use]
    pub fn into_error(self, name: &str) -> Error {
        match self {
            Self::NotFound => Error::ArtifactNotFound {
                name: name.to_string(),
            },
            Self::PreconditionFailed => Error::StoreConflict {
                name: name.to_string(),
            },
            Self::Timeout(timeout) => Error::StoreTimeout {
                name: name.to_string(),
                timeout,
            },
            Self::Unavailable(message) => Error::store_unavailable(name, message),
        }
    }
}

/// Trait for blob containers holding manifests and firmware artifacts.
///
/// Calls are synchronous and must apply a bounded timeout; a transport never
/// blocks indefinitely.
pub trait BlobTransport: Send + Sync {
    /// Returns the name of this transport (e.g., "http", "dir").
    fn name(&self) -> &'static str;

    /// Fetches a blob.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotFound`] if the blob does not exist and
    /// another variant for every other failure.
    fn get(&self, name: &str) -> Result<Blob, TransportError>;

    /// Stores a blob, returning its new version tag if the store reports one.
    ///
    /// Transports that cannot evaluate `condition` ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::PreconditionFailed`] when `condition` does
    /// not hold, and another variant for every other failure.
    fn put(
        &self,
        name: &str,
        bytes: &[u8],
        condition: &WriteCondition,
    ) -> Result<Option<String>, TransportError>;
}

impl<T: BlobTransport + ?Sized> BlobTransport for &T {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn get(&self, name: &str) -> Result<Blob, TransportError> {
        (**self).get(name)
    }

    fn put(
        &self,
        name: &str,
        bytes: &[u8],
        condition: &WriteCondition,
    ) -> Result<Option<String>, TransportError> {
        (**self).put(name, bytes, condition)
    }
}

impl<T: BlobTransport + ?Sized> BlobTransport for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn get(&self, name: &str) -> Result<Blob, TransportError> {
        (**self).get(name)
    }

    fn put(
        &self,
        name: &str,
        bytes: &[u8],
        condition: &WriteCondition,
    ) -> Result<Option<String>, TransportError> {
        (**self).put(name, bytes, condition)
    }
}
