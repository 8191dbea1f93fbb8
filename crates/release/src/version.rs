//! PCB and firmware version identifiers.
//!
//! Two distinct version types live here:
//! - [`VersionId`] identifies a PCB hardware revision. It accepts an optional
//!   `v`/`V` prefix and two or three numeric components.
//! - [`FirmwareVersion`] is a plain numeric firmware release number used for
//!   staging and stable ordering. It never carries a prefix.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Split `s` into two or three numeric components, defaulting patch to zero.
fn parse_components(original: &str, s: &str) -> Result<(u32, u32, u32)> {
    let parts: Vec<&str> = s.split('.').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(Error::invalid_version(
            original,
            format!("expected 2 or 3 components, found {}", parts.len()),
        ));
    }

    let mut numbers = [0u32; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        // u32::from_str accepts a leading '+', which is not a version digit
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_version(
                original,
                format!("component '{part}' is not numeric"),
            ));
        }
        *slot = part.parse().map_err(|_| {
            Error::invalid_version(original, format!("component '{part}' is out of range"))
        })?;
    }

    Ok((numbers[0], numbers[1], numbers[2]))
}

/// A PCB hardware revision.
///
/// Identity and ordering only consider `(major, minor, patch)`; the original
/// input text is kept for display.
#[derive(Debug, Clone)]
pub struct VersionId {
    /// Major revision.
    pub major: u32,
    /// Minor revision.
    pub minor: u32,
    /// Patch revision (defaults to 0).
    pub patch: u32,
    full_string: String,
}

impl VersionId {
    /// Create a version from its components.
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            full_string: format!("{major}.{minor}.{patch}"),
        }
    }

    /// Parse a PCB version such as `v1.2`, `1.2.3` or `V2.0.1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] if a component is not numeric or the
    /// component count is not 2 or 3.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let (major, minor, patch) = parse_components(s, body)?;
        Ok(Self {
            major,
            minor,
            patch,
            full_string: trimmed.to_string(),
        })
    }

    /// Canonical `major.minor.patch` form used as the manifest key.
    #[must_use]
    pub fn full_version(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    /// The text this version was parsed from.
    #[must_use]
    pub fn full_string(&self) -> &str {
        &self.full_string
    }

    /// Three-way comparison returning -1, 0 or 1.
    #[must_use]
    pub fn compare(&self, other: &Self) -> i32 {
        match self.cmp(other) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    const fn key(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }
}

impl PartialEq for VersionId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for VersionId {}

impl Hash for VersionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl FromStr for VersionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The `{major, minor, patch}` record stored under `pcbVersions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcbRecord {
    /// Major revision.
    pub major: u32,
    /// Minor revision.
    pub minor: u32,
    /// Patch revision.
    pub patch: u32,
}

impl From<&VersionId> for PcbRecord {
    fn from(v: &VersionId) -> Self {
        Self {
            major: v.major,
            minor: v.minor,
            patch: v.patch,
        }
    }
}

/// A firmware release number such as `1.10.0`.
///
/// Ordered as a numeric `(major, minor, patch)` tuple, so `1.10.0 > 1.9.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FirmwareVersion {
    /// Major release number.
    pub major: u32,
    /// Minor release number.
    pub minor: u32,
    /// Patch release number.
    pub patch: u32,
}

impl FirmwareVersion {
    /// Create a firmware version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a plain numeric firmware version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] for prefixed, non-numeric or
    /// wrongly sized input.
    pub fn parse(s: &str) -> Result<Self> {
        let (major, minor, patch) = parse_components(s, s.trim())?;
        Ok(Self::new(major, minor, patch))
    }
}

impl FromStr for FirmwareVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
