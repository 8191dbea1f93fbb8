//! Firmware artifact naming in the blob container.
//!
//! Every build is stored once per PCB version it serves:
//! - `{module}-{pcb}-{fw}` - immutable, version-qualified copy
//! - `{module}-{pcb}-latest` - movable alias for the stable release
//! - `{module}-{pcb}-staging` - movable alias for the newest staging release

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Blob listing every module, one `module:description` line each.
pub const NAMING_MAP_BLOB: &str = "naming_map";

/// Release channel with a movable alias blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Production release (`-latest`).
    Stable,
    /// Release candidate (`-staging`).
    Staging,
}

impl Channel {
    /// Suffix used in the alias blob name.
    #[must_use]
    pub const fn alias_suffix(&self) -> &'static str {
        match self {
            Self::Stable => "latest",
            Self::Staging => "staging",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Staging => write!(f, "staging"),
        }
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stable" | "latest" => Ok(Self::Stable),
            "staging" => Ok(Self::Staging),
            _ => Err(Error::config(
                format!("Unknown release channel: {s}"),
                "Valid channels: stable, staging",
            )),
        }
    }
}

/// Name of the version-qualified artifact blob.
#[must_use]
pub fn versioned_blob_name(module: &str, pcb: &str, firmware: &str) -> String {
    format!("{module}-{pcb}-{firmware}")
}

/// Name of the movable alias blob for `channel`.
#[must_use]
pub fn alias_blob_name(module: &str, pcb: &str, channel: Channel) -> String {
    format!("{module}-{pcb}-{}", channel.alias_suffix())
}

/// Module names listed in a naming map blob.
///
/// Blank lines are ignored; everything after the first `:` is a description.
#[must_use]
pub fn parse_naming_map(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.split_once(':').map_or(line, |(module, _)| module).trim())
        .filter(|module| !module.is_empty())
        .map(str::to_string)
        .collect()
}
