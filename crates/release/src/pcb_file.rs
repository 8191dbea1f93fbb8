//! PCB version files shipped with each module's firmware sources.
//!
//! Two layouts are accepted:
//!
//! ```text
//! v1.3
//! v1.1
//! ```
//!
//! where line 1 is the latest PCB revision and line 2 the breaking one, or a
//! C header:
//!
//! ```c
//! #define LATEST_MAJOR 1
//! #define LATEST_MINOR 3
//! #define BREAKING_MAJOR 1
//! #define BREAKING_MINOR 1
//! ```

use crate::error::{Error, Result};
use crate::version::VersionId;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static DEFINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*#define\s+(\w+)[^\S\r\n]+(.*)$").ok());

/// Which version a PCB file field refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcbField {
    /// Newest supported revision.
    Latest,
    /// Oldest supported revision.
    Breaking,
}

/// Which component(s) of a version to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPart {
    /// Major only.
    Major,
    /// Minor only.
    Minor,
    /// `major.minor`.
    Both,
}

/// Latest and breaking PCB revisions declared by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcbVersionFile {
    /// Newest revision the firmware is built for.
    pub latest: VersionId,
    /// Oldest revision the firmware still supports.
    pub breaking: VersionId,
}

impl PcbVersionFile {
    /// Reads a PCB version file. A file that does not exist declares `0.0`
    /// for both versions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file exists but cannot be read and
    /// [`Error::PcbFile`] if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No PCB version file, assuming 0.0");
                return Ok(Self {
                    latest: VersionId::new(0, 0, 0),
                    breaking: VersionId::new(0, 0, 0),
                });
            }
            Err(e) => return Err(e.into()),
        };

        Self::parse(&contents).map_err(|e| match e {
            Error::PcbFile { message, .. } => Error::pcb_file(message, Some(path.to_path_buf())),
            other => other,
        })
    }

    /// Parses file contents in either layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PcbFile`] if a line or define is missing or malformed.
    pub fn parse(contents: &str) -> Result<Self> {
        let defines: HashMap<&str, &str> = DEFINE
            .as_ref()
            .map(|re| {
                re.captures_iter(contents)
                    .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str().trim())))
                    .collect()
            })
            .unwrap_or_default();

        if defines.is_empty() {
            Self::parse_lines(contents)
        } else {
            Self::parse_defines(&defines)
        }
    }

    fn parse_lines(contents: &str) -> Result<Self> {
        let mut lines = contents.lines().map(str::trim);
        let latest = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::pcb_file("missing latest version on line 1", None))?;
        let breaking = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::pcb_file("missing breaking version on line 2", None))?;

        Ok(Self {
            latest: parse_version(latest, "latest")?,
            breaking: parse_version(breaking, "breaking")?,
        })
    }

    fn parse_defines(defines: &HashMap<&str, &str>) -> Result<Self> {
        let number = |name: &str| -> Result<u32> {
            let value = defines
                .get(name)
                .ok_or_else(|| Error::pcb_file(format!("missing #define {name}"), None))?;
            value
                .split_whitespace()
                .next()
                .and_then(|token| token.parse().ok())
                .ok_or_else(|| {
                    Error::pcb_file(format!("#define {name} is not a number: '{value}'"), None)
                })
        };

        Ok(Self {
            latest: VersionId::new(number("LATEST_MAJOR")?, number("LATEST_MINOR")?, 0),
            breaking: VersionId::new(number("BREAKING_MAJOR")?, number("BREAKING_MINOR")?, 0),
        })
    }

    /// The selected version.
    #[must_use]
    pub const fn version(&self, field: PcbField) -> &VersionId {
        match field {
            PcbField::Latest => &self.latest,
            PcbField::Breaking => &self.breaking,
        }
    }

    /// The selected component(s) of a version, as printed for build scripts.
    #[must_use]
    pub fn field(&self, field: PcbField, part: VersionPart) -> String {
        let version = self.version(field);
        match part {
            VersionPart::Major => version.major.to_string(),
            VersionPart::Minor => version.minor.to_string(),
            VersionPart::Both => format!("{}.{}", version.major, version.minor),
        }
    }
}

impl fmt::Display for PcbVersionFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "latest {} / breaking {}", self.latest, self.breaking)
    }
}

fn parse_version(line: &str, which: &str) -> Result<VersionId> {
    VersionId::parse(line)
        .map_err(|e| Error::pcb_file(format!("invalid {which} version '{line}': {e}"), None))
}
