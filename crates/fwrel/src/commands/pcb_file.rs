//! `fwrel pcb-file`

use super::render;
use crate::cli::CliError;
use fwrel_release::{PcbField, PcbVersionFile, VersionPart};
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Serialize)]
struct FieldValue {
    value: String,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Prints one field of a PCB version file, e.g. `1` or `1.2`.
///
/// # Errors
///
/// Returns a precondition error if the file exists but is malformed.
pub fn execute_pcb_file(
    file: &Path,
    field: PcbField,
    part: VersionPart,
    json: bool,
) -> Result<String, CliError> {
    let versions = PcbVersionFile::load(file)?;
    render(
        &FieldValue {
            value: versions.field(field, part),
        },
        json,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_header_file_fields() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("pcb_version.h");
        std::fs::write(
            &file,
            "#define LATEST_MAJOR 2\n#define LATEST_MINOR 3\n#define BREAKING_MAJOR 1\n#define BREAKING_MINOR 0\n",
        )
        .unwrap();

        assert_eq!(
            execute_pcb_file(&file, PcbField::Latest, VersionPart::Both, false).unwrap(),
            "2.3"
        );
        assert_eq!(
            execute_pcb_file(&file, PcbField::Breaking, VersionPart::Major, false).unwrap(),
            "1"
        );
    }

    #[test]
    fn test_missing_file_is_zero() {
        let temp = TempDir::new().unwrap();
        let out = execute_pcb_file(
            &temp.path().join("missing"),
            PcbField::Latest,
            VersionPart::Both,
            false,
        )
        .unwrap();
        assert_eq!(out, "0.0");
    }
}
