//! PCB compatibility resolution.
//!
//! A firmware build declares the PCB revision it targets (`current`) and the
//! oldest revision it still supports (`breaking`). Every registered revision
//! in that inclusive range should point at the build, since no better-suited
//! build exists for those boards yet.

use crate::manifest::ReleaseManifest;
use crate::version::VersionId;
use std::collections::BTreeSet;

/// PCB versions that must be repointed at a build for `breaking..=current`.
///
/// When `breaking == current` the build is a breaking release and the range
/// collapses to `current` itself; older revisions keep their existing
/// firmware.
///
/// An empty result is valid and means no registered revision is in range.
#[must_use]
pub fn affected_pcb_versions(
    manifest: &ReleaseManifest,
    breaking: &VersionId,
    current: &VersionId,
) -> BTreeSet<VersionId> {
    manifest
        .registered_pcbs()
        .into_iter()
        .map(|(v, _)| v)
        .filter(|v| v >= breaking && v <= current)
        .collect()
}

/// Like [`affected_pcb_versions`] but yields the manifest key for each
/// version, in ascending version order.
#[must_use]
pub fn affected_pcb_keys(
    manifest: &ReleaseManifest,
    breaking: &VersionId,
    current: &VersionId,
) -> Vec<String> {
    affected_pcb_versions(manifest, breaking, current)
        .iter()
        .filter_map(|v| manifest.registry_key(v).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with(versions: &[&str]) -> ReleaseManifest {
        let mut manifest = ReleaseManifest::new();
        for v in versions {
            manifest.register(&VersionId::parse(v).unwrap());
        }
        manifest
    }

    fn v(s: &str) -> VersionId {
        VersionId::parse(s).unwrap()
    }

    #[test]
    fn test_inclusive_range() {
        let manifest = manifest_with(&["1.0.0", "1.1.0", "2.0.0"]);
        let affected = affected_pcb_versions(&manifest, &v("1.0.0"), &v("1.1.0"));
        assert_eq!(
            affected.into_iter().collect::<Vec<_>>(),
            vec![v("1.0.0"), v("1.1.0")]
        );
    }

    #[test]
    fn test_empty_registry() {
        let manifest = ReleaseManifest::new();
        assert!(affected_pcb_versions(&manifest, &v("1.0"), &v("2.0")).is_empty());
    }

    #[test]
    fn test_nothing_in_range() {
        let manifest = manifest_with(&["3.0.0"]);
        assert!(affected_pcb_versions(&manifest, &v("1.0"), &v("2.0")).is_empty());
    }

    #[test]
    fn test_breaking_release_touches_only_current() {
        let manifest = manifest_with(&["1.0.0", "1.1.0"]);
        let affected = affected_pcb_versions(&manifest, &v("1.1.0"), &v("1.1.0"));
        assert_eq!(affected.into_iter().collect::<Vec<_>>(), vec![v("1.1.0")]);
    }

    #[test]
    fn test_keys_preserve_legacy_form() {
        let mut manifest = ReleaseManifest::from_slice(
            br#"{"pcbVersions": {"1.2": {"major": 1, "minor": 2, "patch": 0}}}"#,
        )
        .unwrap();
        manifest.register(&v("1.3"));
        assert_eq!(
            affected_pcb_keys(&manifest, &v("1.0"), &v("1.3")),
            vec!["1.2".to_string(), "1.3.0".to_string()]
        );
    }

    #[test]
    fn test_unparseable_keys_are_skipped() {
        let manifest = ReleaseManifest::from_slice(
            br#"{"pcbVersions": {"garbage": {"major": 0, "minor": 0, "patch": 0},
                                 "1.0.0": {"major": 1, "minor": 0, "patch": 0}}}"#,
        )
        .unwrap();
        assert_eq!(
            affected_pcb_versions(&manifest, &v("0.1"), &v("9.9")).len(),
            1
        );
    }
}
