//! Per-module release manifest and its blob-backed store.
//!
//! The manifest is one JSON document per module, stored as
//! `{module}-pcb_versions_list.json`:
//!
//! ```json
//! {
//!     "pcbVersions": { "1.0.0": { "major": 1, "minor": 0, "patch": 0 } },
//!     "latestVersions": { "1.0.0": "2.0.0" },
//!     "stagingVersions": { "1.0.0": ["2.1.0"] },
//!     "latestStagingVersions": { "1.0.0": "2.1.0" }
//! }
//! ```
//!
//! Sections missing from an older document load as empty maps. Top-level keys
//! this crate does not know are carried through a load/save cycle unchanged.
//!
//! Older documents kept the staging pointer under `latestStagingVersion`. A
//! PCB with no `latestStagingVersions` entry gets its pointer from that key,
//! or else from its highest staging candidate.

use crate::error::{Error, Result};
use crate::transport::{BlobTransport, TransportError, WriteCondition};
use crate::version::{FirmwareVersion, PcbRecord, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const LEGACY_STAGING_POINTER: &str = "latestStagingVersion";

/// Release state for one module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReleaseManifest {
    /// Registry of known PCB hardware versions.
    pub pcb_versions: BTreeMap<String, PcbRecord>,
    /// Stable firmware per PCB.
    pub latest_versions: BTreeMap<String, String>,
    /// Pending staging candidates per PCB, in insertion order.
    pub staging_versions: BTreeMap<String, Vec<String>>,
    /// Most recently staged firmware per PCB.
    pub latest_staging_versions: BTreeMap<String, String>,
    /// Unrecognised top-level keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ReleaseManifest {
    /// Creates a manifest with all sections present and empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a manifest document.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the bytes are not a manifest object.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        let mut manifest: Self = serde_json::from_slice(bytes)?;
        manifest.seed_staging_pointers();
        Ok(manifest)
    }

    /// Fills in missing staging pointers from the legacy key or the highest
    /// parseable candidate.
    fn seed_staging_pointers(&mut self) {
        if let Some(legacy) = self
            .extra
            .get(LEGACY_STAGING_POINTER)
            .and_then(serde_json::Value::as_object)
        {
            for (pcb, value) in legacy {
                if let Some(firmware) = value.as_str()
                    && !self.latest_staging_versions.contains_key(pcb)
                {
                    debug!(pcb = %pcb, %firmware, "Using legacy staging pointer");
                    self.latest_staging_versions.insert(pcb.clone(), firmware.to_string());
                }
            }
        }

        for (pcb, candidates) in &self.staging_versions {
            if self.latest_staging_versions.contains_key(pcb) {
                continue;
            }
            let highest = candidates
                .iter()
                .filter_map(|entry| FirmwareVersion::parse(entry).ok().map(|v| (v, entry)))
                .max_by(|(a, _), (b, _)| a.cmp(b));
            if let Some((_, entry)) = highest {
                debug!(pcb = %pcb, firmware = %entry, "Staging pointer from highest candidate");
                self.latest_staging_versions.insert(pcb.clone(), entry.clone());
            }
        }
    }

    /// Encodes the manifest with four-space indentation.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if an extra value cannot be serialized.
    pub fn to_vec_pretty(&self) -> serde_json::Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut serializer)?;
        Ok(out)
    }

    /// Registered PCB versions, skipping keys that do not parse.
    #[must_use]
    pub fn registered_pcbs(&self) -> Vec<(VersionId, &str)> {
        self.pcb_versions
            .keys()
            .filter_map(|key| match VersionId::parse(key) {
                Ok(version) => Some((version, key.as_str())),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping unparseable PCB version key");
                    None
                }
            })
            .collect()
    }

    /// The key under which `version` is registered, if it is.
    ///
    /// Older manifests may key a version as `"1.2"` rather than `"1.2.0"`;
    /// matching is by value so either form is found.
    #[must_use]
    pub fn registry_key(&self, version: &VersionId) -> Option<&str> {
        let canonical = version.full_version();
        if let Some((key, _)) = self.pcb_versions.get_key_value(&canonical) {
            return Some(key.as_str());
        }
        self.registered_pcbs()
            .into_iter()
            .find(|(v, _)| v == version)
            .map(|(_, key)| key)
    }

    /// Whether `version` is in the registry.
    #[must_use]
    pub fn is_registered(&self, version: &VersionId) -> bool {
        self.registry_key(version).is_some()
    }

    /// Adds `version` under its canonical key. Returns `false` if it was
    /// already registered.
    pub fn register(&mut self, version: &VersionId) -> bool {
        if self.is_registered(version) {
            return false;
        }
        self.pcb_versions
            .insert(version.full_version(), PcbRecord::from(version));
        true
    }

    /// Staging candidates for `pcb`, or an empty slice.
    #[must_use]
    pub fn staging_for(&self, pcb: &str) -> &[String] {
        self.staging_versions.get(pcb).map_or(&[], Vec::as_slice)
    }

    /// Whether any PCB has pending staging candidates.
    #[must_use]
    pub fn has_staging(&self) -> bool {
        self.staging_versions.values().any(|list| !list.is_empty())
    }
}

/// Blob name of a module's manifest.
#[must_use]
pub fn manifest_blob_name(module: &str) -> String {
    format!("{module}-pcb_versions_list.json")
}

/// A manifest together with the version tag it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedManifest {
    /// Module the manifest belongs to.
    pub module: String,
    /// Decoded manifest.
    pub manifest: ReleaseManifest,
    /// Tag observed at load; `None` when the manifest did not exist or the
    /// transport reports no tags.
    pub etag: Option<String>,
    /// Whether the manifest existed remotely.
    pub existed: bool,
}

impl LoadedManifest {
    /// Precondition for writing back this manifest.
    #[must_use]
    pub fn write_condition(&self) -> WriteCondition {
        match (&self.etag, self.existed) {
            (Some(tag), _) => WriteCondition::IfMatch(tag.clone()),
            (None, false) => WriteCondition::IfAbsent,
            (None, true) => WriteCondition::None,
        }
    }
}

/// Loads and saves manifests through a [`BlobTransport`].
pub struct ManifestStore<T> {
    transport: T,
}

impl<T: BlobTransport> ManifestStore<T> {
    /// Creates a store over `transport`.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches the manifest for `module`, or a fresh empty one if it does not
    /// exist yet.
    ///
    /// # Errors
    ///
    /// Any transport failure other than not-found is returned as
    /// [`Error::StoreUnavailable`] or [`Error::StoreTimeout`]; a document that
    /// does not decode is [`Error::ManifestCorrupt`].
    pub fn load(&self, module: &str) -> Result<LoadedManifest> {
        let name = manifest_blob_name(module);
        debug!(blob = %name, transport = self.transport.name(), "Loading manifest");

        match self.transport.get(&name) {
            Ok(blob) => {
                let manifest = ReleaseManifest::from_slice(&blob.bytes)
                    .map_err(|source| Error::ManifestCorrupt {
                        name: name.clone(),
                        source,
                    })?;
                Ok(LoadedManifest {
                    module: module.to_string(),
                    manifest,
                    etag: blob.etag,
                    existed: true,
                })
            }
            Err(TransportError::NotFound) => {
                info!(module, "No manifest found, starting a new one");
                Ok(LoadedManifest {
                    module: module.to_string(),
                    manifest: ReleaseManifest::new(),
                    etag: None,
                    existed: false,
                })
            }
            Err(e) => Err(match e {
                TransportError::Timeout(timeout) => Error::StoreTimeout { name, timeout },
                other => Error::store_unavailable(name, other.to_string()),
            }),
        }
    }

    /// Uploads `manifest` for `loaded.module`, conditioned on the tag seen at
    /// load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreConflict`] if another writer got there first and
    /// [`Error::StoreUnavailable`]/[`Error::StoreTimeout`] on transport failure.
    pub fn save(
        &self,
        loaded: &LoadedManifest,
        manifest: &ReleaseManifest,
    ) -> Result<Option<String>> {
        let name = manifest_blob_name(&loaded.module);
        let bytes = manifest.to_vec_pretty()?;
        let condition = loaded.write_condition();
        debug!(blob = %name, size = bytes.len(), ?condition, "Saving manifest");

        self.transport
            .put(&name, &bytes, &condition)
            .map_err(|e| e.into_error(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    const LEGACY: &str = r#"{
    "pcbVersions": {
        "1.2": { "major": 1, "minor": 2, "patch": 0 },
        "2.0.0": { "major": 2, "minor": 0, "patch": 0 }
    },
    "latestVersions": { "1.2": "1.4.0" },
    "latestStagingVersion": { "1.2": "1.5.0" }
}"#;

    #[test]
    fn test_missing_sections_default_to_empty() {
        let manifest = ReleaseManifest::from_slice(br#"{"pcbVersions": {}}"#).unwrap();
        assert!(manifest.latest_versions.is_empty());
        assert!(manifest.staging_versions.is_empty());
        assert!(manifest.latest_staging_versions.is_empty());
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let manifest = ReleaseManifest::from_slice(LEGACY.as_bytes()).unwrap();
        assert!(manifest.extra.contains_key("latestStagingVersion"));

        let encoded = manifest.to_vec_pretty().unwrap();
        let reparsed = ReleaseManifest::from_slice(&encoded).unwrap();
        assert_eq!(reparsed, manifest);
    }

    #[test]
    fn test_legacy_staging_pointer_is_seeded() {
        let manifest = ReleaseManifest::from_slice(LEGACY.as_bytes()).unwrap();
        assert_eq!(
            manifest.latest_staging_versions.get("1.2").map(String::as_str),
            Some("1.5.0")
        );
    }

    #[test]
    fn test_staging_pointer_falls_back_to_highest_candidate() {
        let manifest = ReleaseManifest::from_slice(
            br#"{
                "stagingVersions": {"1.0.0": ["1.9.0", "1.10.0", "junk", "1.2.0"], "1.1.0": []},
                "latestStagingVersions": {"2.0.0": "3.0.0"},
                "latestStagingVersion": {"2.0.0": "1.0.0"}
            }"#,
        )
        .unwrap();
        assert_eq!(
            manifest.latest_staging_versions.get("1.0.0").map(String::as_str),
            Some("1.10.0")
        );
        assert!(!manifest.latest_staging_versions.contains_key("1.1.0"));
        // An existing pointer is never replaced
        assert_eq!(
            manifest.latest_staging_versions.get("2.0.0").map(String::as_str),
            Some("3.0.0")
        );
    }

    #[test]
    fn test_pretty_output_uses_four_spaces() {
        let mut manifest = ReleaseManifest::new();
        manifest.register(&VersionId::new(1, 0, 0));
        let text = String::from_utf8(manifest.to_vec_pretty().unwrap()).unwrap();
        assert!(text.contains("\n    \"pcbVersions\": {\n        \"1.0.0\""));
        assert!(text.contains("\"stagingVersions\": {}"));
    }

    #[test]
    fn test_registry_key_matches_legacy_form() {
        let manifest = ReleaseManifest::from_slice(LEGACY.as_bytes()).unwrap();
        assert_eq!(manifest.registry_key(&VersionId::new(1, 2, 0)), Some("1.2"));
        assert_eq!(manifest.registry_key(&VersionId::new(2, 0, 0)), Some("2.0.0"));
        assert_eq!(manifest.registry_key(&VersionId::new(3, 0, 0)), None);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut manifest = ReleaseManifest::from_slice(LEGACY.as_bytes()).unwrap();
        assert!(!manifest.register(&VersionId::parse("v1.2").unwrap()));
        assert!(manifest.register(&VersionId::parse("v1.3").unwrap()));
        assert_eq!(
            manifest.pcb_versions.get("1.3.0"),
            Some(&PcbRecord {
                major: 1,
                minor: 3,
                patch: 0
            })
        );
        assert_eq!(manifest.pcb_versions.len(), 3);
    }

    #[test]
    fn test_load_not_found_creates_empty() {
        let store = ManifestStore::new(MemoryTransport::new());
        let loaded = store.load("AC").unwrap();
        assert!(!loaded.existed);
        assert_eq!(loaded.manifest, ReleaseManifest::new());
        assert_eq!(loaded.write_condition(), WriteCondition::IfAbsent);
    }

    #[test]
    fn test_load_transport_error_is_fatal() {
        let transport = MemoryTransport::new();
        transport.fail_with(
            manifest_blob_name("AC"),
            TransportError::Unavailable("HTTP 403 Forbidden".to_string()),
        );
        let store = ManifestStore::new(transport);
        assert!(matches!(
            store.load("AC"),
            Err(Error::StoreUnavailable { .. })
        ));
    }

    #[test]
    fn test_load_timeout_is_reported() {
        let transport = MemoryTransport::new();
        transport.fail_with(
            manifest_blob_name("AC"),
            TransportError::Timeout(std::time::Duration::from_secs(5)),
        );
        let store = ManifestStore::new(transport);
        assert!(matches!(store.load("AC"), Err(Error::StoreTimeout { .. })));
    }

    #[test]
    fn test_load_corrupt_manifest() {
        let transport = MemoryTransport::new();
        transport.insert(manifest_blob_name("AC"), b"not json".to_vec());
        let store = ManifestStore::new(transport);
        assert!(matches!(
            store.load("AC"),
            Err(Error::ManifestCorrupt { .. })
        ));
    }

    #[test]
    fn test_save_detects_concurrent_writer() {
        let store = ManifestStore::new(MemoryTransport::new());
        store.transport().insert(manifest_blob_name("AC"), b"{}".to_vec());

        let loaded = store.load("AC").unwrap();
        // Another process rewrites the manifest after our load
        store.transport().insert(manifest_blob_name("AC"), b"{}".to_vec());

        let result = store.save(&loaded, &loaded.manifest);
        assert!(matches!(result, Err(Error::StoreConflict { .. })));
    }

    #[test]
    fn test_save_then_load() {
        let store = ManifestStore::new(MemoryTransport::new());
        let loaded = store.load("DC").unwrap();
        let mut manifest = loaded.manifest.clone();
        manifest.register(&VersionId::new(1, 1, 0));
        store.save(&loaded, &manifest).unwrap();

        let reloaded = store.load("DC").unwrap();
        assert!(reloaded.existed);
        assert_eq!(reloaded.manifest, manifest);
    }
}
