//! End-to-end release lifecycle tests against an in-memory blob store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use fwrel_release::{
    Blob, BlobTransport, DryRun, Error, FirmwareVersion, MemoryTransport, PromoteRequest,
    ReleaseAction, ReleaseManifest, ReleasePromoter, StableRequest, TransportError, VersionId,
    WriteCondition, manifest_blob_name, plan_promote,
};
use std::sync::atomic::{AtomicBool, Ordering};

const MODULE: &str = "AC";

fn v(s: &str) -> VersionId {
    VersionId::parse(s).unwrap()
}

fn fw(s: &str) -> FirmwareVersion {
    FirmwareVersion::parse(s).unwrap()
}

fn manifest_of(transport: &MemoryTransport) -> ReleaseManifest {
    ReleaseManifest::from_slice(&transport.contents(&manifest_blob_name(MODULE)).unwrap())
        .unwrap()
}

fn registered(versions: &[&str]) -> ReleasePromoter<MemoryTransport> {
    let promoter = ReleasePromoter::new(MemoryTransport::new());
    let versions: Vec<_> = versions.iter().map(|s| v(s)).collect();
    promoter.register(MODULE, &versions).unwrap();
    promoter
}

#[test]
fn test_register_creates_manifest() {
    let promoter = ReleasePromoter::new(MemoryTransport::new());
    let report = promoter.register(MODULE, &[v("v1.0"), v("v1.1")]).unwrap();

    assert!(report.manifest_saved);
    let manifest = manifest_of(promoter.store().transport());
    assert_eq!(
        manifest.pcb_versions.keys().collect::<Vec<_>>(),
        vec!["1.0.0", "1.1.0"]
    );

    // A second run changes nothing and skips the save
    let report = promoter.register(MODULE, &[v("1.0")]).unwrap();
    assert!(!report.manifest_saved);
    assert_eq!(
        report.actions,
        vec![ReleaseAction::PcbAlreadyRegistered {
            pcb: "1.0.0".to_string()
        }]
    );
}

#[test]
fn test_stage_then_stable_lifecycle() {
    let promoter = registered(&["1.0.0", "1.1.0", "2.0.0"]);
    let transport = promoter.store().transport();

    let request = PromoteRequest::new(MODULE, v("1.1.0"), v("1.0.0"), fw("3.0.0"));
    promoter.promote(&request, b"build-3.0.0").unwrap();

    for name in [
        "AC-1.0.0-3.0.0",
        "AC-1.1.0-3.0.0",
        "AC-1.0.0-staging",
        "AC-1.1.0-staging",
    ] {
        assert_eq!(transport.contents(name).as_deref(), Some(&b"build-3.0.0"[..]));
    }
    assert!(transport.contents("AC-2.0.0-3.0.0").is_none());
    assert!(transport.contents("AC-1.0.0-latest").is_none());

    let manifest = manifest_of(transport);
    assert_eq!(manifest.staging_for("1.0.0"), ["3.0.0"]);
    assert!(manifest.latest_versions.is_empty());

    let request = StableRequest::new(MODULE, v("1.1.0"), v("1.0.0"), fw("3.0.0"));
    let report = promoter.promote_staging_to_stable(&request).unwrap();
    assert!(report.to_string().contains("Moved Beta 3.0.0 to stable for PCB 1.1.0"));

    assert_eq!(
        transport.contents("AC-1.0.0-latest").as_deref(),
        Some(&b"build-3.0.0"[..])
    );
    assert_eq!(
        transport.contents("AC-1.1.0-latest").as_deref(),
        Some(&b"build-3.0.0"[..])
    );

    let manifest = manifest_of(transport);
    assert_eq!(
        manifest.latest_versions.get("1.0.0").map(String::as_str),
        Some("3.0.0")
    );
    assert!(manifest.staging_for("1.0.0").is_empty());
    assert!(manifest.staging_for("1.1.0").is_empty());
    assert!(!manifest.has_staging());
}

#[test]
fn test_stable_keeps_newer_candidates() {
    let promoter = registered(&["1.0.0"]);
    for build in ["1.9.0", "2.0.0", "2.1.0"] {
        let request = PromoteRequest::new(MODULE, v("1.0.0"), v("1.0.0"), fw(build));
        promoter.promote(&request, build.as_bytes()).unwrap();
    }

    let request = StableRequest::new(MODULE, v("1.0.0"), v("1.0.0"), fw("2.0.0"));
    promoter.promote_staging_to_stable(&request).unwrap();

    let transport = promoter.store().transport();
    let manifest = manifest_of(transport);
    assert_eq!(manifest.staging_for("1.0.0"), ["2.1.0"]);
    assert_eq!(
        transport.contents("AC-1.0.0-latest").as_deref(),
        Some(&b"2.0.0"[..])
    );
    assert_eq!(
        transport.contents("AC-1.0.0-staging").as_deref(),
        Some(&b"2.1.0"[..])
    );
}

#[test]
fn test_unstaged_target_leaves_store_untouched() {
    let promoter = registered(&["1.0.0"]);
    let request = PromoteRequest::new(MODULE, v("1.0.0"), v("1.0.0"), fw("1.0.0"));
    promoter.promote(&request, b"fw").unwrap();

    let transport = promoter.store().transport();
    let before = transport.contents(&manifest_blob_name(MODULE)).unwrap();
    let puts_before = transport.puts().len();

    let request = StableRequest::new(MODULE, v("1.0.0"), v("1.0.0"), fw("1.10.0"));
    let err = promoter.promote_staging_to_stable(&request).unwrap_err();
    assert!(matches!(err, Error::TargetNotStaged { .. }));

    assert_eq!(transport.contents(&manifest_blob_name(MODULE)).unwrap(), before);
    assert_eq!(transport.puts().len(), puts_before);
}

#[test]
fn test_missing_artifact_aborts_before_writes() {
    let transport = MemoryTransport::new();
    transport.insert(
        manifest_blob_name(MODULE),
        br#"{
            "pcbVersions": {"1.0.0": {"major": 1, "minor": 0, "patch": 0}},
            "stagingVersions": {"1.0.0": ["2.0.0"]},
            "latestStagingVersions": {"1.0.0": "2.0.0"}
        }"#
        .to_vec(),
    );
    let promoter = ReleasePromoter::new(transport);

    let request = StableRequest::new(MODULE, v("1.0.0"), v("1.0.0"), fw("2.0.0"));
    let err = promoter.promote_staging_to_stable(&request).unwrap_err();
    assert!(matches!(err, Error::ArtifactNotFound { ref name } if name == "AC-1.0.0-2.0.0"));
    assert!(promoter.store().transport().puts().is_empty());
}

#[test]
fn test_dry_run_writes_nothing() {
    let promoter = registered(&["1.0.0"]).with_dry_run(DryRun::Yes);
    let transport = promoter.store().transport();
    let puts_before = transport.puts().len();

    let request = PromoteRequest::new(MODULE, v("1.0.0"), v("1.0.0"), fw("2.0.0"));
    let report = promoter.promote(&request, b"fw").unwrap();

    assert!(report.dry_run);
    assert!(!report.manifest_saved);
    assert_eq!(report.blob_ops.len(), 1);
    assert_eq!(report.alias_ops.len(), 1);
    assert_eq!(transport.puts().len(), puts_before);
    assert!(manifest_of(transport).staging_versions.is_empty());
}

#[test]
fn test_legacy_manifest_keys_are_preserved() {
    let transport = MemoryTransport::new();
    transport.insert(
        manifest_blob_name(MODULE),
        br#"{
            "pcbVersions": {"1.2": {"major": 1, "minor": 2, "patch": 0}},
            "latestVersions": {"1.2": "1.0.0"},
            "latestStagingVersion": {"1.2": "1.0.0"}
        }"#
        .to_vec(),
    );
    let promoter = ReleasePromoter::new(transport);

    let request = PromoteRequest::new(MODULE, v("v1.2"), v("v1.2"), fw("1.1.0"));
    promoter.promote(&request, b"fw").unwrap();

    let transport = promoter.store().transport();
    let manifest = manifest_of(transport);
    assert_eq!(manifest.staging_for("1.2"), ["1.1.0"]);
    assert!(manifest.extra.contains_key("latestStagingVersion"));
    assert!(transport.contents("AC-1.2-1.1.0").is_some());
    assert!(transport.contents("AC-1.2-staging").is_some());
}

#[test]
fn test_store_failure_is_not_masked() {
    let transport = MemoryTransport::new();
    transport.fail_with(
        manifest_blob_name(MODULE),
        TransportError::Unavailable("HTTP 403 Forbidden".to_string()),
    );
    let promoter = ReleasePromoter::new(transport);

    let request = PromoteRequest::new(MODULE, v("1.0.0"), v("1.0.0"), fw("2.0.0"));
    let err = promoter.promote(&request, b"fw").unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable { .. }));
    assert!(err.is_store_error());
}

#[test]
fn test_retry_on_fresh_load_is_deterministic() {
    let promoter = registered(&["1.0.0", "1.1.0"]);
    let request = PromoteRequest::new(MODULE, v("1.1.0"), v("1.0.0"), fw("2.0.0"));

    let first = plan_promote(&promoter.load(MODULE).unwrap().manifest, &request).unwrap();
    let second = plan_promote(&promoter.load(MODULE).unwrap().manifest, &request).unwrap();
    assert_eq!(first, second);
}

/// Rewrites the manifest once, just before the first manifest save.
struct RacingWriter {
    inner: MemoryTransport,
    raced: AtomicBool,
}

impl BlobTransport for RacingWriter {
    fn name(&self) -> &'static str {
        "racing"
    }

    fn get(&self, name: &str) -> Result<Blob, TransportError> {
        self.inner.get(name)
    }

    fn put(
        &self,
        name: &str,
        bytes: &[u8],
        condition: &WriteCondition,
    ) -> Result<Option<String>, TransportError> {
        if name == manifest_blob_name(MODULE) && !self.raced.swap(true, Ordering::SeqCst) {
            let mut other = ReleaseManifest::from_slice(&self.inner.get(name)?.bytes).unwrap();
            other.register(&v("2.0.0"));
            self.inner
                .put(name, &other.to_vec_pretty().unwrap(), &WriteCondition::None)?;
        }
        self.inner.put(name, bytes, condition)
    }
}

#[test]
fn test_concurrent_writer_is_detected_and_rerun_merges() {
    let inner = MemoryTransport::new();
    inner.insert(
        manifest_blob_name(MODULE),
        br#"{"pcbVersions": {"1.0.0": {"major": 1, "minor": 0, "patch": 0}}}"#.to_vec(),
    );
    let promoter = ReleasePromoter::new(RacingWriter {
        inner,
        raced: AtomicBool::new(false),
    });

    let request = PromoteRequest::new(MODULE, v("1.0.0"), v("1.0.0"), fw("2.0.0"));
    let err = promoter.promote(&request, b"fw").unwrap_err();
    assert!(err.is_conflict());

    // Re-running the whole cycle sees the other writer's change and keeps it
    promoter.promote(&request, b"fw").unwrap();
    let manifest = promoter.load(MODULE).unwrap().manifest;
    assert!(manifest.is_registered(&v("2.0.0")));
    assert_eq!(manifest.staging_for("1.0.0"), ["2.0.0"]);
}

/// Lets another writer stage a build just before the first blob write.
struct StagingRace {
    inner: MemoryTransport,
    raced: AtomicBool,
}

impl BlobTransport for StagingRace {
    fn name(&self) -> &'static str {
        "staging-race"
    }

    fn get(&self, name: &str) -> Result<Blob, TransportError> {
        self.inner.get(name)
    }

    fn put(
        &self,
        name: &str,
        bytes: &[u8],
        condition: &WriteCondition,
    ) -> Result<Option<String>, TransportError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let request = PromoteRequest::new(MODULE, v("1.0.0"), v("1.0.0"), fw("2.0.0"));
            ReleasePromoter::new(&self.inner)
                .promote(&request, b"build-2.0.0")
                .unwrap();
        }
        self.inner.put(name, bytes, condition)
    }
}

#[test]
fn test_lost_race_does_not_move_staging_alias() {
    let inner = MemoryTransport::new();
    inner.insert(
        manifest_blob_name(MODULE),
        br#"{"pcbVersions": {"1.0.0": {"major": 1, "minor": 0, "patch": 0}}}"#.to_vec(),
    );
    let promoter = ReleasePromoter::new(StagingRace {
        inner,
        raced: AtomicBool::new(false),
    });

    let request = PromoteRequest::new(MODULE, v("1.0.0"), v("1.0.0"), fw("1.5.0"));
    let err = promoter.promote(&request, b"build-1.5.0").unwrap_err();
    assert!(err.is_conflict());

    let transport = &promoter.store().transport().inner;
    assert_eq!(
        transport.contents("AC-1.0.0-staging").as_deref(),
        Some(&b"build-2.0.0"[..])
    );

    let report = promoter.promote(&request, b"build-1.5.0").unwrap();
    assert_eq!(
        report.actions,
        vec![ReleaseAction::StagingKept {
            pcb: "1.0.0".to_string(),
            firmware: "1.5.0".to_string(),
            staged: "2.0.0".to_string(),
        }]
    );

    let manifest = manifest_of(transport);
    assert_eq!(
        manifest.latest_staging_versions.get("1.0.0").map(String::as_str),
        Some("2.0.0")
    );
    assert_eq!(
        transport.contents("AC-1.0.0-staging").as_deref(),
        Some(&b"build-2.0.0"[..])
    );
    assert_eq!(
        transport.contents("AC-1.0.0-1.5.0").as_deref(),
        Some(&b"build-1.5.0"[..])
    );
}

#[test]
fn test_legacy_singular_staging_pointer_gates_older_builds() {
    let transport = MemoryTransport::new();
    transport.insert(
        manifest_blob_name(MODULE),
        br#"{
            "pcbVersions": {"1.0.0": {"major": 1, "minor": 0, "patch": 0}},
            "latestStagingVersion": {"1.0.0": "5.0.0"},
            "stagingVersions": {"1.0.0": ["5.0.0"]}
        }"#
        .to_vec(),
    );
    transport.insert("AC-1.0.0-staging", b"build-5.0.0".to_vec());
    let promoter = ReleasePromoter::new(transport);

    let request = PromoteRequest::new(MODULE, v("1.0.0"), v("1.0.0"), fw("1.0.0"));
    let report = promoter.promote(&request, b"build-1.0.0").unwrap();
    assert_eq!(
        report.actions,
        vec![ReleaseAction::StagingKept {
            pcb: "1.0.0".to_string(),
            firmware: "1.0.0".to_string(),
            staged: "5.0.0".to_string(),
        }]
    );

    let transport = promoter.store().transport();
    assert_eq!(manifest_of(transport).staging_for("1.0.0"), ["5.0.0"]);
    assert_eq!(
        transport.contents("AC-1.0.0-staging").as_deref(),
        Some(&b"build-5.0.0"[..])
    );
}
