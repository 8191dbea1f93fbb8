//! Release state machine.
//!
//! Per module and PCB version a firmware build moves `NONE -> STAGED -> STABLE`.
//! Any number of builds can be staged at once; exactly one is stable.
//!
//! The `plan_*` functions are pure: they take the current manifest and a
//! request, and return the next manifest with the blob writes it implies. The
//! input manifest is never modified, so a failed plan leaves the stored state
//! exactly as it was. [`ReleasePromoter`] runs one load, plan, write and save
//! cycle against a [`BlobTransport`].

use crate::artifact::{Channel, alias_blob_name, versioned_blob_name};
use crate::error::{Error, Result};
use crate::manifest::{LoadedManifest, ManifestStore, ReleaseManifest};
use crate::plan::{BlobOp, DryRun, ReleaseAction, ReleasePlan, ReleaseReport, Transition};
use crate::resolver::affected_pcb_keys;
use crate::transport::{BlobTransport, WriteCondition};
use crate::version::{FirmwareVersion, VersionId};
use std::borrow::Cow;
use tracing::{debug, info, warn};

/// A new firmware build to release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoteRequest {
    /// Module the build is for.
    pub module: String,
    /// PCB version the build targets.
    pub current: VersionId,
    /// Oldest PCB version the build supports.
    pub breaking: VersionId,
    /// Firmware version of the build.
    pub firmware: FirmwareVersion,
    /// Skip staging and make the build stable immediately.
    pub force_stable: bool,
}

impl PromoteRequest {
    /// Creates a staging request.
    #[must_use]
    pub fn new(
        module: impl Into<String>,
        current: VersionId,
        breaking: VersionId,
        firmware: FirmwareVersion,
    ) -> Self {
        Self {
            module: module.into(),
            current,
            breaking,
            firmware,
            force_stable: false,
        }
    }

    /// Sets whether the build bypasses staging.
    #[must_use]
    pub const fn with_force_stable(mut self, force: bool) -> Self {
        self.force_stable = force;
        self
    }
}

/// A staged build to mark stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableRequest {
    /// Module the build is for.
    pub module: String,
    /// PCB version the staged build was released for.
    pub current: VersionId,
    /// Oldest PCB version the build supports.
    pub breaking: VersionId,
    /// Staged firmware version to promote.
    pub target: FirmwareVersion,
}

impl StableRequest {
    /// Creates a stable promotion request.
    #[must_use]
    pub fn new(
        module: impl Into<String>,
        current: VersionId,
        breaking: VersionId,
        target: FirmwareVersion,
    ) -> Self {
        Self {
            module: module.into(),
            current,
            breaking,
            target,
        }
    }
}

fn require_registered(
    manifest: &ReleaseManifest,
    module: &str,
    version: &VersionId,
    role: &'static str,
) -> Result<String> {
    manifest
        .registry_key(version)
        .map(str::to_string)
        .ok_or_else(|| Error::unknown_version(module, version.full_version(), role))
}

/// The stored staging entry for `pcb` equal to `target`, compared numerically.
fn staged_entry(manifest: &ReleaseManifest, pcb: &str, target: &FirmwareVersion) -> Option<String> {
    manifest
        .staging_for(pcb)
        .iter()
        .find(|entry| FirmwareVersion::parse(entry).is_ok_and(|v| v == *target))
        .cloned()
}

/// The staging pointer for `pcb` if it is strictly ahead of `firmware`.
fn staging_pointer_ahead(
    manifest: &ReleaseManifest,
    pcb: &str,
    firmware: &FirmwareVersion,
) -> Result<Option<String>> {
    match manifest.latest_staging_versions.get(pcb) {
        Some(staged) if FirmwareVersion::parse(staged)? > *firmware => Ok(Some(staged.clone())),
        _ => Ok(None),
    }
}

/// Whether `target` would move the stable pointer of `pcb` forward.
///
/// With no stable entry any target is ahead.
///
/// # Errors
///
/// Returns [`Error::InvalidVersion`] if the stored stable entry does not parse.
pub fn is_staging_ahead_of_stable(
    manifest: &ReleaseManifest,
    pcb: &str,
    target: &FirmwareVersion,
) -> Result<bool> {
    match manifest.latest_versions.get(pcb) {
        None => Ok(true),
        Some(stable) => Ok(*target > FirmwareVersion::parse(stable)?),
    }
}

/// Adds each of `versions` to the PCB registry.
#[must_use]
pub fn plan_register(manifest: &ReleaseManifest, versions: &[VersionId]) -> Transition {
    let mut next = manifest.clone();
    let mut plan = ReleasePlan::default();

    for version in versions {
        if next.register(version) {
            plan.actions.push(ReleaseAction::PcbRegistered {
                pcb: version.full_version(),
            });
        } else {
            let pcb = next
                .registry_key(version)
                .map_or_else(|| version.full_version(), str::to_string);
            plan.actions.push(ReleaseAction::PcbAlreadyRegistered { pcb });
        }
    }

    Transition {
        manifest: next,
        plan,
    }
}

/// Releases a new build to every PCB version in `breaking..=current`.
///
/// Every affected PCB gets the version-qualified artifact. When forcing, the
/// stable pointer of each affected PCB is set and its `-latest` alias
/// rewritten. Otherwise the build is staged, provided it is not older than
/// the build currently staged for `current`; affected PCBs whose own staging
/// pointer is already ahead are left alone.
///
/// # Errors
///
/// Returns [`Error::UnknownVersion`] if `current` or `breaking` is not
/// registered, and [`Error::InvalidVersion`] if a stored staging pointer is
/// malformed.
pub fn plan_promote(manifest: &ReleaseManifest, request: &PromoteRequest) -> Result<Transition> {
    let module = request.module.as_str();
    let current_key = require_registered(manifest, module, &request.current, "current")?;
    require_registered(manifest, module, &request.breaking, "breaking")?;

    let firmware = request.firmware.to_string();
    let affected = affected_pcb_keys(manifest, &request.breaking, &request.current);
    if affected.is_empty() {
        warn!(
            module,
            breaking = %request.breaking,
            current = %request.current,
            "No registered PCB versions in range"
        );
    }

    let mut next = manifest.clone();
    let mut plan = ReleasePlan::default();

    for pcb in &affected {
        plan.blob_ops.push(BlobOp::UploadArtifact {
            blob: versioned_blob_name(module, pcb, &firmware),
        });
    }

    if request.force_stable {
        for pcb in &affected {
            let previous = next.latest_versions.insert(pcb.clone(), firmware.clone());
            plan.actions.push(ReleaseAction::StableSet {
                pcb: pcb.clone(),
                firmware: firmware.clone(),
                previous,
            });
            plan.alias_ops.push(BlobOp::UploadArtifact {
                blob: alias_blob_name(module, pcb, Channel::Stable),
            });
        }
        return Ok(Transition {
            manifest: next,
            plan,
        });
    }

    if let Some(staged) = staging_pointer_ahead(manifest, &current_key, &request.firmware)? {
        info!(
            module,
            pcb = %current_key,
            %firmware,
            %staged,
            "Newer build already staged, keeping staging pointers"
        );
        plan.actions.push(ReleaseAction::StagingKept {
            pcb: current_key,
            firmware,
            staged,
        });
        return Ok(Transition {
            manifest: next,
            plan,
        });
    }

    for pcb in &affected {
        if let Some(staged) = staging_pointer_ahead(manifest, pcb, &request.firmware)? {
            plan.actions.push(ReleaseAction::StagingKept {
                pcb: pcb.clone(),
                firmware: firmware.clone(),
                staged,
            });
            continue;
        }

        next.latest_staging_versions.insert(pcb.clone(), firmware.clone());
        if staged_entry(&next, pcb, &request.firmware).is_none() {
            next.staging_versions
                .entry(pcb.clone())
                .or_default()
                .push(firmware.clone());
        }
        plan.actions.push(ReleaseAction::StagingAdvanced {
            pcb: pcb.clone(),
            firmware: firmware.clone(),
        });
        plan.alias_ops.push(BlobOp::UploadArtifact {
            blob: alias_blob_name(module, pcb, Channel::Staging),
        });
    }

    Ok(Transition {
        manifest: next,
        plan,
    })
}

/// Marks a staged build stable for every PCB version in `breaking..=current`.
///
/// Each affected PCB gets its stable pointer set, its `-latest` alias copied
/// from the version-qualified artifact, and every staging candidate up to and
/// including the target removed.
///
/// # Errors
///
/// Returns [`Error::UnknownVersion`] if `current` is not registered,
/// [`Error::TargetNotStaged`] if the target is not a staging candidate for
/// `current`, and [`Error::NotAheadOfStable`] if it would not move the stable
/// pointer forward.
pub fn plan_stable(manifest: &ReleaseManifest, request: &StableRequest) -> Result<Transition> {
    let module = request.module.as_str();
    let current_key = require_registered(manifest, module, &request.current, "current")?;
    let target = &request.target;

    let entry = staged_entry(manifest, &current_key, target)
        .ok_or_else(|| Error::target_not_staged(&current_key, target.to_string()))?;

    if !is_staging_ahead_of_stable(manifest, &current_key, target)? {
        let stable = manifest
            .latest_versions
            .get(&current_key)
            .cloned()
            .unwrap_or_default();
        return Err(Error::not_ahead_of_stable(current_key, entry, stable));
    }

    let affected = affected_pcb_keys(manifest, &request.breaking, &request.current);
    if affected.is_empty() {
        warn!(
            module,
            breaking = %request.breaking,
            current = %request.current,
            "No registered PCB versions in range"
        );
    }

    let mut next = manifest.clone();
    let mut plan = ReleasePlan::default();

    for pcb in &affected {
        // Artifact names embed the firmware text as it was staged for that PCB
        let pcb_entry = staged_entry(manifest, pcb, target).unwrap_or_else(|| entry.clone());

        let previous = next.latest_versions.insert(pcb.clone(), pcb_entry.clone());
        plan.actions.push(ReleaseAction::StableSet {
            pcb: pcb.clone(),
            firmware: pcb_entry.clone(),
            previous,
        });
        plan.alias_ops.push(BlobOp::Copy {
            from: versioned_blob_name(module, pcb, &pcb_entry),
            to: alias_blob_name(module, pcb, Channel::Stable),
        });

        if let Some(candidates) = next.staging_versions.get_mut(pcb) {
            let mut removed = Vec::new();
            candidates.retain(|candidate| match FirmwareVersion::parse(candidate) {
                Ok(v) if v <= *target => {
                    removed.push(candidate.clone());
                    false
                }
                Ok(_) => true,
                Err(e) => {
                    warn!(
                        pcb = %pcb,
                        candidate = %candidate,
                        error = %e,
                        "Keeping unparseable staging entry"
                    );
                    true
                }
            });
            if !removed.is_empty() {
                plan.actions.push(ReleaseAction::StagingPruned {
                    pcb: pcb.clone(),
                    removed,
                });
            }
        }
    }

    Ok(Transition {
        manifest: next,
        plan,
    })
}

/// Executes release operations against a blob store.
pub struct ReleasePromoter<T> {
    store: ManifestStore<T>,
    dry_run: DryRun,
}

impl<T: BlobTransport> ReleasePromoter<T> {
    /// Creates a promoter over `transport`.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self {
            store: ManifestStore::new(transport),
            dry_run: DryRun::No,
        }
    }

    /// Sets dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: DryRun) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The manifest store.
    #[must_use]
    pub const fn store(&self) -> &ManifestStore<T> {
        &self.store
    }

    /// Loads the manifest for `module`.
    ///
    /// # Errors
    ///
    /// See [`ManifestStore::load`].
    pub fn load(&self, module: &str) -> Result<LoadedManifest> {
        self.store.load(module)
    }

    /// Registers PCB versions, creating the manifest if needed.
    ///
    /// # Errors
    ///
    /// Returns store errors from loading or saving the manifest.
    pub fn register(&self, module: &str, versions: &[VersionId]) -> Result<ReleaseReport> {
        self.run_cycle(module, None, |manifest| Ok(plan_register(manifest, versions)))
    }

    /// Releases `artifact` as a new build. See [`plan_promote`].
    ///
    /// # Errors
    ///
    /// Returns planning errors before anything is written, and store errors
    /// from uploads or the manifest save.
    pub fn promote(&self, request: &PromoteRequest, artifact: &[u8]) -> Result<ReleaseReport> {
        self.run_cycle(&request.module, Some(artifact), |manifest| {
            plan_promote(manifest, request)
        })
    }

    /// Marks a staged build stable. See [`plan_stable`].
    ///
    /// # Errors
    ///
    /// Returns planning errors before anything is written,
    /// [`Error::ArtifactNotFound`] if a version-qualified artifact is missing
    /// (also before anything is written), and store errors.
    pub fn promote_staging_to_stable(&self, request: &StableRequest) -> Result<ReleaseReport> {
        self.run_cycle(&request.module, None, |manifest| plan_stable(manifest, request))
    }

    fn run_cycle<F>(
        &self,
        module: &str,
        artifact: Option<&[u8]>,
        transform: F,
    ) -> Result<ReleaseReport>
    where
        F: FnOnce(&ReleaseManifest) -> Result<Transition>,
    {
        let loaded = self.store.load(module)?;
        let Transition { manifest, plan } = transform(&loaded.manifest)?;

        if self.dry_run.is_dry_run() {
            info!(
                module,
                actions = plan.actions.len(),
                blob_ops = plan.blob_ops.len(),
                alias_ops = plan.alias_ops.len(),
                "Dry run: skipping uploads"
            );
            for op in plan.blob_ops.iter().chain(&plan.alias_ops) {
                info!(%op, "Would perform");
            }
            return Ok(ReleaseReport::new(module, plan, false, DryRun::Yes));
        }

        // Resolve every source before writing so a missing one leaves the store untouched
        let blob_writes = self.resolve_writes(&plan.blob_ops, artifact)?;
        let alias_writes = self.resolve_writes(&plan.alias_ops, artifact)?;

        self.put_all(module, &blob_writes)?;

        let changed = !loaded.existed || manifest != loaded.manifest;
        if changed {
            self.store.save(&loaded, &manifest)?;
            info!(module, "Saved manifest");
        } else {
            debug!(module, "Manifest unchanged, not saving");
        }

        // Aliases only move once the manifest that names their build is stored
        self.put_all(module, &alias_writes)?;

        for action in &plan.actions {
            info!(module, %action, "Release action");
        }

        Ok(ReleaseReport::new(module, plan, changed, self.dry_run))
    }

    fn resolve_writes<'a>(
        &self,
        ops: &'a [BlobOp],
        artifact: Option<&'a [u8]>,
    ) -> Result<Vec<(&'a str, Cow<'a, [u8]>)>> {
        let transport = self.store.transport();
        let mut writes = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                BlobOp::UploadArtifact { blob } => {
                    let bytes = artifact.ok_or_else(|| {
                        Error::config(
                            format!("No build artifact supplied for '{blob}'"),
                            "Pass the firmware archive with --artifact",
                        )
                    })?;
                    writes.push((blob.as_str(), Cow::Borrowed(bytes)));
                }
                BlobOp::Copy { from, to } => {
                    debug!(from = %from, "Fetching copy source");
                    let source = transport.get(from).map_err(|e| e.into_error(from))?;
                    writes.push((to.as_str(), Cow::Owned(source.bytes)));
                }
            }
        }
        Ok(writes)
    }

    fn put_all(&self, module: &str, writes: &[(&str, Cow<'_, [u8]>)]) -> Result<()> {
        let transport = self.store.transport();
        for (name, bytes) in writes {
            transport
                .put(name, bytes, &WriteCondition::None)
                .map_err(|e| e.into_error(name))?;
            info!(module, blob = %name, size = bytes.len(), "Uploaded blob");
        }
        Ok(())
    }
}
