//! Version records, the registry document, and the registry itself

use chrono::{DateTime, Utc};
use modelhub_core::{Error, MetadataStore, Result, hash, write_atomic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One immutable version of a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Ordinal identifier, `"v1"`, `"v2"`, ...
    pub version_id: String,
    /// 1-based version number; strictly increasing, never reused
    pub version_number: u64,
    /// Optional human label (e.g. `"production"`, `"baseline"`)
    pub tag: Option<String>,
    /// Version-scoped copy of the artifact blob
    pub blob_path: PathBuf,
    /// SHA-256 digest recorded when the version was created
    pub content_hash: String,
    /// When the version was created
    pub created_at: DateTime<Utc>,
    /// Last time this version was re-activated by a rollback
    pub rolled_back_at: Option<DateTime<Utc>>,
    /// Caller-supplied metadata; may include a `"metrics"` object
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Whether this record is the model's active version
    pub is_active: bool,
}

/// Registry state for a single model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Version records in creation order
    pub versions: Vec<VersionRecord>,
    /// The active version's id; absent iff no versions exist
    pub current_version: Option<String>,
    /// Next version number to assign; survives deletions so numbers are
    /// never reused
    pub next_version: u64,
    /// When the model was first registered
    pub created_at: DateTime<Utc>,
}

impl ModelEntry {
    fn new() -> Self {
        Self {
            versions: Vec::new(),
            current_version: None,
            next_version: 1,
            created_at: Utc::now(),
        }
    }
}

/// The registry's metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryDoc {
    /// Per-model registry entries
    pub models: BTreeMap<String, ModelEntry>,
    /// When the document was initialized
    pub created_at: DateTime<Utc>,
}

impl Default for RegistryDoc {
    fn default() -> Self {
        Self {
            models: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// Options for [`VersionRegistry::create_version`].
#[derive(Debug, Clone, Default)]
pub struct CreateVersion {
    /// Optional human label for the new version
    pub tag: Option<String>,
    /// Metadata stored on the record (evaluation metrics go under
    /// `"metrics"`)
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Activate the new version immediately. The first version of a model
    /// is always activated.
    pub activate: bool,
}

/// A model's version history, as returned by `list_versions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersions {
    /// The model the history belongs to
    pub model_id: String,
    /// The active version's id
    pub current_version: Option<String>,
    /// Number of versions currently recorded
    pub total_versions: usize,
    /// Records in creation order
    pub versions: Vec<VersionRecord>,
}

/// Result of a rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackOutcome {
    /// The model that was rolled back
    pub model_id: String,
    /// The version now active
    pub version_id: String,
    /// Canonical serving location refreshed from the version blob
    pub serving_path: PathBuf,
    /// True when the target was already active (no state changed)
    pub already_active: bool,
    /// When the rollback completed
    pub timestamp: DateTime<Utc>,
}

/// Result of a deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// The model the version belonged to
    pub model_id: String,
    /// The deleted version's id
    pub deleted_version: String,
    /// Versions remaining after the deletion
    pub remaining_versions: usize,
}

/// Absolute and percentage change of one numeric metadata entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericDelta {
    /// Value in the first version
    pub from: f64,
    /// Value in the second version
    pub to: f64,
    /// `to - from`
    pub difference: f64,
    /// Percentage change relative to `from`; absent when `from` is zero
    pub percent_change: Option<f64>,
}

/// Identity and status of one side of a comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSummary {
    /// The version's id
    pub version_id: String,
    /// Optional human label
    pub tag: Option<String>,
    /// When the version was created
    pub created_at: DateTime<Utc>,
    /// Whether it is the active version
    pub is_active: bool,
}

impl From<&VersionRecord> for VersionSummary {
    fn from(record: &VersionRecord) -> Self {
        Self {
            version_id: record.version_id.clone(),
            tag: record.tag.clone(),
            created_at: record.created_at,
            is_active: record.is_active,
        }
    }
}

/// Result of comparing two versions of a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionComparison {
    /// The model both versions belong to
    pub model_id: String,
    /// First version compared
    pub version_1: VersionSummary,
    /// Second version compared
    pub version_2: VersionSummary,
    /// Deltas of numeric metadata entries present in both versions
    pub metadata_deltas: BTreeMap<String, NumericDelta>,
    /// Deltas of entries of both versions' `metadata.metrics` objects
    pub metric_deltas: BTreeMap<String, NumericDelta>,
}

/// Per-model ordered history of immutable versions with exactly one
/// active pointer.
#[derive(Debug)]
pub struct VersionRegistry {
    models_dir: PathBuf,
    store: MetadataStore,
}

impl VersionRegistry {
    /// Open (and create if necessary) a registry rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let models_dir = data_dir.join("models");
        fs::create_dir_all(&models_dir).map_err(|e| Error::io(e, &models_dir, "create_dir_all"))?;
        let store = MetadataStore::new(data_dir.join("versions_metadata.json"));
        Ok(Self { models_dir, store })
    }

    /// Canonical serving location for a model's active artifact.
    #[must_use]
    pub fn serving_path(&self, model_id: &str) -> PathBuf {
        self.models_dir.join(format!("{model_id}.blob"))
    }

    fn version_blob_path(&self, model_id: &str, version_id: &str) -> PathBuf {
        self.models_dir
            .join(model_id)
            .join(version_id)
            .join(format!("{model_id}.blob"))
    }

    /// Register a new version from a source blob.
    ///
    /// The source is copied, never mutated. The new version receives the
    /// model's next version number (1 for a first version) and becomes
    /// active iff it is the first version or `opts.activate` is set;
    /// activation is exclusive and refreshes the serving blob.
    pub fn create_version(
        &self,
        model_id: &str,
        blob_source: &Path,
        opts: CreateVersion,
    ) -> Result<VersionRecord> {
        validate_id(model_id, "model id")?;

        let bytes = match fs::read(blob_source) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(format!(
                    "source blob {}",
                    blob_source.display()
                )));
            }
            Err(e) => return Err(Error::io(e, blob_source, "read")),
        };
        let content_hash = hash::sha256_hex(&bytes);

        let serving_path = self.serving_path(model_id);
        let record = self.store.update(|doc: &mut RegistryDoc| {
            let entry = doc
                .models
                .entry(model_id.to_string())
                .or_insert_with(ModelEntry::new);

            let version_number = entry.next_version;
            let version_id = format!("v{version_number}");
            let blob_path = self.version_blob_path(model_id, &version_id);
            write_atomic(&blob_path, &bytes)?;

            let activate = entry.versions.is_empty() || opts.activate;
            if activate {
                for version in &mut entry.versions {
                    version.is_active = false;
                }
                // Keep "active" and "serving" in lockstep
                write_atomic(&serving_path, &bytes)?;
                entry.current_version = Some(version_id.clone());
            }

            let record = VersionRecord {
                version_id,
                version_number,
                tag: opts.tag.clone(),
                blob_path,
                content_hash: content_hash.clone(),
                created_at: Utc::now(),
                rolled_back_at: None,
                metadata: opts.metadata.clone(),
                is_active: activate,
            };
            entry.versions.push(record.clone());
            entry.next_version = version_number + 1;
            Ok(record)
        })?;

        info!(
            model_id,
            version = %record.version_id,
            active = record.is_active,
            hash = %&record.content_hash[..8],
            "created model version"
        );
        Ok(record)
    }

    /// The full version history of a model.
    pub fn list_versions(&self, model_id: &str) -> Result<ModelVersions> {
        let doc: RegistryDoc = self.store.read()?;
        let entry = doc
            .models
            .get(model_id)
            .ok_or_else(|| Error::not_found(format!("model {model_id}")))?;
        Ok(ModelVersions {
            model_id: model_id.to_string(),
            current_version: entry.current_version.clone(),
            total_versions: entry.versions.len(),
            versions: entry.versions.clone(),
        })
    }

    /// Fetch one version record, re-verifying the stored blob's digest.
    ///
    /// Returns `IntegrityViolation` on a hash mismatch rather than handing
    /// out possibly-corrupt data; a missing blob is `NotFound`.
    pub fn get_version(&self, model_id: &str, version_id: &str) -> Result<VersionRecord> {
        let doc: RegistryDoc = self.store.read()?;
        let record = find_record(&doc, model_id, version_id)?.clone();
        hash::verify_file(
            &record.blob_path,
            &record.content_hash,
            &format!("model {model_id} version {version_id}"),
        )?;
        Ok(record)
    }

    /// Make `version_id` the active version and refresh the serving blob.
    ///
    /// The target blob is integrity-verified first. Rolling back to the
    /// already-active version succeeds and changes nothing.
    pub fn rollback(&self, model_id: &str, version_id: &str) -> Result<RollbackOutcome> {
        let target = self.get_version(model_id, version_id)?;
        let bytes = match fs::read(&target.blob_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(format!(
                    "blob for model {model_id} version {version_id}"
                )));
            }
            Err(e) => return Err(Error::io(e, &target.blob_path, "read")),
        };

        let serving_path = self.serving_path(model_id);
        let outcome = self.store.update(|doc: &mut RegistryDoc| {
            let entry = doc
                .models
                .get_mut(model_id)
                .ok_or_else(|| Error::not_found(format!("model {model_id}")))?;

            let already_active = entry.current_version.as_deref() == Some(version_id);
            if !already_active {
                let mut found = false;
                for version in &mut entry.versions {
                    if version.version_id == version_id {
                        version.is_active = true;
                        version.rolled_back_at = Some(Utc::now());
                        found = true;
                    } else {
                        version.is_active = false;
                    }
                }
                if !found {
                    return Err(Error::not_found(format!(
                        "version {version_id} for model {model_id}"
                    )));
                }
                entry.current_version = Some(version_id.to_string());
                write_atomic(&serving_path, &bytes)?;
            }

            Ok(RollbackOutcome {
                model_id: model_id.to_string(),
                version_id: version_id.to_string(),
                serving_path: serving_path.clone(),
                already_active,
                timestamp: Utc::now(),
            })
        })?;

        if outcome.already_active {
            info!(model_id, version = version_id, "rollback target already active");
        } else {
            info!(model_id, version = version_id, "rolled back model");
        }
        Ok(outcome)
    }

    /// Diff the numeric metadata of two versions.
    ///
    /// Both records are integrity-verified (they pass through
    /// [`get_version`](Self::get_version)). Non-numeric or one-sided keys
    /// are omitted from the deltas.
    pub fn compare_versions(
        &self,
        model_id: &str,
        version_1: &str,
        version_2: &str,
    ) -> Result<VersionComparison> {
        let first = self.get_version(model_id, version_1)?;
        let second = self.get_version(model_id, version_2)?;

        let mut metadata_deltas = BTreeMap::new();
        for (key, from) in &first.metadata {
            if key == "metrics" {
                continue;
            }
            if let Some(to) = second.metadata.get(key)
                && let Some(delta) = delta_between(from, to)
            {
                metadata_deltas.insert(key.clone(), delta);
            }
        }

        let mut metric_deltas = BTreeMap::new();
        if let (
            Some(serde_json::Value::Object(first_metrics)),
            Some(serde_json::Value::Object(second_metrics)),
        ) = (first.metadata.get("metrics"), second.metadata.get("metrics"))
        {
            for (key, from) in first_metrics {
                if let Some(to) = second_metrics.get(key)
                    && let Some(delta) = delta_between(from, to)
                {
                    metric_deltas.insert(key.clone(), delta);
                }
            }
        }

        Ok(VersionComparison {
            model_id: model_id.to_string(),
            version_1: VersionSummary::from(&first),
            version_2: VersionSummary::from(&second),
            metadata_deltas,
            metric_deltas,
        })
    }

    /// Delete an inactive version's record and blob.
    ///
    /// Deleting the active version fails with `InvalidOperation` and
    /// leaves the registry unmodified. Remaining versions keep their
    /// numbers; the model's counter is untouched, so the number is never
    /// reassigned.
    pub fn delete_version(&self, model_id: &str, version_id: &str) -> Result<DeleteOutcome> {
        let (outcome, blob_path) = self.store.update(|doc: &mut RegistryDoc| {
            let entry = doc
                .models
                .get_mut(model_id)
                .ok_or_else(|| Error::not_found(format!("model {model_id}")))?;

            if entry.current_version.as_deref() == Some(version_id) {
                return Err(Error::invalid_operation(format!(
                    "cannot delete active version {version_id} of model {model_id}; \
                     roll back to a different version first"
                )));
            }

            let index = entry
                .versions
                .iter()
                .position(|v| v.version_id == version_id)
                .ok_or_else(|| {
                    Error::not_found(format!("version {version_id} for model {model_id}"))
                })?;
            let record = entry.versions.remove(index);

            let outcome = DeleteOutcome {
                model_id: model_id.to_string(),
                deleted_version: version_id.to_string(),
                remaining_versions: entry.versions.len(),
            };
            Ok((outcome, record.blob_path))
        })?;

        // The record is retired before its blob: a failed metadata write
        // must not leave a listed version with no blob on disk.
        if let Some(version_dir) = blob_path.parent()
            && let Err(e) = fs::remove_dir_all(version_dir)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(
                path = %version_dir.display(),
                error = %e,
                "failed to remove version directory"
            );
        }

        info!(model_id, version = version_id, "deleted model version");
        Ok(outcome)
    }
}

fn find_record<'a>(
    doc: &'a RegistryDoc,
    model_id: &str,
    version_id: &str,
) -> Result<&'a VersionRecord> {
    let entry = doc
        .models
        .get(model_id)
        .ok_or_else(|| Error::not_found(format!("model {model_id}")))?;
    entry
        .versions
        .iter()
        .find(|v| v.version_id == version_id)
        .ok_or_else(|| Error::not_found(format!("version {version_id} for model {model_id}")))
}

fn delta_between(from: &serde_json::Value, to: &serde_json::Value) -> Option<NumericDelta> {
    let from = from.as_f64()?;
    let to = to.as_f64()?;
    Some(NumericDelta {
        from,
        to,
        difference: to - from,
        percent_change: if from == 0.0 {
            None
        } else {
            Some((to - from) / from * 100.0)
        },
    })
}

/// Model and version ids become path components; reject anything that
/// could escape the registry root.
fn validate_id(id: &str, what: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::invalid_operation(format!("{what} must not be empty")));
    }
    if id.contains('/') || id.contains('\\') || id.contains('\0') || id == "." || id == ".." {
        return Err(Error::invalid_operation(format!(
            "{what} {id:?} contains path separators or traversal components"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        registry: VersionRegistry,
        scratch: PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let registry = VersionRegistry::new(tmp.path().join("data")).unwrap();
        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        Fixture {
            registry,
            scratch,
            _tmp: tmp,
        }
    }

    impl Fixture {
        fn blob(&self, name: &str, contents: &[u8]) -> PathBuf {
            let path = self.scratch.join(name);
            fs::write(&path, contents).unwrap();
            path
        }
    }

    fn active_versions(registry: &VersionRegistry, model_id: &str) -> Vec<String> {
        registry
            .list_versions(model_id)
            .unwrap()
            .versions
            .into_iter()
            .filter(|v| v.is_active)
            .map(|v| v.version_id)
            .collect()
    }

    // ==========================================================================
    // create_version
    // ==========================================================================

    #[test]
    fn first_version_is_v1_and_active() {
        let fx = fixture();
        let blob = fx.blob("m.bin", b"model A");

        let record = fx
            .registry
            .create_version("house-price", &blob, CreateVersion::default())
            .unwrap();

        assert_eq!(record.version_id, "v1");
        assert_eq!(record.version_number, 1);
        assert!(record.is_active);
        assert!(record.blob_path.exists());
        // Source untouched
        assert_eq!(fs::read(&blob).unwrap(), b"model A");
        // First activation also materializes the serving blob
        assert_eq!(
            fs::read(fx.registry.serving_path("house-price")).unwrap(),
            b"model A"
        );
    }

    #[test]
    fn second_version_is_inactive_unless_requested() {
        let fx = fixture();
        fx.registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();
        let second = fx
            .registry
            .create_version("m", &fx.blob("b.bin", b"B"), CreateVersion::default())
            .unwrap();

        assert_eq!(second.version_id, "v2");
        assert!(!second.is_active);
        assert_eq!(active_versions(&fx.registry, "m"), vec!["v1"]);
        // Serving blob still points at v1's contents
        assert_eq!(fs::read(fx.registry.serving_path("m")).unwrap(), b"A");
    }

    #[test]
    fn explicit_activation_supersedes_previous_active() {
        let fx = fixture();
        fx.registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();
        let second = fx
            .registry
            .create_version(
                "m",
                &fx.blob("b.bin", b"B"),
                CreateVersion {
                    activate: true,
                    ..CreateVersion::default()
                },
            )
            .unwrap();

        assert!(second.is_active);
        assert_eq!(active_versions(&fx.registry, "m"), vec!["v2"]);
        assert_eq!(fs::read(fx.registry.serving_path("m")).unwrap(), b"B");
    }

    #[test]
    fn version_numbers_are_never_reused_after_deletion() {
        let fx = fixture();
        for name in ["a", "b", "c"] {
            fx.registry
                .create_version("m", &fx.blob(&format!("{name}.bin"), name.as_bytes()), CreateVersion::default())
                .unwrap();
        }

        fx.registry.delete_version("m", "v2").unwrap();
        let fourth = fx
            .registry
            .create_version("m", &fx.blob("d.bin", b"d"), CreateVersion::default())
            .unwrap();

        // v2 is gone for good; the new version continues the sequence
        assert_eq!(fourth.version_id, "v4");
        let ids: Vec<String> = fx
            .registry
            .list_versions("m")
            .unwrap()
            .versions
            .into_iter()
            .map(|v| v.version_id)
            .collect();
        assert_eq!(ids, vec!["v1", "v3", "v4"]);
    }

    #[test]
    fn missing_source_blob_is_not_found() {
        let fx = fixture();
        let err = fx
            .registry
            .create_version("m", &fx.scratch.join("absent.bin"), CreateVersion::default())
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn model_id_with_separators_is_rejected() {
        let fx = fixture();
        let blob = fx.blob("a.bin", b"A");
        let err = fx
            .registry
            .create_version("../escape", &blob, CreateVersion::default())
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_operation");
    }

    // ==========================================================================
    // list / get
    // ==========================================================================

    #[test]
    fn list_versions_unknown_model_is_not_found() {
        let fx = fixture();
        let err = fx.registry.list_versions("nope").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn get_version_verifies_integrity() {
        let fx = fixture();
        let record = fx
            .registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();

        // Untampered read succeeds
        fx.registry.get_version("m", "v1").unwrap();

        // Tamper with the stored blob; the next read must refuse it
        fs::write(&record.blob_path, b"tampered").unwrap();
        let err = fx.registry.get_version("m", "v1").unwrap_err();
        assert_eq!(err.kind(), "integrity_violation");
    }

    #[test]
    fn get_version_with_deleted_blob_is_not_found() {
        let fx = fixture();
        let record = fx
            .registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();
        fs::remove_file(&record.blob_path).unwrap();

        let err = fx.registry.get_version("m", "v1").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    // ==========================================================================
    // rollback
    // ==========================================================================

    #[test]
    fn rollback_switches_the_active_version() {
        let fx = fixture();
        fx.registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();
        fx.registry
            .create_version("m", &fx.blob("b.bin", b"B"), CreateVersion::default())
            .unwrap();

        let outcome = fx.registry.rollback("m", "v2").unwrap();
        assert!(!outcome.already_active);
        assert_eq!(active_versions(&fx.registry, "m"), vec!["v2"]);
        assert_eq!(fs::read(fx.registry.serving_path("m")).unwrap(), b"B");

        let v2 = fx.registry.get_version("m", "v2").unwrap();
        assert!(v2.rolled_back_at.is_some());
    }

    #[test]
    fn rollback_to_active_version_is_idempotent() {
        let fx = fixture();
        fx.registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();

        let before = fx.registry.list_versions("m").unwrap();
        let outcome = fx.registry.rollback("m", "v1").unwrap();
        let after = fx.registry.list_versions("m").unwrap();

        assert!(outcome.already_active);
        assert_eq!(after.current_version, before.current_version);
        assert_eq!(
            after.versions[0].rolled_back_at,
            before.versions[0].rolled_back_at
        );
    }

    #[test]
    fn rollback_to_unknown_version_is_not_found() {
        let fx = fixture();
        fx.registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();
        let err = fx.registry.rollback("m", "v9").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn rollback_refuses_a_tampered_target() {
        let fx = fixture();
        fx.registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();
        let second = fx
            .registry
            .create_version("m", &fx.blob("b.bin", b"B"), CreateVersion::default())
            .unwrap();

        fs::write(&second.blob_path, b"evil").unwrap();
        let err = fx.registry.rollback("m", "v2").unwrap_err();
        assert_eq!(err.kind(), "integrity_violation");
        // Active pointer unchanged
        assert_eq!(active_versions(&fx.registry, "m"), vec!["v1"]);
    }

    #[test]
    fn exactly_one_active_after_any_sequence() {
        let fx = fixture();
        for name in ["a", "b", "c"] {
            fx.registry
                .create_version("m", &fx.blob(&format!("{name}.bin"), name.as_bytes()), CreateVersion::default())
                .unwrap();
        }
        fx.registry.rollback("m", "v3").unwrap();
        fx.registry.rollback("m", "v2").unwrap();
        fx.registry
            .create_version(
                "m",
                &fx.blob("d.bin", b"d"),
                CreateVersion {
                    activate: true,
                    ..CreateVersion::default()
                },
            )
            .unwrap();

        assert_eq!(active_versions(&fx.registry, "m").len(), 1);
    }

    // ==========================================================================
    // compare_versions
    // ==========================================================================

    fn meta(pairs: &[(&str, serde_json::Value)]) -> BTreeMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn compare_reports_numeric_metric_deltas() {
        let fx = fixture();
        fx.registry
            .create_version(
                "m",
                &fx.blob("a.bin", b"A"),
                CreateVersion {
                    metadata: meta(&[
                        ("training_rows", json!(1000)),
                        ("metrics", json!({"r2": 0.80, "rmse": 20.0})),
                    ]),
                    ..CreateVersion::default()
                },
            )
            .unwrap();
        fx.registry
            .create_version(
                "m",
                &fx.blob("b.bin", b"B"),
                CreateVersion {
                    metadata: meta(&[
                        ("training_rows", json!(1500)),
                        ("metrics", json!({"r2": 0.90, "rmse": 15.0})),
                    ]),
                    ..CreateVersion::default()
                },
            )
            .unwrap();

        let cmp = fx.registry.compare_versions("m", "v1", "v2").unwrap();

        let rows = &cmp.metadata_deltas["training_rows"];
        assert_eq!(rows.difference, 500.0);
        assert_eq!(rows.percent_change, Some(50.0));

        let r2 = &cmp.metric_deltas["r2"];
        assert!((r2.difference - 0.10).abs() < 1e-9);
        let rmse = &cmp.metric_deltas["rmse"];
        assert_eq!(rmse.difference, -5.0);
        assert_eq!(rmse.percent_change, Some(-25.0));
    }

    #[test]
    fn compare_omits_non_numeric_and_one_sided_keys() {
        let fx = fixture();
        fx.registry
            .create_version(
                "m",
                &fx.blob("a.bin", b"A"),
                CreateVersion {
                    metadata: meta(&[
                        ("dataset", json!("housing-2024")),
                        ("only_in_v1", json!(1.0)),
                        ("metrics", json!({"r2": 0.0, "mae": 3.0})),
                    ]),
                    ..CreateVersion::default()
                },
            )
            .unwrap();
        fx.registry
            .create_version(
                "m",
                &fx.blob("b.bin", b"B"),
                CreateVersion {
                    metadata: meta(&[
                        ("dataset", json!("housing-2025")),
                        ("metrics", json!({"r2": 0.5})),
                    ]),
                    ..CreateVersion::default()
                },
            )
            .unwrap();

        let cmp = fx.registry.compare_versions("m", "v1", "v2").unwrap();
        assert!(cmp.metadata_deltas.is_empty());
        assert_eq!(cmp.metric_deltas.len(), 1);
        // Zero baseline: absolute change reported, percentage undefined
        assert_eq!(cmp.metric_deltas["r2"].percent_change, None);
        assert_eq!(cmp.metric_deltas["r2"].difference, 0.5);
    }

    // ==========================================================================
    // delete_version
    // ==========================================================================

    #[test]
    fn deleting_the_active_version_fails_and_changes_nothing() {
        let fx = fixture();
        fx.registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();

        let err = fx.registry.delete_version("m", "v1").unwrap_err();
        assert_eq!(err.kind(), "invalid_operation");

        let listed = fx.registry.list_versions("m").unwrap();
        assert_eq!(listed.total_versions, 1);
        assert_eq!(listed.current_version.as_deref(), Some("v1"));
    }

    #[test]
    fn deleting_an_inactive_version_removes_record_and_blob() {
        let fx = fixture();
        fx.registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();
        let second = fx
            .registry
            .create_version("m", &fx.blob("b.bin", b"B"), CreateVersion::default())
            .unwrap();

        let outcome = fx.registry.delete_version("m", "v2").unwrap();
        assert_eq!(outcome.remaining_versions, 1);
        assert!(!second.blob_path.exists());

        let err = fx.registry.get_version("m", "v2").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn failed_delete_leaves_the_blob_on_disk() {
        let fx = fixture();
        let first = fx
            .registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();

        let err = fx.registry.delete_version("m", "v1").unwrap_err();
        assert_eq!(err.kind(), "invalid_operation");
        // No filesystem mutation when the registry document was not updated
        assert!(first.blob_path.exists());
        fx.registry.get_version("m", "v1").unwrap();
    }

    #[test]
    fn delete_unknown_version_is_not_found() {
        let fx = fixture();
        fx.registry
            .create_version("m", &fx.blob("a.bin", b"A"), CreateVersion::default())
            .unwrap();
        let err = fx.registry.delete_version("m", "v7").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    // ==========================================================================
    // End-to-end scenario
    // ==========================================================================

    #[test]
    fn house_price_lifecycle_scenario() {
        let fx = fixture();

        let v1 = fx
            .registry
            .create_version("house-price", &fx.blob("a.bin", b"blob A"), CreateVersion::default())
            .unwrap();
        assert_eq!(v1.version_id, "v1");
        assert!(v1.is_active);

        let v2 = fx
            .registry
            .create_version("house-price", &fx.blob("b.bin", b"blob B"), CreateVersion::default())
            .unwrap();
        assert_eq!(v2.version_id, "v2");
        assert!(!v2.is_active);
        assert_eq!(active_versions(&fx.registry, "house-price"), vec!["v1"]);

        fx.registry.rollback("house-price", "v2").unwrap();
        assert_eq!(active_versions(&fx.registry, "house-price"), vec!["v2"]);

        let err = fx.registry.delete_version("house-price", "v2").unwrap_err();
        assert_eq!(err.kind(), "invalid_operation");

        fx.registry.rollback("house-price", "v1").unwrap();
        fx.registry.delete_version("house-price", "v2").unwrap();

        let listed = fx.registry.list_versions("house-price").unwrap();
        assert_eq!(listed.total_versions, 1);
        assert_eq!(listed.current_version.as_deref(), Some("v1"));
    }
}
