//! TTL-bound artifact store with content-addressed keys

use chrono::{DateTime, Duration, Utc};
use modelhub_core::{Artifact, Error, MetadataStore, Result, write_atomic};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default time-to-live for cached artifacts.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// A normalized training configuration: mapping keys to primitive values.
///
/// `BTreeMap` keeps keys sorted, which makes the canonical JSON (and thus
/// the derived cache key) independent of insertion order.
pub type ConfigMap = BTreeMap<String, serde_json::Value>;

/// Envelope hashed to derive a cache key.
#[derive(Debug, Clone, Serialize)]
struct CacheKeyEnvelope<'a> {
    kind: &'a str,
    config: &'a ConfigMap,
}

/// Compute the deterministic cache key for (kind, configuration).
///
/// The configuration must contain only primitive values; nested arrays or
/// objects are rejected so that semantically equal configurations cannot
/// hide behind differently-ordered substructure.
pub fn cache_key(kind: &str, config: &ConfigMap) -> Result<String> {
    for (key, value) in config {
        if value.is_array() || value.is_object() {
            return Err(Error::invalid_operation(format!(
                "unsupported configuration key {key:?}: values must be primitive"
            )));
        }
    }
    let envelope = CacheKeyEnvelope { kind, config };
    let bytes = serde_json::to_vec(&envelope)
        .map_err(|e| Error::serialization(format!("Failed to encode cache key envelope: {e}")))?;
    Ok(hex::encode(Sha256::digest(bytes)))
}

/// Metadata persisted for one cached artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryMeta {
    /// Artifact kind the entry was stored under
    pub kind: String,
    /// Normalized configuration the key was derived from
    pub config: ConfigMap,
    /// When the blob was stored
    pub created_at: DateTime<Utc>,
    /// Last cache hit
    pub last_accessed: DateTime<Utc>,
    /// Size of the serialized blob
    pub size_bytes: u64,
    /// Opaque caller-supplied metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// The cache's metadata document: cache key to entry metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheIndex {
    /// All known entries, keyed by cache key
    pub entries: BTreeMap<String, CacheEntryMeta>,
}

/// Cache statistics, as reported by the `stats` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in the metadata document
    pub total_entries: usize,
    /// Entries within their TTL
    pub valid_entries: usize,
    /// Entries past their TTL (removable by `evict_expired`)
    pub expired_entries: usize,
    /// Sum of blob sizes in bytes
    pub total_bytes: u64,
    /// Sum of blob sizes in megabytes, rounded to two decimals
    pub total_megabytes: f64,
    /// Cache root directory
    pub root: PathBuf,
    /// Configured TTL in hours
    pub ttl_hours: i64,
}

/// Configuration for an [`ArtifactCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory holding `entries/` and `metadata.json`
    pub root: PathBuf,
    /// Entry time-to-live
    pub ttl: Duration,
}

impl CacheConfig {
    /// Configuration with an explicit root directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, ttl_hours: i64) -> Self {
        Self {
            root: root.into(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Configuration using the platform default cache root.
    pub fn with_default_root(ttl_hours: i64) -> Result<Self> {
        Ok(Self {
            root: default_cache_root()?,
            ttl: Duration::hours(ttl_hours),
        })
    }
}

/// Inputs for determining the default cache root directory
#[derive(Debug, Clone)]
struct CacheRootInputs {
    modelhub_cache_dir: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
}

fn cache_root_from_inputs(inputs: CacheRootInputs) -> Result<PathBuf> {
    // Resolution order (first writable wins):
    // 1) MODELHUB_CACHE_DIR (explicit override)
    // 2) XDG_CACHE_HOME/modelhub/models
    // 3) OS cache dir/modelhub/models
    // 4) ~/.modelhub/cache/models
    // 5) TMPDIR/modelhub/cache/models (fallback)
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(dir) = inputs
        .modelhub_cache_dir
        .filter(|p| !p.as_os_str().is_empty())
    {
        candidates.push(dir);
    }
    if let Some(xdg) = inputs.xdg_cache_home {
        candidates.push(xdg.join("modelhub/models"));
    }
    if let Some(os_cache) = inputs.os_cache_dir {
        candidates.push(os_cache.join("modelhub/models"));
    }
    if let Some(home) = inputs.home_dir {
        candidates.push(home.join(".modelhub/cache/models"));
    }
    candidates.push(inputs.temp_dir.join("modelhub/cache/models"));

    for path in candidates {
        // An existing candidate may be read-only (CI caches under $HOME);
        // probe before committing to it.
        if path.exists() {
            let probe = path.join(".write_probe");
            match fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&probe)
            {
                Ok(_) => {
                    let _ = fs::remove_file(&probe);
                    return Ok(path);
                }
                Err(_) => continue,
            }
        }
        if fs::create_dir_all(&path).is_ok() {
            return Ok(path);
        }
    }
    Err(Error::configuration(
        "Failed to determine a writable cache directory",
    ))
}

fn default_cache_root() -> Result<PathBuf> {
    let inputs = CacheRootInputs {
        modelhub_cache_dir: std::env::var("MODELHUB_CACHE_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        xdg_cache_home: std::env::var("XDG_CACHE_HOME")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        os_cache_dir: dirs::cache_dir(),
        home_dir: dirs::home_dir(),
        temp_dir: std::env::temp_dir(),
    };
    cache_root_from_inputs(inputs)
}

/// Content-addressed, TTL-bound store for trained-model artifacts.
///
/// Constructed explicitly with its configuration and passed to callers;
/// there is no ambient process-wide instance.
#[derive(Debug)]
pub struct ArtifactCache {
    root: PathBuf,
    ttl: Duration,
    index: MetadataStore,
}

impl ArtifactCache {
    /// Open (and create if necessary) a cache rooted at `config.root`.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let entries_dir = config.root.join("entries");
        fs::create_dir_all(&entries_dir).map_err(|e| Error::io(e, &entries_dir, "create_dir_all"))?;
        let index = MetadataStore::new(config.root.join("metadata.json"));
        Ok(Self {
            root: config.root,
            ttl: config.ttl,
            index,
        })
    }

    /// Cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join("entries").join(format!("{key}.blob"))
    }

    fn is_fresh(&self, entry: &CacheEntryMeta, now: DateTime<Utc>) -> bool {
        now < entry.created_at + self.ttl
    }

    /// Retrieve a cached artifact, if present and within its TTL.
    ///
    /// An entry whose blob is missing or undecodable is removed and
    /// reported as a miss (self-healing).
    pub fn get<A: Artifact>(&self, kind: &str, config: &ConfigMap) -> Result<Option<A>> {
        let key = cache_key(kind, config)?;
        let Some((bytes, created_at)) = self.read_fresh(&key)? else {
            return Ok(None);
        };
        match A::from_bytes(&bytes) {
            Ok(artifact) => Ok(Some(artifact)),
            Err(e) => {
                warn!(key = %short_key(&key), error = %e, "cached blob undecodable, purging entry");
                self.remove_if_unchanged(&key, created_at)?;
                Ok(None)
            }
        }
    }

    /// Retrieve the raw serialized blob for (kind, configuration).
    pub fn get_bytes(&self, kind: &str, config: &ConfigMap) -> Result<Option<Vec<u8>>> {
        let key = cache_key(kind, config)?;
        Ok(self.read_fresh(&key)?.map(|(bytes, _)| bytes))
    }

    fn read_fresh(&self, key: &str) -> Result<Option<(Vec<u8>, DateTime<Utc>)>> {
        let index: CacheIndex = self.index.read()?;
        let Some(entry) = index.entries.get(key) else {
            debug!(key = %short_key(key), "cache miss");
            return Ok(None);
        };
        let created_at = entry.created_at;

        if !self.is_fresh(entry, Utc::now()) {
            info!(key = %short_key(key), "cache entry expired, removing");
            self.remove_if_unchanged(key, created_at)?;
            return Ok(None);
        }

        // The entry may have been evicted between the index read and here;
        // a dangling reference is a miss, not a failure.
        let blob_path = self.blob_path(key);
        match fs::read(&blob_path) {
            Ok(bytes) => {
                self.touch(key)?;
                debug!(key = %short_key(key), size = bytes.len(), "cache hit");
                Ok(Some((bytes, created_at)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(key = %short_key(key), "metadata references missing blob, purging entry");
                self.remove_if_unchanged(key, created_at)?;
                Ok(None)
            }
            Err(e) => Err(Error::io(e, &blob_path, "read")),
        }
    }

    /// Store a trained artifact, overwriting any prior entry for the key.
    ///
    /// Returns the derived cache key.
    pub fn put<A: Artifact>(
        &self,
        kind: &str,
        config: &ConfigMap,
        artifact: &A,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Result<String> {
        let bytes = artifact.to_bytes()?;
        self.put_bytes(kind, config, &bytes, metadata)
    }

    /// Store a pre-serialized blob, overwriting any prior entry for the key.
    pub fn put_bytes(
        &self,
        kind: &str,
        config: &ConfigMap,
        bytes: &[u8],
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Result<String> {
        let key = cache_key(kind, config)?;
        write_atomic(&self.blob_path(&key), bytes)?;

        let now = Utc::now();
        let entry = CacheEntryMeta {
            kind: kind.to_string(),
            config: config.clone(),
            created_at: now,
            last_accessed: now,
            size_bytes: bytes.len() as u64,
            metadata,
        };
        self.index.update(|index: &mut CacheIndex| {
            index.entries.insert(key.clone(), entry);
            Ok(())
        })?;

        info!(key = %short_key(&key), kind, size = bytes.len(), "artifact cached");
        Ok(key)
    }

    /// Remove every entry past its TTL. Blob and metadata go together.
    pub fn evict_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let ttl = self.ttl;
        let root = self.root.clone();
        let count = self.index.update(|index: &mut CacheIndex| {
            let expired: Vec<String> = index
                .entries
                .iter()
                .filter(|(_, entry)| now >= entry.created_at + ttl)
                .map(|(key, _)| key.clone())
                .collect();
            for key in &expired {
                index.entries.remove(key);
                remove_blob_file(&root, key);
            }
            Ok(expired.len())
        })?;
        if count > 0 {
            info!(count, "evicted expired cache entries");
        }
        Ok(count)
    }

    /// Remove every entry regardless of age.
    pub fn clear_all(&self) -> Result<usize> {
        let root = self.root.clone();
        let count = self.index.update(|index: &mut CacheIndex| {
            let keys: Vec<String> = index.entries.keys().cloned().collect();
            for key in &keys {
                index.entries.remove(key);
                remove_blob_file(&root, key);
            }
            Ok(keys.len())
        })?;
        info!(count, "cleared cache");
        Ok(count)
    }

    /// Summarize the cache without mutating it.
    pub fn stats(&self) -> Result<CacheStats> {
        let index: CacheIndex = self.index.read()?;
        let now = Utc::now();

        let total_entries = index.entries.len();
        let valid_entries = index
            .entries
            .values()
            .filter(|entry| self.is_fresh(entry, now))
            .count();
        let total_bytes: u64 = index.entries.values().map(|entry| entry.size_bytes).sum();

        Ok(CacheStats {
            total_entries,
            valid_entries,
            expired_entries: total_entries - valid_entries,
            total_bytes,
            total_megabytes: (total_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
            root: self.root.clone(),
            ttl_hours: self.ttl.num_hours(),
        })
    }

    /// Drop one entry: metadata and blob together, under the write lock.
    ///
    /// The purge decision was made from an unlocked index read, so a
    /// concurrent `put` may have refreshed the entry in the meantime. The
    /// entry is removed only while its creation stamp still matches the
    /// observed one; a refreshed entry stays.
    fn remove_if_unchanged(&self, key: &str, observed_created_at: DateTime<Utc>) -> Result<bool> {
        let root = self.root.clone();
        self.index.update(|index: &mut CacheIndex| {
            match index.entries.get(key) {
                Some(entry) if entry.created_at == observed_created_at => {
                    index.entries.remove(key);
                    remove_blob_file(&root, key);
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn touch(&self, key: &str) -> Result<()> {
        self.index.update(|index: &mut CacheIndex| {
            if let Some(entry) = index.entries.get_mut(key) {
                entry.last_accessed = Utc::now();
            }
            Ok(())
        })
    }
}

fn remove_blob_file(root: &Path, key: &str) {
    let path = root.join("entries").join(format!("{key}.blob"));
    if let Err(e) = fs::remove_file(&path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove cache blob");
    }
}

fn short_key(key: &str) -> &str {
    key.get(..8).unwrap_or(key)
}
