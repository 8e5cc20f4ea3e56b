//! Command execution: CLI arguments in, JSON payloads out

use crate::cli::{CacheArgs, CacheCommands, Commands, RegistryCommands};
use modelhub_cache::{ArtifactCache, CacheConfig};
use modelhub_core::{Error, Result};
use modelhub_registry::{CreateVersion, VersionRegistry};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Execute a parsed command and return the payload to embed in the
/// response envelope.
pub fn run(command: Commands) -> Result<Value> {
    match command {
        Commands::Cache(command) => run_cache(command),
        Commands::Registry(command) => run_registry(command),
    }
}

fn run_cache(command: CacheCommands) -> Result<Value> {
    match command {
        CacheCommands::Stats(args) => {
            let cache = open_cache(&args)?;
            to_payload(&cache.stats()?)
        }
        CacheCommands::ClearExpired(args) => {
            let cache = open_cache(&args)?;
            let removed = cache.evict_expired()?;
            Ok(json!({ "removed": removed, "root": cache.root() }))
        }
        CacheCommands::ClearAll(args) => {
            let cache = open_cache(&args)?;
            let removed = cache.clear_all()?;
            Ok(json!({ "removed": removed, "root": cache.root() }))
        }
    }
}

fn run_registry(command: RegistryCommands) -> Result<Value> {
    match command {
        RegistryCommands::CreateVersion {
            registry,
            model_id,
            blob,
            tag,
            activate,
            metadata,
        } => {
            let registry = VersionRegistry::new(registry.data_dir)?;
            let opts = CreateVersion {
                tag,
                metadata: parse_metadata(metadata.as_deref())?,
                activate,
            };
            let record = registry.create_version(&model_id, &blob, opts)?;
            Ok(json!({ "model_id": model_id, "version": to_payload(&record)? }))
        }
        RegistryCommands::ListVersions { registry, model_id } => {
            let registry = VersionRegistry::new(registry.data_dir)?;
            to_payload(&registry.list_versions(&model_id)?)
        }
        RegistryCommands::GetVersion {
            registry,
            model_id,
            version_id,
        } => {
            let registry = VersionRegistry::new(registry.data_dir)?;
            let record = registry.get_version(&model_id, &version_id)?;
            Ok(json!({ "model_id": model_id, "version": to_payload(&record)? }))
        }
        RegistryCommands::Rollback {
            registry,
            model_id,
            version_id,
        } => {
            let registry = VersionRegistry::new(registry.data_dir)?;
            to_payload(&registry.rollback(&model_id, &version_id)?)
        }
        RegistryCommands::CompareVersions {
            registry,
            model_id,
            version_1,
            version_2,
        } => {
            let registry = VersionRegistry::new(registry.data_dir)?;
            to_payload(&registry.compare_versions(&model_id, &version_1, &version_2)?)
        }
        RegistryCommands::DeleteVersion {
            registry,
            model_id,
            version_id,
        } => {
            let registry = VersionRegistry::new(registry.data_dir)?;
            to_payload(&registry.delete_version(&model_id, &version_id)?)
        }
    }
}

fn open_cache(args: &CacheArgs) -> Result<ArtifactCache> {
    let config = match &args.root {
        Some(root) => CacheConfig::new(root.clone(), args.ttl_hours),
        None => CacheConfig::with_default_root(args.ttl_hours)?,
    };
    ArtifactCache::new(config)
}

fn parse_metadata(raw: Option<&str>) -> Result<BTreeMap<String, Value>> {
    let Some(raw) = raw else {
        return Ok(BTreeMap::new());
    };
    serde_json::from_str(raw).map_err(|e| {
        Error::serialization(format!("--metadata must be a JSON object: {e}"))
    })
}

fn to_payload<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| Error::serialization(format!("Failed to encode response: {e}")))
}

/// Wrap a successful payload in the response envelope.
#[must_use]
pub fn ok_envelope(payload: Value) -> Value {
    let mut envelope = serde_json::Map::new();
    envelope.insert("success".to_string(), json!(true));
    match payload {
        Value::Object(fields) => envelope.extend(fields),
        other => {
            envelope.insert("result".to_string(), other);
        }
    }
    Value::Object(envelope)
}

/// Build the failure envelope for an error.
#[must_use]
pub fn error_envelope(error: &Error) -> Value {
    json!({
        "success": false,
        "error": error.to_string(),
        "kind": error.kind(),
    })
}
