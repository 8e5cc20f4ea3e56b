//! Content-addressed artifact caching for modelhub
//!
//! This crate lets training scripts skip redundant work: before training,
//! a producer asks the cache for a hit keyed by (artifact kind, training
//! configuration); on a miss it trains and stores the result.
//!
//! # Cache Key Computation
//!
//! Cache keys are a SHA-256 digest over:
//! - The artifact kind (e.g. `"random_forest"`)
//! - The canonical JSON of the normalized configuration (sorted keys)
//!
//! Two semantically identical configurations always collide on the same
//! key regardless of how their mappings were built.
//!
//! # Failure semantics
//!
//! Caching is strictly an optimization. An expired, missing, or
//! undecodable blob is reported as a miss and the stale entry is purged;
//! corruption never propagates to the caller as a hard failure.

mod store;

pub use store::{
    ArtifactCache, CacheConfig, CacheEntryMeta, CacheIndex, CacheStats, ConfigMap,
    DEFAULT_TTL_HOURS, cache_key,
};
