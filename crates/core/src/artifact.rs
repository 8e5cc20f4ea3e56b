//! The artifact serialization contract
//!
//! Trained-model artifacts are opaque to the stores: the cache and the
//! registry move, hash, and persist bytes without inspecting structure.
//! Types that want transparent caching implement [`Artifact`]; anything
//! already serialized can use the raw-bytes store entry points instead.

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// An opaque trained-model artifact that knows how to move itself to and
/// from a byte blob.
///
/// This replaces blanket "serialize anything" persistence with an explicit
/// capability: only types that opt in can round-trip through the stores,
/// and deserialization never executes arbitrary code.
pub trait Artifact: Sized {
    /// Serialize the artifact to a byte blob.
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Reconstruct the artifact from a byte blob.
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

/// Adapter giving any serde type the [`Artifact`] contract via JSON.
///
/// Most trained-model summaries (coefficients, hyperparameters, metric
/// tables) are plain data; wrapping them in `JsonArtifact` is enough to
/// cache them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonArtifact<T>(pub T);

impl<T> JsonArtifact<T> {
    /// Unwrap the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize + DeserializeOwned> Artifact for JsonArtifact<T> {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0)
            .map_err(|e| Error::serialization(format!("Failed to serialize artifact: {e}")))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map(JsonArtifact)
            .map_err(|e| Error::serialization(format!("Failed to deserialize artifact: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct LinearModel {
        coefficients: Vec<f64>,
        intercept: f64,
        features: Vec<String>,
    }

    #[test]
    fn json_artifact_round_trips() {
        let model = LinearModel {
            coefficients: vec![0.5, -1.25, 3.0],
            intercept: 42.0,
            features: vec!["sqft".into(), "bedrooms".into(), "age".into()],
        };
        let blob = JsonArtifact(model.clone()).to_bytes().unwrap();
        let restored = JsonArtifact::<LinearModel>::from_bytes(&blob).unwrap();
        assert_eq!(restored.into_inner(), model);
    }

    #[test]
    fn json_artifact_round_trips_maps() {
        let mut metrics = BTreeMap::new();
        metrics.insert("r2".to_string(), 0.93);
        metrics.insert("rmse".to_string(), 12.4);
        let blob = JsonArtifact(metrics.clone()).to_bytes().unwrap();
        let restored = JsonArtifact::<BTreeMap<String, f64>>::from_bytes(&blob).unwrap();
        assert_eq!(restored.0, metrics);
    }

    #[test]
    fn garbage_bytes_are_a_serialization_error() {
        let err = JsonArtifact::<LinearModel>::from_bytes(b"\x00\x01not json").unwrap_err();
        assert_eq!(err.kind(), "serialization_error");
    }
}
