//! Fingerprint Builder
//!
//! Derives cache keys from an endpoint identifier and its request parameters.
//! Keys have the form `{group}{sha256 hex}` so the group can be recovered from
//! the key prefix.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::cache::MAX_KEY_LENGTH;
use crate::error::{CacheError, Result};

/// Group assigned to keys that carry no recognizable prefix.
pub const DEFAULT_GROUP: &str = "default";

// == Fingerprint ==
pub struct Fingerprint;

impl Fingerprint {
    /// Builds a deterministic key for `endpoint` called with `params`.
    ///
    /// Object keys are sorted recursively before hashing, so parameter
    /// insertion order does not affect the result.
    pub fn build<P: Serialize + ?Sized>(group: &str, endpoint: &str, params: &P) -> Result<String> {
        if endpoint.is_empty() {
            return Err(CacheError::InvalidKey("endpoint cannot be empty".to_string()));
        }

        let value = serde_json::to_value(params)
            .map_err(|e| CacheError::InvalidKey(format!("parameters not serializable: {}", e)))?;
        let canonical = serde_json::to_string(&canonicalize(value))
            .map_err(|e| CacheError::InvalidKey(format!("parameters not serializable: {}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(endpoint.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.as_bytes());
        let key = format!("{}{:x}", group, hasher.finalize());

        validate_key(&key)?;
        Ok(key)
    }
}

/// Recursively rebuilds objects with sorted keys.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

// == Group Derivation ==
/// Derives a group from a key prefix: everything up to and including the
/// last `_`, or [`DEFAULT_GROUP`] when there is none.
pub fn group_of(key: &str) -> &str {
    match key.rfind('_') {
        Some(idx) => &key[..=idx],
        None => DEFAULT_GROUP,
    }
}

// == Key Validation ==
/// Rejects empty and oversized keys.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
