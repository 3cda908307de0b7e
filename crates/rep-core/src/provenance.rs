//! Provenance descriptors and canonical hashing for persisted artifacts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{ErrorInfo, RepError};

/// Provenance information attached to every persisted result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunProvenance {
    /// Hash of the parameter tree the result was computed with.
    pub params_hash: String,
    /// Hash of the input data the result was computed on.
    pub data_hash: String,
    /// RFC 3339 timestamp recording when the result was produced.
    pub created_at: String,
    /// Version of the runner that produced the result.
    pub tool_version: String,
}

/// Serializes `value` to JSON with object keys in sorted order.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, RepError> {
    let tree = serde_json::to_value(value)
        .map_err(|err| RepError::Serde(ErrorInfo::new("canonical-value", err.to_string())))?;
    serde_json::to_vec(&tree)
        .map_err(|err| RepError::Serde(ErrorInfo::new("canonical-encode", err.to_string())))
}

/// Computes a stable hexadecimal SHA-256 of the canonical JSON of `value`.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, RepError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(hex::encode(Sha256::digest(bytes)))
}
