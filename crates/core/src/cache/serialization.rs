//! JSON encoding of cached values.
//!
//! Cached values are JSON so they stay readable with `redis-cli` or a debugger.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{CacheError, Result};

/// Encodes a value to JSON bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Decodes JSON bytes into a value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Parses a counter stored as ASCII digits. Missing counters are zero.
pub fn parse_counter(bytes: Option<&[u8]>) -> Result<u64> {
    let Some(bytes) = bytes else {
        return Ok(0);
    };
    let text = String::from_utf8_lossy(bytes);
    text.trim()
        .parse()
        .map_err(|_| CacheError::CorruptGeneration(text.into_owned()))
}
