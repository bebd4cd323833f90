//! Wire envelope for distributed-tier entries.
//!
//! Entries are stored as JSON: `{"value":{"present":V}|"absent","stored_at":ms,"ttl_secs":n}`.
//! The negative marker uses the same envelope with `"absent"`, so any reader can
//! decode it regardless of the entity type it expects.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::cache::CacheEntry;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("failed to encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode cache entry: {0}")]
    Decode(#[source] serde_json::Error),
}

pub fn encode_entry<V: Serialize>(entry: &CacheEntry<V>) -> Result<Vec<u8>, PayloadError> {
    serde_json::to_vec(entry).map_err(PayloadError::Encode)
}

pub fn decode_entry<V: DeserializeOwned>(bytes: &[u8]) -> Result<CacheEntry<V>, PayloadError> {
    serde_json::from_slice(bytes).map_err(PayloadError::Decode)
}
