use serde::{Deserialize, Serialize};

use super::Contact;

/// Metadata stored next to the cached contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    /// Unix seconds of the fetch that produced the cache.
    pub timestamp: i64,
    /// SHA-256 hex of the raw, unparsed payload.
    pub data_hash: String,
    pub contact_count: usize,
}

impl CacheEnvelope {
    pub fn new(data_hash: impl Into<String>, contact_count: usize) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            data_hash: data_hash.into(),
            contact_count,
        }
    }
}

/// A contact list together with the envelope it was saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedContacts {
    pub contacts: Vec<Contact>,
    pub envelope: CacheEnvelope,
}
