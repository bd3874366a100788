//! Short-lived download ids for individual contacts.
//!
//! A contacts page registers one opaque id per card; the download endpoint
//! resolves it back to the contact until the entry expires.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::Contact;

pub const DOWNLOAD_ID_LEN: usize = 16;

/// First 16 hex characters of `sha256(name|number|index)`.
pub fn contact_download_id(contact: &Contact, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", contact.name, contact.number, index).as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(DOWNLOAD_ID_LEN);
    id
}

/// Exactly 16 lowercase hex characters.
pub fn is_valid_download_id(id: &str) -> bool {
    id.len() == DOWNLOAD_ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Found(V),
    Expired,
    Missing,
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Process-scoped key/value store whose entries lapse after a fixed TTL.
pub struct ExpiringStore<V> {
    ttl: Mutex<Duration>,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> ExpiringStore<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: Mutex::new(ttl),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn expire_after(&self, ttl: Duration) {
        *self.ttl.lock().unwrap_or_else(|p| p.into_inner()) = ttl;
    }

    pub fn ttl(&self) -> Duration {
        *self.ttl.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        self.put_at(key, value, Instant::now());
    }

    pub fn get(&self, key: &str) -> Lookup<V> {
        self.get_at(key, Instant::now())
    }

    /// Lapsed entries stay behind as tombstones for a second TTL so late
    /// lookups still report `Expired`; older ones are dropped here.
    pub fn put_at(&self, key: impl Into<String>, value: V, now: Instant) {
        let retain_for = self.ttl().saturating_mul(2);
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.retain(|_, e| now.saturating_duration_since(e.stored_at) < retain_for);
        entries.insert(
            key.into(),
            Entry {
                value,
                stored_at: now,
            },
        );
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Lookup<V> {
        let ttl = self.ttl();
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        match entries.get(key) {
            None => Lookup::Missing,
            Some(e) if now.saturating_duration_since(e.stored_at) < ttl => Lookup::Found(e.value.clone()),
            Some(_) => Lookup::Expired,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
