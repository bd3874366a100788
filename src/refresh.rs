//! When to go to the network, and what to serve when it fails.
//!
//! Page views never fetch while a cache exists. Only a cache miss or an
//! operator-requested hash check reaches the sheet, and every failure along
//! that path falls back to the last good cache (or an empty list).

use std::sync::Mutex;

use crate::cache::ContactCache;
use crate::config::Config;
use crate::error::FetchError;
use crate::models::{CacheEnvelope, CachedContacts, Contact};
use crate::sheets::url::normalize_sheet_url;
use crate::sheets::{build_contacts, FetchedSheet, SheetFetcher, SheetSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPlan {
    /// No cache yet: fetch, parse, merge, save.
    FullFetch,
    /// Cache present, no hash check asked for: no network at all.
    ServeCache,
    /// Cache present, hash check asked for: fetch and rebuild only on change.
    CompareHash,
}

impl RefreshPlan {
    pub fn decide(cache_exists: bool, hash_check_requested: bool) -> Self {
        match (cache_exists, hash_check_requested) {
            (false, _) => RefreshPlan::FullFetch,
            (true, false) => RefreshPlan::ServeCache,
            (true, true) => RefreshPlan::CompareHash,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Built from a payload fetched during this call.
    Fresh,
    /// Served from the stored cache.
    Cache,
    /// Nothing to serve.
    Empty,
}

#[derive(Debug, Clone)]
pub struct DirectoryLoad {
    pub contacts: Vec<Contact>,
    pub envelope: Option<CacheEnvelope>,
    pub origin: LoadOrigin,
}

impl DirectoryLoad {
    fn empty() -> Self {
        Self {
            contacts: Vec::new(),
            envelope: None,
            origin: LoadOrigin::Empty,
        }
    }

    fn from_cache(cached: CachedContacts) -> Self {
        Self {
            contacts: cached.contacts,
            envelope: Some(cached.envelope),
            origin: LoadOrigin::Cache,
        }
    }

    fn cache_or_empty(cached: Option<CachedContacts>) -> Self {
        cached.map(Self::from_cache).unwrap_or_else(Self::empty)
    }

    pub fn cache_used(&self) -> bool {
        self.origin == LoadOrigin::Cache
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

/// The directory: configuration, a sheet source, and the cache it maintains.
pub struct Directory<S: SheetSource> {
    config: Config,
    source: S,
    cache: ContactCache,
    refresh_lock: Mutex<()>,
}

impl Directory<SheetFetcher> {
    pub fn from_config(config: Config) -> Result<Self, FetchError> {
        let source = SheetFetcher::new()?;
        Ok(Self::new(config, source))
    }
}

impl<S: SheetSource> Directory<S> {
    pub fn new(config: Config, source: S) -> Self {
        let cache = ContactCache::new(config.cache_dir.clone());
        Self {
            config,
            source,
            cache,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &ContactCache {
        &self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Current contact list. `hash_check_requested` is set only by the manual
    /// refresh path.
    pub fn load(&self, hash_check_requested: bool) -> DirectoryLoad {
        let cached = self.cache.load();
        let plan = RefreshPlan::decide(cached.is_some(), hash_check_requested);
        tracing::debug!(?plan, "refresh plan");

        if plan == RefreshPlan::ServeCache {
            return DirectoryLoad::cache_or_empty(cached);
        }

        let url = normalize_sheet_url(&self.config.sheet_url);
        if url.is_empty() {
            tracing::warn!("sheet URL missing or invalid; not fetching");
            return DirectoryLoad::cache_or_empty(cached);
        }

        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another request may have filled the cache while we waited.
        match self.cache.load().or(cached) {
            Some(current) if !hash_check_requested => DirectoryLoad::from_cache(current),
            Some(current) => self.compare_hash(&url, current),
            None => self.full_fetch(&url),
        }
    }

    fn full_fetch(&self, url: &str) -> DirectoryLoad {
        match self.source.fetch(url) {
            Ok(sheet) => self.rebuild(sheet, None),
            Err(e) => {
                tracing::warn!(error = %e, "sheet fetch failed with no cache to fall back on");
                DirectoryLoad::empty()
            }
        }
    }

    fn compare_hash(&self, url: &str, cached: CachedContacts) -> DirectoryLoad {
        let sheet = match self.source.fetch(url) {
            Ok(sheet) => sheet,
            Err(e) => {
                tracing::warn!(error = %e, "hash check fetch failed; keeping cache");
                return DirectoryLoad::from_cache(cached);
            }
        };

        if sheet.hash == cached.envelope.data_hash {
            tracing::info!(hash = %sheet.hash, "sheet unchanged; cache kept");
            return DirectoryLoad::from_cache(cached);
        }

        tracing::info!(
            old = %cached.envelope.data_hash,
            new = %sheet.hash,
            "sheet changed; rebuilding cache"
        );
        self.rebuild(sheet, Some(cached))
    }

    /// Parse, merge, and save an already-fetched payload. An unusable payload
    /// never replaces the cache.
    fn rebuild(&self, sheet: FetchedSheet, fallback: Option<CachedContacts>) -> DirectoryLoad {
        let contacts = match build_contacts(&sheet.body, &self.config) {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::warn!(error = %e, "sheet payload unusable; falling back");
                return DirectoryLoad::cache_or_empty(fallback);
            }
        };

        let envelope = match self.cache.save(&contacts, &sheet.hash) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(error = %e, "failed to save contact cache; serving fresh list");
                CacheEnvelope::new(sheet.hash, contacts.len())
            }
        };

        DirectoryLoad {
            contacts,
            envelope: Some(envelope),
            origin: LoadOrigin::Fresh,
        }
    }
}
