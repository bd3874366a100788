//! On-disk contact cache: the contact list plus its envelope, as two JSON files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::CacheError;
use crate::models::{CacheEnvelope, CachedContacts, Contact};

pub const DATA_FILE: &str = "contacts.json";
pub const META_FILE: &str = "contacts_meta.json";
const BACKUP_FILE: &str = "contacts.json.bak";

pub struct ContactCache {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ContactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    /// The stored list and envelope, or `None` when either file is missing,
    /// unreadable, or the pair disagrees on the contact count.
    pub fn load(&self) -> Option<CachedContacts> {
        let contacts: Vec<Contact> = read_json(&self.data_path())?;
        let envelope: CacheEnvelope = read_json(&self.meta_path())?;

        if envelope.contact_count != contacts.len() {
            tracing::warn!(
                stored = envelope.contact_count,
                actual = contacts.len(),
                "cache files disagree; treating as no cache"
            );
            return None;
        }
        Some(CachedContacts { contacts, envelope })
    }

    /// Replace both files. On failure the previous pair is left in place.
    pub fn save(&self, contacts: &[Contact], raw_hash: &str) -> Result<CacheEnvelope, CacheError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        fs::create_dir_all(&self.dir)?;
        let envelope = CacheEnvelope::new(raw_hash, contacts.len());

        let data = self.stage(contacts)?;
        let meta = self.stage(&envelope)?;

        let backup = self.dir.join(BACKUP_FILE);
        let had_data = match fs::copy(self.data_path(), &backup) {
            Ok(_) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = data.persist(self.data_path()) {
            let _ = fs::remove_file(&backup);
            return Err(e.into());
        }
        if let Err(e) = meta.persist(self.meta_path()) {
            // A new list beside the old envelope would load as a mismatched pair.
            self.restore_data(&backup, had_data);
            return Err(e.into());
        }
        let _ = fs::remove_file(&backup);

        tracing::debug!(dir = %self.dir.display(), count = contacts.len(), "cache saved");
        Ok(envelope)
    }

    fn restore_data(&self, backup: &Path, had_data: bool) {
        let restored = if had_data {
            fs::rename(backup, self.data_path())
        } else {
            fs::remove_file(self.data_path())
        };
        if let Err(e) = restored {
            tracing::error!(dir = %self.dir.display(), error = %e, "failed to roll back cache data file");
        }
    }

    fn stage<T: Serialize + ?Sized>(&self, value: &T) -> Result<NamedTempFile, CacheError> {
        let mut file = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut file, value)?;
        file.flush()?;
        file.as_file().sync_all()?;
        Ok(file)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read cache file");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cache file is not valid JSON");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn contacts() -> Vec<Contact> {
        vec![
            Contact {
                number: "161,046-417-0727".to_string(),
                name: "BACOOR EMERGENCY".to_string(),
                logo: "images/bacoor-logo.jpg".to_string(),
                label: "Bacoor Emergency".to_string(),
                messenger: Some("https://m.me/194115273982761".to_string()),
            },
            Contact {
                number: "117".to_string(),
                name: "PNP".to_string(),
                logo: "images/pnp.png".to_string(),
                label: "PNP".to_string(),
                messenger: None,
            },
        ]
    }

    #[test]
    fn test_empty_dir_has_no_cache() {
        let dir = tempdir().unwrap();
        let cache = ContactCache::new(dir.path());
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let cache = ContactCache::new(dir.path().join("nested"));
        let envelope = cache.save(&contacts(), "abc123").unwrap();

        assert_eq!(envelope.contact_count, 2);
        assert_eq!(envelope.data_hash, "abc123");

        let loaded = cache.load().unwrap();
        assert_eq!(loaded.contacts, contacts());
        assert_eq!(loaded.envelope, envelope);
    }

    #[test]
    fn test_torn_file_is_no_cache() {
        let dir = tempdir().unwrap();
        let cache = ContactCache::new(dir.path());
        cache.save(&contacts(), "abc").unwrap();

        fs::write(cache.data_path(), "[{\"number\": \"16").unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_missing_meta_is_no_cache() {
        let dir = tempdir().unwrap();
        let cache = ContactCache::new(dir.path());
        cache.save(&contacts(), "abc").unwrap();

        fs::remove_file(cache.meta_path()).unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_count_mismatch_is_no_cache() {
        let dir = tempdir().unwrap();
        let cache = ContactCache::new(dir.path());
        cache.save(&contacts(), "abc").unwrap();

        let one = &contacts()[..1];
        fs::write(cache.data_path(), serde_json::to_string(one).unwrap()).unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let cache = ContactCache::new(dir.path());
        cache.save(&contacts(), "first").unwrap();
        cache.save(&contacts()[1..], "second").unwrap();

        let loaded = cache.load().unwrap();
        assert_eq!(loaded.envelope.data_hash, "second");
        assert_eq!(loaded.contacts.len(), 1);

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "{:?}", names);
    }

    #[test]
    fn test_failed_meta_write_keeps_previous_data() {
        let dir = tempdir().unwrap();
        let cache = ContactCache::new(dir.path());
        cache.save(&contacts(), "old").unwrap();
        let old_data = fs::read_to_string(cache.data_path()).unwrap();

        // A non-empty directory cannot be replaced by a rename.
        fs::remove_file(cache.meta_path()).unwrap();
        fs::create_dir(cache.meta_path()).unwrap();
        fs::write(cache.meta_path().join("keep"), "x").unwrap();

        assert!(cache.save(&contacts()[1..], "new").is_err());
        assert_eq!(fs::read_to_string(cache.data_path()).unwrap(), old_data);
        assert!(!dir.path().join(BACKUP_FILE).exists());
    }

    #[test]
    fn test_failed_first_save_leaves_no_data() {
        let dir = tempdir().unwrap();
        let cache = ContactCache::new(dir.path());
        fs::create_dir(cache.meta_path()).unwrap();
        fs::write(cache.meta_path().join("keep"), "x").unwrap();

        assert!(cache.save(&contacts(), "abc").is_err());
        assert!(!cache.data_path().exists());
    }

    #[test]
    fn test_concurrent_saves_and_loads_never_mix_pairs() {
        let dir = tempdir().unwrap();
        let cache = ContactCache::new(dir.path());
        let full = contacts();
        let short = contacts()[1..].to_vec();
        cache.save(&full, "full").unwrap();

        std::thread::scope(|s| {
            for i in 0..4 {
                let (cache, full, short) = (&cache, &full, &short);
                s.spawn(move || {
                    for _ in 0..20 {
                        if i % 2 == 0 {
                            cache.save(full, "full").unwrap();
                        } else {
                            cache.save(short, "short").unwrap();
                        }
                    }
                });
            }
            for _ in 0..4 {
                let (cache, full, short) = (&cache, &full, &short);
                s.spawn(move || {
                    for _ in 0..50 {
                        if let Some(loaded) = cache.load() {
                            let expected = match loaded.envelope.data_hash.as_str() {
                                "full" => full,
                                _ => short,
                            };
                            assert_eq!(&loaded.contacts, expected);
                        }
                    }
                });
            }
        });

        assert!(cache.load().is_some());
    }

    #[test]
    fn test_save_into_unwritable_location_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let cache = ContactCache::new(blocker.join("cache"));
        assert!(cache.save(&contacts(), "abc").is_err());
    }
}
