//! Descriptor caches.
//!
//! A cached descriptor is only served back when the caller's [`Freshness`]
//! token equals the one it was stored with. Tokens combine the descriptor
//! format version with a fingerprint of the declaration source, so editing a
//! declaration or upgrading the crate both force a rebuild.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::CacheError;
use crate::types::{DESCRIPTOR_VERSION, EntityDescriptor};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub name: String,
    pub class: Option<String>,
}

impl CacheKey {
    pub fn new(name: impl Into<String>, class: Option<String>) -> Self {
        Self {
            name: name.into(),
            class,
        }
    }

    fn file_stem(&self) -> String {
        let raw = match &self.class {
            Some(class) => format!("{}.{class}", self.name),
            None => self.name.clone(),
        };
        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' { c } else { '_' })
            .collect()
    }
}

/// Validity token of a cached descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freshness {
    pub version: u32,
    pub fingerprint: String,
}

impl Freshness {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            version: DESCRIPTOR_VERSION,
            fingerprint: fingerprint.into(),
        }
    }

    /// Token of a declaration file: its modification time and size.
    pub fn for_source(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let modified = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        Ok(Self::new(format!("{modified}:{}", metadata.len())))
    }
}

pub trait DescriptorCache: Send + Sync {
    /// The descriptor stored under `key`, if it was stored with `token`.
    fn fetch(&self, key: &CacheKey, token: &Freshness) -> Option<EntityDescriptor>;

    fn store(&self, key: &CacheKey, token: &Freshness, descriptor: &EntityDescriptor) -> Result<(), CacheError>;

    fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError>;

    /// Drop every entry, returning how many were removed.
    fn clear(&self) -> Result<usize, CacheError>;
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryDescriptorCache {
    entries: RwLock<HashMap<CacheKey, (Freshness, EntityDescriptor)>>,
}

impl MemoryDescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DescriptorCache for MemoryDescriptorCache {
    fn fetch(&self, key: &CacheKey, token: &Freshness) -> Option<EntityDescriptor> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|(stored, _)| stored == token)
            .map(|(_, descriptor)| descriptor.clone())
    }

    fn store(&self, key: &CacheKey, token: &Freshness, descriptor: &EntityDescriptor) -> Result<(), CacheError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), (token.clone(), descriptor.clone()));
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// File stems are sanitised, so distinct keys can share a file.
    key: CacheKey,
    freshness: Freshness,
    stored_at: DateTime<Utc>,
    descriptor: EntityDescriptor,
}

/// One JSON file per descriptor under a directory. Safe to delete at any time.
#[derive(Debug, Clone)]
pub struct FsDescriptorCache {
    dir: PathBuf,
}

impl FsDescriptorCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Failed to remove cache entry {}: {e}", path.display());
        }
    }
}

impl DescriptorCache for FsDescriptorCache {
    fn fetch(&self, key: &CacheKey, token: &Freshness) -> Option<EntityDescriptor> {
        let path = self.path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read cache entry {}: {e}", path.display());
                return None;
            }
        };
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Discarding corrupt cache entry {}: {e}", path.display());
                self.discard(&path);
                return None;
            }
        };
        if &entry.key != key {
            debug!("Cache file {} holds another key, ignoring it", path.display());
            return None;
        }
        if &entry.freshness != token || entry.descriptor.version != DESCRIPTOR_VERSION {
            debug!("Cache entry for {} is stale (stored {})", key.name, entry.stored_at);
            self.discard(&path);
            return None;
        }
        Some(entry.descriptor)
    }

    fn store(&self, key: &CacheKey, token: &Freshness, descriptor: &EntityDescriptor) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let entry = CacheEntry {
            key: key.clone(),
            freshness: token.clone(),
            stored_at: Utc::now(),
            descriptor: descriptor.clone(),
        };
        fs::write(self.path(key), serde_json::to_string_pretty(&entry)?)?;
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        match fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn clear(&self) -> Result<usize, CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> CacheKey {
        CacheKey::new("user", Some("app::User".to_string()))
    }

    #[test]
    fn test_memory_cache_honours_token() {
        let cache = MemoryDescriptorCache::new();
        let token = Freshness::new("1:10");
        cache.store(&key(), &token, &EntityDescriptor::new("user")).unwrap();

        assert!(cache.fetch(&key(), &token).is_some());
        assert!(cache.fetch(&key(), &Freshness::new("2:10")).is_none());
        assert!(cache.fetch(&CacheKey::new("user", None), &token).is_none());

        cache.invalidate(&key()).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fs_cache_round_trip_and_staleness() {
        let dir = TempDir::new().unwrap();
        let cache = FsDescriptorCache::new(dir.path().join("cache"));
        let token = Freshness::new("1:10");
        let descriptor = EntityDescriptor::new("user");
        cache.store(&key(), &token, &descriptor).unwrap();

        assert_eq!(cache.fetch(&key(), &token), Some(descriptor));
        assert!(cache.fetch(&key(), &Freshness::new("9:10")).is_none());
        // Stale entries are removed on sight.
        assert!(cache.fetch(&key(), &token).is_none());
    }

    #[test]
    fn test_fs_cache_discards_corrupt_entries() {
        let dir = TempDir::new().unwrap();
        let cache = FsDescriptorCache::new(dir.path());
        fs::write(cache.path(&key()), "{ not json").unwrap();
        assert!(cache.fetch(&key(), &Freshness::new("1:10")).is_none());
        assert!(!cache.path(&key()).exists());
    }

    #[test]
    fn test_fs_cache_clear() {
        let dir = TempDir::new().unwrap();
        let cache = FsDescriptorCache::new(dir.path().join("missing"));
        assert_eq!(cache.clear().unwrap(), 0);

        let token = Freshness::new("1:1");
        cache.store(&key(), &token, &EntityDescriptor::new("user")).unwrap();
        cache
            .store(&CacheKey::new("post", None), &token, &EntityDescriptor::new("post"))
            .unwrap();
        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.fetch(&key(), &token).is_none());
    }

    #[test]
    fn test_freshness_tracks_source_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user.toml");
        fs::write(&path, "[fields]\n").unwrap();
        let before = Freshness::for_source(&path).unwrap();
        fs::write(&path, "[fields]\nname = \"string\"\n").unwrap();
        let after = Freshness::for_source(&path).unwrap();
        assert_ne!(before, after);
        assert_eq!(before.version, DESCRIPTOR_VERSION);
    }

    #[test]
    fn test_fs_cache_keys_sharing_a_file_stay_apart() {
        let dir = TempDir::new().unwrap();
        let cache = FsDescriptorCache::new(dir.path());
        let token = Freshness::new("1:10");
        let nested = CacheKey::new("user", Some("a::b".to_string()));
        let flat = CacheKey::new("user", Some("a__b".to_string()));
        assert_eq!(nested.file_stem(), flat.file_stem());

        cache.store(&nested, &token, &EntityDescriptor::new("user")).unwrap();
        assert!(cache.fetch(&flat, &token).is_none());
        assert!(cache.fetch(&nested, &token).is_some());

        let dotted = CacheKey::new("user.x", None);
        let classed = CacheKey::new("user", Some("x".to_string()));
        cache.store(&dotted, &token, &EntityDescriptor::new("user.x")).unwrap();
        assert!(cache.fetch(&classed, &token).is_none());
        assert_eq!(cache.fetch(&dotted, &token).map(|d| d.name), Some("user.x".to_string()));
    }

    #[test]
    fn test_file_stem_is_sanitised() {
        assert_eq!(key().file_stem(), "user.app__User");
    }
}
