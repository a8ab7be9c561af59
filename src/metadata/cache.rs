//! Injected key-value cache capability.
//!
//! The cache storage engine is supplied by the caller through [`CacheStore`].
//! Entries live in named buckets following the `{provider-id}/{purpose}`
//! convention, see the `BUCKET_*` constants. [`MemoryStore`] is the default
//! process-local engine.
//!
//! Entries are write-once-then-reused: there is no TTL or eviction. A missing
//! entry is reported as `None`, which is distinct from a cached empty value.

use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::metadata::provider::{AuthData, User};

/// Query to provider-ranked ids. `["berserk" => [7, 42, 69]]`
pub const BUCKET_QUERY_TO_IDS: &str = "query-to-ids";
/// Title to a single id. `["berserk" => 7]`
pub const BUCKET_TITLE_TO_ID: &str = "title-to-id";
/// Id to full record. `[7 => {title: ..., ...}]`
pub const BUCKET_ID_TO_MANGA: &str = "id-to-manga";
/// Username to authenticated user. Paired with [`BUCKET_NAME_TO_ACCESS_DATA`].
pub const BUCKET_NAME_TO_USER: &str = "name-to-user";
/// Username to auth data. Paired with [`BUCKET_NAME_TO_USER`].
pub const BUCKET_NAME_TO_ACCESS_DATA: &str = "name-to-access-data";

/// Named-bucket key-value store.
///
/// Implementations must tolerate concurrent reads and writes from several
/// in-flight downloads; last write wins.
pub trait CacheStore: Send + Sync {
    /// Reads the value stored under `key`, `None` if absent.
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}

/// In-memory [`CacheStore`].
///
/// # Examples
///
/// ```rust
/// use kanko::metadata::{CacheStore, MemoryStore};
///
/// # fn main() -> kanko::Result<()> {
/// let store = MemoryStore::new();
/// store.set("al/title-to-id", "berserk", b"7")?;
/// assert_eq!(store.get("al/title-to-id", "berserk")?, Some(b"7".to_vec()));
/// assert_eq!(store.get("al/title-to-id", "monster")?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in `bucket`.
    pub fn len(&self, bucket: &str) -> usize {
        self.buckets.read().get(bucket).map_or(0, HashMap::len)
    }

    /// Returns `true` when no bucket holds any entry.
    pub fn is_empty(&self) -> bool {
        self.buckets.read().values().all(HashMap::is_empty)
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .buckets
            .read()
            .get(bucket)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn set(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        if let Some(entries) = self.buckets.write().get_mut(bucket) {
            entries.remove(key);
        }
        Ok(())
    }
}

/// Typed access to the buckets of one provider.
///
/// Values are JSON encoded. Every failure, including codec failures, is
/// reported as [`Error::Cache`].
#[derive(Clone)]
pub(crate) struct ProviderCache {
    provider_id: String,
    store: Arc<dyn CacheStore>,
}

impl ProviderCache {
    pub(crate) fn new(provider_id: impl Into<String>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            provider_id: provider_id.into(),
            store,
        }
    }

    fn bucket(&self, purpose: &str) -> String {
        format!("{}/{}", self.provider_id, purpose)
    }

    fn get<T: DeserializeOwned>(&self, purpose: &str, key: &str) -> Result<Option<T>> {
        let bucket = self.bucket(purpose);
        let Some(raw) = self.store.get(&bucket, key).map_err(into_cache_error)? else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| Error::cache(format!("decoding {bucket}[{key}]: {e}")))
    }

    fn set<T: Serialize + ?Sized>(&self, purpose: &str, key: &str, value: &T) -> Result<()> {
        let bucket = self.bucket(purpose);
        let raw = serde_json::to_vec(value)
            .map_err(|e| Error::cache(format!("encoding {bucket}[{key}]: {e}")))?;
        self.store.set(&bucket, key, &raw).map_err(into_cache_error)
    }

    fn delete(&self, purpose: &str, key: &str) -> Result<()> {
        self.store
            .delete(&self.bucket(purpose), key)
            .map_err(into_cache_error)
    }

    pub(crate) fn query_ids(&self, query: &str) -> Result<Option<Vec<u64>>> {
        self.get(BUCKET_QUERY_TO_IDS, query)
    }

    pub(crate) fn set_query_ids(&self, query: &str, ids: &[u64]) -> Result<()> {
        self.set(BUCKET_QUERY_TO_IDS, query, ids)
    }

    pub(crate) fn title_id(&self, title: &str) -> Result<Option<u64>> {
        self.get(BUCKET_TITLE_TO_ID, title)
    }

    pub(crate) fn set_title_id(&self, title: &str, id: u64) -> Result<()> {
        self.set(BUCKET_TITLE_TO_ID, title, &id)
    }

    pub(crate) fn metadata(&self, id: u64) -> Result<Option<Metadata>> {
        self.get(BUCKET_ID_TO_MANGA, &id.to_string())
    }

    pub(crate) fn set_metadata(&self, id: u64, metadata: &Metadata) -> Result<()> {
        self.set(BUCKET_ID_TO_MANGA, &id.to_string(), metadata)
    }

    pub(crate) fn user(&self, name: &str) -> Result<Option<User>> {
        self.get(BUCKET_NAME_TO_USER, name)
    }

    pub(crate) fn set_user(&self, name: &str, user: &User) -> Result<()> {
        self.set(BUCKET_NAME_TO_USER, name, user)
    }

    pub(crate) fn delete_user(&self, name: &str) -> Result<()> {
        self.delete(BUCKET_NAME_TO_USER, name)
    }

    pub(crate) fn auth_data(&self, name: &str) -> Result<Option<AuthData>> {
        self.get(BUCKET_NAME_TO_ACCESS_DATA, name)
    }

    pub(crate) fn set_auth_data(&self, name: &str, auth: &AuthData) -> Result<()> {
        self.set(BUCKET_NAME_TO_ACCESS_DATA, name, auth)
    }

    pub(crate) fn delete_auth_data(&self, name: &str) -> Result<()> {
        self.delete(BUCKET_NAME_TO_ACCESS_DATA, name)
    }
}

// Store engines may report arbitrary error kinds; callers only ever see Cache.
fn into_cache_error(error: Error) -> Error {
    match error {
        Error::Cache(_) => error,
        other => Error::cache(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_are_isolated() {
        let store = Arc::new(MemoryStore::new());
        let anilist = ProviderCache::new("al", store.clone());
        let mal = ProviderCache::new("mal", store.clone());

        anilist.set_title_id("berserk", 7).unwrap();
        assert_eq!(anilist.title_id("berserk").unwrap(), Some(7));
        assert_eq!(mal.title_id("berserk").unwrap(), None);
        assert_eq!(store.len("al/title-to-id"), 1);
    }

    #[test]
    fn test_empty_ids_are_distinct_from_missing() {
        let cache = ProviderCache::new("al", Arc::new(MemoryStore::new()));
        assert_eq!(cache.query_ids("nothing").unwrap(), None);

        cache.set_query_ids("nothing", &[]).unwrap();
        assert_eq!(cache.query_ids("nothing").unwrap(), Some(vec![]));
    }

    #[test]
    fn test_corrupt_entry_is_cache_error() {
        let store = Arc::new(MemoryStore::new());
        store.set("al/id-to-manga", "7", b"not json").unwrap();

        let cache = ProviderCache::new("al", store);
        let err = cache.metadata(7).unwrap_err();
        assert!(err.is_cache());
    }

    #[test]
    fn test_delete_removes_entry() {
        let cache = ProviderCache::new("al", Arc::new(MemoryStore::new()));
        let auth = AuthData {
            access_token: "token".to_string(),
            ..Default::default()
        };
        cache.set_auth_data("guts", &auth).unwrap();
        assert_eq!(cache.auth_data("guts").unwrap(), Some(auth));

        cache.delete_auth_data("guts").unwrap();
        assert_eq!(cache.auth_data("guts").unwrap(), None);
    }
}
