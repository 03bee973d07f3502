//! Cache storage capability.

use std::collections::HashMap;

use async_trait::async_trait;
use http::header::HeaderName;
use http::HeaderValue;
use sw_core::{header_names, ApiResponse};
use tokio::sync::RwLock;

use crate::key::RequestKey;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The store refused the write (e.g. quota exceeded).
    #[error("quota exceeded writing to {0}")]
    QuotaExceeded(String),

    /// Failed to serialize or copy the response.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// A stored response.
///
/// Entries written through [`crate::CacheStoreManager`] always carry the
/// `x-sw-api-fetched-on` provenance header; entries without it are treated
/// as invalid on read.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    /// The stored response, headers included.
    pub response: ApiResponse,
}

impl CachedEntry {
    /// Wrap a response without stamping it.
    pub fn new(response: ApiResponse) -> Self {
        Self { response }
    }

    /// Copy `response` and stamp it with the fetch time.
    ///
    /// Any provenance header already present upstream is replaced.
    pub fn stamped(mut response: ApiResponse, fetched_on_millis: u64) -> Self {
        response.headers.insert(
            HeaderName::from_static(header_names::X_SW_API_FETCHED_ON),
            HeaderValue::from(fetched_on_millis),
        );
        Self { response }
    }

    /// Raw provenance header value, if present and valid UTF-8.
    pub fn fetched_on(&self) -> Option<&str> {
        self.response.header(header_names::X_SW_API_FETCHED_ON)
    }

    /// The response to hand back to the caller.
    pub fn into_response(self) -> ApiResponse {
        self.response
    }
}

/// Storage capability behind the cache.
///
/// Implementations provide atomic per-key writes; no multi-key transactions
/// are needed. In production this is the platform's cache storage; tests
/// and the CLI use [`MemoryCacheStore`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the bucket if it does not exist.
    async fn open(&self, bucket: &str) -> CacheResult<()>;

    /// Look up an entry in one bucket. A missing bucket is a miss.
    async fn read(&self, bucket: &str, key: &RequestKey) -> CacheResult<Option<CachedEntry>>;

    /// Store an entry, creating the bucket if needed. Replaces any existing entry.
    async fn write(&self, bucket: &str, key: RequestKey, entry: CachedEntry) -> CacheResult<()>;

    /// Names of all existing buckets.
    async fn enumerate(&self) -> CacheResult<Vec<String>>;

    /// Delete a bucket. Returns whether it existed.
    async fn delete(&self, bucket: &str) -> CacheResult<bool>;
}

/// In-memory cache store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    buckets: RwLock<HashMap<String, HashMap<RequestKey, CachedEntry>>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a bucket (`None` if the bucket does not exist).
    pub async fn entry_count(&self, bucket: &str) -> Option<usize> {
        self.buckets.read().await.get(bucket).map(HashMap::len)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, bucket: &str) -> CacheResult<()> {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default();
        Ok(())
    }

    async fn read(&self, bucket: &str, key: &RequestKey) -> CacheResult<Option<CachedEntry>> {
        let buckets = self.buckets.read().await;
        Ok(buckets.get(bucket).and_then(|b| b.get(key)).cloned())
    }

    async fn write(&self, bucket: &str, key: RequestKey, entry: CachedEntry) -> CacheResult<()> {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default()
            .insert(key, entry);
        Ok(())
    }

    async fn enumerate(&self) -> CacheResult<Vec<String>> {
        let mut names: Vec<String> = self.buckets.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, bucket: &str) -> CacheResult<bool> {
        Ok(self.buckets.write().await.remove(bucket).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RequestKey {
        RequestKey::new("GET", "https://api.test/api/model.json")
    }

    #[test]
    fn test_stamped_replaces_upstream_header() {
        let upstream = ApiResponse::ok("{}").with_header(
            HeaderName::from_static(header_names::X_SW_API_FETCHED_ON),
            HeaderValue::from_static("1"),
        );

        let entry = CachedEntry::stamped(upstream, 1_700_000_000_000);

        assert_eq!(entry.fetched_on(), Some("1700000000000"));
        assert_eq!(
            entry
                .response
                .headers
                .get_all(header_names::X_SW_API_FETCHED_ON)
                .iter()
                .count(),
            1
        );
    }

    #[test]
    fn test_unstamped_entry() {
        assert_eq!(CachedEntry::new(ApiResponse::ok("{}")).fetched_on(), None);
    }

    #[tokio::test]
    async fn test_read_missing_bucket_is_miss() {
        let store = MemoryCacheStore::new();

        assert_eq!(store.read("api-cache-1", &key()).await, Ok(None));
        assert!(store.enumerate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = MemoryCacheStore::new();
        let entry = CachedEntry::stamped(ApiResponse::ok("{}"), 5);

        store.write("api-cache-1", key(), entry.clone()).await.unwrap();

        assert_eq!(store.read("api-cache-1", &key()).await, Ok(Some(entry)));
        assert_eq!(store.read("api-cache-2", &key()).await, Ok(None));
        assert_eq!(store.entry_count("api-cache-1").await, Some(1));
    }

    #[tokio::test]
    async fn test_write_replaces_entry() {
        let store = MemoryCacheStore::new();

        store
            .write("api-cache-1", key(), CachedEntry::stamped(ApiResponse::ok("old"), 1))
            .await
            .unwrap();
        store
            .write("api-cache-1", key(), CachedEntry::stamped(ApiResponse::ok("new"), 2))
            .await
            .unwrap();

        let entry = store.read("api-cache-1", &key()).await.unwrap().unwrap();
        assert_eq!(entry.response.body.as_ref(), b"new");
        assert_eq!(store.entry_count("api-cache-1").await, Some(1));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryCacheStore::new();
        store.open("api-cache-1").await.unwrap();

        assert_eq!(store.delete("api-cache-1").await, Ok(true));
        assert_eq!(store.delete("api-cache-1").await, Ok(false));
        assert!(store.enumerate().await.unwrap().is_empty());
    }
}
