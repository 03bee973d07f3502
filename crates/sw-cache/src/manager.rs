//! Owner of the current versioned cache bucket.

use std::sync::Arc;

use futures::future::try_join_all;
use sw_core::ApiResponse;

use crate::key::{bucket_name, RequestKey};
use crate::store::{CacheResult, CacheStore, CachedEntry};

/// Handle to an opened bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketHandle {
    name: String,
}

impl BucketHandle {
    /// Bucket name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Result of a cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The response was stamped and stored.
    Stored,
    /// The response status was not exactly 200; nothing was written.
    Skipped,
}

/// Exclusive owner of the bucket for one deployment version.
///
/// No other component writes cache entries directly.
#[derive(Clone)]
pub struct CacheStoreManager {
    store: Arc<dyn CacheStore>,
    bucket: String,
}

impl std::fmt::Debug for CacheStoreManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStoreManager")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl CacheStoreManager {
    /// Create a manager for `version`'s bucket.
    pub fn new(store: Arc<dyn CacheStore>, version: u32) -> Self {
        Self {
            store,
            bucket: bucket_name(version),
        }
    }

    /// Name of the current bucket.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Open (creating if necessary) the current bucket. Idempotent.
    pub async fn open(&self) -> CacheResult<BucketHandle> {
        self.store.open(&self.bucket).await?;
        Ok(BucketHandle {
            name: self.bucket.clone(),
        })
    }

    /// Look up `key` in the current bucket only.
    pub async fn read(&self, key: &RequestKey) -> CacheResult<Option<CachedEntry>> {
        self.store.read(&self.bucket, key).await
    }

    /// Store a provenance-stamped copy of `response` if its status is exactly 200.
    pub async fn write(
        &self,
        key: RequestKey,
        response: ApiResponse,
        now_millis: u64,
    ) -> CacheResult<WriteOutcome> {
        if !response.is_ok() {
            tracing::debug!(%key, status = %response.status, "not caching non-200 response");
            return Ok(WriteOutcome::Skipped);
        }

        self.open().await?;
        let entry = CachedEntry::stamped(response, now_millis);
        self.store.write(&self.bucket, key, entry).await?;
        Ok(WriteOutcome::Stored)
    }

    /// Delete every bucket except the current one.
    ///
    /// Deletions run concurrently. Returns the names that were removed.
    pub async fn purge_stale_versions(&self) -> CacheResult<Vec<String>> {
        let stale: Vec<String> = self
            .store
            .enumerate()
            .await?
            .into_iter()
            .filter(|name| *name != self.bucket)
            .collect();

        let deleted = try_join_all(stale.iter().map(|name| self.store.delete(name))).await?;

        let removed: Vec<String> = stale
            .into_iter()
            .zip(deleted)
            .filter_map(|(name, existed)| existed.then_some(name))
            .collect();

        if !removed.is_empty() {
            tracing::info!(current = %self.bucket, removed = ?removed, "purged stale cache buckets");
        }
        Ok(removed)
    }
}
