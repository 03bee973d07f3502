//! Install and activate handlers.

use std::sync::Arc;

use async_trait::async_trait;
use sw_cache::CacheStoreManager;
use sw_observability::CacheMetrics;

use crate::event::{ActivateEvent, Handler, InstallEvent, WaitUntil};

/// Logs the version being installed.
#[derive(Debug, Default)]
pub struct InstallHandler;

#[async_trait]
impl Handler<InstallEvent> for InstallHandler {
    async fn handle(&self, event: &InstallEvent, _lifetime: &WaitUntil) {
        tracing::info!(worker = %event.worker, version = event.version, "version installed");
    }
}

/// Deletes every cache bucket but the current one before the worker goes live.
#[derive(Debug)]
pub struct ActivateHandler {
    cache: CacheStoreManager,
    metrics: Arc<CacheMetrics>,
}

impl ActivateHandler {
    pub fn new(cache: CacheStoreManager, metrics: Arc<CacheMetrics>) -> Self {
        Self { cache, metrics }
    }
}

#[async_trait]
impl Handler<ActivateEvent> for ActivateHandler {
    async fn handle(&self, event: &ActivateEvent, lifetime: &WaitUntil) {
        tracing::info!(worker = %event.worker, version = event.version, "version activated");

        let cache = self.cache.clone();
        let metrics = self.metrics.clone();
        lifetime.wait_until(async move {
            match cache.purge_stale_versions().await {
                Ok(removed) => metrics.record_buckets_purged(removed.len()),
                Err(e) => {
                    tracing::warn!(current = %cache.bucket(), error = %e, "failed to purge stale buckets")
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_cache::{CacheStore, MemoryCacheStore};
    use sw_core::Registration;

    #[tokio::test]
    async fn test_activate_purges_after_settle() {
        let store = Arc::new(MemoryCacheStore::new());
        store.open("api-cache-1").await.unwrap();
        store.open("api-cache-2").await.unwrap();
        let metrics = Arc::new(CacheMetrics::new());
        let handler = ActivateHandler::new(CacheStoreManager::new(store.clone(), 2), metrics.clone());

        let worker = Registration::new("/").begin_update(2);
        let lifetime = WaitUntil::new();
        handler
            .handle(&ActivateEvent { worker, version: 2 }, &lifetime)
            .await;
        assert_eq!(lifetime.pending(), 1);

        lifetime.settle().await;
        assert_eq!(store.enumerate().await.unwrap(), vec!["api-cache-2"]);
        assert_eq!(metrics.snapshot().buckets_purged, 1);
    }
}
