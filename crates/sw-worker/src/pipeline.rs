//! Cache-first fetch handling.

use std::sync::Arc;

use async_trait::async_trait;
use sw_cache::{
    CacheStatus, CacheStoreManager, Freshness, FreshnessEvaluator, RequestKey, WriteOutcome,
};
use sw_core::{ApiRequest, ApiResponse, Clock, ControlMessage};
use sw_net::Network;
use sw_observability::CacheMetrics;

use crate::classifier::InterceptSet;
use crate::error::WorkerResult;
use crate::event::{FetchEvent, FetchOutcome, Handler, WaitUntil};
use crate::scope::WorkerScope;

/// Client count below which a navigation may trigger promotion.
const PROMOTION_CLIENT_LIMIT: usize = 2;

/// Answers intercepted requests from the cache when fresh, otherwise from
/// the network, and writes network answers back in the background.
pub struct FetchPipeline {
    intercept: InterceptSet,
    cache: CacheStoreManager,
    freshness: FreshnessEvaluator,
    network: Arc<dyn Network>,
    scope: Arc<dyn WorkerScope>,
    clock: Arc<dyn Clock>,
    metrics: Arc<CacheMetrics>,
}

impl std::fmt::Debug for FetchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchPipeline")
            .field("intercept", &self.intercept)
            .field("cache", &self.cache)
            .field("freshness", &self.freshness)
            .finish_non_exhaustive()
    }
}

impl FetchPipeline {
    /// Create a pipeline.
    pub fn new(
        intercept: InterceptSet,
        cache: CacheStoreManager,
        freshness: FreshnessEvaluator,
        network: Arc<dyn Network>,
        scope: Arc<dyn WorkerScope>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            intercept,
            cache,
            freshness,
            network,
            scope,
            clock,
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    /// Record into shared metrics.
    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Metrics this pipeline records into.
    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Handle one request.
    pub async fn respond(
        &self,
        request: &ApiRequest,
        lifetime: &WaitUntil,
    ) -> WorkerResult<FetchOutcome> {
        if !self.intercept.is_cacheable(&request.url) {
            tracing::trace!(url = %request.url, "not intercepted");
            self.metrics.record(CacheStatus::Bypass);
            return Ok(FetchOutcome::Passthrough);
        }

        tracing::debug!(request_id = %request.request_id, url = %request.url, "intercepted request");

        if request.is_navigation_get() && self.should_promote().await {
            let signalled = self.scope.signal_waiting_worker(ControlMessage::SkipWaiting);
            tracing::info!(url = %request.url, signalled, "navigation with waiting worker; reloading");
            return Ok(self.answer(ApiResponse::refresh(), CacheStatus::Reload));
        }

        let key = RequestKey::from_request(request);
        let cached = match self.cache.read(&key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache read failed; treating as miss");
                None
            }
        };

        let status = match self.freshness.evaluate(cached.as_ref(), self.clock.now_millis()) {
            Freshness::Fresh { age_ms } => {
                if let Some(entry) = cached {
                    tracing::debug!(%key, age_ms, "serving fresh cached response");
                    return Ok(self.answer(entry.into_response(), CacheStatus::Hit));
                }
                CacheStatus::Miss
            }
            Freshness::Stale { age_ms } => {
                tracing::debug!(%key, age_ms, "cached response expired");
                CacheStatus::Stale
            }
            Freshness::Missing | Freshness::Unstamped => {
                tracing::debug!(%key, "no valid cached response");
                CacheStatus::Miss
            }
        };

        let response = match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%key, error = %e, "network request failed");
                self.metrics.record_network_error();
                return Err(e.into());
            }
        };
        tracing::debug!(%key, status = %response.status, "fetched from network");

        self.repopulate(key, response.clone(), lifetime);
        Ok(self.answer(response, status))
    }

    async fn should_promote(&self) -> bool {
        self.scope.has_waiting_worker()
            && self.scope.client_count().await < PROMOTION_CLIENT_LIMIT
    }

    fn answer(&self, response: ApiResponse, status: CacheStatus) -> FetchOutcome {
        self.metrics.record(status);
        FetchOutcome::Respond { response, status }
    }

    /// Write `response` to the cache after the caller has been answered.
    fn repopulate(&self, key: RequestKey, response: ApiResponse, lifetime: &WaitUntil) {
        let cache = self.cache.clone();
        let metrics = self.metrics.clone();
        let now = self.clock.now_millis();

        lifetime.wait_until(async move {
            match cache.write(key.clone(), response, now).await {
                Ok(WriteOutcome::Stored) => {
                    tracing::debug!(%key, fetched_on = now, "cached network response");
                    metrics.record_write_stored();
                }
                Ok(WriteOutcome::Skipped) => metrics.record_write_skipped(),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "failed to cache network response");
                    metrics.record_write_failure();
                }
            }
        });
    }
}

#[async_trait]
impl Handler<FetchEvent> for FetchPipeline {
    async fn handle(&self, event: &FetchEvent, lifetime: &WaitUntil) -> WorkerResult<FetchOutcome> {
        self.respond(&event.request, lifetime).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use http::{Method, StatusCode};
    use sw_cache::{CacheError, CacheResult, CacheStore, CachedEntry, MemoryCacheStore};
    use sw_core::{header_names, ManualClock};
    use sw_net::{FetchError, ScriptedNetwork};

    use crate::error::WorkerError;

    const URL: &str = "http://localhost:3000/api/model.json";
    const NOW: u64 = 1_700_000_000_000;
    const MINUTE: u64 = 60 * 1000;

    #[derive(Default)]
    struct FakeScope {
        waiting: bool,
        clients: usize,
        signalled: AtomicBool,
    }

    #[async_trait]
    impl WorkerScope for FakeScope {
        fn has_waiting_worker(&self) -> bool {
            self.waiting
        }

        async fn client_count(&self) -> usize {
            self.clients
        }

        fn signal_waiting_worker(&self, _message: ControlMessage) -> bool {
            self.signalled.store(true, Ordering::SeqCst);
            self.waiting
        }

        async fn skip_waiting(&self) {}
    }

    struct Fixture {
        store: Arc<MemoryCacheStore>,
        network: Arc<ScriptedNetwork>,
        clock: Arc<ManualClock>,
        scope: Arc<FakeScope>,
        pipeline: FetchPipeline,
    }

    fn fixture_with_scope(scope: FakeScope) -> Fixture {
        let store = Arc::new(MemoryCacheStore::new());
        let network = Arc::new(ScriptedNetwork::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let scope = Arc::new(scope);
        let pipeline = FetchPipeline::new(
            InterceptSet::default(),
            CacheStoreManager::new(store.clone(), 1),
            FreshnessEvaluator::default(),
            network.clone(),
            scope.clone(),
            clock.clone(),
        );
        Fixture {
            store,
            network,
            clock,
            scope,
            pipeline,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_scope(FakeScope::default())
    }

    async fn respond(fx: &Fixture, request: &ApiRequest) -> WorkerResult<FetchOutcome> {
        let lifetime = WaitUntil::new();
        let outcome = fx.pipeline.respond(request, &lifetime).await;
        lifetime.settle().await;
        outcome
    }

    #[tokio::test]
    async fn test_passthrough_skips_cache() {
        let fx = fixture();

        let outcome = respond(&fx, &ApiRequest::get("http://localhost:3000/static/app.js"))
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Passthrough);
        assert_eq!(fx.network.call_count(), 0);
        assert!(fx.store.enumerate().await.unwrap().is_empty());
        assert_eq!(fx.pipeline.metrics().snapshot().passthrough, 1);
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let fx = fixture();
        fx.network.respond(URL, ApiResponse::ok("{\"v\":1}"));

        let first = respond(&fx, &ApiRequest::get(URL)).await.unwrap();
        assert_eq!(first.status(), CacheStatus::Miss);

        fx.clock.advance(Duration::from_millis(30 * MINUTE));
        let second = respond(&fx, &ApiRequest::get(URL)).await.unwrap();

        assert_eq!(second.status(), CacheStatus::Hit);
        assert_eq!(second.response().unwrap().body.as_ref(), b"{\"v\":1}");
        assert_eq!(
            second.response().unwrap().header(header_names::X_SW_API_FETCHED_ON),
            Some("1700000000000")
        );
        assert_eq!(fx.network.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_refetched() {
        let fx = fixture();
        fx.network.respond(URL, ApiResponse::ok("old"));
        respond(&fx, &ApiRequest::get(URL)).await.unwrap();

        fx.network.respond(URL, ApiResponse::ok("new"));
        fx.clock.advance(Duration::from_millis(180 * MINUTE));
        let outcome = respond(&fx, &ApiRequest::get(URL)).await.unwrap();

        assert_eq!(outcome.status(), CacheStatus::Stale);
        assert_eq!(outcome.response().unwrap().body.as_ref(), b"new");

        let entry = fx
            .store
            .read("api-cache-1", &RequestKey::new("GET", URL))
            .await
            .unwrap()
            .unwrap();
        let expected = (NOW + 180 * MINUTE).to_string();
        assert_eq!(entry.fetched_on(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_non_200_returned_but_not_cached() {
        let fx = fixture();
        fx.network
            .respond(URL, ApiResponse::new(StatusCode::SERVICE_UNAVAILABLE, "busy"));

        let outcome = respond(&fx, &ApiRequest::get(URL)).await.unwrap();

        assert_eq!(
            outcome.response().unwrap().status,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert!(fx.store.enumerate().await.unwrap().is_empty());
        assert_eq!(fx.pipeline.metrics().snapshot().writes_skipped, 1);
    }

    #[tokio::test]
    async fn test_network_error_propagates() {
        let fx = fixture();
        fx.network
            .fail(URL, FetchError::Connection("offline".to_string()));

        let result = respond(&fx, &ApiRequest::get(URL)).await;

        assert_eq!(
            result,
            Err(WorkerError::Network(FetchError::Connection("offline".to_string())))
        );
        assert_eq!(fx.pipeline.metrics().snapshot().network_errors, 1);
    }

    #[tokio::test]
    async fn test_network_error_with_stale_cache_is_not_masked() {
        let fx = fixture();
        fx.store
            .write(
                "api-cache-1",
                RequestKey::new("GET", URL),
                CachedEntry::stamped(ApiResponse::ok("old"), NOW - 3 * 60 * MINUTE),
            )
            .await
            .unwrap();
        fx.network.fail(URL, FetchError::Timeout("slow".to_string()));

        assert!(respond(&fx, &ApiRequest::get(URL)).await.is_err());
    }

    #[tokio::test]
    async fn test_navigation_with_waiting_worker_reloads() {
        let fx = fixture_with_scope(FakeScope {
            waiting: true,
            clients: 1,
            ..Default::default()
        });

        let outcome = respond(&fx, &ApiRequest::navigate(URL)).await.unwrap();

        let response = outcome.response().unwrap();
        assert_eq!(outcome.status(), CacheStatus::Reload);
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.is_empty());
        assert_eq!(response.header(header_names::REFRESH), Some("0"));
        assert!(fx.scope.signalled.load(Ordering::SeqCst));
        assert_eq!(fx.network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_navigation_with_two_clients_not_promoted() {
        let fx = fixture_with_scope(FakeScope {
            waiting: true,
            clients: 2,
            ..Default::default()
        });
        fx.network.respond(URL, ApiResponse::ok("{}"));

        let outcome = respond(&fx, &ApiRequest::navigate(URL)).await.unwrap();

        assert_eq!(outcome.status(), CacheStatus::Miss);
        assert!(!fx.scope.signalled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_non_get_navigation_not_promoted() {
        let fx = fixture_with_scope(FakeScope {
            waiting: true,
            clients: 0,
            ..Default::default()
        });
        fx.network.respond(URL, ApiResponse::ok("{}"));

        let request = ApiRequest::new(Method::POST, URL).with_mode(sw_core::RequestMode::Navigate);
        let outcome = respond(&fx, &request).await.unwrap();

        assert_eq!(outcome.status(), CacheStatus::Miss);
        assert!(!fx.scope.signalled.load(Ordering::SeqCst));
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn open(&self, bucket: &str) -> CacheResult<()> {
            Err(CacheError::QuotaExceeded(bucket.to_string()))
        }

        async fn read(&self, _bucket: &str, _key: &RequestKey) -> CacheResult<Option<CachedEntry>> {
            Err(CacheError::Storage("unavailable".to_string()))
        }

        async fn write(&self, bucket: &str, _key: RequestKey, _entry: CachedEntry) -> CacheResult<()> {
            Err(CacheError::QuotaExceeded(bucket.to_string()))
        }

        async fn enumerate(&self) -> CacheResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn delete(&self, _bucket: &str) -> CacheResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_affect_response() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(URL, ApiResponse::ok("fresh"));
        let pipeline = FetchPipeline::new(
            InterceptSet::default(),
            CacheStoreManager::new(Arc::new(BrokenStore), 1),
            FreshnessEvaluator::default(),
            network,
            Arc::new(FakeScope::default()),
            Arc::new(ManualClock::new(NOW)),
        );

        let lifetime = WaitUntil::new();
        let outcome = pipeline.respond(&ApiRequest::get(URL), &lifetime).await.unwrap();
        lifetime.settle().await;

        assert_eq!(outcome.response().unwrap().body.as_ref(), b"fresh");
        assert_eq!(pipeline.metrics().snapshot().write_failures, 1);
    }
}
