//! A deployed worker version.

use std::sync::Arc;

use sw_cache::{CacheStore, CacheStoreManager, FreshnessEvaluator};
use sw_core::{Clock, SystemClock, WorkerConfig};
use sw_net::Network;
use sw_observability::CacheMetrics;
use sw_security::OriginAllowlist;

use crate::classifier::InterceptSet;
use crate::error::WorkerResult;
use crate::event::{Dispatched, EventDispatcher, EventOutput, FetchEvent, FetchOutcome, WorkerEvent};
use crate::lifecycle::{ActivateHandler, InstallHandler};
use crate::pipeline::FetchPipeline;
use crate::promotion::PromotionHandler;
use crate::scope::WorkerScope;

/// Platform capabilities shared by every worker version.
#[derive(Clone)]
pub struct WorkerServices {
    pub store: Arc<dyn CacheStore>,
    pub network: Arc<dyn Network>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<CacheMetrics>,
}

impl WorkerServices {
    /// Services using the system clock and fresh metrics.
    pub fn new(store: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> Self {
        Self {
            store,
            network,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    /// Use a different clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Record into shared metrics.
    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

impl std::fmt::Debug for WorkerServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerServices")
            .field("clock", &self.clock)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

/// One worker version with its handlers wired up.
#[derive(Debug)]
pub struct ApiCacheWorker {
    config: WorkerConfig,
    cache: CacheStoreManager,
    dispatcher: EventDispatcher,
}

impl ApiCacheWorker {
    /// Build the worker for `config`.
    pub fn new(config: WorkerConfig, scope: Arc<dyn WorkerScope>, services: &WorkerServices) -> Self {
        let cache = CacheStoreManager::new(services.store.clone(), config.version);
        let allowlist: OriginAllowlist = config.allowed_origins.iter().cloned().collect();

        let pipeline = FetchPipeline::new(
            InterceptSet::from_config(&config),
            cache.clone(),
            FreshnessEvaluator::new(config.ttl()),
            services.network.clone(),
            scope.clone(),
            services.clock.clone(),
        )
        .with_metrics(services.metrics.clone());

        let dispatcher = EventDispatcher::new()
            .on_install(InstallHandler)
            .on_activate(ActivateHandler::new(cache.clone(), services.metrics.clone()))
            .on_fetch(pipeline)
            .on_message(PromotionHandler::new(allowlist, scope));

        Self {
            config,
            cache,
            dispatcher,
        }
    }

    /// Deployment version.
    pub fn version(&self) -> u32 {
        self.config.version
    }

    /// Configuration the worker was built from.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// The cache bucket this worker owns.
    pub fn bucket(&self) -> &str {
        self.cache.bucket()
    }

    /// Deliver any event.
    pub async fn handle(&self, event: WorkerEvent) -> Dispatched<EventOutput> {
        tracing::trace!(event = event.name(), version = self.config.version, "dispatching event");
        self.dispatcher.dispatch_event(event).await
    }

    /// Deliver a fetch.
    pub async fn fetch(&self, event: FetchEvent) -> Dispatched<WorkerResult<FetchOutcome>> {
        self.dispatcher.dispatch(event).await
    }
}
