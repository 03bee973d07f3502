//! In-process worker platform.
//!
//! [`WorkerHost`] plays the part of the hosting runtime: it installs new
//! versions, runs activate events to completion before a worker takes
//! control, delivers posted messages, and routes fetches to the
//! controlling worker. Registration events are processed by [`WorkerHost::pump`].

use std::collections::HashMap;
use std::sync::Arc;

use sw_core::{
    Clients, ConfigError, MessageEvent, Registration, RegistrationEvent, WorkerConfig, WorkerId,
    WorkerState,
};
use sw_observability::CacheMetrics;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::error::WorkerResult;
use crate::event::{
    ActivateEvent, Dispatched, FetchEvent, FetchOutcome, InstallEvent, WaitUntil, WorkerEvent,
};
use crate::scope::RegistrationScope;
use crate::worker::{ApiCacheWorker, WorkerServices};

/// Hosts the worker versions of one registration.
pub struct WorkerHost {
    origin: String,
    registration: Registration,
    clients: Clients,
    services: WorkerServices,
    workers: HashMap<WorkerId, Arc<ApiCacheWorker>>,
    events: broadcast::Receiver<RegistrationEvent>,
}

impl std::fmt::Debug for WorkerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHost")
            .field("origin", &self.origin)
            .field("registration", &self.registration)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl WorkerHost {
    /// Create a host for the site at `origin`.
    pub fn new(origin: impl Into<String>, services: WorkerServices) -> Self {
        let origin = origin.into();
        let registration = Registration::new(format!("{}/", origin.trim_end_matches('/')));
        let events = registration.subscribe();

        Self {
            origin,
            registration,
            clients: Clients::new(),
            services,
            workers: HashMap::new(),
            events,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.services.metrics
    }

    /// A live worker by ID.
    pub fn worker(&self, id: WorkerId) -> Option<&Arc<ApiCacheWorker>> {
        self.workers.get(&id)
    }

    /// The worker answering fetches, if any.
    pub fn controller(&self) -> Option<&Arc<ApiCacheWorker>> {
        let active = self.registration.active()?;
        if active.state != WorkerState::Activated {
            return None;
        }
        self.workers.get(&active.id)
    }

    /// Install a new worker version.
    ///
    /// The worker waits if another version is active; otherwise it is
    /// activated immediately. Versions must increase, since activation
    /// purges every other cache bucket. Returns the new worker's ID.
    pub async fn deploy(&mut self, config: WorkerConfig) -> WorkerResult<WorkerId> {
        config.validate()?;
        let current = [self.registration.active(), self.registration.waiting()]
            .into_iter()
            .flatten()
            .map(|w| w.version)
            .max();
        if let Some(current) = current.filter(|current| config.version <= *current) {
            return Err(ConfigError::StaleVersion {
                version: config.version,
                current,
            }
            .into());
        }

        let version = config.version;
        let id = self.registration.begin_update(version);
        let scope = RegistrationScope::new(
            self.registration.clone(),
            self.clients.clone(),
            id,
            self.origin.clone(),
        );
        let worker = Arc::new(ApiCacheWorker::new(config, Arc::new(scope), &self.services));
        self.workers.insert(id, worker.clone());

        worker
            .handle(WorkerEvent::Install(InstallEvent { worker: id, version }))
            .await
            .settle()
            .await;
        self.registration.finish_install(id);

        if self.registration.active().is_none() {
            self.registration.activate_waiting();
        }

        self.pump().await;
        Ok(id)
    }

    /// Route a fetch to the controlling worker.
    ///
    /// Without a controller the request is not intercepted. The returned
    /// value carries the response immediately; its lifetime covers any
    /// background cache write.
    pub async fn fetch(&self, event: FetchEvent) -> Dispatched<WorkerResult<FetchOutcome>> {
        match self.controller() {
            Some(worker) => worker.fetch(event).await,
            None => {
                tracing::debug!(url = %event.request.url, "no controlling worker");
                Dispatched::new(Ok(FetchOutcome::Passthrough), WaitUntil::new())
            }
        }
    }

    /// Process pending registration events until none are left.
    ///
    /// If events were dropped, an active worker left in `Activating` is
    /// activated from the registration state. Dropped messages are lost.
    /// Returns the number of events seen.
    pub async fn pump(&mut self) -> usize {
        let mut seen = 0;
        let mut lagged = false;
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "registration events dropped");
                    lagged = true;
                    continue;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            };
            seen += 1;

            match event {
                RegistrationEvent::StateChange {
                    worker,
                    state: WorkerState::Activating,
                } => self.activate(worker).await,
                RegistrationEvent::Message { to, message } => self.deliver(to, message).await,
                _ => {}
            }
        }

        if lagged {
            if let Some(active) = self.registration.active() {
                if active.state == WorkerState::Activating {
                    self.activate(active.id).await;
                }
            }
        }

        let registration = &self.registration;
        self.workers.retain(|id, _| registration.worker(*id).is_some());
        seen
    }

    async fn activate(&self, id: WorkerId) {
        let Some(worker) = self.workers.get(&id).cloned() else {
            return;
        };

        worker
            .handle(WorkerEvent::Activate(ActivateEvent {
                worker: id,
                version: worker.version(),
            }))
            .await
            .settle()
            .await;

        if self.registration.complete_activation(id) {
            tracing::info!(worker = %id, version = worker.version(), "worker now controls clients");
        }
    }

    async fn deliver(&self, to: WorkerId, message: MessageEvent) {
        match self.workers.get(&to).cloned() {
            Some(worker) => {
                worker
                    .handle(WorkerEvent::Message(message))
                    .await
                    .settle()
                    .await;
            }
            None => tracing::debug!(worker = %to, "message for unknown worker dropped"),
        }
    }
}
