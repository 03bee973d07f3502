//! Worker events and their dispatch.
//!
//! Each event shape has its own handler type and output. Handlers may
//! extend the event beyond their return by handing work to the event's
//! [`WaitUntil`]; the platform awaits that work before it considers the
//! event finished (install and activate), or lets it run alongside the
//! response (fetch).

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sw_cache::CacheStatus;
use sw_core::{ApiRequest, ApiResponse, ClientId, MessageEvent, WorkerId};
use tokio::task::JoinHandle;

use crate::error::WorkerResult;

/// Background work attached to an event.
#[derive(Debug, Clone, Default)]
pub struct WaitUntil {
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl WaitUntil {
    /// Create an empty lifetime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` in the background and keep the event alive until it ends.
    ///
    /// Must be called from within a tokio runtime.
    pub fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(work);
        self.tasks().push(handle);
    }

    /// Number of tasks not yet awaited by [`WaitUntil::settle`].
    pub fn pending(&self) -> usize {
        self.tasks().len()
    }

    /// Wait for all extended work, including work added while waiting.
    pub async fn settle(&self) {
        loop {
            let batch = std::mem::take(&mut *self.tasks());
            if batch.is_empty() {
                return;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "extended event work did not complete");
                }
            }
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The install event of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallEvent {
    pub worker: WorkerId,
    pub version: u32,
}

/// The activate event of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivateEvent {
    pub worker: WorkerId,
    pub version: u32,
}

/// A request issued by a controlled client.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    pub request: ApiRequest,
    /// The client that issued the request, if known.
    pub client: Option<ClientId>,
}

impl FetchEvent {
    /// Create a fetch event with no client attribution.
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            client: None,
        }
    }

    /// Attribute the request to a client.
    pub fn with_client(mut self, client: ClientId) -> Self {
        self.client = Some(client);
        self
    }
}

/// How a fetch event was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not intercepted; the platform performs the request itself.
    Passthrough,
    /// Answered by the worker.
    Respond {
        response: ApiResponse,
        status: CacheStatus,
    },
}

impl FetchOutcome {
    /// The worker's response, if it answered.
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Self::Passthrough => None,
            Self::Respond { response, .. } => Some(response),
        }
    }

    /// Cache status of the answer (`Bypass` for passthrough).
    pub fn status(&self) -> CacheStatus {
        match self {
            Self::Passthrough => CacheStatus::Bypass,
            Self::Respond { status, .. } => *status,
        }
    }
}

/// An event type the dispatcher knows how to route.
pub trait EventShape: Send + Sync + Sized + 'static {
    /// What a handler produces for this event.
    type Output: Send;

    /// Event name used in logs.
    const NAME: &'static str;

    /// The handler registered for this shape.
    fn handler(dispatcher: &EventDispatcher) -> Option<&Arc<dyn Handler<Self>>>;

    /// Output when no handler is registered.
    fn unhandled(&self) -> Self::Output;
}

/// Handler for one event shape.
#[async_trait]
pub trait Handler<E: EventShape>: Send + Sync {
    async fn handle(&self, event: &E, lifetime: &WaitUntil) -> E::Output;
}

impl EventShape for InstallEvent {
    type Output = ();
    const NAME: &'static str = "install";

    fn handler(dispatcher: &EventDispatcher) -> Option<&Arc<dyn Handler<Self>>> {
        dispatcher.install.as_ref()
    }

    fn unhandled(&self) -> Self::Output {}
}

impl EventShape for ActivateEvent {
    type Output = ();
    const NAME: &'static str = "activate";

    fn handler(dispatcher: &EventDispatcher) -> Option<&Arc<dyn Handler<Self>>> {
        dispatcher.activate.as_ref()
    }

    fn unhandled(&self) -> Self::Output {}
}

impl EventShape for FetchEvent {
    type Output = WorkerResult<FetchOutcome>;
    const NAME: &'static str = "fetch";

    fn handler(dispatcher: &EventDispatcher) -> Option<&Arc<dyn Handler<Self>>> {
        dispatcher.fetch.as_ref()
    }

    fn unhandled(&self) -> Self::Output {
        Ok(FetchOutcome::Passthrough)
    }
}

impl EventShape for MessageEvent {
    type Output = ();
    const NAME: &'static str = "message";

    fn handler(dispatcher: &EventDispatcher) -> Option<&Arc<dyn Handler<Self>>> {
        dispatcher.message.as_ref()
    }

    fn unhandled(&self) -> Self::Output {}
}

/// Any event a worker receives.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install(InstallEvent),
    Activate(ActivateEvent),
    Fetch(FetchEvent),
    Message(MessageEvent),
}

impl WorkerEvent {
    /// Event name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install(_) => InstallEvent::NAME,
            Self::Activate(_) => ActivateEvent::NAME,
            Self::Fetch(_) => FetchEvent::NAME,
            Self::Message(_) => MessageEvent::NAME,
        }
    }
}

/// Output of an untyped dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutput {
    /// Install, activate and message events produce nothing.
    Completed,
    Fetch(WorkerResult<FetchOutcome>),
}

/// The result of dispatching an event: the handler's output plus the
/// event's extended lifetime.
#[derive(Debug)]
#[must_use]
pub struct Dispatched<O> {
    pub outcome: O,
    lifetime: WaitUntil,
}

impl<O> Dispatched<O> {
    pub(crate) fn new(outcome: O, lifetime: WaitUntil) -> Self {
        Self { outcome, lifetime }
    }

    /// The event's extended lifetime.
    pub fn lifetime(&self) -> &WaitUntil {
        &self.lifetime
    }

    /// Split into the output and the lifetime.
    pub fn into_parts(self) -> (O, WaitUntil) {
        (self.outcome, self.lifetime)
    }

    /// Wait for extended work, then return the output.
    pub async fn settle(self) -> O {
        self.lifetime.settle().await;
        self.outcome
    }

    /// Transform the output, keeping the lifetime.
    pub fn map<T>(self, f: impl FnOnce(O) -> T) -> Dispatched<T> {
        Dispatched {
            outcome: f(self.outcome),
            lifetime: self.lifetime,
        }
    }
}

/// Routes events to at most one handler per event shape.
#[derive(Default)]
pub struct EventDispatcher {
    install: Option<Arc<dyn Handler<InstallEvent>>>,
    activate: Option<Arc<dyn Handler<ActivateEvent>>>,
    fetch: Option<Arc<dyn Handler<FetchEvent>>>,
    message: Option<Arc<dyn Handler<MessageEvent>>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("install", &self.install.is_some())
            .field("activate", &self.activate.is_some())
            .field("fetch", &self.fetch.is_some())
            .field("message", &self.message.is_some())
            .finish()
    }
}

impl EventDispatcher {
    /// Create a dispatcher with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the install handler, replacing any previous one.
    pub fn on_install(mut self, handler: impl Handler<InstallEvent> + 'static) -> Self {
        self.install = Some(Arc::new(handler));
        self
    }

    /// Register the activate handler, replacing any previous one.
    pub fn on_activate(mut self, handler: impl Handler<ActivateEvent> + 'static) -> Self {
        self.activate = Some(Arc::new(handler));
        self
    }

    /// Register the fetch handler, replacing any previous one.
    pub fn on_fetch(mut self, handler: impl Handler<FetchEvent> + 'static) -> Self {
        self.fetch = Some(Arc::new(handler));
        self
    }

    /// Register the message handler, replacing any previous one.
    pub fn on_message(mut self, handler: impl Handler<MessageEvent> + 'static) -> Self {
        self.message = Some(Arc::new(handler));
        self
    }

    /// Dispatch one event to its handler.
    pub async fn dispatch<E: EventShape>(&self, event: E) -> Dispatched<E::Output> {
        let lifetime = WaitUntil::new();
        let outcome = match E::handler(self) {
            Some(handler) => handler.handle(&event, &lifetime).await,
            None => {
                tracing::trace!(event = E::NAME, "no handler registered");
                event.unhandled()
            }
        };
        Dispatched::new(outcome, lifetime)
    }

    /// Dispatch an event of any shape.
    pub async fn dispatch_event(&self, event: WorkerEvent) -> Dispatched<EventOutput> {
        match event {
            WorkerEvent::Install(e) => self.dispatch(e).await.map(|()| EventOutput::Completed),
            WorkerEvent::Activate(e) => self.dispatch(e).await.map(|()| EventOutput::Completed),
            WorkerEvent::Fetch(e) => self.dispatch(e).await.map(EventOutput::Fetch),
            WorkerEvent::Message(e) => self.dispatch(e).await.map(|()| EventOutput::Completed),
        }
    }
}
