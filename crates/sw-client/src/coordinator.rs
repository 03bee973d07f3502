//! Page-side handling of version handover.

use std::sync::Arc;

use sw_core::{
    ControlMessage, MessageEvent, Registration, RegistrationEvent, WeakRegistration, WorkerId,
};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::observer::WaitingWorkerObserver;

/// Reloads the page.
pub trait PageReloader: Send + Sync {
    fn reload(&self);
}

/// What the coordinator did in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorAction {
    /// Asked a waiting worker to activate.
    Promoted { worker: WorkerId },
    /// Reloaded the page after the controller changed.
    Reloaded { worker: WorkerId },
}

/// Promotes every waiting worker and reloads the page once per controller change.
///
/// Holds the registration weakly; once the worker side drops it the
/// event stream closes and [`ClientCoordinator::run`] returns.
pub struct ClientCoordinator {
    registration: WeakRegistration,
    origin: String,
    reloader: Arc<dyn PageReloader>,
    observer: WaitingWorkerObserver,
    events: broadcast::Receiver<RegistrationEvent>,
}

impl std::fmt::Debug for ClientCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCoordinator")
            .field("scope", &self.registration.scope())
            .field("origin", &self.origin)
            .field("observer", &self.observer)
            .finish_non_exhaustive()
    }
}

impl ClientCoordinator {
    /// Coordinate `registration` for a page at `origin`.
    pub fn new(
        registration: Registration,
        origin: impl Into<String>,
        reloader: Arc<dyn PageReloader>,
    ) -> Self {
        let events = registration.subscribe();
        let observer = WaitingWorkerObserver::new(&registration);
        tracing::info!(scope = %registration.scope(), "worker registration ready");

        Self {
            registration: registration.downgrade(),
            origin: origin.into(),
            reloader,
            observer,
            events,
        }
    }

    /// Post `skipWaiting` to the worker currently waiting, if any.
    pub fn promote_waiting(&self) -> Option<WorkerId> {
        let waiting = self.registration.upgrade()?.waiting()?;
        self.promote(waiting.id).then_some(waiting.id)
    }

    fn promote(&self, worker: WorkerId) -> bool {
        let Some(registration) = self.registration.upgrade() else {
            return false;
        };
        tracing::info!(%worker, "new version available");
        let posted = registration.post_message(
            worker,
            MessageEvent::control(self.origin.as_str(), ControlMessage::SkipWaiting),
        );
        if posted {
            tracing::info!(%worker, "new version activation requested");
        }
        posted
    }

    /// Handle a worker that was waiting before the coordinator started.
    pub fn start(&mut self) -> Option<CoordinatorAction> {
        let worker = self.observer.take_initial()?;
        self.promote(worker)
            .then_some(CoordinatorAction::Promoted { worker })
    }

    /// React to one registration event.
    pub fn handle_event(&mut self, event: &RegistrationEvent) -> Option<CoordinatorAction> {
        if let RegistrationEvent::ControllerChange { worker } = event {
            tracing::info!(worker = %worker, "controller changed; reloading page");
            self.reloader.reload();
            return Some(CoordinatorAction::Reloaded { worker: *worker });
        }

        let worker = self.observer.observe(event)?;
        self.promote(worker)
            .then_some(CoordinatorAction::Promoted { worker })
    }

    /// Handle every event already delivered, without waiting.
    pub fn poll(&mut self) -> Vec<CoordinatorAction> {
        let mut actions = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => actions.extend(self.handle_event(&event)),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "registration events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return actions,
            }
        }
    }

    /// Run until every other handle to the registration is dropped.
    pub async fn run(mut self) {
        self.start();
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    self.handle_event(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "registration events dropped");
                }
                Err(RecvError::Closed) => return,
            }
        }
    }
}
