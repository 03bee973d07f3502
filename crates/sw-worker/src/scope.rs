//! The worker's view of its platform.

use async_trait::async_trait;
use sw_core::{Clients, ControlMessage, MessageEvent, Registration, WorkerId};

/// Platform facilities available to a running worker.
#[async_trait]
pub trait WorkerScope: Send + Sync {
    /// Whether a newer worker is installed and waiting.
    fn has_waiting_worker(&self) -> bool;

    /// Number of open client contexts.
    async fn client_count(&self) -> usize;

    /// Post a control message to the waiting worker.
    ///
    /// Returns false if no worker is waiting.
    fn signal_waiting_worker(&self, message: ControlMessage) -> bool;

    /// Activate this worker if it is the one waiting.
    async fn skip_waiting(&self);
}

/// [`WorkerScope`] backed by a [`Registration`].
#[derive(Debug, Clone)]
pub struct RegistrationScope {
    registration: Registration,
    clients: Clients,
    worker: WorkerId,
    origin: String,
}

impl RegistrationScope {
    /// Create the scope of `worker`. Messages it posts carry `origin`.
    pub fn new(
        registration: Registration,
        clients: Clients,
        worker: WorkerId,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            registration,
            clients,
            worker,
            origin: origin.into(),
        }
    }

    /// The worker this scope belongs to.
    pub fn worker(&self) -> WorkerId {
        self.worker
    }
}

#[async_trait]
impl WorkerScope for RegistrationScope {
    fn has_waiting_worker(&self) -> bool {
        self.registration.waiting().is_some()
    }

    async fn client_count(&self) -> usize {
        self.clients.count()
    }

    fn signal_waiting_worker(&self, message: ControlMessage) -> bool {
        let Some(waiting) = self.registration.waiting() else {
            return false;
        };
        self.registration
            .post_message(waiting.id, MessageEvent::control(self.origin.as_str(), message))
    }

    async fn skip_waiting(&self) {
        match self.registration.waiting() {
            Some(waiting) if waiting.id == self.worker => {
                tracing::info!(worker = %self.worker, "skipping wait");
                self.registration.activate_waiting();
            }
            _ => tracing::debug!(worker = %self.worker, "skip waiting ignored; worker is not waiting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_core::{RegistrationEvent, WorkerState};

    fn waiting_registration() -> (Registration, WorkerId, WorkerId) {
        let reg = Registration::new("http://localhost:3000/");
        let active = reg.begin_update(1);
        reg.finish_install(active);
        reg.activate_waiting();
        reg.complete_activation(active);

        let waiting = reg.begin_update(2);
        reg.finish_install(waiting);
        (reg, active, waiting)
    }

    #[tokio::test]
    async fn test_signal_posts_to_waiting() {
        let (reg, active, waiting) = waiting_registration();
        let scope = RegistrationScope::new(reg.clone(), Clients::new(), active, "http://localhost:3000");
        let mut rx = reg.subscribe();

        assert!(scope.has_waiting_worker());
        assert!(scope.signal_waiting_worker(ControlMessage::SkipWaiting));

        match rx.try_recv().unwrap() {
            RegistrationEvent::Message { to, message } => {
                assert_eq!(to, waiting);
                assert_eq!(message.origin, "http://localhost:3000");
                assert_eq!(message.control_message(), Some(ControlMessage::SkipWaiting));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_skip_waiting_only_for_waiting_worker() {
        let (reg, active, waiting) = waiting_registration();

        RegistrationScope::new(reg.clone(), Clients::new(), active, "o")
            .skip_waiting()
            .await;
        assert_eq!(reg.waiting().map(|w| w.id), Some(waiting));

        RegistrationScope::new(reg.clone(), Clients::new(), waiting, "o")
            .skip_waiting()
            .await;
        let now_active = reg.active().unwrap();
        assert_eq!(now_active.id, waiting);
        assert_eq!(now_active.state, WorkerState::Activating);
        assert!(reg.waiting().is_none());
    }

    #[tokio::test]
    async fn test_client_count() {
        let (reg, active, _) = waiting_registration();
        let clients = Clients::new();
        let scope = RegistrationScope::new(reg, clients.clone(), active, "o");

        let a = clients.open();
        clients.open();
        assert_eq!(scope.client_count().await, 2);
        clients.close(a);
        assert_eq!(scope.client_count().await, 1);
    }
}
