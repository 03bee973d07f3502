//! Worker lifecycle as owned by the hosting platform.
//!
//! A [`Registration`] tracks up to three worker versions (installing,
//! waiting, active) and broadcasts every transition. Both halves of the
//! system observe it: the worker asks whether a newer version is waiting,
//! and the page-side coordinator reacts to versions reaching "installed".

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::message::MessageEvent;

const EVENT_CAPACITY: usize = 64;

/// Unique identifier for a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(u64);

impl WorkerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of the ID.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sw-{}", self.0)
    }
}

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Install event running.
    Installing,
    /// Installed; waiting for the previous version to let go.
    Installed,
    /// Activate event running.
    Activating,
    /// Active and controlling clients.
    Activated,
    /// Replaced or discarded.
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

/// Snapshot of one worker in a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerInfo {
    /// Worker ID.
    pub id: WorkerId,
    /// Deployment version the worker was built from.
    pub version: u32,
    /// Current state.
    pub state: WorkerState,
}

/// Events broadcast by a registration.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationEvent {
    /// A new worker started installing.
    UpdateFound { worker: WorkerId },
    /// A worker changed state.
    StateChange { worker: WorkerId, state: WorkerState },
    /// The worker controlling clients changed.
    ControllerChange { worker: WorkerId },
    /// A message was posted to a worker.
    Message { to: WorkerId, message: MessageEvent },
}

#[derive(Debug, Default)]
struct Slots {
    installing: Option<WorkerInfo>,
    waiting: Option<WorkerInfo>,
    active: Option<WorkerInfo>,
}

/// A worker registration for one scope.
///
/// Cloning yields another handle to the same registration.
#[derive(Debug, Clone)]
pub struct Registration {
    scope: Arc<str>,
    slots: Arc<Mutex<Slots>>,
    events: Arc<broadcast::Sender<RegistrationEvent>>,
}

impl Registration {
    /// Create an empty registration.
    pub fn new(scope: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            scope: Arc::from(scope.into()),
            slots: Arc::new(Mutex::new(Slots::default())),
            events: Arc::new(events),
        }
    }

    /// A handle that does not keep the registration alive.
    ///
    /// Subscribers see the event stream close once every strong handle
    /// has been dropped.
    pub fn downgrade(&self) -> WeakRegistration {
        WeakRegistration {
            scope: self.scope.clone(),
            slots: Arc::downgrade(&self.slots),
            events: Arc::downgrade(&self.events),
        }
    }

    /// Registration scope URL.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.events.subscribe()
    }

    /// The installing worker, if any.
    pub fn installing(&self) -> Option<WorkerInfo> {
        self.slots().installing
    }

    /// The installed worker waiting to activate, if any.
    pub fn waiting(&self) -> Option<WorkerInfo> {
        self.slots().waiting
    }

    /// The active (or activating) worker, if any.
    pub fn active(&self) -> Option<WorkerInfo> {
        self.slots().active
    }

    /// Look up a worker by ID in any slot.
    pub fn worker(&self, id: WorkerId) -> Option<WorkerInfo> {
        let slots = self.slots();
        [slots.installing, slots.waiting, slots.active]
            .into_iter()
            .flatten()
            .find(|w| w.id == id)
    }

    /// Start installing a new version.
    ///
    /// An installation already in progress is discarded.
    pub fn begin_update(&self, version: u32) -> WorkerId {
        let worker = WorkerInfo {
            id: WorkerId::next(),
            version,
            state: WorkerState::Installing,
        };

        let replaced = self.slots().installing.replace(worker);
        if let Some(old) = replaced {
            self.emit_state(old.id, WorkerState::Redundant);
        }

        tracing::debug!(scope = %self.scope, worker = %worker.id, version, "update found");
        self.emit(RegistrationEvent::UpdateFound { worker: worker.id });
        worker.id
    }

    /// Finish installing `id`, moving it into the waiting slot.
    ///
    /// Returns false if `id` is not the installing worker.
    pub fn finish_install(&self, id: WorkerId) -> bool {
        let replaced = {
            let mut slots = self.slots();
            let mut worker = match slots.installing {
                Some(w) if w.id == id => w,
                _ => return false,
            };
            slots.installing = None;
            worker.state = WorkerState::Installed;
            slots.waiting.replace(worker)
        };

        if let Some(old) = replaced {
            self.emit_state(old.id, WorkerState::Redundant);
        }
        self.emit_state(id, WorkerState::Installed);
        true
    }

    /// Begin activating the waiting worker.
    ///
    /// The previous active worker becomes redundant. The new worker stays
    /// in `Activating` until [`Registration::complete_activation`] is called,
    /// which the host does once the activate event has settled.
    pub fn activate_waiting(&self) -> Option<WorkerId> {
        let (worker, previous) = {
            let mut slots = self.slots();
            let mut worker = slots.waiting.take()?;
            worker.state = WorkerState::Activating;
            (worker, slots.active.replace(worker))
        };

        if let Some(old) = previous {
            self.emit_state(old.id, WorkerState::Redundant);
        }
        self.emit_state(worker.id, WorkerState::Activating);
        Some(worker.id)
    }

    /// Mark an activating worker as activated and make it the controller.
    pub fn complete_activation(&self, id: WorkerId) -> bool {
        {
            let mut slots = self.slots();
            match slots.active.as_mut() {
                Some(w) if w.id == id && w.state == WorkerState::Activating => {
                    w.state = WorkerState::Activated;
                }
                _ => return false,
            }
        }

        self.emit_state(id, WorkerState::Activated);
        self.emit(RegistrationEvent::ControllerChange { worker: id });
        true
    }

    /// Post a message to a worker of this registration.
    ///
    /// Returns false if no such worker exists.
    pub fn post_message(&self, to: WorkerId, message: MessageEvent) -> bool {
        if self.worker(to).is_none() {
            return false;
        }
        self.emit(RegistrationEvent::Message { to, message });
        true
    }

    fn emit_state(&self, worker: WorkerId, state: WorkerState) {
        tracing::debug!(scope = %self.scope, %worker, %state, "worker state change");
        self.emit(RegistrationEvent::StateChange { worker, state });
    }

    fn emit(&self, event: RegistrationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Non-owning handle to a [`Registration`].
#[derive(Debug, Clone)]
pub struct WeakRegistration {
    scope: Arc<str>,
    slots: Weak<Mutex<Slots>>,
    events: Weak<broadcast::Sender<RegistrationEvent>>,
}

impl WeakRegistration {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The registration, unless every strong handle is gone.
    pub fn upgrade(&self) -> Option<Registration> {
        Some(Registration {
            scope: self.scope.clone(),
            slots: self.slots.upgrade()?,
            events: self.events.upgrade()?,
        })
    }
}

/// Identifier for an open client context (tab, window).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// The set of client contexts currently open in a scope.
#[derive(Debug, Clone, Default)]
pub struct Clients {
    open: Arc<Mutex<BTreeSet<ClientId>>>,
}

impl Clients {
    /// Create an empty client set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened client.
    pub fn open(&self) -> ClientId {
        static COUNTER: AtomicU64 = AtomicU64::new(1);

        let id = ClientId(COUNTER.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id);
        id
    }

    /// Record a closed client.
    pub fn close(&self, id: ClientId) -> bool {
        self.lock().remove(&id)
    }

    /// Number of open clients.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<ClientId>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn drain(rx: &mut broadcast::Receiver<RegistrationEvent>) -> Vec<RegistrationEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
        events
    }

    #[test]
    fn test_install_moves_to_waiting() {
        let reg = Registration::new("http://localhost:3000/");
        let mut rx = reg.subscribe();

        let id = reg.begin_update(1);
        assert_eq!(reg.installing().map(|w| w.id), Some(id));
        assert!(reg.waiting().is_none());

        assert!(reg.finish_install(id));
        assert!(reg.installing().is_none());
        assert_eq!(reg.waiting().map(|w| w.state), Some(WorkerState::Installed));

        assert_eq!(
            drain(&mut rx),
            vec![
                RegistrationEvent::UpdateFound { worker: id },
                RegistrationEvent::StateChange { worker: id, state: WorkerState::Installed },
            ]
        );
    }

    #[test]
    fn test_finish_install_rejects_unknown_worker() {
        let reg = Registration::new("/");
        let id = reg.begin_update(1);
        let other = reg.begin_update(2);

        assert!(!reg.finish_install(id));
        assert!(reg.finish_install(other));
    }

    #[test]
    fn test_full_activation() {
        let reg = Registration::new("/");
        let v1 = reg.begin_update(1);
        reg.finish_install(v1);
        assert_eq!(reg.activate_waiting(), Some(v1));
        assert!(reg.complete_activation(v1));

        let v2 = reg.begin_update(2);
        reg.finish_install(v2);
        let mut rx = reg.subscribe();

        assert_eq!(reg.activate_waiting(), Some(v2));
        assert_eq!(reg.active().map(|w| w.state), Some(WorkerState::Activating));
        assert!(reg.complete_activation(v2));
        assert_eq!(reg.active().map(|w| (w.id, w.version)), Some((v2, 2)));

        assert_eq!(
            drain(&mut rx),
            vec![
                RegistrationEvent::StateChange { worker: v1, state: WorkerState::Redundant },
                RegistrationEvent::StateChange { worker: v2, state: WorkerState::Activating },
                RegistrationEvent::StateChange { worker: v2, state: WorkerState::Activated },
                RegistrationEvent::ControllerChange { worker: v2 },
            ]
        );
    }

    #[test]
    fn test_activate_without_waiting() {
        let reg = Registration::new("/");
        assert_eq!(reg.activate_waiting(), None);
    }

    #[test]
    fn test_post_message_requires_known_worker() {
        let reg = Registration::new("/");
        let id = reg.begin_update(1);
        let msg = MessageEvent::new("http://localhost:3000", serde_json::json!("hi"));

        assert!(reg.post_message(id, msg.clone()));
        assert!(!reg.post_message(WorkerId(u64::MAX), msg));
    }

    #[test]
    fn test_weak_handle_closes_events() {
        let reg = Registration::new("/");
        let weak = reg.downgrade();
        let mut rx = reg.subscribe();

        let id = weak.upgrade().unwrap().begin_update(1);
        assert_eq!(reg.installing().map(|w| w.id), Some(id));

        drop(reg);
        assert!(weak.upgrade().is_none());
        assert_eq!(weak.scope(), "/");
        assert!(matches!(rx.try_recv(), Ok(RegistrationEvent::UpdateFound { .. })));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
    }

    #[test]
    fn test_clients() {
        let clients = Clients::new();
        let a = clients.open();
        let b = clients.open();
        assert_eq!(clients.count(), 2);

        assert!(clients.close(a));
        assert!(!clients.close(a));
        assert_eq!(clients.count(), 1);

        clients.close(b);
        assert_eq!(clients.count(), 0);
    }
}
