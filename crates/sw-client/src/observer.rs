//! Detection of newly waiting worker versions.

use std::collections::BTreeSet;

use sw_core::{Registration, RegistrationEvent, WorkerId, WorkerState};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Tracks installing workers and reports each one once it is waiting.
///
/// A worker already waiting when the observer is created is reported
/// first. Every later update is tracked from `UpdateFound` onwards, so
/// successive deployments are each reported exactly once.
#[derive(Debug, Default)]
pub struct WaitingWorkerObserver {
    tracked: BTreeSet<WorkerId>,
    reported: BTreeSet<WorkerId>,
    initial: Option<WorkerId>,
}

impl WaitingWorkerObserver {
    /// Snapshot `registration`.
    ///
    /// Subscribe to the registration before calling this so no transition
    /// falls between the snapshot and the first event.
    pub fn new(registration: &Registration) -> Self {
        let mut observer = Self::default();

        if let Some(installing) = registration.installing() {
            observer.tracked.insert(installing.id);
        }
        if let Some(waiting) = registration.waiting() {
            observer.reported.insert(waiting.id);
            observer.initial = Some(waiting.id);
        }
        observer
    }

    /// The worker that was already waiting at creation. Returned once.
    pub fn take_initial(&mut self) -> Option<WorkerId> {
        self.initial.take()
    }

    /// Feed one registration event. Returns a worker that just became waiting.
    pub fn observe(&mut self, event: &RegistrationEvent) -> Option<WorkerId> {
        match event {
            RegistrationEvent::UpdateFound { worker } => {
                self.tracked.insert(*worker);
                None
            }
            RegistrationEvent::StateChange {
                worker,
                state: WorkerState::Installed,
            } if self.tracked.remove(worker) => self.reported.insert(*worker).then_some(*worker),
            RegistrationEvent::StateChange {
                worker,
                state: WorkerState::Redundant,
            } => {
                self.tracked.remove(worker);
                None
            }
            _ => None,
        }
    }

    /// Workers currently being tracked through installation.
    pub fn tracked(&self) -> impl Iterator<Item = WorkerId> + '_ {
        self.tracked.iter().copied()
    }
}

/// Run `callback` for the waiting worker, now and after every update.
///
/// Listens until the returned task is aborted.
pub fn listen_for_waiting_worker<F>(registration: Registration, mut callback: F) -> JoinHandle<()>
where
    F: FnMut(&Registration, WorkerId) + Send + 'static,
{
    let mut events = registration.subscribe();
    let mut observer = WaitingWorkerObserver::new(&registration);

    tokio::spawn(async move {
        if let Some(worker) = observer.take_initial() {
            callback(&registration, worker);
        }

        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(worker) = observer.observe(&event) {
                        callback(&registration, worker);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "registration events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn drain(
        observer: &mut WaitingWorkerObserver,
        rx: &mut tokio::sync::broadcast::Receiver<RegistrationEvent>,
    ) -> Vec<WorkerId> {
        let mut found = Vec::new();
        while let Ok(event) = rx.try_recv() {
            found.extend(observer.observe(&event));
        }
        found
    }

    #[test]
    fn test_already_waiting_reported_immediately() {
        let reg = Registration::new("/");
        let id = reg.begin_update(1);
        reg.finish_install(id);

        let mut observer = WaitingWorkerObserver::new(&reg);

        assert_eq!(observer.take_initial(), Some(id));
        assert_eq!(observer.take_initial(), None);
    }

    #[test]
    fn test_installing_worker_reported_when_installed() {
        let reg = Registration::new("/");
        let id = reg.begin_update(1);
        let mut rx = reg.subscribe();
        let mut observer = WaitingWorkerObserver::new(&reg);
        assert_eq!(observer.take_initial(), None);

        reg.finish_install(id);

        assert_eq!(drain(&mut observer, &mut rx), vec![id]);
    }

    #[test]
    fn test_successive_updates_each_reported_once() {
        let reg = Registration::new("/");
        let mut rx = reg.subscribe();
        let mut observer = WaitingWorkerObserver::new(&reg);

        let first = reg.begin_update(1);
        reg.finish_install(first);
        let second = reg.begin_update(2);
        reg.finish_install(second);
        let third = reg.begin_update(3);
        reg.finish_install(third);

        assert_eq!(drain(&mut observer, &mut rx), vec![first, second, third]);
        assert_eq!(observer.tracked().count(), 0);
    }

    #[test]
    fn test_discarded_install_not_reported() {
        let reg = Registration::new("/");
        let mut rx = reg.subscribe();
        let mut observer = WaitingWorkerObserver::new(&reg);

        let abandoned = reg.begin_update(1);
        let replacement = reg.begin_update(2);
        assert!(!reg.finish_install(abandoned));
        reg.finish_install(replacement);

        assert_eq!(drain(&mut observer, &mut rx), vec![replacement]);
    }

    #[tokio::test]
    async fn test_listener_runs_callback() {
        let reg = Registration::new("/");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let handle = listen_for_waiting_worker(reg.clone(), move |_, worker| {
            sink.lock().unwrap().push(worker);
        });

        let first = reg.begin_update(1);
        reg.finish_install(first);
        let second = reg.begin_update(2);
        reg.finish_install(second);

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        handle.abort();
        assert_eq!(*seen.lock().unwrap(), vec![first, second]);
    }
}
