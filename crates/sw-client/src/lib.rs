//! Page-side lifecycle coordination.
//!
//! This crate provides:
//! - `WaitingWorkerObserver` - Reports each worker version that reaches "installed"
//! - `listen_for_waiting_worker` - Runs a callback for every waiting worker
//! - `ClientCoordinator` - Promotes waiting workers and reloads on controller change
//! - `PageReloader` - The page's reload capability

mod coordinator;
mod observer;

pub use coordinator::*;
pub use observer::*;
