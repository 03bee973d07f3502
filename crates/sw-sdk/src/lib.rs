//! Public SDK for the API caching worker.
//!
//! This crate re-exports the worker and its page-side coordinator:
//!
//! ```ignore
//! use sw_sdk::prelude::*;
//!
//! let services = WorkerServices::new(Arc::new(MemoryCacheStore::new()), network);
//! let mut host = WorkerHost::new("http://localhost:3000", services);
//! host.deploy(WorkerConfig::new(1)).await?;
//!
//! let mut coordinator = ClientCoordinator::new(
//!     host.registration().clone(),
//!     "http://localhost:3000",
//!     reloader,
//! );
//! coordinator.start();
//!
//! let outcome = host
//!     .fetch(FetchEvent::new(ApiRequest::get("http://localhost:3000/api/model.json")))
//!     .await
//!     .settle()
//!     .await?;
//! ```

pub use sw_cache;
pub use sw_client;
pub use sw_core;
pub use sw_net;
pub use sw_observability;
pub use sw_security;
pub use sw_worker;

/// Prelude for convenient imports.
pub mod prelude {
    pub use sw_cache::*;
    pub use sw_client::*;
    pub use sw_core::*;
    pub use sw_net::*;
    pub use sw_observability::*;
    pub use sw_security::*;
    pub use sw_worker::*;
}
