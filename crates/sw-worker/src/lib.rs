//! The API caching worker.
//!
//! This crate provides:
//! - `EventDispatcher` / `Handler` - Typed dispatch of install, activate, fetch and message events
//! - `WaitUntil` - Extends an event's lifetime over background work
//! - `InterceptSet` - Decides which requests are cached
//! - `FetchPipeline` - Cache-first fetch handling with network fallback
//! - `PromotionHandler` - Honors `skipWaiting` from allowlisted origins
//! - `ApiCacheWorker` - One deployed worker version
//! - `WorkerHost` - In-process platform that installs, activates and feeds workers

mod classifier;
mod error;
mod event;
mod host;
mod lifecycle;
mod pipeline;
mod promotion;
mod scope;
mod worker;

pub use classifier::*;
pub use error::*;
pub use event::*;
pub use host::*;
pub use lifecycle::*;
pub use pipeline::*;
pub use promotion::*;
pub use scope::*;
pub use worker::*;
