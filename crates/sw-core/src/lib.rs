//! Core abstractions for the API caching worker.
//!
//! This crate provides the fundamental types shared by the worker and the
//! page-side coordinator:
//! - `ApiRequest` / `ApiResponse` - Values flowing through fetch interception
//! - `ControlMessage` / `MessageEvent` - Cross-context control channel
//! - `WorkerConfig` - Immutable worker configuration
//! - `Registration` - Platform model of worker versions and their states
//! - `Clock` - Time source for provenance stamps

mod clock;
mod config;
mod context;
mod lifecycle;
mod message;

pub use clock::*;
pub use config::*;
pub use context::*;
pub use lifecycle::*;
pub use message::*;
