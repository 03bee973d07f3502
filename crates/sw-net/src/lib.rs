//! Network capability used by the caching worker.
//!
//! This crate provides:
//! - `Network` - Outbound fetch performed when the cache cannot answer
//! - `FetchError` - Failures propagated to the caller unchanged
//! - `ScriptedNetwork` - Deterministic network for tests and simulations

mod client;
mod scripted;

pub use client::*;
pub use scripted::*;
