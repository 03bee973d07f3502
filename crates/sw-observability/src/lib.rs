//! Observability for the API caching worker.
//!
//! This crate provides:
//! - `LogConfig` / `init` - tracing subscriber setup (JSON or human output)
//! - `CacheMetrics` - Shared counters for cache decisions and writes
//! - `MetricsSnapshot` - Serializable point-in-time view of the counters

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;
