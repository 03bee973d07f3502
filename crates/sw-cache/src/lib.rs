//! Versioned API response cache for the caching worker.
//!
//! This crate provides:
//! - `CacheStore` - Storage capability (open/read/write/enumerate/delete)
//! - `MemoryCacheStore` - In-process store for tests and simulations
//! - `CacheStoreManager` - Owns the current versioned bucket
//! - `FreshnessEvaluator` - Provenance-stamp based validity check
//! - `RequestKey` - Normalized request identity
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sw_cache::{CacheStoreManager, FreshnessEvaluator, MemoryCacheStore, RequestKey};
//!
//! let manager = CacheStoreManager::new(Arc::new(MemoryCacheStore::new()), 2);
//! manager.open().await?;
//!
//! let key = RequestKey::new("GET", "https://api.test/api/model.json");
//! manager.write(key.clone(), response, clock.now_millis()).await?;
//!
//! let entry = manager.read(&key).await?;
//! let fresh = FreshnessEvaluator::default().is_valid(entry.as_ref(), clock.now_millis());
//! ```

mod freshness;
mod key;
mod manager;
mod status;
mod store;

pub use freshness::*;
pub use key::*;
pub use manager::*;
pub use status::*;
pub use store::*;
