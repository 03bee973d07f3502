//! Security infrastructure for the API caching worker.
//!
//! This crate provides:
//! - `OriginAllowlist` - Exact-match set of origins trusted to send control messages
//!
//! # Example
//!
//! ```
//! use sw_security::OriginAllowlist;
//!
//! let allowlist = OriginAllowlist::new()
//!     .allow_origin("http://localhost:3000")
//!     .allow_origin("https://www.yourdomain.com");
//!
//! assert!(allowlist.is_allowed("http://localhost:3000"));
//! assert!(!allowlist.is_allowed("https://evil.example"));
//! ```

mod allowlist;

pub use allowlist::*;
