//! How an intercepted request was answered.

use serde::{Deserialize, Serialize};

/// Status of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Fresh cache hit; no network call.
    Hit,
    /// No usable entry; answered from the network.
    Miss,
    /// Entry expired; answered from the network.
    Stale,
    /// Navigation answered with a reload directive.
    Reload,
    /// Not intercepted.
    Bypass,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Stale => write!(f, "STALE"),
            Self::Reload => write!(f, "RELOAD"),
            Self::Bypass => write!(f, "BYPASS"),
        }
    }
}
