//! Origin allowlist for cross-context control messages.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Result type for allowlist operations.
pub type AllowlistResult<T> = Result<T, AllowlistError>;

/// Errors from allowlist operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllowlistError {
    #[error("origin not allowed: {0}")]
    OriginNotAllowed(String),
}

/// Immutable set of origins permitted to send control messages.
///
/// Matching is exact: scheme, host and port must all agree, and no
/// normalisation (case folding, trailing slash) is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginAllowlist {
    origins: BTreeSet<String>,
}

impl OriginAllowlist {
    /// Create an empty allowlist (denies everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow a specific origin.
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.origins.insert(origin.into());
        self
    }

    /// Allow multiple origins.
    pub fn allow_origins(mut self, origins: &[&str]) -> Self {
        for origin in origins {
            self.origins.insert((*origin).to_string());
        }
        self
    }

    /// Whether `origin` is in the set.
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.contains(origin)
    }

    /// Same decision as [`OriginAllowlist::is_allowed`], as a result.
    pub fn check(&self, origin: &str) -> AllowlistResult<()> {
        if self.is_allowed(origin) {
            Ok(())
        } else {
            Err(AllowlistError::OriginNotAllowed(origin.to_string()))
        }
    }

    /// Number of allowed origins.
    pub fn len(&self) -> usize {
        self.origins.len()
    }

    /// Whether no origin is allowed.
    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Iterate over the allowed origins in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.origins.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for OriginAllowlist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            origins: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Pre-configured allowlists.
pub mod presets {
    use super::OriginAllowlist;

    /// The local development server and the production site.
    pub fn default_origins() -> OriginAllowlist {
        OriginAllowlist::new().allow_origins(&["http://localhost:3000", "https://www.yourdomain.com"])
    }
}
