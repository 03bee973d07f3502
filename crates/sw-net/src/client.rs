//! Platform fetch capability.

use async_trait::async_trait;
use sw_core::{ApiRequest, ApiResponse};

/// Error type for fetch operations.
///
/// HTTP error statuses are not errors: a 500 is a response like any other.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request error: {0}")]
    Request(String),
}

/// Outbound network access.
///
/// The worker does not retry or time out requests itself; whatever the
/// implementation does is what the caller sees.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request against the network.
    async fn fetch(&self, request: &ApiRequest) -> Result<ApiResponse, FetchError>;
}
