//! Worker errors.

use sw_core::ConfigError;
use sw_net::FetchError;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors surfaced to the requester or the deployer.
///
/// Cache failures never appear here: they are logged and the request is
/// answered from the network instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    #[error("network request failed: {0}")]
    Network(#[from] FetchError),

    #[error("invalid worker configuration: {0}")]
    Config(#[from] ConfigError),
}
