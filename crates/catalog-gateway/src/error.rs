//! Error types surfaced to gateway callers.

use thiserror::Error;

/// Terminal failure of a catalog request.
///
/// Intermediate throttling is absorbed by the gateway and only shows up here
/// as [`GatewayError::Throttled`] once the attempt budget is spent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The catalog answered 429 on every attempt
    #[error("catalog throttled the request on all {attempts} attempts")]
    Throttled { attempts: u32 },

    /// The catalog answered with a non-success status
    #[error("catalog request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response (connection, timeout, TLS)
    #[error("catalog request error: {0}")]
    Request(String),

    /// The response body could not be decoded
    #[error("failed to decode catalog response: {0}")]
    Decode(String),

    /// The cache store failed
    #[error("cache store error: {0}")]
    Store(String),

    /// The queue processor went away before answering
    #[error("request queue closed before the request completed")]
    Closed,
}

impl GatewayError {
    /// Whether this is a "retry later" answer from the catalog
    pub fn is_throttled(&self) -> bool {
        matches!(self, GatewayError::Status { status: 429, .. })
    }

    pub(crate) fn store(err: anyhow::Error) -> Self {
        GatewayError::Store(format!("{:#}", err))
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
