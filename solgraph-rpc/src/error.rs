use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("client error: {0}")]
    ClientError(String),

    #[error("endpoint returned HTTP {0}")]
    BadStatus(u16),

    #[error("upstream error {code}: {message}")]
    Upstream { code: i64, message: String },

    #[error("all {0} endpoints are failing")]
    AllEndpointsFailed(usize),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("operation superseded")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl RpcError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, RpcError::RateLimited { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RpcError::Cancelled)
    }

    /// Whether another attempt could reasonably succeed. Client errors and
    /// contract violations are final; everything transient is fair game.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            RpcError::RateLimited { .. }
            | RpcError::Timeout(_)
            | RpcError::BadStatus(_)
            | RpcError::AllEndpointsFailed(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
