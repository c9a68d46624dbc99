pub mod client;
pub mod endpoint;
pub mod error;
pub mod pool;
pub mod rate_limit;
pub mod types;

pub use client::LedgerClient;
pub use error::RpcError;
pub use pool::{EndpointPool, PoolConfig};
pub use rate_limit::{BackoffConfig, RateLimiter};
