use solgraph_rpc::RpcError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    #[error("{0}")]
    Other(String),
}

impl ExplorerError {
    /// Supersession is not a failure; callers skip quietly instead of
    /// warning or marking anything failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExplorerError::Rpc(err) if err.is_cancelled())
    }
}

pub type Result<T> = std::result::Result<T, ExplorerError>;
