//! Fault scheduling error types
//!
//! All of these are reported back to the operator synchronously; no
//! node state changes when a request is rejected.

use thiserror::Error;

/// Disruption request rejections
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaultError {
    #[error("no node at chain {chain} index {index}")]
    UnknownNode { chain: u32, index: u32 },

    #[error("node '{0}' already has a disruption in flight")]
    NodeBusy(String),
}

/// Result type for fault scheduling
pub type FaultResult<T> = Result<T, FaultError>;

/// Operator command parse failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("fault commands come in groups of four tokens: <action> <chain> <index> <duration>")]
    TruncatedBatch,

    #[error("unknown action '{0}' (expected 'apply_stop' or 'kill_node')")]
    UnknownAction(String),

    #[error("invalid chain or node index '{0}'")]
    InvalidIndex(String),

    #[error("invalid duration '{0}' (whole seconds or 'inf')")]
    InvalidDuration(String),
}
