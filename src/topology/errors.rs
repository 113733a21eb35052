//! Topology construction error types
//!
//! All of these are fatal: no partial cluster is meaningful, so the
//! builder aborts before any node is touched.

use thiserror::Error;

/// Malformed or disconnected topology definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("no primary configured: exactly one node must have role 'primary'")]
    NoPrimary,

    #[error("multiple primaries configured: '{first}' and '{second}'")]
    MultiplePrimaries { first: String, second: String },

    #[error("duplicate node name '{0}'")]
    DuplicateName(String),

    #[error("replica '{0}' must supply connect_to")]
    MissingParent(String),

    #[error("primary '{0}' must not supply connect_to")]
    PrimaryHasParent(String),

    #[error("node '{node}': connect_to references unknown node '{parent}'")]
    UnknownParent { node: String, parent: String },

    #[error("node '{0}' is not reachable from the primary (reference cycle)")]
    Unreachable(String),
}

/// Result type for topology construction
pub type TopologyResult<T> = Result<T, TopologyError>;
