//! Node controller and collaborator error types

use thiserror::Error;

/// Errors from the external process-control channel
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    #[error("process start failed: {0}")]
    Start(String),

    #[error("process stop failed: {0}")]
    Stop(String),
}

/// Errors from a node link (the query/control channel to one instance)
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    /// Link could not be (re)established; transient from the monitor's
    /// point of view, fatal during initial bring-up
    #[error("connection failed: {0}")]
    Connection(String),

    /// A status/position query failed
    #[error("query failed: {0}")]
    Query(String),

    /// Pause/resume instruction failed
    #[error("replay control failed: {0}")]
    ReplayControl(String),
}

/// Node controller errors
#[derive(Debug, Error)]
pub enum NodeError {
    /// Operation not legal from the node's current state
    #[error("node {node}: cannot {op} from state '{from}'")]
    InvalidTransition {
        node: String,
        op: &'static str,
        from: &'static str,
    },

    /// Underlying process could not be brought up
    #[error("node {node}: {source}")]
    ProcessStart {
        node: String,
        #[source]
        source: ProcessError,
    },

    /// Underlying process could not be brought down
    #[error("node {node}: {source}")]
    ProcessStop {
        node: String,
        #[source]
        source: ProcessError,
    },

    /// Node link failure (connect, query, or replay control)
    #[error("node {node}: {source}")]
    Link {
        node: String,
        #[source]
        source: LinkError,
    },

    /// A single poll exceeded its time budget
    #[error("node {node}: poll exceeded {budget_ms}ms budget")]
    PollTimeout { node: String, budget_ms: u64 },

    /// Probe writes only run on the primary
    #[error("node {node}: probe writes require the primary role")]
    NotPrimary { node: String },
}

impl NodeError {
    /// Transient errors degrade one node's record to stale for a tick;
    /// everything else aborts the calling flow.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NodeError::Link { .. } | NodeError::PollTimeout { .. }
        )
    }
}

/// Result type for node controller operations
pub type NodeResult<T> = Result<T, NodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let link = NodeError::Link {
            node: "line0-0".into(),
            source: LinkError::Connection("refused".into()),
        };
        let timeout = NodeError::PollTimeout {
            node: "line0-0".into(),
            budget_ms: 250,
        };
        let start = NodeError::ProcessStart {
            node: "line0-0".into(),
            source: ProcessError::Start("exit 1".into()),
        };

        assert!(link.is_transient());
        assert!(timeout.is_transient());
        assert!(!start.is_transient());
    }

    #[test]
    fn test_display_carries_node_name() {
        let err = NodeError::InvalidTransition {
            node: "line1-0".into(),
            op: "pause replay",
            from: "killed",
        };
        let msg = err.to_string();
        assert!(msg.contains("line1-0"));
        assert!(msg.contains("pause replay"));
        assert!(msg.contains("killed"));
    }
}
