//! Node Link: the query/control channel to one running instance
//!
//! Implemented by a database-specific adapter; the crate ships a
//! simulated adapter in `crate::sim`. The link is owned exclusively by
//! its node controller: the monitor and the fault scheduler never touch
//! it directly.

use async_trait::async_trait;

use crate::topology::{Endpoint, NodeRole};

use super::errors::LinkError;
use super::stats::{Lsn, StatsSnapshot};

/// Which lag-query variant a node supports, selected by role.
///
/// A capability table rather than a type hierarchy: the controller
/// picks the shape once from the node's role and the adapter issues the
/// matching query set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusShape {
    /// Wait thresholds + downstream set + own position
    Primary,
    /// Downstream set + own receive/apply positions
    Forwarding,
    /// Own receive/apply positions only
    Terminal,
}

impl StatusShape {
    /// The query shape a role supports
    pub fn for_role(role: NodeRole) -> Self {
        match role {
            NodeRole::Primary => StatusShape::Primary,
            NodeRole::Replica => StatusShape::Forwarding,
            NodeRole::TerminalReplica => StatusShape::Terminal,
        }
    }
}

/// Query/control channel to one running database instance.
///
/// Dropping the link closes the underlying connection.
#[async_trait]
pub trait NodeLink: Send + Sync {
    /// Query current replication progress in the given shape
    async fn query_replication_status(&self, shape: StatusShape)
        -> Result<StatsSnapshot, LinkError>;

    /// Query the node's current insert position
    async fn query_current_position(&self) -> Result<Lsn, LinkError>;

    /// Suspend WAL replay on this node
    async fn pause_replay(&self) -> Result<(), LinkError>;

    /// Resume WAL replay on this node
    async fn resume_replay(&self) -> Result<(), LinkError>;

    /// Issue one probe write; returns when the write is acknowledged
    /// under the cluster's durability rules
    async fn execute_probe_write(&self) -> Result<(), LinkError>;

    /// Signed distance between two positions, in log bytes.
    ///
    /// Positions are totally ordered 64-bit values, so the default
    /// computes locally; an adapter may override to delegate to a
    /// server-side computation.
    fn lsn_distance(&self, a: Lsn, b: Lsn) -> i64 {
        a.distance(b)
    }
}

/// Opens node links. One connector serves the whole cluster.
#[async_trait]
pub trait LinkConnector: Send + Sync {
    /// Establish a link to the instance at `endpoint`
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn NodeLink>, LinkError>;
}
