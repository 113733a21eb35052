//! Node identity and topology position
//!
//! Everything here is fixed at build time: role, durability mode,
//! endpoint, and chain position never change while a cluster runs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Node role within the replication tree.
///
/// The role selects the lag-query shape: terminal nodes report only
/// their own receive/apply positions, non-terminal nodes additionally
/// report forwarding thresholds for their downstream set, and the
/// primary reports the wait thresholds it is blocked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Sole root of the tree; origin of the write-ahead stream
    Primary,
    /// Cascading replica: applies the stream and forwards it downstream
    Replica,
    /// Replica with no children (derived from tree shape, not configured)
    TerminalReplica,
}

impl NodeRole {
    /// Whether this node is the primary
    pub fn is_primary(&self) -> bool {
        matches!(self, NodeRole::Primary)
    }

    /// Whether this node forwards the stream to children
    pub fn is_forwarding(&self) -> bool {
        matches!(self, NodeRole::Primary | NodeRole::Replica)
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Primary => "primary",
            NodeRole::Replica => "replica",
            NodeRole::TerminalReplica => "terminal_replica",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the primary must observe from a node's subtree before treating
/// a write as durable there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurabilityMode {
    /// Asynchronous: the primary never waits for this subtree
    #[default]
    None,
    /// Wait until the write reaches the standby's OS buffers
    Write,
    /// Wait until the write is flushed to the standby's disk
    Flush,
    /// Wait until the write is applied and visible on the standby
    Apply,
}

impl DurabilityMode {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DurabilityMode::None => "none",
            DurabilityMode::Write => "write",
            DurabilityMode::Flush => "flush",
            DurabilityMode::Apply => "apply",
        }
    }
}

impl fmt::Display for DurabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Network endpoint pre-assigned to a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Position of a replica within its chain.
///
/// Chain `i` is the subtree under the primary's `i`-th child; `index`
/// is the node's pre-order position within that subtree. The primary
/// has no chain position (the sentinel is `Option::None` on NodeMeta).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPosition {
    pub chain: u32,
    pub index: u32,
}

impl fmt::Display for ChainPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chain, self.index)
    }
}

/// Node identity: name, role, durability, endpoint, chain position.
#[derive(Debug, Clone)]
pub struct NodeMeta {
    /// Unique name within the cluster
    pub name: String,
    /// Final role (terminal replicas derived by the builder)
    pub role: NodeRole,
    /// Durability mode the primary applies to this node's subtree
    pub durability: DurabilityMode,
    /// Pre-assigned query/control endpoint
    pub endpoint: Endpoint,
    /// Data directory handed to process control
    pub data_dir: PathBuf,
    /// Chain position; `None` for the primary
    pub position: Option<ChainPosition>,
}
