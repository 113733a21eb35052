//! Topology subsystem
//!
//! - Exactly one node holds the Primary role and has no parent
//! - Every other node has exactly one parent
//! - The parent graph is a tree rooted at the primary, never a forest
//!
//! The builder rejects every violation at build time; the resulting
//! tree is immutable for the life of the cluster.

mod builder;
mod errors;
mod node;
mod tree;

pub use builder::TopologyBuilder;
pub use errors::{TopologyError, TopologyResult};
pub use node::{ChainPosition, DurabilityMode, Endpoint, NodeMeta, NodeRole};
pub use tree::{Topology, TopologyEntry};
