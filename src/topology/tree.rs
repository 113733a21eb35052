//! The validated replication tree
//!
//! Nodes live in an arena (`Vec`) with index-based edges; the flat
//! name index and the chain table give the fault scheduler and the
//! operator command surface O(1) lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::node::{NodeController, NodeResult};
use crate::observability::{Logger, Severity};

/// One arena slot: a controller plus its tree edges
pub struct TopologyEntry {
    pub controller: Arc<NodeController>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// A validated tree of node controllers rooted at the primary.
///
/// Construction goes through `TopologyBuilder`; once built, the shape
/// is immutable for the life of the cluster.
pub struct Topology {
    pub(super) entries: Vec<TopologyEntry>,
    pub(super) by_name: HashMap<String, usize>,
    pub(super) chains: Vec<Vec<usize>>,
    pub(super) root: usize,
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topology")
            .field("len", &self.entries.len())
            .field("by_name", &self.by_name)
            .field("chains", &self.chains)
            .field("root", &self.root)
            .finish()
    }
}

impl Topology {
    /// The primary's controller
    pub fn primary(&self) -> &Arc<NodeController> {
        &self.entries[self.root].controller
    }

    /// Look up a controller by name
    pub fn get(&self, name: &str) -> Option<&Arc<NodeController>> {
        self.by_name
            .get(name)
            .map(|&idx| &self.entries[idx].controller)
    }

    /// Look up a controller by chain position
    pub fn node_at(&self, chain: u32, index: u32) -> Option<&Arc<NodeController>> {
        self.chains
            .get(chain as usize)
            .and_then(|chain| chain.get(index as usize))
            .map(|&idx| &self.entries[idx].controller)
    }

    /// Number of nodes, primary included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of replication chains (subtrees under the primary)
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Controllers of one chain, in pre-order
    pub fn chain_nodes(&self, chain: usize) -> Vec<&Arc<NodeController>> {
        self.chains
            .get(chain)
            .map(|chain| {
                chain
                    .iter()
                    .map(|&idx| &self.entries[idx].controller)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All controllers, root first, parents before children
    pub fn preorder(&self) -> Vec<&Arc<NodeController>> {
        self.preorder_with_depth()
            .into_iter()
            .map(|(_, controller)| controller)
            .collect()
    }

    /// Pre-order walk carrying the tree depth, for rendering
    pub fn preorder_with_depth(&self) -> Vec<(usize, &Arc<NodeController>)> {
        let mut out = Vec::with_capacity(self.entries.len());
        let mut stack = vec![(0usize, self.root)];
        while let Some((depth, idx)) = stack.pop() {
            let entry = &self.entries[idx];
            out.push((depth, &entry.controller));
            // reversed so children pop in config order
            for &child in entry.children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }

    /// Bring every node up, parents before children.
    ///
    /// The first failure aborts: a half-started cluster is torn back
    /// down by the caller.
    pub async fn start_all(&self) -> NodeResult<()> {
        for controller in self.preorder() {
            controller.start().await?;
        }
        Ok(())
    }

    /// Tear every node down, children before parents. Best-effort:
    /// stop failures are logged and do not halt the teardown.
    pub async fn stop_all(&self) {
        for controller in self.preorder().into_iter().rev() {
            if let Err(e) = controller.stop().await {
                Logger::log(
                    Severity::Warn,
                    "NODE_STOP_FAILED",
                    &[("node", controller.name()), ("reason", &e.to_string())],
                );
            }
        }
    }
}
