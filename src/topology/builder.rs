//! Two-phase topology construction
//!
//! Phase one parses the flat configuration list into a name table;
//! phase two resolves `connect_to` references into owned tree edges.
//! Dangling references, duplicate names, and primary-count violations
//! are rejected here, at build time, before any node is touched.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ConfigRole, NodeConfig};
use crate::node::{LinkConnector, NodeController, ProcessControl};
use crate::observability::{log_event_with_fields, Event};

use super::errors::{TopologyError, TopologyResult};
use super::node::{ChainPosition, DurabilityMode, NodeMeta, NodeRole};
use super::tree::{Topology, TopologyEntry};

/// Builds a validated `Topology` from a flat configuration list.
///
/// No side effects: no processes are started and no links are opened.
pub struct TopologyBuilder;

impl TopologyBuilder {
    pub fn build(
        configs: &[NodeConfig],
        cluster_durability: DurabilityMode,
        process: Arc<dyn ProcessControl>,
        connector: Arc<dyn LinkConnector>,
    ) -> TopologyResult<Topology> {
        // Phase 1: flat name table, primary uniqueness, field presence
        let mut by_name: HashMap<String, usize> = HashMap::with_capacity(configs.len());
        let mut root: Option<usize> = None;

        for (idx, cfg) in configs.iter().enumerate() {
            if by_name.insert(cfg.name.clone(), idx).is_some() {
                return Err(TopologyError::DuplicateName(cfg.name.clone()));
            }
            match cfg.role {
                ConfigRole::Primary => {
                    if cfg.connect_to.is_some() {
                        return Err(TopologyError::PrimaryHasParent(cfg.name.clone()));
                    }
                    if let Some(first) = root {
                        return Err(TopologyError::MultiplePrimaries {
                            first: configs[first].name.clone(),
                            second: cfg.name.clone(),
                        });
                    }
                    root = Some(idx);
                }
                ConfigRole::Replica => {
                    if cfg.connect_to.is_none() {
                        return Err(TopologyError::MissingParent(cfg.name.clone()));
                    }
                }
            }
        }
        let root = root.ok_or(TopologyError::NoPrimary)?;

        // Phase 2: resolve references into tree edges
        let mut parents: Vec<Option<usize>> = vec![None; configs.len()];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); configs.len()];

        for (idx, cfg) in configs.iter().enumerate() {
            if let Some(parent_name) = &cfg.connect_to {
                let &parent = by_name.get(parent_name).ok_or_else(|| {
                    TopologyError::UnknownParent {
                        node: cfg.name.clone(),
                        parent: parent_name.clone(),
                    }
                })?;
                parents[idx] = Some(parent);
                children[parent].push(idx);
            }
        }

        // Every node must hang off the primary; an unreachable node
        // means a reference cycle among replicas
        let reachable = Self::reach(root, &children);
        if let Some(stray) = configs
            .iter()
            .enumerate()
            .find(|(idx, _)| !reachable[*idx])
        {
            return Err(TopologyError::Unreachable(stray.1.name.clone()));
        }

        // Chain table: chain i is the subtree under the primary's i-th
        // child, in pre-order
        let mut positions: Vec<Option<ChainPosition>> = vec![None; configs.len()];
        let mut chains: Vec<Vec<usize>> = Vec::with_capacity(children[root].len());
        for (chain_no, &head) in children[root].iter().enumerate() {
            let members = Self::preorder(head, &children);
            for (seq, &idx) in members.iter().enumerate() {
                positions[idx] = Some(ChainPosition {
                    chain: chain_no as u32,
                    index: seq as u32,
                });
            }
            chains.push(members);
        }

        // Final roles: replicas with no children are terminal
        let entries: Vec<TopologyEntry> = configs
            .iter()
            .enumerate()
            .map(|(idx, cfg)| {
                let role = match cfg.role {
                    ConfigRole::Primary => NodeRole::Primary,
                    ConfigRole::Replica if children[idx].is_empty() => NodeRole::TerminalReplica,
                    ConfigRole::Replica => NodeRole::Replica,
                };
                let meta = NodeMeta {
                    name: cfg.name.clone(),
                    role,
                    durability: cfg.durability.unwrap_or(cluster_durability),
                    endpoint: cfg.endpoint(),
                    data_dir: cfg.resolved_data_dir(),
                    position: positions[idx],
                };
                TopologyEntry {
                    controller: Arc::new(NodeController::new(
                        meta,
                        Arc::clone(&process),
                        Arc::clone(&connector),
                    )),
                    parent: parents[idx],
                    children: children[idx].clone(),
                }
            })
            .collect();

        log_event_with_fields(
            Event::TopologyBuilt,
            &[
                ("nodes", &entries.len().to_string()),
                ("chains", &chains.len().to_string()),
            ],
        );

        Ok(Topology {
            entries,
            by_name,
            chains,
            root,
        })
    }

    fn reach(root: usize, children: &[Vec<usize>]) -> Vec<bool> {
        let mut seen = vec![false; children.len()];
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if seen[idx] {
                continue;
            }
            seen[idx] = true;
            stack.extend(children[idx].iter().copied());
        }
        seen
    }

    fn preorder(head: usize, children: &[Vec<usize>]) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![head];
        while let Some(idx) = stack.pop() {
            out.push(idx);
            for &child in children[idx].iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::{primary, replica};
    use crate::node::{LinkError, NodeLink};
    use crate::topology::Endpoint;
    use async_trait::async_trait;
    use std::path::Path;

    struct NullProcess;

    #[async_trait]
    impl ProcessControl for NullProcess {
        async fn start_process(
            &self,
            _data_dir: &Path,
            _port: u16,
        ) -> Result<(), crate::node::ProcessError> {
            Ok(())
        }

        async fn stop_process(&self, _data_dir: &Path) -> Result<(), crate::node::ProcessError> {
            Ok(())
        }
    }

    struct NullConnector;

    #[async_trait]
    impl LinkConnector for NullConnector {
        async fn connect(&self, _endpoint: &Endpoint) -> Result<Box<dyn NodeLink>, LinkError> {
            Err(LinkError::Connection("no links in builder tests".into()))
        }
    }

    fn build(configs: &[NodeConfig]) -> TopologyResult<Topology> {
        TopologyBuilder::build(
            configs,
            DurabilityMode::Apply,
            Arc::new(NullProcess),
            Arc::new(NullConnector),
        )
    }

    #[test]
    fn test_two_chains_build() {
        let configs = vec![
            primary("master", 6432),
            replica("line0-0", "master", 6433),
            replica("line0-1", "line0-0", 6434),
            replica("line1-0", "master", 6435),
        ];
        let topo = build(&configs).unwrap();

        assert_eq!(topo.len(), 4);
        assert_eq!(topo.chain_count(), 2);
        assert_eq!(topo.primary().name(), "master");
        assert_eq!(topo.node_at(0, 1).unwrap().name(), "line0-1");
        assert_eq!(topo.node_at(1, 0).unwrap().name(), "line1-0");
        assert!(topo.node_at(1, 1).is_none());
        assert!(topo.node_at(2, 0).is_none());
    }

    #[test]
    fn test_terminal_roles_derived() {
        let configs = vec![
            primary("master", 6432),
            replica("mid", "master", 6433),
            replica("tail", "mid", 6434),
        ];
        let topo = build(&configs).unwrap();

        assert_eq!(topo.get("mid").unwrap().meta().role, NodeRole::Replica);
        assert_eq!(
            topo.get("tail").unwrap().meta().role,
            NodeRole::TerminalReplica
        );
    }

    #[test]
    fn test_no_primary_rejected() {
        let configs = vec![replica("a", "b", 1), replica("b", "a", 2)];
        // the cycle also makes both unreachable, but the missing
        // primary is detected first
        assert_eq!(build(&configs).unwrap_err(), TopologyError::NoPrimary);
    }

    #[test]
    fn test_multiple_primaries_rejected() {
        let configs = vec![primary("m1", 1), primary("m2", 2)];
        assert!(matches!(
            build(&configs).unwrap_err(),
            TopologyError::MultiplePrimaries { .. }
        ));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let configs = vec![primary("master", 1), replica("r", "ghost", 2)];
        assert_eq!(
            build(&configs).unwrap_err(),
            TopologyError::UnknownParent {
                node: "r".into(),
                parent: "ghost".into()
            }
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let configs = vec![primary("master", 1), replica("r", "master", 2), replica("r", "master", 3)];
        assert_eq!(
            build(&configs).unwrap_err(),
            TopologyError::DuplicateName("r".into())
        );
    }

    #[test]
    fn test_replica_cycle_rejected() {
        let configs = vec![
            primary("master", 1),
            replica("a", "b", 2),
            replica("b", "a", 3),
        ];
        assert!(matches!(
            build(&configs).unwrap_err(),
            TopologyError::Unreachable(_)
        ));
    }

    #[test]
    fn test_preorder_parents_first() {
        let configs = vec![
            primary("master", 1),
            replica("c0", "master", 2),
            replica("c0-0", "c0", 3),
            replica("c1", "master", 4),
        ];
        let topo = build(&configs).unwrap();
        let names: Vec<_> = topo.preorder().iter().map(|c| c.name().to_owned()).collect();
        assert_eq!(names, vec!["master", "c0", "c0-0", "c1"]);
    }
}
