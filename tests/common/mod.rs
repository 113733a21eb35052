//! Shared test harness: a simulated cluster wired to a built topology
#![allow(dead_code)]

use std::sync::Arc;

use cascmon::config::test_support::{primary, replica};
use cascmon::config::{ClusterConfig, NodeConfig};
use cascmon::sim::SimCluster;
use cascmon::topology::{DurabilityMode, Topology, TopologyBuilder};

pub struct Harness {
    pub sim: SimCluster,
    pub topology: Arc<Topology>,
}

/// Build a harness from node configs with a cluster-wide durability
/// mode and fast test cadences.
pub fn cluster(nodes: Vec<NodeConfig>, durability: DurabilityMode) -> Harness {
    let config = ClusterConfig {
        poll_interval_ms: 50,
        poll_timeout_ms: 100,
        durability,
        nodes,
    };
    config.validate().expect("test config must be valid");
    let sim = SimCluster::from_config(&config);
    let topology = TopologyBuilder::build(
        &config.nodes,
        config.durability,
        sim.process_control(),
        sim.connector(),
    )
    .expect("test topology must build");
    Harness {
        sim,
        topology: Arc::new(topology),
    }
}

/// Primary plus two chains of one replica each, the end-to-end
/// scenario shape.
pub fn two_chains(durability: DurabilityMode) -> Harness {
    cluster(
        vec![
            primary("master", 6432),
            replica("line0-0", "master", 6433),
            replica("line1-0", "master", 6434),
        ],
        durability,
    )
}

/// Primary with one chain of two cascading replicas.
pub fn cascade_line(durability: DurabilityMode) -> Harness {
    cluster(
        vec![
            primary("master", 6432),
            replica("mid", "master", 6433),
            replica("tail", "mid", 6434),
        ],
        durability,
    )
}
