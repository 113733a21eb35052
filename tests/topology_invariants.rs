//! Topology construction invariants
//!
//! - Every valid configuration yields a tree with exactly one root and
//!   every node reachable from it
//! - Every invalid configuration (missing primary, duplicate name,
//!   dangling parent, replica cycle) fails with a TopologyError before
//!   any node is touched

mod common;

use cascmon::config::test_support::{primary, replica};
use cascmon::node::NodeState;
use cascmon::topology::{DurabilityMode, NodeRole, TopologyError};

// =============================================================================
// Valid configurations
// =============================================================================

/// A branching tree resolves with one root and full reachability.
#[test]
fn test_branching_tree_reachable_from_root() {
    let harness = common::cluster(
        vec![
            primary("master", 6432),
            replica("a", "master", 6433),
            replica("a-0", "a", 6434),
            replica("a-1", "a", 6435),
            replica("b", "master", 6436),
        ],
        DurabilityMode::Apply,
    );
    let topology = &harness.topology;

    assert_eq!(topology.len(), 5);
    assert_eq!(topology.primary().name(), "master");
    assert_eq!(topology.preorder().len(), topology.len());
    assert_eq!(topology.preorder()[0].name(), "master");
}

/// Chain addressing resolves every replica and nothing else.
#[test]
fn test_chain_addressing() {
    let harness = common::cluster(
        vec![
            primary("master", 6432),
            replica("a", "master", 6433),
            replica("a-0", "a", 6434),
            replica("b", "master", 6435),
        ],
        DurabilityMode::Apply,
    );
    let topology = &harness.topology;

    assert_eq!(topology.chain_count(), 2);
    assert_eq!(topology.node_at(0, 0).unwrap().name(), "a");
    assert_eq!(topology.node_at(0, 1).unwrap().name(), "a-0");
    assert_eq!(topology.node_at(1, 0).unwrap().name(), "b");
    assert!(topology.node_at(0, 2).is_none());
    assert!(topology.node_at(2, 0).is_none());
}

/// Replicas with no children come out as terminal replicas.
#[test]
fn test_terminal_roles() {
    let harness = common::cascade_line(DurabilityMode::Apply);
    let topology = &harness.topology;

    assert_eq!(topology.get("master").unwrap().meta().role, NodeRole::Primary);
    assert_eq!(topology.get("mid").unwrap().meta().role, NodeRole::Replica);
    assert_eq!(
        topology.get("tail").unwrap().meta().role,
        NodeRole::TerminalReplica
    );
}

/// Building has no side effects: every controller starts Stopped.
#[test]
fn test_build_touches_no_node() {
    let harness = common::two_chains(DurabilityMode::Apply);
    for controller in harness.topology.preorder() {
        assert_eq!(controller.state(), NodeState::Stopped);
    }
}

/// Per-node durability overrides the cluster default.
#[test]
fn test_durability_override() {
    let mut nodes = vec![primary("master", 6432), replica("r", "master", 6433)];
    nodes[1].durability = Some(DurabilityMode::Write);

    let harness = common::cluster(nodes, DurabilityMode::Apply);
    assert_eq!(
        harness.topology.get("master").unwrap().meta().durability,
        DurabilityMode::Apply
    );
    assert_eq!(
        harness.topology.get("r").unwrap().meta().durability,
        DurabilityMode::Write
    );
}

// =============================================================================
// Invalid configurations
// =============================================================================

fn build_err(nodes: Vec<cascmon::config::NodeConfig>) -> TopologyError {
    use cascmon::sim::SimCluster;
    use cascmon::topology::TopologyBuilder;

    let sim = SimCluster::new();
    TopologyBuilder::build(
        &nodes,
        DurabilityMode::Apply,
        sim.process_control(),
        sim.connector(),
    )
    .expect_err("config must be rejected")
}

/// No primary at all is rejected.
#[test]
fn test_missing_primary_rejected() {
    let err = build_err(vec![replica("a", "b", 6433), replica("b", "a", 6434)]);
    assert_eq!(err, TopologyError::NoPrimary);
}

/// Two primaries are rejected.
#[test]
fn test_second_primary_rejected() {
    let err = build_err(vec![primary("m1", 6432), primary("m2", 6433)]);
    assert_eq!(
        err,
        TopologyError::MultiplePrimaries {
            first: "m1".into(),
            second: "m2".into()
        }
    );
}

/// A replica pointing at a nonexistent parent is rejected.
#[test]
fn test_dangling_parent_rejected() {
    let err = build_err(vec![primary("master", 6432), replica("r", "ghost", 6433)]);
    assert!(matches!(err, TopologyError::UnknownParent { .. }));
}

/// A replica without connect_to is rejected.
#[test]
fn test_orphan_replica_rejected() {
    let mut orphan = replica("r", "master", 6433);
    orphan.connect_to = None;
    let err = build_err(vec![primary("master", 6432), orphan]);
    assert_eq!(err, TopologyError::MissingParent("r".into()));
}

/// A primary carrying connect_to is rejected.
#[test]
fn test_primary_with_parent_rejected() {
    let mut bad = primary("master", 6432);
    bad.connect_to = Some("elsewhere".into());
    let err = build_err(vec![bad]);
    assert_eq!(err, TopologyError::PrimaryHasParent("master".into()));
}

/// Duplicate names are rejected.
#[test]
fn test_duplicate_name_rejected() {
    let err = build_err(vec![
        primary("master", 6432),
        replica("r", "master", 6433),
        replica("r", "master", 6434),
    ]);
    assert_eq!(err, TopologyError::DuplicateName("r".into()));
}

/// A replica cycle disconnected from the primary is rejected.
#[test]
fn test_replica_cycle_rejected() {
    let err = build_err(vec![
        primary("master", 6432),
        replica("x", "y", 6433),
        replica("y", "x", 6434),
    ]);
    assert!(matches!(err, TopologyError::Unreachable(_)));
}
