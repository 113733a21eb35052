//! Lag monitor tick tests
//!
//! - the aggregated snapshot keeps its shape across ticks, degraded
//!   nodes included
//! - classification follows the per-node durability mode against the
//!   primary's same-tick thresholds
//! - a single unresponsive node never stalls the tick

mod common;

use std::time::Duration;

use cascmon::monitor::{LagClass, LagMonitor};
use cascmon::node::NodeState;
use cascmon::topology::DurabilityMode;

const BUDGET: Duration = Duration::from_millis(100);

/// A settled cluster classifies every replica CaughtUp under apply
/// mode, and the primary's own verdict is CaughtUp.
#[tokio::test]
async fn test_settled_cluster_is_caught_up() {
    let harness = common::two_chains(DurabilityMode::Apply);
    harness.topology.start_all().await.unwrap();
    harness.sim.step_n(2);

    let monitor = LagMonitor::new(harness.topology.clone(), BUDGET);
    let snapshot = monitor.tick().await;

    assert_eq!(snapshot.primary.durability, LagClass::CaughtUp);
    assert_eq!(snapshot.replica_count(), 2);
    for record in snapshot.chains.iter().flatten() {
        assert_eq!(record.lag.receive, LagClass::CaughtUp);
        assert_eq!(record.lag.apply, LagClass::CaughtUp);
        assert!(!record.stale);
    }
}

/// A paused replica falls Behind on the apply tier while its receive
/// tier stays CaughtUp; the sibling chain is unaffected.
#[tokio::test]
async fn test_paused_replica_classified_behind() {
    let harness = common::two_chains(DurabilityMode::Apply);
    harness.topology.start_all().await.unwrap();
    harness.sim.step_n(2);

    harness
        .topology
        .get("line0-0")
        .unwrap()
        .pause_replay()
        .await
        .unwrap();
    harness.sim.advance_head(0x500);
    harness.sim.step_n(2);

    let monitor = LagMonitor::new(harness.topology.clone(), BUDGET);
    let snapshot = monitor.tick().await;

    let paused = snapshot.replica("line0-0").unwrap();
    assert_eq!(paused.state, NodeState::ReplayPaused);
    assert_eq!(paused.lag.receive, LagClass::CaughtUp);
    assert_eq!(paused.lag.apply, LagClass::Behind);

    let sibling = snapshot.replica("line1-0").unwrap();
    assert_eq!(sibling.lag.apply, LagClass::CaughtUp);
}

/// Terminal replicas report no forwarding positions, so their
/// durability tier is withheld rather than read as zero lag.
#[tokio::test]
async fn test_terminal_durability_tier_withheld() {
    let harness = common::cascade_line(DurabilityMode::Apply);
    harness.topology.start_all().await.unwrap();
    harness.sim.step_n(3);

    let monitor = LagMonitor::new(harness.topology.clone(), BUDGET);
    let snapshot = monitor.tick().await;

    let mid = snapshot.replica("mid").unwrap();
    let tail = snapshot.replica("tail").unwrap();
    assert_ne!(mid.lag.durability, LagClass::Unknown);
    assert_eq!(tail.lag.durability, LagClass::Unknown);
    assert_eq!(tail.lag.apply, LagClass::CaughtUp);
}

/// Async (durability none) nodes have no threshold: all tiers
/// withheld.
#[tokio::test]
async fn test_async_cluster_withholds_classification() {
    let harness = common::two_chains(DurabilityMode::None);
    harness.topology.start_all().await.unwrap();
    harness.sim.step_n(2);

    let monitor = LagMonitor::new(harness.topology.clone(), BUDGET);
    let snapshot = monitor.tick().await;

    assert_eq!(snapshot.primary.durability, LagClass::Unknown);
    for record in snapshot.chains.iter().flatten() {
        assert_eq!(record.lag.durability, LagClass::Unknown);
        assert_eq!(record.lag.receive, LagClass::Unknown);
        assert_eq!(record.lag.apply, LagClass::Unknown);
    }
}

/// A killed replica stays in the snapshot, marked stale with its
/// last-known data; the topology shape is identical across ticks.
#[tokio::test]
async fn test_killed_node_degrades_to_stale_record() {
    let harness = common::two_chains(DurabilityMode::Apply);
    harness.topology.start_all().await.unwrap();
    harness.sim.step_n(2);

    let monitor = LagMonitor::new(harness.topology.clone(), BUDGET);
    let before = monitor.tick().await;

    harness.topology.get("line0-0").unwrap().kill().await.unwrap();
    let after = monitor.tick().await;

    assert_eq!(after.replica_count(), before.replica_count());
    let record = after.replica("line0-0").unwrap();
    assert!(record.stale);
    assert_eq!(record.state, NodeState::Killed);
    assert_eq!(
        record.stats.last_apply_lsn,
        before.replica("line0-0").unwrap().stats.last_apply_lsn
    );
}

/// An unresponsive link costs at most the per-node budget; the rest of
/// the tree still gets fresh records in the same tick.
#[tokio::test]
async fn test_unresponsive_node_never_stalls_the_tick() {
    let harness = common::two_chains(DurabilityMode::Apply);
    harness.topology.start_all().await.unwrap();
    harness.sim.step_n(2);

    harness.sim.set_unresponsive("line0-0", true);

    let monitor = LagMonitor::new(harness.topology.clone(), Duration::from_millis(50));
    let started = std::time::Instant::now();
    let snapshot = monitor.tick().await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(snapshot.replica("line0-0").unwrap().stale);
    assert!(!snapshot.replica("line1-0").unwrap().stale);
    assert!(!snapshot.primary.stale);
}

/// An unresponsive primary degrades its record but replicas are still
/// classified against its last-known thresholds.
#[tokio::test]
async fn test_stale_primary_still_yields_full_snapshot() {
    let harness = common::two_chains(DurabilityMode::Apply);
    harness.topology.start_all().await.unwrap();
    harness.sim.step_n(2);

    let monitor = LagMonitor::new(harness.topology.clone(), Duration::from_millis(50));
    // one warm tick to cache the thresholds
    monitor.tick().await;

    harness.sim.set_unresponsive("master", true);
    let snapshot = monitor.tick().await;

    assert!(snapshot.primary.stale);
    assert_eq!(snapshot.replica_count(), 2);
    for record in snapshot.chains.iter().flatten() {
        assert_eq!(record.lag.apply, LagClass::CaughtUp);
    }
}
