//! Lag monitor
//!
//! On a fixed tick, walks the tree (primary strictly first, then every
//! chain in pre-order), pulls a snapshot from each controller, and
//! emits one immutable aggregated snapshot to the Presenter. Each
//! per-node poll is bounded by the poll budget: an unresponsive link
//! degrades that node's record to stale, never the tick.

mod classify;
mod snapshot;

pub use classify::{classify, classify_primary, classify_replica};
pub use snapshot::{ClusterSnapshot, LagClass, LagReport, PrimaryRecord, ReplicaRecord};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::topology::{ChainPosition, Topology};

/// Renders one aggregated snapshot per tick. Textual, graphical, or
/// remote, the monitor does not care.
pub trait Presenter: Send + Sync {
    fn render(&self, snapshot: &ClusterSnapshot);
}

/// The periodic polling loop over a topology
pub struct LagMonitor {
    topology: Arc<Topology>,
    poll_timeout: Duration,
}

impl LagMonitor {
    pub fn new(topology: Arc<Topology>, poll_timeout: Duration) -> Self {
        Self {
            topology,
            poll_timeout,
        }
    }

    /// One monitoring pass over the whole tree.
    ///
    /// The primary is polled before any replica: replica classification
    /// depends on the wait thresholds from this tick, not a stale prior
    /// value.
    pub async fn tick(&self) -> ClusterSnapshot {
        let primary = self.topology.primary();
        let poll = primary.poll_stats(self.poll_timeout).await;
        let mode = primary.meta().durability;

        let primary_record = PrimaryRecord {
            name: primary.name().to_owned(),
            state: poll.state,
            stale: !poll.fresh,
            durability_mode: mode,
            durability: classify_primary(mode, &poll.stats),
            stats: poll.stats.clone(),
        };
        let thresholds = poll.stats;

        let mut chains = Vec::with_capacity(self.topology.chain_count());
        for chain_no in 0..self.topology.chain_count() {
            let members = self.topology.chain_nodes(chain_no);
            let mut records = Vec::with_capacity(members.len());
            for controller in members {
                let poll = controller.poll_stats(self.poll_timeout).await;
                let meta = controller.meta();
                let position = meta.position.unwrap_or(ChainPosition {
                    chain: chain_no as u32,
                    index: records.len() as u32,
                });
                records.push(ReplicaRecord {
                    name: meta.name.clone(),
                    role: meta.role,
                    chain: position.chain,
                    index: position.index,
                    state: poll.state,
                    stale: !poll.fresh,
                    durability_mode: meta.durability,
                    lag: classify_replica(meta.durability, &poll.stats, &thresholds),
                    stats: poll.stats,
                });
            }
            chains.push(records);
        }

        ClusterSnapshot {
            captured_at: Utc::now(),
            primary: primary_record,
            chains,
        }
    }

    /// Run the periodic loop until cancelled, handing each snapshot to
    /// the presenter.
    pub async fn run(
        &self,
        interval: Duration,
        presenter: Arc<dyn Presenter>,
        shutdown: CancellationToken,
    ) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.tick().await;
                    presenter.render(&snapshot);
                }
                _ = shutdown.cancelled() => break,
            }
        }
    }
}
