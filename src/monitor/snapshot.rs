//! Aggregated topology snapshot
//!
//! One immutable value per tick: the primary's record plus, per chain,
//! the ordered replica records with their classifications. This is the
//! sole artifact handed to the Presenter; the monitor never shares a
//! mutable buffer with it. A node whose poll failed is still present,
//! marked stale with its last-known data, so the topology shape is
//! identical on every tick.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::node::{NodeState, StatsSnapshot};
use crate::topology::{DurabilityMode, NodeRole};

/// Lag classification against a durability threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LagClass {
    /// Signed distance to the threshold is >= 0
    CaughtUp,
    /// Signed distance to the threshold is < 0
    Behind,
    /// Either operand absent: classification withheld, not zero lag
    Unknown,
}

impl LagClass {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LagClass::CaughtUp => "caught-up",
            LagClass::Behind => "behind",
            LagClass::Unknown => "unknown",
        }
    }
}

/// The three classification tiers of one replica.
///
/// `durability` compares the replica's mode-selected forwarding
/// position against the primary's same-mode wait threshold; `receive`
/// and `apply` compare the replica's own progress against that same
/// threshold, separating "received but not yet applied" from "not yet
/// received".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LagReport {
    pub durability: LagClass,
    pub receive: LagClass,
    pub apply: LagClass,
}

impl LagReport {
    /// All tiers withheld (async node, or no data yet)
    pub fn unknown() -> Self {
        Self {
            durability: LagClass::Unknown,
            receive: LagClass::Unknown,
            apply: LagClass::Unknown,
        }
    }
}

/// The primary's record for one tick
#[derive(Debug, Clone, Serialize)]
pub struct PrimaryRecord {
    pub name: String,
    pub state: NodeState,
    pub stats: StatsSnapshot,
    /// Last-known data: this tick's poll failed or timed out
    pub stale: bool,
    /// The mode the primary's own verdict is computed under
    pub durability_mode: DurabilityMode,
    /// The primary's own durability position vs its wait threshold
    pub durability: LagClass,
}

/// One replica's record for one tick
#[derive(Debug, Clone, Serialize)]
pub struct ReplicaRecord {
    pub name: String,
    pub role: NodeRole,
    pub chain: u32,
    pub index: u32,
    pub state: NodeState,
    pub stats: StatsSnapshot,
    /// Last-known data: this tick's poll failed or timed out
    pub stale: bool,
    /// The mode that selected this replica's threshold
    pub durability_mode: DurabilityMode,
    pub lag: LagReport,
}

/// The aggregated snapshot handed to the Presenter, once per tick
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSnapshot {
    pub captured_at: DateTime<Utc>,
    pub primary: PrimaryRecord,
    /// Chain -> ordered replica records (pre-order within the chain)
    pub chains: Vec<Vec<ReplicaRecord>>,
}

impl ClusterSnapshot {
    /// Total replica count across chains
    pub fn replica_count(&self) -> usize {
        self.chains.iter().map(|chain| chain.len()).sum()
    }

    /// Find a replica record by name
    pub fn replica(&self, name: &str) -> Option<&ReplicaRecord> {
        self.chains
            .iter()
            .flatten()
            .find(|record| record.name == name)
    }
}
