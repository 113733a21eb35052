//! Lag classification
//!
//! Classification never subtracts raw positions: when either operand
//! is absent the verdict is withheld (`Unknown`), because "no data"
//! must not read as zero lag. The threshold for all three tiers of a
//! replica is selected by that replica's own durability mode: one
//! yardstick per node.

use crate::node::{lsn_distance, Lsn, StatsSnapshot};
use crate::topology::DurabilityMode;

use super::snapshot::{LagClass, LagReport};

/// Classify a position against a threshold with the signed distance
pub fn classify(position: Option<Lsn>, threshold: Option<Lsn>) -> LagClass {
    match lsn_distance(position, threshold) {
        None => LagClass::Unknown,
        Some(distance) if distance >= 0 => LagClass::CaughtUp,
        Some(_) => LagClass::Behind,
    }
}

/// Three-tier report for one replica against the primary's thresholds
/// from the same tick.
pub fn classify_replica(
    mode: DurabilityMode,
    stats: &StatsSnapshot,
    primary: &StatsSnapshot,
) -> LagReport {
    let threshold = primary.wait_lsn(mode);
    LagReport {
        durability: classify(stats.downstream_lsn(mode), threshold),
        receive: classify(stats.last_receive_lsn, threshold),
        apply: classify(stats.last_apply_lsn, threshold),
    }
}

/// The primary's own verdict: its furthest-behind downstream position
/// for its configured mode against the wait threshold for that mode.
pub fn classify_primary(mode: DurabilityMode, stats: &StatsSnapshot) -> LagClass {
    classify(stats.downstream_lsn(mode), stats.wait_lsn(mode))
}
