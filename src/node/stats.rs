//! Log positions and per-poll replication statistics
//!
//! A `StatsSnapshot` is a value: created fresh on each poll, superseded
//! (never edited) by the next poll. Absent positions are `None`, never
//! zero: a zero operand means "no data", and lag classification is
//! withheld rather than read as zero lag.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topology::DurabilityMode;

/// A log sequence number: a monotonically increasing position in a
/// node's write-ahead log.
///
/// Prints and parses the conventional `XXXXXXXX/XXXXXXXX` split-hex
/// form (high 32 bits / low 32 bits).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Lsn(u64);

impl Lsn {
    pub const fn new(value: u64) -> Self {
        Lsn(value)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Signed distance from `other` to `self`, in log bytes.
    ///
    /// Positive when `self` is ahead of `other`.
    pub fn distance(&self, other: Lsn) -> i64 {
        let wide = self.0 as i128 - other.0 as i128;
        wide.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Advance by `bytes`, saturating at the top of the range
    pub fn advance(&self, bytes: u64) -> Lsn {
        Lsn(self.0.saturating_add(bytes))
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

/// Error parsing an LSN from its split-hex form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid lsn '{0}': expected XXXXXXXX/XXXXXXXX hex form")]
pub struct ParseLsnError(String);

impl FromStr for Lsn {
    type Err = ParseLsnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (high, low) = s.split_once('/').ok_or_else(|| ParseLsnError(s.into()))?;
        let high = u32::from_str_radix(high, 16).map_err(|_| ParseLsnError(s.into()))?;
        let low = u32::from_str_radix(low, 16).map_err(|_| ParseLsnError(s.into()))?;
        Ok(Lsn(((high as u64) << 32) | low as u64))
    }
}

/// Signed distance between two optional positions.
///
/// `None` when either operand is absent: no data, not zero lag.
pub fn lsn_distance(a: Option<Lsn>, b: Option<Lsn>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.distance(b)),
        _ => None,
    }
}

/// One node's replication progress at one poll.
///
/// Which fields are populated depends on the node's role:
/// - every replica reports `last_receive_lsn` / `last_apply_lsn`;
/// - forwarding nodes (primary and non-terminal replicas) additionally
///   report `sent_lsn` and the write/flush/apply positions of their
///   furthest-behind descendant;
/// - only the primary reports the `wait_*` thresholds it is currently
///   blocked on per durability mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub sent_lsn: Option<Lsn>,
    pub write_lsn: Option<Lsn>,
    pub flush_lsn: Option<Lsn>,
    pub apply_lsn: Option<Lsn>,

    /// This node's own receipt progress
    pub last_receive_lsn: Option<Lsn>,
    /// This node's own application progress
    pub last_apply_lsn: Option<Lsn>,

    pub wait_write_lsn: Option<Lsn>,
    pub wait_flush_lsn: Option<Lsn>,
    pub wait_apply_lsn: Option<Lsn>,

    pub captured_at: DateTime<Utc>,
}

impl StatsSnapshot {
    /// A snapshot with no data, for a node that has never been polled
    pub fn empty() -> Self {
        Self {
            sent_lsn: None,
            write_lsn: None,
            flush_lsn: None,
            apply_lsn: None,
            last_receive_lsn: None,
            last_apply_lsn: None,
            wait_write_lsn: None,
            wait_flush_lsn: None,
            wait_apply_lsn: None,
            captured_at: Utc::now(),
        }
    }

    /// The downstream (furthest-behind descendant) position selected by
    /// a durability mode. `None` for async mode or missing data.
    pub fn downstream_lsn(&self, mode: DurabilityMode) -> Option<Lsn> {
        match mode {
            DurabilityMode::None => None,
            DurabilityMode::Write => self.write_lsn,
            DurabilityMode::Flush => self.flush_lsn,
            DurabilityMode::Apply => self.apply_lsn,
        }
    }

    /// The primary's wait threshold selected by a durability mode
    pub fn wait_lsn(&self, mode: DurabilityMode) -> Option<Lsn> {
        match mode {
            DurabilityMode::None => None,
            DurabilityMode::Write => self.wait_write_lsn,
            DurabilityMode::Flush => self.wait_flush_lsn,
            DurabilityMode::Apply => self.wait_apply_lsn,
        }
    }
}
