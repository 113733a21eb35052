//! Operator command surface
//!
//! Batched textual commands in groups of four tokens:
//! `<action> <chain> <index> <durationOrInf>`, repeated for batched
//! requests. Actions: `apply_stop` (pause replay) and `kill_node`
//! (kill and restart).

use std::fmt;
use std::time::Duration;

use super::errors::CommandError;

/// The two supported disruptions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    PauseReplay,
    KillAndRestart,
}

impl FaultAction {
    /// The operator-surface token for this action
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultAction::PauseReplay => "apply_stop",
            FaultAction::KillAndRestart => "kill_node",
        }
    }
}

impl fmt::Display for FaultAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How long the disruption holds before its counter-action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultDuration {
    Finite(Duration),
    /// No counter-action is scheduled at all
    Indefinite,
}

impl FaultDuration {
    pub fn is_indefinite(&self) -> bool {
        matches!(self, FaultDuration::Indefinite)
    }
}

impl fmt::Display for FaultDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultDuration::Finite(d) => write!(f, "{}ms", d.as_millis()),
            FaultDuration::Indefinite => write!(f, "inf"),
        }
    }
}

/// One disruption request, addressed by chain position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultRequest {
    pub action: FaultAction,
    pub chain: u32,
    pub index: u32,
    pub duration: FaultDuration,
}

/// Parse a batched operator command line.
///
/// An empty line parses to an empty batch; a trailing partial group is
/// an error, not silently dropped.
pub fn parse_batch(input: &str) -> Result<Vec<FaultRequest>, CommandError> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    if tokens.len() % 4 != 0 {
        return Err(CommandError::TruncatedBatch);
    }

    let mut requests = Vec::with_capacity(tokens.len() / 4);
    for group in tokens.chunks_exact(4) {
        let action = match group[0] {
            "apply_stop" => FaultAction::PauseReplay,
            "kill_node" => FaultAction::KillAndRestart,
            other => return Err(CommandError::UnknownAction(other.into())),
        };
        let chain = group[1]
            .parse::<u32>()
            .map_err(|_| CommandError::InvalidIndex(group[1].into()))?;
        let index = group[2]
            .parse::<u32>()
            .map_err(|_| CommandError::InvalidIndex(group[2].into()))?;
        let duration = match group[3] {
            "inf" => FaultDuration::Indefinite,
            secs => secs
                .parse::<u64>()
                .map(|s| FaultDuration::Finite(Duration::from_secs(s)))
                .map_err(|_| CommandError::InvalidDuration(secs.into()))?,
        };
        requests.push(FaultRequest {
            action,
            chain,
            index,
            duration,
        });
    }
    Ok(requests)
}
