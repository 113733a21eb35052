//! Node lifecycle state machine
//!
//! States: `Stopped -> Starting -> Running <-> ReplayPaused`, and
//! `{Running, ReplayPaused} -> Killed -> Restarting -> Running`.
//! All transitions are driven by the controller; this module only
//! answers which operations are legal from which state.

use std::fmt;

use serde::Serialize;

/// Probe-query phase, carried by `Running` on the primary only.
///
/// Drives the demonstration write workload: issue one write, observe it
/// propagate. Replicas run with no query phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPhase {
    /// A probe write is in flight
    Running,
    /// The last probe write was acknowledged
    Complete,
}

/// Lifecycle state of one node.
///
/// There is no terminal state during normal operation: a node cycles
/// between `Running` and the disruption states until external teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Initial state; process down, no link
    Stopped,
    /// Process coming up, link not yet established
    Starting,
    /// Serving; polls are valid
    Running {
        /// Probe phase, primary only
        query: Option<QueryPhase>,
    },
    /// Replay suspended; receive may advance, apply must not
    ReplayPaused,
    /// Process forced down by a fault; awaits restart or operator start
    Killed,
    /// Scheduled restart in progress
    Restarting,
}

impl NodeState {
    /// Running state as entered after a successful start.
    ///
    /// The primary comes up with its probe phase settled (`Complete`);
    /// replicas carry no phase.
    pub fn running(primary: bool) -> Self {
        NodeState::Running {
            query: if primary {
                Some(QueryPhase::Complete)
            } else {
                None
            },
        }
    }

    /// Whether `start()` is legal from this state
    pub fn can_start(&self) -> bool {
        matches!(self, NodeState::Stopped | NodeState::Killed)
    }

    /// Whether `pause_replay()` is legal from this state
    pub fn can_pause(&self) -> bool {
        matches!(self, NodeState::Running { .. })
    }

    /// Whether `resume_replay()` is legal from this state
    pub fn can_resume(&self) -> bool {
        matches!(self, NodeState::ReplayPaused)
    }

    /// Whether `kill()` is legal from this state
    pub fn can_kill(&self) -> bool {
        matches!(self, NodeState::Running { .. } | NodeState::ReplayPaused)
    }

    /// Whether a scheduled `restart()` is legal from this state
    pub fn can_restart(&self) -> bool {
        matches!(self, NodeState::Killed)
    }

    /// Whether `poll_stats()` returns fresh data from this state
    pub fn is_pollable(&self) -> bool {
        matches!(self, NodeState::Running { .. } | NodeState::ReplayPaused)
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Stopped => "stopped",
            NodeState::Starting => "starting",
            NodeState::Running { query: None } => "running",
            NodeState::Running {
                query: Some(QueryPhase::Running),
            } => "query running",
            NodeState::Running {
                query: Some(QueryPhase::Complete),
            } => "query complete",
            NodeState::ReplayPaused => "replay paused",
            NodeState::Killed => "killed",
            NodeState::Restarting => "restarting",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
