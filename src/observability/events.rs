//! Observable lifecycle events
//!
//! Events are explicit and typed: every state change the controller,
//! monitor, or fault scheduler makes maps to exactly one event name.

use std::fmt;

/// Observable events in cascmon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & lifecycle
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Topology built (tree validated, controllers created)
    TopologyBuilt,
    /// Cluster bring-up begins
    BringupStart,
    /// All nodes running, monitoring may begin
    BringupComplete,
    /// Teardown initiated
    ShutdownStart,
    /// Teardown complete
    ShutdownComplete,

    // Node controller
    /// Node process started and link established
    NodeStarted,
    /// Node stopped (link closed, process down)
    NodeStopped,
    /// WAL replay suspended on a node
    ReplayPaused,
    /// WAL replay resumed on a node
    ReplayResumed,
    /// Node killed by a fault task
    NodeKilled,
    /// Scheduled restart succeeded
    NodeRestarted,
    /// Scheduled restart attempt failed, node stays killed (FATAL only
    /// during initial bring-up; a retry follows here)
    RestartAttemptFailed,

    // Lag monitor
    /// A node's poll failed or timed out; its record degrades to stale
    PollDegraded,

    // Probe workload
    /// Probe write issued at the primary
    ProbeWriteStart,
    /// Probe write durably acknowledged
    ProbeWriteComplete,

    // Fault scheduler
    /// Disruption task accepted and spawned
    FaultScheduled,
    /// Disruption request rejected (unknown target or busy node)
    FaultRejected,
    /// Disruption task ran to completion
    FaultCompleted,
    /// Disruption task cancelled by operator override
    FaultCancelled,
}

impl Event {
    /// Returns the canonical event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::TopologyBuilt => "TOPOLOGY_BUILT",
            Event::BringupStart => "BRINGUP_START",
            Event::BringupComplete => "BRINGUP_COMPLETE",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::NodeStarted => "NODE_STARTED",
            Event::NodeStopped => "NODE_STOPPED",
            Event::ReplayPaused => "REPLAY_PAUSED",
            Event::ReplayResumed => "REPLAY_RESUMED",
            Event::NodeKilled => "NODE_KILLED",
            Event::NodeRestarted => "NODE_RESTARTED",
            Event::RestartAttemptFailed => "RESTART_ATTEMPT_FAILED",
            Event::PollDegraded => "POLL_DEGRADED",
            Event::ProbeWriteStart => "PROBE_WRITE_START",
            Event::ProbeWriteComplete => "PROBE_WRITE_COMPLETE",
            Event::FaultScheduled => "FAULT_SCHEDULED",
            Event::FaultRejected => "FAULT_REJECTED",
            Event::FaultCompleted => "FAULT_COMPLETED",
            Event::FaultCancelled => "FAULT_CANCELLED",
        }
    }

    /// Whether this event reports a degraded (but recoverable) condition
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            Event::PollDegraded | Event::RestartAttemptFailed | Event::FaultRejected
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
