//! Fault scheduler
//!
//! Each accepted disruption runs as an independent task bound to one
//! node's controller, so faults against different nodes proceed
//! concurrently and never block the monitor tick. The active-fault
//! registry enforces at-most-one in-flight disruption per node:
//! overlapping transitions on the same controller are rejected up
//! front, not interleaved. Every task carries a cancellation token,
//! the operator-override hook that aborts a pending counter-action.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::node::{NodeController, NodeError};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::topology::Topology;

use super::command::{FaultAction, FaultDuration, FaultRequest};
use super::errors::{FaultError, FaultResult};

/// Restart attempts after the kill duration elapses
const RESTART_ATTEMPTS: u32 = 3;

/// One in-flight disruption
pub struct ActiveFault {
    pub id: Uuid,
    pub action: FaultAction,
    pub cancel: CancellationToken,
}

/// Accepts disruption requests and runs them as tracked tasks.
pub struct FaultScheduler {
    topology: Arc<Topology>,
    active: Arc<Mutex<HashMap<String, ActiveFault>>>,
    restart_retry_delay: Duration,
}

impl FaultScheduler {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            active: Arc::new(Mutex::new(HashMap::new())),
            restart_retry_delay: Duration::from_secs(1),
        }
    }

    /// Override the delay between restart attempts
    pub fn with_restart_retry_delay(mut self, delay: Duration) -> Self {
        self.restart_retry_delay = delay;
        self
    }

    /// Validate and dispatch one disruption.
    ///
    /// Rejections (`UnknownNode`, `NodeBusy`) are synchronous and leave
    /// every node untouched. On success the fault runs as an
    /// independent task; the returned id identifies it in logs.
    pub fn submit(&self, request: FaultRequest) -> FaultResult<Uuid> {
        let controller = match self.topology.node_at(request.chain, request.index) {
            Some(controller) => Arc::clone(controller),
            None => {
                let err = FaultError::UnknownNode {
                    chain: request.chain,
                    index: request.index,
                };
                log_event_with_fields(
                    Event::FaultRejected,
                    &[("reason", &err.to_string())],
                );
                return Err(err);
            }
        };

        let name = controller.name().to_owned();
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        {
            let mut active = lock(&self.active);
            if active.contains_key(&name) {
                log_event_with_fields(
                    Event::FaultRejected,
                    &[("node", name.as_str()), ("reason", "busy")],
                );
                return Err(FaultError::NodeBusy(name));
            }
            active.insert(
                name.clone(),
                ActiveFault {
                    id,
                    action: request.action,
                    cancel: token.clone(),
                },
            );
        }

        log_event_with_fields(
            Event::FaultScheduled,
            &[
                ("node", name.as_str()),
                ("action", request.action.as_str()),
                ("duration", &request.duration.to_string()),
                ("task", &id.to_string()),
            ],
        );

        let registry = Arc::clone(&self.active);
        let retry_delay = self.restart_retry_delay;
        tokio::spawn(async move {
            match request.action {
                FaultAction::PauseReplay => {
                    run_pause(&controller, request.duration, &token).await;
                }
                FaultAction::KillAndRestart => {
                    run_kill(&controller, request.duration, &token, retry_delay).await;
                }
            }

            lock(&registry).remove(&name);
            let done = if token.is_cancelled() {
                Event::FaultCancelled
            } else {
                Event::FaultCompleted
            };
            log_event_with_fields(done, &[("node", name.as_str()), ("task", &id.to_string())]);
        });

        Ok(id)
    }

    /// Operator override: abort the pending counter-action of the
    /// node's in-flight fault, if any. Returns whether a task was
    /// signalled.
    pub fn cancel(&self, chain: u32, index: u32) -> FaultResult<bool> {
        let controller = self
            .topology
            .node_at(chain, index)
            .ok_or(FaultError::UnknownNode { chain, index })?;
        let active = lock(&self.active);
        match active.get(controller.name()) {
            Some(fault) => {
                fault.cancel.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether a node currently has a disruption in flight
    pub fn is_busy(&self, name: &str) -> bool {
        lock(&self.active).contains_key(name)
    }

    /// Number of in-flight disruptions
    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }
}

fn lock<'a>(
    registry: &'a Arc<Mutex<HashMap<String, ActiveFault>>>,
) -> MutexGuard<'a, HashMap<String, ActiveFault>> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Pause now; resume after the duration unless cancelled. An
/// indefinite pause schedules no resume: the node stays paused until
/// an explicit `resume_replay()`.
async fn run_pause(controller: &NodeController, duration: FaultDuration, token: &CancellationToken) {
    if let Err(e) = controller.pause_replay().await {
        fault_failed(controller, "pause replay", &e);
        return;
    }
    if let FaultDuration::Finite(hold) = duration {
        tokio::select! {
            _ = time::sleep(hold) => {
                if let Err(e) = controller.resume_replay().await {
                    fault_failed(controller, "resume replay", &e);
                }
            }
            _ = token.cancelled() => {
                // operator override: no counter-action fires
            }
        }
    }
}

/// Kill now; restart after the duration unless cancelled or
/// indefinite. Restart failures leave the node killed and are retried
/// a bounded number of times.
async fn run_kill(
    controller: &NodeController,
    duration: FaultDuration,
    token: &CancellationToken,
    retry_delay: Duration,
) {
    match controller.kill().await {
        Ok(()) => {}
        Err(NodeError::ProcessStop { .. }) => {
            // already marked killed; the stop error is informational
        }
        Err(e) => {
            fault_failed(controller, "kill", &e);
            return;
        }
    }

    let hold = match duration {
        FaultDuration::Finite(hold) => hold,
        // no restart task at all; the node stays killed until an
        // explicit operator start()
        FaultDuration::Indefinite => return,
    };

    tokio::select! {
        _ = time::sleep(hold) => {}
        _ = token.cancelled() => return,
    }

    for attempt in 1..=RESTART_ATTEMPTS {
        match controller.restart().await {
            Ok(()) => return,
            Err(e) => {
                log_event_with_fields(
                    Event::RestartAttemptFailed,
                    &[
                        ("node", controller.name()),
                        ("attempt", &attempt.to_string()),
                        ("reason", &e.to_string()),
                    ],
                );
            }
        }
        if attempt < RESTART_ATTEMPTS {
            tokio::select! {
                _ = time::sleep(retry_delay) => {}
                _ = token.cancelled() => return,
            }
        }
    }
}

fn fault_failed(controller: &NodeController, op: &str, err: &NodeError) {
    Logger::log(
        Severity::Error,
        "FAULT_FAILED",
        &[
            ("node", controller.name()),
            ("op", op),
            ("reason", &err.to_string()),
        ],
    );
}
