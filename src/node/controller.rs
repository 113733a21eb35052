//! Per-node lifecycle controller
//!
//! Owns one node's state machine and its Node Link. All operations go
//! through the controller's internal lock, which serializes access to
//! the link: the monitor and the fault scheduler never hold it
//! directly. Polls are bounded by a caller-supplied budget so an
//! unresponsive link degrades one node's record instead of stalling
//! the tick.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time;

use crate::observability::{log_event_with_fields, Event};
use crate::topology::NodeMeta;

use super::errors::{LinkError, NodeError, NodeResult};
use super::link::{LinkConnector, NodeLink, StatusShape};
use super::process::ProcessControl;
use super::state::{NodeState, QueryPhase};
use super::stats::{Lsn, StatsSnapshot};

/// Result of a graceful poll
#[derive(Debug, Clone)]
pub struct PolledStats {
    /// Node state at the time of the poll
    pub state: NodeState,
    /// Fresh data, or the cached snapshot when `fresh` is false
    pub stats: StatsSnapshot,
    /// False when the node was unpollable or the poll failed/timed out
    pub fresh: bool,
}

/// Mutable controller state, guarded by the async lock
struct Inner {
    state: NodeState,
    link: Option<Box<dyn NodeLink>>,
    probe_start: Option<Lsn>,
}

/// Read-only mirror for non-blocking observation.
///
/// Updated on every transition and successful poll while the async
/// lock is held; readers (the tick assembling records, the presenter)
/// never wait on an in-flight link operation.
#[derive(Clone)]
struct Observed {
    state: NodeState,
    stats: StatsSnapshot,
}

/// Controls one node: lifecycle transitions, polling, probe writes.
pub struct NodeController {
    meta: NodeMeta,
    process: Arc<dyn ProcessControl>,
    connector: Arc<dyn LinkConnector>,
    inner: Mutex<Inner>,
    observed: StdMutex<Observed>,
}

impl NodeController {
    pub fn new(
        meta: NodeMeta,
        process: Arc<dyn ProcessControl>,
        connector: Arc<dyn LinkConnector>,
    ) -> Self {
        Self {
            meta,
            process,
            connector,
            inner: Mutex::new(Inner {
                state: NodeState::Stopped,
                link: None,
                probe_start: None,
            }),
            observed: StdMutex::new(Observed {
                state: NodeState::Stopped,
                stats: StatsSnapshot::empty(),
            }),
        }
    }

    pub fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Last observed state, without waiting on in-flight operations
    pub fn state(&self) -> NodeState {
        self.view().state
    }

    /// Last cached snapshot, without waiting on in-flight operations
    pub fn cached_stats(&self) -> StatsSnapshot {
        self.view().stats
    }

    /// Current probe phase, if the node is running one
    pub fn query_phase(&self) -> Option<QueryPhase> {
        match self.state() {
            NodeState::Running { query } => query,
            _ => None,
        }
    }

    /// Start the node: `Stopped/Killed -> Starting -> Running`.
    ///
    /// Brings the process up, then establishes the link. Failure
    /// reverts to the entry state; fatal during initial bring-up,
    /// retried by the fault scheduler during a restart cycle.
    pub async fn start(&self) -> NodeResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.state.can_start() {
            return Err(self.invalid("start", inner.state));
        }
        self.bring_up(&mut inner, NodeState::Starting).await?;
        log_event_with_fields(
            Event::NodeStarted,
            &[
                ("node", self.name()),
                ("endpoint", &self.meta.endpoint.to_string()),
            ],
        );
        Ok(())
    }

    /// Stop the node: close the link, stop the process.
    ///
    /// Idempotent: stopping an already-stopped node is a no-op.
    pub async fn stop(&self) -> NodeResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == NodeState::Stopped {
            return Ok(());
        }
        inner.link = None;
        self.process
            .stop_process(&self.meta.data_dir)
            .await
            .map_err(|e| NodeError::ProcessStop {
                node: self.meta.name.clone(),
                source: e,
            })?;
        self.set_state(&mut inner, NodeState::Stopped);
        log_event_with_fields(Event::NodeStopped, &[("node", self.name())]);
        Ok(())
    }

    /// Suspend WAL replay. Valid only from `Running`.
    ///
    /// While paused, apply positions in subsequent snapshots stop
    /// advancing even though receive positions may continue: that
    /// divergence is the observable pause signal.
    pub async fn pause_replay(&self) -> NodeResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.state.can_pause() {
            return Err(self.invalid("pause replay", inner.state));
        }
        let link = inner.link.as_ref().ok_or_else(|| self.no_link())?;
        link.pause_replay().await.map_err(|e| self.link_err(e))?;
        self.set_state(&mut inner, NodeState::ReplayPaused);
        log_event_with_fields(Event::ReplayPaused, &[("node", self.name())]);
        Ok(())
    }

    /// Resume WAL replay. Valid only from `ReplayPaused`.
    pub async fn resume_replay(&self) -> NodeResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.state.can_resume() {
            return Err(self.invalid("resume replay", inner.state));
        }
        let link = inner.link.as_ref().ok_or_else(|| self.no_link())?;
        link.resume_replay().await.map_err(|e| self.link_err(e))?;
        self.set_state(
            &mut inner,
            NodeState::running(self.meta.role.is_primary()),
        );
        log_event_with_fields(Event::ReplayResumed, &[("node", self.name())]);
        Ok(())
    }

    /// Force the node down: `Running/ReplayPaused -> Killed`.
    ///
    /// The node is Killed from the cluster's point of view even when
    /// the process stop reports an error; the error is still returned
    /// so the caller can log it.
    pub async fn kill(&self) -> NodeResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.state.can_kill() {
            return Err(self.invalid("kill", inner.state));
        }
        inner.link = None;
        let stopped = self.process.stop_process(&self.meta.data_dir).await;
        self.set_state(&mut inner, NodeState::Killed);
        log_event_with_fields(Event::NodeKilled, &[("node", self.name())]);
        stopped.map_err(|e| NodeError::ProcessStop {
            node: self.meta.name.clone(),
            source: e,
        })
    }

    /// Scheduled restart: `Killed -> Restarting -> Running`.
    ///
    /// Failure reverts to `Killed`; the fault scheduler logs and
    /// re-attempts rather than propagating.
    pub async fn restart(&self) -> NodeResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.state.can_restart() {
            return Err(self.invalid("restart", inner.state));
        }
        self.bring_up(&mut inner, NodeState::Restarting).await?;
        log_event_with_fields(Event::NodeRestarted, &[("node", self.name())]);
        Ok(())
    }

    /// Strict poll: fresh snapshot or an error.
    ///
    /// The budget bounds the whole poll, including any wait on an
    /// in-flight lifecycle operation holding the controller lock.
    pub async fn refresh_stats(&self, budget: Duration) -> NodeResult<StatsSnapshot> {
        match time::timeout(budget, self.query_once()).await {
            Ok(result) => result,
            Err(_) => Err(NodeError::PollTimeout {
                node: self.meta.name.clone(),
                budget_ms: budget.as_millis() as u64,
            }),
        }
    }

    /// Graceful poll: degrade to the cached snapshot instead of
    /// erroring, so the aggregated dashboard keeps its shape.
    ///
    /// Transient failures (link errors, timeouts) are logged as
    /// degraded polls; an unpollable state (killed, mid-restart) is
    /// expected and degrades quietly.
    pub async fn poll_stats(&self, budget: Duration) -> PolledStats {
        match self.refresh_stats(budget).await {
            Ok(stats) => PolledStats {
                state: self.state(),
                stats,
                fresh: true,
            },
            Err(err) => {
                if err.is_transient() {
                    log_event_with_fields(
                        Event::PollDegraded,
                        &[("node", self.name()), ("reason", &err.to_string())],
                    );
                }
                let view = self.view();
                PolledStats {
                    state: view.state,
                    stats: view.stats,
                    fresh: false,
                }
            }
        }
    }

    /// Issue one probe write at the primary.
    ///
    /// Captures the current insert position as the probe start, enters
    /// the `QueryRunning` phase, performs the write on a dedicated
    /// short-lived connection (the polling link stays free while the
    /// write blocks on durability acknowledgement), then settles the
    /// phase to `QueryComplete`.
    pub async fn run_probe_write(&self) -> NodeResult<()> {
        if !self.meta.role.is_primary() {
            return Err(NodeError::NotPrimary {
                node: self.meta.name.clone(),
            });
        }

        let start;
        {
            let mut inner = self.inner.lock().await;
            if !matches!(inner.state, NodeState::Running { .. }) {
                return Err(self.invalid("probe write", inner.state));
            }
            let link = inner.link.as_ref().ok_or_else(|| self.no_link())?;
            start = link
                .query_current_position()
                .await
                .map_err(|e| self.link_err(e))?;
            inner.probe_start = Some(start);
            self.set_state(
                &mut inner,
                NodeState::Running {
                    query: Some(QueryPhase::Running),
                },
            );
        }
        log_event_with_fields(
            Event::ProbeWriteStart,
            &[("node", self.name()), ("start_lsn", &start.to_string())],
        );

        let result = match self.connector.connect(&self.meta.endpoint).await {
            Ok(link) => link
                .execute_probe_write()
                .await
                .map_err(|e| self.link_err(e)),
            Err(e) => Err(self.link_err(e)),
        };

        {
            let mut inner = self.inner.lock().await;
            if matches!(inner.state, NodeState::Running { .. }) {
                self.set_state(
                    &mut inner,
                    NodeState::Running {
                        query: Some(QueryPhase::Complete),
                    },
                );
            }
        }
        if result.is_ok() {
            log_event_with_fields(Event::ProbeWriteComplete, &[("node", self.name())]);
        }
        result
    }

    /// The insert position captured before the last probe write
    pub async fn probe_start(&self) -> Option<Lsn> {
        self.inner.lock().await.probe_start
    }

    // -- internals ---------------------------------------------------

    async fn query_once(&self) -> NodeResult<StatsSnapshot> {
        let inner = self.inner.lock().await;
        if !inner.state.is_pollable() {
            return Err(self.invalid("poll stats", inner.state));
        }
        let link = inner.link.as_ref().ok_or_else(|| self.no_link())?;
        let shape = StatusShape::for_role(self.meta.role);
        let stats = link
            .query_replication_status(shape)
            .await
            .map_err(|e| self.link_err(e))?;
        self.mirror(|view| view.stats = stats.clone());
        Ok(stats)
    }

    async fn bring_up(&self, inner: &mut Inner, via: NodeState) -> NodeResult<()> {
        let fallback = inner.state;
        self.set_state(inner, via);

        if let Err(e) = self
            .process
            .start_process(&self.meta.data_dir, self.meta.endpoint.port)
            .await
        {
            self.set_state(inner, fallback);
            return Err(NodeError::ProcessStart {
                node: self.meta.name.clone(),
                source: e,
            });
        }

        match self.connector.connect(&self.meta.endpoint).await {
            Ok(link) => {
                inner.link = Some(link);
                self.set_state(inner, NodeState::running(self.meta.role.is_primary()));
                Ok(())
            }
            Err(e) => {
                // process is up but unreachable; bring it back down
                let _ = self.process.stop_process(&self.meta.data_dir).await;
                self.set_state(inner, fallback);
                Err(self.link_err(e))
            }
        }
    }

    fn set_state(&self, inner: &mut Inner, state: NodeState) {
        inner.state = state;
        self.mirror(|view| view.state = state);
    }

    fn mirror(&self, update: impl FnOnce(&mut Observed)) {
        match self.observed.lock() {
            Ok(mut view) => update(&mut *view),
            Err(poisoned) => update(&mut *poisoned.into_inner()),
        }
    }

    fn view(&self) -> Observed {
        match self.observed.lock() {
            Ok(view) => view.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn invalid(&self, op: &'static str, from: NodeState) -> NodeError {
        NodeError::InvalidTransition {
            node: self.meta.name.clone(),
            op,
            from: from.as_str(),
        }
    }

    fn no_link(&self) -> NodeError {
        NodeError::Link {
            node: self.meta.name.clone(),
            source: LinkError::Connection("link not established".into()),
        }
    }

    fn link_err(&self, source: LinkError) -> NodeError {
        NodeError::Link {
            node: self.meta.name.clone(),
            source,
        }
    }
}
