//! Simulated cluster adapter
//!
//! In-memory implementation of the Node Link and Process Control seams
//! over a cascading-propagation model:
//!
//! - a replica's receive position chases its parent's receive position
//! - its apply position chases its own receive position unless paused
//! - nothing advances on a node that is not running
//!
//! Propagation is driven by explicit `step()` calls so tests control
//! it deterministically; the CLI pumps it on a timer. The cluster also
//! supports unresponsive-link and start-failure injection for timeout
//! and restart-retry coverage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::ClusterConfig;
use crate::node::{
    LinkConnector, LinkError, Lsn, NodeLink, ProcessControl, ProcessError, StatsSnapshot,
    StatusShape,
};
use crate::topology::{DurabilityMode, Endpoint};

/// Initial insert position of the primary
const BASE_LSN: u64 = 0x0100_0000;
/// Log bytes appended by one probe write
const PROBE_DELTA: u64 = 0x1000;
/// Probe writes give up waiting for durability after this long
const ACK_TIMEOUT: Duration = Duration::from_secs(10);

struct SimNode {
    endpoint: Endpoint,
    data_dir: PathBuf,
    parent: Option<String>,
    durability: DurabilityMode,
    primary: bool,
    running: bool,
    paused: bool,
    unresponsive: bool,
    fail_starts: u32,
    /// Primary only: current insert position
    head: u64,
    receive: u64,
    apply: u64,
}

type NodeTable = HashMap<String, SimNode>;

/// An in-memory cascading cluster shared by its links and process
/// control handles.
#[derive(Clone)]
pub struct SimCluster {
    nodes: Arc<Mutex<NodeTable>>,
}

impl SimCluster {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Build a simulated cluster mirroring a cluster config
    pub fn from_config(config: &ClusterConfig) -> Self {
        let cluster = Self::new();
        // parents may be declared after their children; add in passes
        let mut pending: Vec<_> = config.nodes.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|node| {
                let parent_present = match &node.connect_to {
                    None => true,
                    Some(parent) => lock(&cluster.nodes).contains_key(parent),
                };
                if parent_present {
                    cluster.add_node(
                        &node.name,
                        &node.endpoint(),
                        &node.resolved_data_dir(),
                        node.connect_to.as_deref(),
                        node.durability.unwrap_or(config.durability),
                    );
                    false
                } else {
                    true
                }
            });
            if pending.len() == before {
                // dangling parents; the topology builder rejects these
                // configs, so just drop the leftovers
                break;
            }
        }
        cluster
    }

    /// Add one node. The primary (no parent) starts at the base
    /// position; replicas start fully caught up to their parent, as
    /// after a fresh base backup.
    pub fn add_node(
        &self,
        name: &str,
        endpoint: &Endpoint,
        data_dir: &Path,
        parent: Option<&str>,
        durability: DurabilityMode,
    ) {
        let mut nodes = lock(&self.nodes);
        let (primary, start_at) = match parent {
            None => (true, BASE_LSN),
            Some(parent_name) => (
                false,
                nodes.get(parent_name).map(|p| p.receive).unwrap_or(0),
            ),
        };
        nodes.insert(
            name.to_owned(),
            SimNode {
                endpoint: endpoint.clone(),
                data_dir: data_dir.to_owned(),
                parent: parent.map(str::to_owned),
                durability,
                primary,
                running: false,
                paused: false,
                unresponsive: false,
                fail_starts: 0,
                head: if primary { BASE_LSN } else { 0 },
                receive: start_at,
                apply: start_at,
            },
        );
    }

    /// The link connector handle for controllers
    pub fn connector(&self) -> Arc<dyn LinkConnector> {
        Arc::new(SimConnector {
            nodes: Arc::clone(&self.nodes),
        })
    }

    /// The process control handle for controllers
    pub fn process_control(&self) -> Arc<dyn ProcessControl> {
        Arc::new(SimProcess {
            nodes: Arc::clone(&self.nodes),
        })
    }

    /// One propagation round: every replica pulls from its parent's
    /// positions as they stood when the round began, so progress moves
    /// one hop down the tree per round.
    pub fn step(&self) {
        let mut nodes = lock(&self.nodes);
        let before: HashMap<String, (bool, u64)> = nodes
            .iter()
            .map(|(name, n)| (name.clone(), (n.running, n.receive)))
            .collect();

        for node in nodes.values_mut() {
            if !node.running {
                continue;
            }
            if node.primary {
                node.receive = node.head;
            } else if let Some((true, upstream)) =
                node.parent.as_deref().and_then(|p| before.get(p)).copied()
            {
                node.receive = node.receive.max(upstream);
            }
            if !node.paused {
                node.apply = node.receive;
            }
        }
    }

    /// Run `n` propagation rounds
    pub fn step_n(&self, n: usize) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Append `bytes` to the primary's log, as background write
    /// traffic. The primary applies its own writes immediately.
    pub fn advance_head(&self, bytes: u64) {
        let mut nodes = lock(&self.nodes);
        for node in nodes.values_mut() {
            if node.primary {
                node.head += bytes;
                node.receive = node.head;
                node.apply = node.head;
            }
        }
    }

    /// The primary's current insert position
    pub fn head(&self) -> Lsn {
        let nodes = lock(&self.nodes);
        nodes
            .values()
            .find(|n| n.primary)
            .map(|n| Lsn::new(n.head))
            .unwrap_or_default()
    }

    /// A node's current (receive, apply) positions
    pub fn positions(&self, name: &str) -> Option<(Lsn, Lsn)> {
        let nodes = lock(&self.nodes);
        nodes
            .get(name)
            .map(|n| (Lsn::new(n.receive), Lsn::new(n.apply)))
    }

    /// Make a node's link hang on every query, to exercise the poll
    /// budget
    pub fn set_unresponsive(&self, name: &str, stalled: bool) {
        if let Some(node) = lock(&self.nodes).get_mut(name) {
            node.unresponsive = stalled;
        }
    }

    /// Make the next `n` process starts of a node fail
    pub fn fail_next_starts(&self, name: &str, n: u32) {
        if let Some(node) = lock(&self.nodes).get_mut(name) {
            node.fail_starts = n;
        }
    }
}

impl Default for SimCluster {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(nodes: &Arc<Mutex<NodeTable>>) -> MutexGuard<'_, NodeTable> {
    match nodes.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Transitive descendants of a node, for furthest-behind aggregation
fn descendants(nodes: &NodeTable, name: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut frontier = vec![name.to_owned()];
    while let Some(current) = frontier.pop() {
        for (child, node) in nodes.iter() {
            if node.parent.as_deref() == Some(current.as_str()) {
                frontier.push(child.clone());
                out.push(child.clone());
            }
        }
    }
    out
}

struct SimConnector {
    nodes: Arc<Mutex<NodeTable>>,
}

#[async_trait]
impl LinkConnector for SimConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn NodeLink>, LinkError> {
        let nodes = lock(&self.nodes);
        let (name, node) = nodes
            .iter()
            .find(|(_, n)| &n.endpoint == endpoint)
            .ok_or_else(|| LinkError::Connection(format!("unknown endpoint {}", endpoint)))?;
        if !node.running {
            return Err(LinkError::Connection(format!(
                "connection refused at {}",
                endpoint
            )));
        }
        Ok(Box::new(SimLink {
            nodes: Arc::clone(&self.nodes),
            name: name.clone(),
        }))
    }
}

struct SimLink {
    nodes: Arc<Mutex<NodeTable>>,
    name: String,
}

impl SimLink {
    async fn stall_if_unresponsive(&self) {
        let stalled = lock(&self.nodes)
            .get(&self.name)
            .map(|n| n.unresponsive)
            .unwrap_or(false);
        if stalled {
            std::future::pending::<()>().await;
        }
    }

    fn closed(&self) -> LinkError {
        LinkError::Query(format!("server {} closed the connection", self.name))
    }
}

#[async_trait]
impl NodeLink for SimLink {
    async fn query_replication_status(
        &self,
        shape: StatusShape,
    ) -> Result<StatsSnapshot, LinkError> {
        self.stall_if_unresponsive().await;

        let nodes = lock(&self.nodes);
        let node = nodes.get(&self.name).ok_or_else(|| self.closed())?;
        if !node.running {
            return Err(self.closed());
        }

        let mut stats = StatsSnapshot {
            captured_at: Utc::now(),
            ..StatsSnapshot::empty()
        };

        if shape != StatusShape::Primary {
            stats.last_receive_lsn = Some(Lsn::new(node.receive));
            stats.last_apply_lsn = Some(Lsn::new(node.apply));
        }

        if shape != StatusShape::Terminal {
            let downstream = descendants(&nodes, &self.name);
            if !downstream.is_empty() {
                let receives = downstream
                    .iter()
                    .filter_map(|d| nodes.get(d))
                    .map(|d| d.receive);
                let applies = downstream
                    .iter()
                    .filter_map(|d| nodes.get(d))
                    .map(|d| d.apply);
                let min_receive = receives.min().map(Lsn::new);
                stats.write_lsn = min_receive;
                stats.flush_lsn = min_receive;
                stats.apply_lsn = applies.min().map(Lsn::new);
            }
            stats.sent_lsn = Some(Lsn::new(if node.primary { node.head } else { node.receive }));
        }

        if shape == StatusShape::Primary {
            let head = Some(Lsn::new(node.head));
            stats.wait_write_lsn = head;
            stats.wait_flush_lsn = head;
            stats.wait_apply_lsn = head;
        }

        Ok(stats)
    }

    async fn query_current_position(&self) -> Result<Lsn, LinkError> {
        self.stall_if_unresponsive().await;
        let nodes = lock(&self.nodes);
        let node = nodes.get(&self.name).ok_or_else(|| self.closed())?;
        if !node.running {
            return Err(self.closed());
        }
        Ok(Lsn::new(if node.primary { node.head } else { node.receive }))
    }

    async fn pause_replay(&self) -> Result<(), LinkError> {
        let mut nodes = lock(&self.nodes);
        let node = nodes
            .get_mut(&self.name)
            .ok_or_else(|| LinkError::ReplayControl("unknown node".into()))?;
        if !node.running {
            return Err(LinkError::ReplayControl("server is down".into()));
        }
        node.paused = true;
        Ok(())
    }

    async fn resume_replay(&self) -> Result<(), LinkError> {
        let mut nodes = lock(&self.nodes);
        let node = nodes
            .get_mut(&self.name)
            .ok_or_else(|| LinkError::ReplayControl("unknown node".into()))?;
        if !node.running {
            return Err(LinkError::ReplayControl("server is down".into()));
        }
        node.paused = false;
        Ok(())
    }

    /// Appends one probe write, then blocks until every synchronous
    /// node satisfies its durability mode for the new position, the
    /// same back-pressure a synchronous-commit write sees.
    async fn execute_probe_write(&self) -> Result<(), LinkError> {
        self.stall_if_unresponsive().await;

        let target = {
            let mut nodes = lock(&self.nodes);
            let node = nodes.get_mut(&self.name).ok_or_else(|| self.closed())?;
            if !node.primary {
                return Err(LinkError::Query("writes go to the primary".into()));
            }
            node.head += PROBE_DELTA;
            node.receive = node.head;
            node.apply = node.head;
            node.head
        };

        let deadline = tokio::time::Instant::now() + ACK_TIMEOUT;
        loop {
            let acked = {
                let nodes = lock(&self.nodes);
                nodes
                    .values()
                    .filter(|n| !n.primary)
                    .all(|n| match n.durability {
                        DurabilityMode::None => true,
                        DurabilityMode::Write | DurabilityMode::Flush => n.receive >= target,
                        DurabilityMode::Apply => n.apply >= target,
                    })
            };
            if acked {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(LinkError::Query(
                    "probe write timed out waiting for durability acknowledgement".into(),
                ));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

struct SimProcess {
    nodes: Arc<Mutex<NodeTable>>,
}

#[async_trait]
impl ProcessControl for SimProcess {
    async fn start_process(&self, data_dir: &Path, _port: u16) -> Result<(), ProcessError> {
        let mut nodes = lock(&self.nodes);
        let node = nodes
            .values_mut()
            .find(|n| n.data_dir == data_dir)
            .ok_or_else(|| {
                ProcessError::Start(format!("unknown data dir {}", data_dir.display()))
            })?;
        if node.fail_starts > 0 {
            node.fail_starts -= 1;
            return Err(ProcessError::Start("injected start failure".into()));
        }
        node.running = true;
        Ok(())
    }

    async fn stop_process(&self, data_dir: &Path) -> Result<(), ProcessError> {
        let mut nodes = lock(&self.nodes);
        let node = nodes
            .values_mut()
            .find(|n| n.data_dir == data_dir)
            .ok_or_else(|| {
                ProcessError::Stop(format!("unknown data dir {}", data_dir.display()))
            })?;
        // a fresh process comes back with replay running
        node.running = false;
        node.paused = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new("localhost", port)
    }

    fn three_node_line() -> SimCluster {
        let sim = SimCluster::new();
        sim.add_node(
            "master",
            &endpoint(6432),
            Path::new("data/master"),
            None,
            DurabilityMode::Apply,
        );
        sim.add_node(
            "mid",
            &endpoint(6433),
            Path::new("data/mid"),
            Some("master"),
            DurabilityMode::Apply,
        );
        sim.add_node(
            "tail",
            &endpoint(6434),
            Path::new("data/tail"),
            Some("mid"),
            DurabilityMode::Apply,
        );
        sim
    }

    async fn start_all(sim: &SimCluster) {
        let process = sim.process_control();
        for dir in ["data/master", "data/mid", "data/tail"] {
            process.start_process(Path::new(dir), 0).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_propagation_cascades_one_level_per_step() {
        let sim = three_node_line();
        start_all(&sim).await;

        sim.advance_head(0x100);
        let head = sim.head();

        sim.step(); // primary exposes, mid pulls
        assert_eq!(sim.positions("mid").unwrap().0, head);
        assert!(sim.positions("tail").unwrap().0 < head);

        sim.step();
        assert_eq!(sim.positions("tail").unwrap(), (head, head));
    }

    #[tokio::test]
    async fn test_pause_freezes_apply_but_not_receive() {
        let sim = three_node_line();
        start_all(&sim).await;
        sim.step_n(2);

        let connector = sim.connector();
        let link = connector.connect(&endpoint(6433)).await.unwrap();
        link.pause_replay().await.unwrap();

        let (_, apply_before) = sim.positions("mid").unwrap();
        sim.advance_head(0x100);
        sim.step_n(3);

        let (receive, apply) = sim.positions("mid").unwrap();
        assert_eq!(apply, apply_before);
        assert!(receive > apply);

        link.resume_replay().await.unwrap();
        sim.step();
        let (receive, apply) = sim.positions("mid").unwrap();
        assert_eq!(receive, apply);
    }

    #[tokio::test]
    async fn test_stopped_node_refuses_connections_and_stalls_descendants() {
        let sim = three_node_line();
        start_all(&sim).await;
        sim.step_n(2);

        sim.process_control()
            .stop_process(Path::new("data/mid"))
            .await
            .unwrap();
        assert!(sim.connector().connect(&endpoint(6433)).await.is_err());

        let (tail_before, _) = sim.positions("tail").unwrap();
        sim.advance_head(0x100);
        sim.step_n(3);
        assert_eq!(sim.positions("tail").unwrap().0, tail_before);
    }

    #[tokio::test]
    async fn test_status_shapes() {
        let sim = three_node_line();
        start_all(&sim).await;
        sim.step_n(2);

        let connector = sim.connector();

        let primary = connector.connect(&endpoint(6432)).await.unwrap();
        let stats = primary
            .query_replication_status(StatusShape::Primary)
            .await
            .unwrap();
        assert!(stats.wait_apply_lsn.is_some());
        assert!(stats.apply_lsn.is_some());
        assert!(stats.last_apply_lsn.is_none());

        let mid = connector.connect(&endpoint(6433)).await.unwrap();
        let stats = mid
            .query_replication_status(StatusShape::Forwarding)
            .await
            .unwrap();
        assert!(stats.wait_apply_lsn.is_none());
        assert!(stats.apply_lsn.is_some());
        assert!(stats.last_apply_lsn.is_some());

        let tail = connector.connect(&endpoint(6434)).await.unwrap();
        let stats = tail
            .query_replication_status(StatusShape::Terminal)
            .await
            .unwrap();
        assert!(stats.apply_lsn.is_none());
        assert!(stats.last_apply_lsn.is_some());
    }

    #[tokio::test]
    async fn test_probe_write_blocks_until_applied() {
        let sim = three_node_line();
        start_all(&sim).await;
        sim.step_n(2);

        let connector = sim.connector();
        let link = connector.connect(&endpoint(6432)).await.unwrap();

        let pump = {
            let sim = sim.clone();
            tokio::spawn(async move {
                loop {
                    sim.step();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
        };

        link.execute_probe_write().await.unwrap();
        let head = sim.head();
        assert_eq!(sim.positions("tail").unwrap().1, head);
        pump.abort();
    }

    #[tokio::test]
    async fn test_injected_start_failures_consumed() {
        let sim = three_node_line();
        sim.fail_next_starts("master", 1);

        let process = sim.process_control();
        assert!(process
            .start_process(Path::new("data/master"), 0)
            .await
            .is_err());
        assert!(process
            .start_process(Path::new("data/master"), 0)
            .await
            .is_ok());
    }
}
