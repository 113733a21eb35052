//! CLI command implementations
//!
//! `check` validates without side effects; `run` brings the cluster
//! up, starts continuous monitoring, and drives the operator console:
//! each entered line may carry a fault batch, then one probe write is
//! fired at the primary and timed until it is durably acknowledged.

use std::io::{self, Write as _};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::config::ClusterConfig;
use crate::faults::{parse_batch, FaultScheduler};
use crate::monitor::LagMonitor;
use crate::observability::{log_event, Event};
use crate::sim::SimCluster;
use crate::topology::{Topology, TopologyBuilder};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::render::TextPresenter;

/// Cadence of the simulated replication pump
const PUMP_INTERVAL: Duration = Duration::from_millis(50);

/// Dispatch a parsed command line
pub fn run_command(cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Check { config } => check(&config),
        Command::Run { config } => run(&config),
    }
}

/// Load + validate the config, build the topology, print the tree.
/// No processes are started and no links are opened.
pub fn check(path: &Path) -> CliResult<()> {
    let config = ClusterConfig::load(path)?;
    let topology = build_topology(&config, &SimCluster::from_config(&config))?;

    println!(
        "topology ok: {} nodes, {} chains",
        topology.len(),
        topology.chain_count()
    );
    for (depth, controller) in topology.preorder_with_depth() {
        let meta = controller.meta();
        let position = meta
            .position
            .map(|p| format!("chain {} index {}", p.chain, p.index))
            .unwrap_or_else(|| "root".into());
        println!(
            "{}{} ({}, durability={}, {}) [{}]",
            "  ".repeat(depth),
            meta.name,
            meta.role,
            meta.durability,
            meta.endpoint,
            position,
        );
    }
    Ok(())
}

/// Bring the cluster up and run the operator console until EOF or `q`
pub fn run(path: &Path) -> CliResult<()> {
    let config = ClusterConfig::load(path)?;
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime_error(e.to_string()))?;
    runtime.block_on(run_cluster(config))
}

fn build_topology(config: &ClusterConfig, sim: &SimCluster) -> CliResult<Arc<Topology>> {
    let topology = TopologyBuilder::build(
        &config.nodes,
        config.durability,
        sim.process_control(),
        sim.connector(),
    )?;
    Ok(Arc::new(topology))
}

async fn run_cluster(config: ClusterConfig) -> CliResult<()> {
    let sim = SimCluster::from_config(&config);
    let topology = build_topology(&config, &sim)?;

    log_event(Event::BringupStart);
    if let Err(e) = topology.start_all().await {
        // a half-started cluster is torn back down before aborting
        topology.stop_all().await;
        return Err(CliError::bringup_failed(e.to_string()));
    }
    log_event(Event::BringupComplete);

    // simulated replication traffic
    let pump = {
        let sim = sim.clone();
        tokio::spawn(async move {
            loop {
                sim.step();
                tokio::time::sleep(PUMP_INTERVAL).await;
            }
        })
    };

    // continuous monitoring, one render per tick
    let shutdown = CancellationToken::new();
    let monitor_task = {
        let monitor = LagMonitor::new(Arc::clone(&topology), config.poll_timeout());
        let interval = config.poll_interval();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            monitor.run(interval, Arc::new(TextPresenter), shutdown).await;
        })
    };

    let scheduler = FaultScheduler::new(Arc::clone(&topology));
    console(&topology, &scheduler).await?;

    log_event(Event::ShutdownStart);
    shutdown.cancel();
    pump.abort();
    let _ = monitor_task.await;
    topology.stop_all().await;
    log_event(Event::ShutdownComplete);
    Ok(())
}

/// The operator console loop.
///
/// Every line is an optional fault batch (`<action> <chain> <index>
/// <durationOrInf>`, groups of four, repeated); after submitting it,
/// one probe write is fired at the primary and timed until it is
/// durably acknowledged. `q` quits.
async fn console(topology: &Arc<Topology>, scheduler: &FaultScheduler) -> CliResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("commands: apply_stop <chain> <index> <secs|inf>, kill_node <chain> <index> <secs|inf>, q to quit");
    println!("an empty line fires a probe write without faults");

    loop {
        print!("Enter command: ");
        io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let line = line.trim();
        if line == "q" || line == "quit" {
            break;
        }

        match parse_batch(line) {
            Ok(batch) => {
                for request in batch {
                    if let Err(e) = scheduler.submit(request) {
                        eprintln!("fault rejected: {}", e);
                    }
                }
            }
            Err(e) => {
                eprintln!("bad command: {}", e);
                continue;
            }
        }

        // one probe write, timed to durability acknowledgement
        let started = Instant::now();
        let probe = {
            let primary = Arc::clone(topology.primary());
            tokio::spawn(async move { primary.run_probe_write().await })
        };
        match probe.await {
            Ok(Ok(())) => {
                println!("probe write acknowledged in {:.3}s", started.elapsed().as_secs_f64());
            }
            Ok(Err(e)) => eprintln!("probe write failed: {}", e),
            Err(e) => eprintln!("probe task failed: {}", e),
        }
    }
    Ok(())
}
