//! Process Control: the provisioning channel for one instance
//!
//! Implemented by the orchestration layer (pg_ctl, container exec, or
//! the simulated cluster). The controller calls it on start/stop/kill;
//! nothing else touches process lifecycles.

use std::path::Path;

use async_trait::async_trait;

use super::errors::ProcessError;

/// Starts and stops the underlying database process for one node.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Bring the process up on `port`, serving from `data_dir`
    async fn start_process(&self, data_dir: &Path, port: u16) -> Result<(), ProcessError>;

    /// Bring the process down. Stopping an already-stopped process is
    /// a no-op, not an error.
    async fn stop_process(&self, data_dir: &Path) -> Result<(), ProcessError>;
}
