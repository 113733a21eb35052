//! CLI argument definitions using clap
//!
//! Commands:
//! - cascmon check --config <path>
//! - cascmon run --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cascmon - topology controller and lag monitor for cascading
/// replication clusters
#[derive(Parser, Debug)]
#[command(name = "cascmon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the cluster config and print the resolved topology
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./cascmon.json")]
        config: PathBuf,
    },

    /// Bring the cluster up and run the operator console
    Run {
        /// Path to configuration file
        #[arg(long, default_value = "./cascmon.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
