//! CLI module for cascmon
//!
//! Provides the command-line surface:
//! - check: validate config and print the resolved topology
//! - run: bring the cluster up, monitor it, drive the operator console

mod args;
mod commands;
mod errors;
mod render;

pub use args::{Cli, Command};
pub use commands::{check, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use render::{render_to_string, TextPresenter};

/// Parse arguments and dispatch. The entry point `main.rs` delegates
/// here and only maps the error to an exit code.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli)
}
