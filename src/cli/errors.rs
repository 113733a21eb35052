//! CLI-specific error types
//!
//! All CLI errors are fatal: they halt the controller with a coded
//! diagnostic before or during bring-up.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::topology::TopologyError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// Malformed or disconnected topology definition
    TopologyError,
    /// Initial cluster bring-up failed
    BringupFailed,
    /// I/O error (stdin/stdout)
    IoError,
    /// Async runtime could not be created
    RuntimeError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "CASCMON_CLI_CONFIG_ERROR",
            Self::TopologyError => "CASCMON_CLI_TOPOLOGY_ERROR",
            Self::BringupFailed => "CASCMON_CLI_BRINGUP_FAILED",
            Self::IoError => "CASCMON_CLI_IO_ERROR",
            Self::RuntimeError => "CASCMON_CLI_RUNTIME_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// Topology error
    pub fn topology_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::TopologyError, msg)
    }

    /// Bring-up failure
    pub fn bringup_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BringupFailed, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Runtime error
    pub fn runtime_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RuntimeError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<TopologyError> for CliError {
    fn from(e: TopologyError) -> Self {
        Self::topology_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = CliError::config_error("bad json");
        let msg = err.to_string();
        assert!(msg.contains("CASCMON_CLI_CONFIG_ERROR"));
        assert!(msg.contains("bad json"));
    }

    #[test]
    fn test_topology_error_converts() {
        let err: CliError = TopologyError::NoPrimary.into();
        assert_eq!(err.code(), &CliErrorCode::TopologyError);
    }
}
