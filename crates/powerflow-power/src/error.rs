//! Error types for power operations
//!
//! Failures fall into three classes callers must be able to tell apart:
//! the power CLI could not be found, it ran but failed, or it succeeded and
//! left the host in the wrong power state.

use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Details of a power CLI run that exited unsuccessfully
#[derive(Debug)]
pub struct CommandFailureInfo {
    pub command: String,
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl std::fmt::Display for CommandFailureInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "command [{}] exited with status {}",
            self.command, self.status
        )?;
        write!(f, "  stdout: {}", self.stdout.trim())?;
        write!(f, "  stderr: {}", self.stderr.trim())
    }
}

/// The power CLI could not be located
#[derive(Debug, Error)]
#[error("power CLI '{name}' not found: {reason}")]
pub struct ResolutionError {
    pub name: String,
    pub reason: String,
}

/// The power CLI was found but did not run to a successful exit
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The process could not be spawned
    #[error("failed to start [{command}]: {err}")]
    Start {
        command: String,
        #[source]
        err: std::io::Error,
    },

    /// The process ran and exited non-zero
    #[error("{0}")]
    CommandFailure(Box<CommandFailureInfo>),

    /// Reading output or waiting on the process failed
    #[error("I/O error while running [{command}]: {err}")]
    Io {
        command: String,
        #[source]
        err: std::io::Error,
    },

    /// The deadline passed and the process was killed
    #[error("[{command}] timed out after {timeout:?}")]
    Timeout {
        command: String,
        timeout: Duration,
        stdout: String,
    },

    /// The caller cancelled the run and the process was killed
    #[error("[{command}] cancelled")]
    Cancelled { command: String, stdout: String },
}

impl ExecutionError {
    /// Whatever the process wrote to stdout before failing
    pub fn stdout(&self) -> Option<&str> {
        match self {
            ExecutionError::CommandFailure(info) => Some(info.stdout.as_str()),
            ExecutionError::Timeout { stdout, .. } | ExecutionError::Cancelled { stdout, .. } => {
                Some(stdout.as_str())
            }
            ExecutionError::Start { .. } | ExecutionError::Io { .. } => None,
        }
    }

    /// Exit code of the process, when it exited on its own
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionError::CommandFailure(info) => info.status.code(),
            _ => None,
        }
    }
}

/// Coarse classification of a [`PowerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerErrorKind {
    Resolution,
    Execution,
    WrongPowerState,
    InvalidRequest,
}

/// Error type for power operations
#[derive(Debug, Error)]
pub enum PowerError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// The CLI succeeded but the host reports an unexpected state
    #[error("BMC is in wrong power state: expected {expected}, got {actual:?}")]
    WrongPowerState {
        expected: &'static str,
        actual: String,
    },

    /// The request could not be understood
    #[error("invalid power request: {0}")]
    InvalidRequest(String),
}

impl PowerError {
    pub fn kind(&self) -> PowerErrorKind {
        match self {
            PowerError::Resolution(_) => PowerErrorKind::Resolution,
            PowerError::Execution(_) => PowerErrorKind::Execution,
            PowerError::WrongPowerState { .. } => PowerErrorKind::WrongPowerState,
            PowerError::InvalidRequest(_) => PowerErrorKind::InvalidRequest,
        }
    }

    pub fn is_wrong_power_state(&self) -> bool {
        self.kind() == PowerErrorKind::WrongPowerState
    }
}

impl From<serde_json::Error> for PowerError {
    fn from(err: serde_json::Error) -> Self {
        PowerError::InvalidRequest(err.to_string())
    }
}

/// Result type for power operations
pub type Result<T> = std::result::Result<T, PowerError>;
