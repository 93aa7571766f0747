use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for process operations
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// Output read from a process before it was abandoned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl PartialOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Errors that can occur while running a source or parsing its output
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn process: {0}")]
    SpawnError(#[from] io::Error),

    #[error("Failed to wait for process: {0}")]
    WaitError(io::Error),

    #[error("Process timed out after {after:?}")]
    Timeout { after: Duration, partial: PartialOutput },

    #[error("Output streams still open {after:?} after process exit")]
    WaitDelay { after: Duration, partial: PartialOutput },

    #[error("Failed to read from process: {0}")]
    ReadError(io::Error),

    #[error("Process output parse error: {0}")]
    ParseError(String),

    #[error("Other process error: {0}")]
    Other(String),
}

impl ProcessError {
    /// Whatever the process printed before the run was cut short
    pub fn partial(&self) -> Option<&PartialOutput> {
        match self {
            ProcessError::Timeout { partial, .. } | ProcessError::WaitDelay { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
