//! Running external data sources and parsing what they print
//!
//! This module spawns subprocesses under a time bound, captures their
//! output streams concurrently, and turns the captured text into samples.

mod command;
mod error;
mod parsers;
mod stream;

pub use command::{CapturedOutput, Command, ProcessHandle};
pub use error::{PartialOutput, ProcessError, ProcessResult};
pub use parsers::{OutputParser, SHORTHAND_LABEL, parse_labels};
pub use stream::{StreamParser, collect_records};

use std::time::Duration;

/// Grace period after a termination request, and the bound on output
/// streams staying open after the process exited
pub const DEFAULT_WAIT_DELAY: Duration = Duration::from_secs(10);

/// Maximum run time of a source before it is asked to terminate
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for process execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecConfig {
    /// Maximum time to wait for the process to exit on its own
    pub timeout: Duration,

    /// Grace period between SIGTERM and SIGKILL, also bounding how long
    /// output streams may stay open after exit
    pub wait_delay: Duration,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            wait_delay: DEFAULT_WAIT_DELAY,
        }
    }
}

impl ExecConfig {
    /// Default settings with a custom run time bound
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}
