use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

use crate::config::LogLevel;

/// Log target prefix for per-rule diagnostics
const RULE_TARGET_PREFIX: &str = "mini_metric::rule";

/// Initialize the logging system
pub fn init(level: &LogLevel) {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter(None, level_filter(level))
        .init();
}

fn level_filter(level: &LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    }
}

/// Logging handle scoped to a single rule.
///
/// Records are emitted under the target `mini_metric::rule::<name>`, so
/// one rule can be filtered with `RUST_LOG`-style target directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLog {
    target: String,
}

impl RuleLog {
    /// Create a handle for the named rule
    pub fn for_rule(name: &str) -> Self {
        Self {
            target: format!("{}::{}", RULE_TARGET_PREFIX, name),
        }
    }

    /// Log target for records about this rule
    pub fn target(&self) -> &str {
        &self.target
    }
}
