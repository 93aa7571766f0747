//! Exporter turning shell commands and files into Prometheus metrics

#[cfg(feature = "battery")]
pub mod battery;
pub mod collector;
pub mod config;
pub mod error;
pub mod handler;
pub mod output;
pub mod process;
pub mod rule;
pub mod scrape;
pub mod server;
pub mod util;

/// Re-export of commonly used types for convenience
pub mod prelude {
    pub use crate::collector::{CollectorSet, RuleCollector};
    pub use crate::config::{LogLevel, RuleSet, load_rules};
    pub use crate::error::{MetricError, Result};
    pub use crate::handler::Handler;
    pub use crate::output::{Labels, Output, Sample};
    pub use crate::process::ExecConfig;
    pub use crate::rule::{MetricType, Rule, RuleConfig, SourceKind};
    pub use crate::scrape::Scraper;
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
