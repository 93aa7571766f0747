//! Rules pair a data source with the metric it feeds.

use std::fmt;
use std::path::PathBuf;

use log::warn;
use serde::Deserialize;

use crate::error::{MetricError, Result};
use crate::handler::{FileHandler, Handler, ShellHandler};
use crate::process::ExecConfig;
use crate::util::RuleLog;

/// Family of the collector a rule feeds
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Value may go up and down
    #[default]
    Gauge,
    /// Monotonically increasing value
    Counter,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricType::Gauge => write!(f, "gauge"),
            MetricType::Counter => write!(f, "counter"),
        }
    }
}

/// How a rule is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Shell command
    Shell,
    /// File contents
    File,
    /// Setup step run before every scrape, never exported
    Init,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Shell => write!(f, "shell"),
            SourceKind::File => write!(f, "file"),
            SourceKind::Init => write!(f, "init"),
        }
    }
}

/// One rule entry of the configuration file, keyed by metric name
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RuleConfig {
    /// Help text of the metric
    #[serde(default)]
    pub description: String,
    /// `gauge` or `counter`
    #[serde(default, alias = "type")]
    pub metric_type: MetricType,
    /// Shell command producing the samples
    #[serde(default)]
    pub command: Option<String>,
    /// File holding the samples
    #[serde(default)]
    pub file: Option<String>,
    /// Deprecated: label names are taken from the output
    #[serde(default)]
    pub labels: Vec<String>,
    /// Run as a setup step before each scrape instead of exporting a metric
    #[serde(default)]
    pub init: bool,
}

/// A classified rule with its handler
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    description: String,
    metric_type: MetricType,
    labels: Vec<String>,
    kind: SourceKind,
    handler: Handler,
}

impl Rule {
    /// Classify a configured rule and build its handler.
    ///
    /// Exactly one of `command` and `file` must be non-blank.
    pub fn from_config(name: &str, config: RuleConfig, exec: &ExecConfig) -> Result<Self> {
        let log = RuleLog::for_rule(name);

        let command = non_blank(config.command);
        let file = non_blank(config.file);

        let handler = match (command, file) {
            (Some(command), None) => Handler::Shell(ShellHandler::new(command, *exec, log.clone())),
            (None, Some(file)) => Handler::File(FileHandler::new(PathBuf::from(file), log.clone())),
            (Some(_), Some(_)) => {
                return Err(MetricError::classification(name, "both command and file are set"));
            }
            (None, None) => {
                return Err(MetricError::classification(name, "neither command nor file is set"));
            }
        };

        let kind = match (&handler, config.init) {
            (_, true) => SourceKind::Init,
            (Handler::Shell(_), false) => SourceKind::Shell,
            (Handler::File(_), false) => SourceKind::File,
        };

        if !config.labels.is_empty() {
            warn!(
                target: log.target(),
                "labels {:?} are deprecated and ignored, label names come from the output",
                config.labels
            );
        }

        Ok(Self {
            name: name.to_string(),
            description: config.description,
            metric_type: config.metric_type,
            labels: config.labels,
            kind,
            handler,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Label names declared in the configuration (deprecated)
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn is_init(&self) -> bool {
        self.kind == SourceKind::Init
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
