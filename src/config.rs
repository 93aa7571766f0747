use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error::{MetricError, Result};
use crate::rule::RuleConfig;

/// Rules keyed by metric name, ordered by name
pub type RuleSet = BTreeMap<String, RuleConfig>;

/// Logging level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level
    #[default]
    Info,
    /// Debug level
    Debug,
    /// Trace level
    Trace,
}

/// Source of configuration
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// TOML file, must exist
    File(PathBuf),
    /// TOML string
    Toml(String),
}

/// Load configuration from the given sources, later sources overriding
/// earlier ones
pub fn load_config<T>(sources: Vec<ConfigSource>) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let mut builder = config::Config::builder();

    for source in sources {
        match source {
            ConfigSource::File(path) => {
                debug!("Loading TOML configuration from file: {}", path.display());
                builder = builder.add_source(
                    config::File::from(path.as_path())
                        .format(config::FileFormat::Toml)
                        .required(true),
                );
            }
            ConfigSource::Toml(toml_str) => {
                debug!("Loading configuration from TOML string");
                builder = builder.add_source(config::File::from_str(&toml_str, config::FileFormat::Toml));
            }
        }
    }

    let config = builder
        .build()
        .map_err(|e| MetricError::Config(format!("Failed to build configuration: {}", e)))?;

    config
        .try_deserialize()
        .map_err(|e| MetricError::Config(format!("Failed to deserialize configuration: {}", e)))
}

/// Load the rule file
pub fn load_rules<P: AsRef<Path>>(path: P) -> Result<RuleSet> {
    ConfigBuilder::new().add_file(path).build()
}

/// Configuration builder
pub struct ConfigBuilder<T: for<'de> Deserialize<'de>> {
    sources: Vec<ConfigSource>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: for<'de> Deserialize<'de>> ConfigBuilder<T> {
    /// Create a new config builder
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Add a TOML file source
    pub fn add_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sources.push(ConfigSource::File(path.as_ref().to_path_buf()));
        self
    }

    /// Add TOML string
    pub fn add_toml(mut self, toml: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Toml(toml.into()));
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<T> {
        load_config::<T>(self.sources)
    }
}

impl<T: for<'de> Deserialize<'de>> Default for ConfigBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::MetricType;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_load_rules_from_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [disk_free]
            description = "Free space on /"
            command = "echo 0.73"

            [temp]
            metric_type = "counter"
            file = "/sys/class/thermal/thermal_zone0/temp"
            "#
        )
        .unwrap();

        let rules = load_rules(file.path()).unwrap();
        assert_eq!(rules.len(), 2);

        let disk = &rules["disk_free"];
        assert_eq!(disk.description, "Free space on /");
        assert_eq!(disk.command.as_deref(), Some("echo 0.73"));
        assert_eq!(disk.metric_type, MetricType::Gauge);

        let temp = &rules["temp"];
        assert_eq!(temp.metric_type, MetricType::Counter);
        assert_eq!(temp.file.as_deref(), Some("/sys/class/thermal/thermal_zone0/temp"));
        assert!(!temp.init);
    }

    #[test]
    fn test_type_alias_and_init() {
        let rules: RuleSet = ConfigBuilder::new()
            .add_toml(
                r#"
                [warmup]
                command = "true"
                init = true

                [requests]
                type = "counter"
                command = "echo 3"
                labels = ["path"]
                "#,
            )
            .build()
            .unwrap();

        assert!(rules["warmup"].init);
        assert_eq!(rules["requests"].metric_type, MetricType::Counter);
        assert_eq!(rules["requests"].labels, vec!["path".to_string()]);
    }

    #[test]
    fn test_unknown_metric_type_is_decode_error() {
        let err = ConfigBuilder::<RuleSet>::new()
            .add_toml(
                r#"
                [bad]
                metric_type = "Gauge"
                command = "echo 1"
                "#,
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, MetricError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_rules(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, MetricError::Config(_)));
    }

    #[test]
    fn test_empty_config_has_no_rules() {
        let rules: RuleSet = ConfigBuilder::new().add_toml("").build().unwrap();
        assert!(rules.is_empty());
    }
}
