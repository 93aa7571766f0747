use std::collections::BTreeMap;

use log::debug;
use prometheus::Registry;

use crate::error::{MetricError, Result};
use crate::rule::Rule;

use super::core::RuleCollector;

/// Collectors of every registered rule, keyed by rule name.
///
/// Built once at load time; the collectors live as long as the process.
#[derive(Clone)]
pub struct CollectorSet {
    registry: Registry,
    collectors: BTreeMap<String, RuleCollector>,
}

impl CollectorSet {
    /// Create a set registering into `registry`
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            collectors: BTreeMap::new(),
        }
    }

    /// Create and register the collector of a rule
    pub fn register(&mut self, rule: &Rule) -> Result<RuleCollector> {
        if self.collectors.contains_key(rule.name()) {
            return Err(MetricError::registration(rule.name(), "duplicate metric name"));
        }

        let collector = RuleCollector::new(rule.name(), rule.description(), rule.metric_type())?;
        self.registry
            .register(Box::new(collector.clone()))
            .map_err(|e| MetricError::registration(rule.name(), e))?;

        debug!("Registered {} collector {}", rule.metric_type(), rule.name());
        self.collectors.insert(rule.name().to_string(), collector.clone());
        Ok(collector)
    }

    /// Collector of a rule, if registered
    pub fn get(&self, name: &str) -> Option<&RuleCollector> {
        self.collectors.get(name)
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Registry the collectors are registered into
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ExecConfig;
    use crate::rule::RuleConfig;
    use prometheus::Gauge;

    fn rule(name: &str) -> Rule {
        Rule::from_config(
            name,
            RuleConfig {
                command: Some("echo 1".to_string()),
                ..Default::default()
            },
            &ExecConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_register_once() {
        let mut set = CollectorSet::new(Registry::new());
        set.register(&rule("disk_free")).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get("disk_free").is_some());

        let err = set.register(&rule("disk_free")).unwrap_err();
        assert!(matches!(err, MetricError::Registration { .. }));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_clash_with_foreign_collector() {
        let registry = Registry::new();
        registry
            .register(Box::new(Gauge::new("battery_percent", "Battery").unwrap()))
            .unwrap();

        let mut set = CollectorSet::new(registry);
        let err = set.register(&rule("battery_percent")).unwrap_err();
        assert!(matches!(err, MetricError::Registration { .. }));
        assert!(set.is_empty());
    }

    #[test]
    fn test_invalid_name_is_registration_error() {
        let mut set = CollectorSet::new(Registry::new());
        assert!(set.register(&rule("not-valid")).is_err());
    }
}
