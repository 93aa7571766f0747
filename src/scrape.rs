//! Scrape orchestration: run every rule and refresh its collector.

use std::sync::Arc;

use log::{debug, error, info, warn};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::task::JoinSet;

use crate::collector::{CollectorSet, RuleCollector};
use crate::config::RuleSet;
use crate::error::{MetricError, Result};
use crate::process::ExecConfig;
use crate::rule::{Rule, RuleConfig};

/// Runs all rules on demand and renders the registry
pub struct Scraper {
    init_rules: Vec<Arc<Rule>>,
    rules: Vec<(Arc<Rule>, RuleCollector)>,
    collectors: CollectorSet,
    skipped: Vec<String>,
}

impl Scraper {
    /// Classify and register every configured rule.
    ///
    /// Rules that cannot be classified or registered are logged and
    /// skipped; the others still load.
    pub fn load(rules: RuleSet, exec: &ExecConfig, registry: Registry) -> Self {
        let mut scraper = Self {
            init_rules: Vec::new(),
            rules: Vec::new(),
            collectors: CollectorSet::new(registry),
            skipped: Vec::new(),
        };

        for (name, config) in rules {
            info!("Found rule {}", name);
            if let Err(e) = scraper.add(&name, config, exec) {
                error!("Skipping rule {}: {}", name, e);
                scraper.skipped.push(name);
            }
        }

        info!(
            "Loaded {} rules and {} init rules, skipped {}",
            scraper.rules.len(),
            scraper.init_rules.len(),
            scraper.skipped.len()
        );
        scraper
    }

    fn add(&mut self, name: &str, config: RuleConfig, exec: &ExecConfig) -> Result<()> {
        let rule = Rule::from_config(name, config, exec)?;
        debug!("Rule {} is {} from {}", name, rule.kind(), rule.handler().describe());

        if rule.is_init() {
            self.init_rules.push(Arc::new(rule));
            return Ok(());
        }

        let collector = self.collectors.register(&rule)?;
        self.rules.push((Arc::new(rule), collector));
        Ok(())
    }

    /// Names of rules that failed to load
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Registered metric rules
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|(rule, _)| rule.as_ref())
    }

    /// Setup rules run before each scrape
    pub fn init_rules(&self) -> impl Iterator<Item = &Rule> {
        self.init_rules.iter().map(|rule| rule.as_ref())
    }

    pub fn collectors(&self) -> &CollectorSet {
        &self.collectors
    }

    /// Run one scrape cycle.
    ///
    /// Init rules run first, one after another, and their output is
    /// discarded. Metric rules then run concurrently; a failing rule only
    /// affects its own collector.
    pub async fn scrape(&self) {
        for rule in &self.init_rules {
            debug!("Running init rule {}", rule.name());
            let output = rule.handler().exec().await;
            if output.is_nan_sentinel() {
                warn!("Init rule {} failed", rule.name());
            }
        }

        let mut tasks = JoinSet::new();
        for (rule, collector) in &self.rules {
            let rule = Arc::clone(rule);
            let collector = collector.clone();
            tasks.spawn(async move {
                let output = rule.handler().exec().await;
                debug!("Rule {} produced {} samples", rule.name(), output.len());
                collector.apply(&output);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Rule task failed: {}", e);
            }
        }
    }

    /// Encode the current registry state in the text exposition format
    pub fn render(&self) -> Result<String> {
        let families = self.collectors.registry().gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .map_err(|e| MetricError::Render(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricError::Render(e.to_string()))
    }

    /// Scrape, then render
    pub async fn scrape_and_render(&self) -> Result<String> {
        self.scrape().await;
        self.render()
    }
}
