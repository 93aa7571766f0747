//! Live metric state for one rule, keyed by label set
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, RwLock};

use log::{error, warn};
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Counter, Gauge, Opts};

use crate::error::{MetricError, Result};
use crate::output::{Labels, Output, Sample};
use crate::rule::MetricType;
use crate::util::RuleLog;

/// One time series of a rule
#[derive(Clone)]
enum Series {
    Gauge(Gauge),
    Counter(Counter),
}

impl Series {
    fn new(metric_type: MetricType, opts: Opts) -> prometheus::Result<Self> {
        Ok(match metric_type {
            MetricType::Gauge => Series::Gauge(Gauge::with_opts(opts)?),
            MetricType::Counter => Series::Counter(Counter::with_opts(opts)?),
        })
    }

    fn set(&self, value: f64, log: &RuleLog) {
        match self {
            Series::Gauge(gauge) => gauge.set(value),
            Series::Counter(counter) => {
                if value.is_nan() || value < 0.0 {
                    warn!(target: log.target(), "Counter cannot hold {}, keeping {}", value, counter.get());
                    return;
                }
                // Counters only expose inc_by; reset first so the stored
                // value is exactly what the source reported.
                counter.reset();
                counter.inc_by(value);
            }
        }
    }

    fn get(&self) -> f64 {
        match self {
            Series::Gauge(gauge) => gauge.get(),
            Series::Counter(counter) => counter.get(),
        }
    }

    fn collect(&self) -> Vec<MetricFamily> {
        match self {
            Series::Gauge(gauge) => gauge.collect(),
            Series::Counter(counter) => counter.collect(),
        }
    }
}

struct Inner {
    name: String,
    help: String,
    metric_type: MetricType,
    desc: Desc,
    series: RwLock<HashMap<Labels, Series>>,
    log: RuleLog,
}

/// Registry collector bound to one rule name.
///
/// Each distinct label set gets its own series. Series are never removed:
/// a label set that stops appearing keeps its last value until the
/// process restarts.
#[derive(Clone)]
pub struct RuleCollector {
    inner: Arc<Inner>,
}

impl fmt::Debug for RuleCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleCollector")
            .field("name", &self.inner.name)
            .field("metric_type", &self.inner.metric_type)
            .field("series", &self.series_count())
            .finish()
    }
}

impl RuleCollector {
    /// Create a collector; fails on an invalid metric name
    pub fn new(name: &str, help: &str, metric_type: MetricType) -> Result<Self> {
        // The registry rejects empty help strings
        let help = if help.trim().is_empty() { name } else { help };
        let desc = Desc::new(name.to_string(), help.to_string(), Vec::new(), HashMap::new())
            .map_err(|e| MetricError::registration(name, e))?;

        Ok(Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                help: help.to_string(),
                metric_type,
                desc,
                series: RwLock::new(HashMap::new()),
                log: RuleLog::for_rule(name),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn metric_type(&self) -> MetricType {
        self.inner.metric_type
    }

    /// Store `sample.value` as the current value of its label set
    pub fn upsert(&self, sample: &Sample) -> Result<()> {
        let mut series = self
            .inner
            .series
            .write()
            .map_err(|_| MetricError::Other("Lock poisoned".to_string()))?;

        let entry = match series.entry(sample.label_set()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let opts = Opts::new(self.inner.name.clone(), self.inner.help.clone())
                    .const_labels(entry.key().clone().into_iter().collect());
                let created = Series::new(self.inner.metric_type, opts)
                    .map_err(|e| MetricError::registration(&self.inner.name, e))?;
                entry.insert(created)
            }
        };

        entry.set(sample.value, &self.inner.log);
        Ok(())
    }

    /// Upsert every sample of an output; bad samples are logged and skipped
    pub fn apply(&self, output: &Output) {
        for sample in output {
            if let Err(e) = self.upsert(sample) {
                warn!(target: self.inner.log.target(), "Dropping sample {:?}: {}", sample, e);
            }
        }
    }

    /// Current value of a label set, `None` if it was never written
    pub fn value(&self, labels: &Labels) -> Option<f64> {
        let series = self.inner.series.read().ok()?;
        series.get(labels).map(Series::get)
    }

    /// Number of label sets seen so far
    pub fn series_count(&self) -> usize {
        self.inner.series.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl Collector for RuleCollector {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.inner.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        match self.inner.series.read() {
            Ok(series) => series.values().flat_map(Series::collect).collect(),
            Err(_) => {
                error!(target: self.inner.log.target(), "Series lock poisoned, skipping collection");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, Registry, TextEncoder};

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn render(collector: &RuleCollector) -> String {
        let registry = Registry::new();
        registry.register(Box::new(collector.clone())).unwrap();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_gauge_upsert_replaces_value() {
        let collector = RuleCollector::new("disk_free", "Free disk", MetricType::Gauge).unwrap();
        collector.upsert(&Sample::new(0.5)).unwrap();
        collector.upsert(&Sample::new(0.73)).unwrap();
        assert_eq!(collector.value(&Labels::new()), Some(0.73));
        assert_eq!(collector.series_count(), 1);
    }

    #[test]
    fn test_label_sets_are_independent() {
        let collector = RuleCollector::new("temp", "Temperature", MetricType::Gauge).unwrap();
        collector.apply(&Output(vec![
            Sample::with_labels(labels(&[("sensor", "cpu")]), 42.5),
            Sample::with_labels(labels(&[("sensor", "gpu")]), 55.0),
        ]));
        collector.apply(&Output(vec![Sample::with_labels(labels(&[("sensor", "cpu")]), 40.0)]));

        assert_eq!(collector.value(&labels(&[("sensor", "cpu")])), Some(40.0));
        // Stale label sets keep their last value
        assert_eq!(collector.value(&labels(&[("sensor", "gpu")])), Some(55.0));
    }

    #[test]
    fn test_gauge_keeps_nan() {
        let collector = RuleCollector::new("broken", "Broken", MetricType::Gauge).unwrap();
        collector.apply(&Output::nan());
        assert!(collector.value(&Labels::new()).unwrap().is_nan());
        assert!(render(&collector).contains("broken NaN"));
    }

    #[test]
    fn test_counter_tracks_reported_value() {
        let collector = RuleCollector::new("requests_total", "Requests", MetricType::Counter).unwrap();
        collector.upsert(&Sample::new(10.0)).unwrap();
        collector.upsert(&Sample::new(0.3)).unwrap();
        assert_eq!(collector.value(&Labels::new()), Some(0.3));

        collector.upsert(&Sample::new(f64::NAN)).unwrap();
        collector.upsert(&Sample::new(-1.0)).unwrap();
        assert_eq!(collector.value(&Labels::new()), Some(0.3));

        let text = render(&collector);
        assert!(text.contains("# TYPE requests_total counter"));
        assert!(text.contains("requests_total 0.3"));
    }

    #[test]
    fn test_render_merges_label_sets() {
        let collector = RuleCollector::new("temp", "Temperature", MetricType::Gauge).unwrap();
        collector.upsert(&Sample::with_labels(labels(&[("sensor", "cpu")]), 42.5)).unwrap();
        collector.upsert(&Sample::with_labels(labels(&[("sensor", "gpu")]), 50.0)).unwrap();

        let text = render(&collector);
        assert_eq!(text.matches("# TYPE temp gauge").count(), 1);
        assert!(text.contains("temp{sensor=\"cpu\"} 42.5"));
        assert!(text.contains("temp{sensor=\"gpu\"} 50"));
    }

    #[test]
    fn test_invalid_label_name_is_rejected() {
        let collector = RuleCollector::new("temp", "Temperature", MetricType::Gauge).unwrap();
        let err = collector
            .upsert(&Sample::with_labels(labels(&[("0bad", "x")]), 1.0))
            .unwrap_err();
        assert!(matches!(err, MetricError::Registration { .. }));
        assert_eq!(collector.series_count(), 0);
    }

    #[test]
    fn test_invalid_metric_name_is_rejected() {
        let err = RuleCollector::new("bad-name", "x", MetricType::Gauge).unwrap_err();
        assert!(matches!(err, MetricError::Registration { .. }));
    }

    #[test]
    fn test_empty_help_falls_back_to_name() {
        let collector = RuleCollector::new("plain", "", MetricType::Gauge).unwrap();
        collector.upsert(&Sample::new(1.0)).unwrap();
        assert!(render(&collector).contains("# HELP plain plain"));
    }
}
