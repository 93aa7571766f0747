//! Samples produced by one execution of a data source

use std::collections::BTreeMap;

/// Label set attached to a sample, ordered by label name
pub type Labels = BTreeMap<String, String>;

/// One labeled reading
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Label set, `None` when the source emitted no labels
    pub labels: Option<Labels>,
    /// The reading, NaN when unavailable
    pub value: f64,
}

impl Sample {
    /// Create an unlabeled sample
    pub fn new(value: f64) -> Self {
        Self {
            labels: None,
            value,
        }
    }

    /// Create a labeled sample
    pub fn with_labels(labels: Labels, value: f64) -> Self {
        Self {
            labels: Some(labels),
            value,
        }
    }

    /// Labels of the sample, empty when none were emitted
    pub fn label_set(&self) -> Labels {
        self.labels.clone().unwrap_or_default()
    }
}

/// Ordered samples from one handler execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output(pub Vec<Sample>);

impl Output {
    /// The failure sentinel: a single unlabeled NaN sample
    pub fn nan() -> Self {
        Output(vec![Sample::new(f64::NAN)])
    }

    /// Whether this output is exactly the failure sentinel
    pub fn is_nan_sentinel(&self) -> bool {
        matches!(self.0.as_slice(), [only] if only.labels.is_none() && only.value.is_nan())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.0.iter()
    }
}

impl From<Vec<Sample>> for Output {
    fn from(samples: Vec<Sample>) -> Self {
        Output(samples)
    }
}

impl<'a> IntoIterator for &'a Output {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_sentinel_shape() {
        let out = Output::nan();
        assert_eq!(out.len(), 1);
        assert!(out.0[0].labels.is_none());
        assert!(out.0[0].value.is_nan());
        assert!(out.is_nan_sentinel());
    }

    #[test]
    fn test_empty_output_is_not_sentinel() {
        assert!(!Output::default().is_nan_sentinel());

        let labeled = Output(vec![Sample::with_labels(
            Labels::from([("type".to_string(), "disk".to_string())]),
            f64::NAN,
        )]);
        assert!(!labeled.is_nan_sentinel());
    }
}
