//! Parser for the line-oriented sample format emitted by sources.
//!
//! Every line holds one sample:
//!
//! ```text
//! [label1="value1",label2="value2"] <float>
//! ```
//!
//! The label segment is optional, its brackets are optional, and pairs may
//! be separated by commas or whitespace. A bare word without `=` or `,` is
//! shorthand for `type="<word>"`.

use std::sync::LazyLock;

use log::{debug, trace};
use regex::Regex;

use crate::output::{Labels, Output, Sample};
use crate::process::error::{ProcessError, ProcessResult};
use crate::process::stream::{StreamParser, collect_records};
use crate::util::RuleLog;

static LABEL_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z0-9_]+)="(.*?)""#).expect("label pair pattern is valid")
});

/// Label name used by the bare-word shorthand
pub const SHORTHAND_LABEL: &str = "type";

/// Parser turning source output into samples
#[derive(Debug, Clone)]
pub struct OutputParser {
    log: RuleLog,
}

impl OutputParser {
    /// Create a parser logging under the given rule
    pub fn new(log: RuleLog) -> Self {
        Self { log }
    }

    /// Parse a complete source output.
    ///
    /// All-or-nothing: a malformed line fails the whole output.
    pub fn parse_output(&self, raw: &[u8]) -> ProcessResult<Output> {
        let id: u32 = rand::random();
        debug!(target: self.log.target(), "[parse {:08x}] parsing {} bytes", id, raw.len());

        let text = std::str::from_utf8(raw)
            .map_err(|e| ProcessError::ParseError(format!("output is not valid UTF-8: {}", e)))?;

        let samples = collect_records(text, self).inspect_err(|e| {
            debug!(target: self.log.target(), "[parse {:08x}] failed: {}", id, e);
        })?;

        debug!(target: self.log.target(), "[parse {:08x}] done, {} samples", id, samples.len());
        Ok(Output(samples))
    }
}

impl StreamParser<Sample> for OutputParser {
    fn parse(&self, line: &str) -> ProcessResult<Option<Sample>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (segment, raw_value) = match line.rsplit_once(char::is_whitespace) {
            Some((segment, value)) => (segment.trim(), value),
            None => ("", line),
        };

        let value: f64 = raw_value.parse().map_err(|e| {
            ProcessError::ParseError(format!("invalid float value {:?}: {}", raw_value, e))
        })?;
        trace!(target: self.log.target(), "value {} with label segment {:?}", value, segment);

        Ok(Some(match parse_labels(segment) {
            Some(labels) => Sample::with_labels(labels, value),
            None => Sample::new(value),
        }))
    }
}

/// Decode a label segment, `None` when it carries no labels
pub fn parse_labels(segment: &str) -> Option<Labels> {
    let segment = strip_brackets(segment.trim());
    if segment.is_empty() {
        return None;
    }

    let mut labels: Labels = LABEL_PAIR
        .captures_iter(segment)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect();

    if labels.is_empty() && !segment.contains(['=', ',']) {
        labels.insert(SHORTHAND_LABEL.to_string(), segment.to_string());
    }

    if labels.is_empty() { None } else { Some(labels) }
}

fn strip_brackets(segment: &str) -> &str {
    let segment = segment.strip_prefix('[').unwrap_or(segment);
    segment.strip_suffix(']').unwrap_or(segment).trim()
}
