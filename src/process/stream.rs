use log::trace;

use super::error::ProcessResult;

/// Trait for parsing a line of output into a record
pub trait StreamParser<T>: Send + Sync + 'static {
    /// Parse a line of output into a record, `None` skips the line
    fn parse(&self, line: &str) -> ProcessResult<Option<T>>;
}

/// Run a parser over every line of `text` and collect the records.
///
/// Stops at the first error; records parsed before it are dropped.
pub fn collect_records<T, P: StreamParser<T>>(text: &str, parser: &P) -> ProcessResult<Vec<T>> {
    let mut records = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        trace!("line {}: {:?}", idx + 1, line);
        if let Some(record) = parser.parse(line)? {
            records.push(record);
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessError;

    struct Digits;

    impl StreamParser<u32> for Digits {
        fn parse(&self, line: &str) -> ProcessResult<Option<u32>> {
            if line.is_empty() {
                return Ok(None);
            }
            line.parse()
                .map(Some)
                .map_err(|_| ProcessError::ParseError(line.to_string()))
        }
    }

    #[test]
    fn test_collect_skips_none() {
        let records = collect_records("1\n\n2\n3", &Digits).unwrap();
        assert_eq!(records, vec![1, 2, 3]);
    }

    #[test]
    fn test_collect_stops_on_error() {
        let err = collect_records("1\nx\n3\n", &Digits).unwrap_err();
        assert!(matches!(err, ProcessError::ParseError(ref l) if l == "x"));
    }
}
