//! Execution-sample source reader.
//!
//! The shipped source is a JSON Lines file with one event per line, shaped
//! like the event objects of `jfr print --json`:
//!
//! ```text
//! {"type":"jdk.ExecutionSample","values":{"startTime":"2024-01-15T12:00:00.010Z",
//!  "stackTrace":{"frames":[{"method":{"type":{"name":"demo.Load"},"name":"work3"},"lineNumber":12}]}}}
//! ```
//!
//! Any iterator of `Result<SourceEvent, SampleSourceError>` is a valid
//! [`SampleSource`], so other producers can be plugged into ingestion.

use crate::utils::config::EXECUTION_SAMPLE_EVENT;
use crate::utils::error::SampleSourceError;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// One frame of a captured call stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Declaring type name (e.g. "demo.Top10Load")
    pub type_name: String,

    /// Method name
    pub method: String,

    /// Source line, -1 when unknown
    pub line: i32,
}

impl StackFrame {
    pub fn new(type_name: impl Into<String>, method: impl Into<String>, line: i32) -> Self {
        Self {
            type_name: type_name.into(),
            method: method.into(),
            line,
        }
    }

    /// Attribution key: `<type>.<method>`
    pub fn key(&self) -> String {
        format!("{}.{}", self.type_name, self.method)
    }
}

/// A timestamped call stack, frames ordered leaf to root
///
/// `frames` is `None` when the profiler recorded no stack at all.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSample {
    pub timestamp: DateTime<Utc>,
    pub frames: Option<Vec<StackFrame>>,
}

/// Event read from a sample source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    ExecutionSample(ExecutionSample),
    /// Any other event kind, identified by its type name
    Other(String),
}

/// Sequential stream of profiler events
pub trait SampleSource: Iterator<Item = Result<SourceEvent, SampleSourceError>> {}

impl<T> SampleSource for T where T: Iterator<Item = Result<SourceEvent, SampleSourceError>> {}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,

    #[serde(default)]
    values: RawValues,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawValues {
    #[serde(default)]
    start_time: Option<String>,

    #[serde(default)]
    stack_trace: Option<RawStackTrace>,
}

#[derive(Debug, Deserialize)]
struct RawStackTrace {
    #[serde(default)]
    frames: Vec<RawFrame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFrame {
    method: RawMethod,

    #[serde(default = "unknown_line")]
    line_number: i32,
}

#[derive(Debug, Deserialize)]
struct RawMethod {
    #[serde(rename = "type")]
    declaring_type: RawType,

    name: String,
}

#[derive(Debug, Deserialize)]
struct RawType {
    name: String,
}

fn unknown_line() -> i32 {
    -1
}

/// JSON Lines sample source
///
/// **Public** - stops yielding after the first corrupt line
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_number: usize,
    failed: bool,
}

impl JsonLinesSource<BufReader<File>> {
    /// Open a JSON Lines sample file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SampleSourceError> {
        let path = path.as_ref();
        debug!("Opening sample source: {}", path.display());
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            failed: false,
        }
    }

    /// Decode one non-blank line
    ///
    /// **Private** - internal helper for the iterator
    fn decode(&self, line: &str) -> Result<SourceEvent, SampleSourceError> {
        let raw: RawEvent = serde_json::from_str(line).map_err(|source| SampleSourceError::Json {
            line: self.line_number,
            source,
        })?;

        if raw.event_type != EXECUTION_SAMPLE_EVENT {
            return Ok(SourceEvent::Other(raw.event_type));
        }

        let start_time = raw.values.start_time.ok_or_else(|| SampleSourceError::InvalidEvent {
            line: self.line_number,
            reason: "execution sample without startTime".to_string(),
        })?;

        let timestamp = DateTime::parse_from_rfc3339(&start_time)
            .map_err(|e| SampleSourceError::InvalidEvent {
                line: self.line_number,
                reason: format!("invalid startTime '{}': {}", start_time, e),
            })?
            .with_timezone(&Utc);

        let frames = raw.values.stack_trace.map(|trace| {
            trace
                .frames
                .into_iter()
                .map(|f| StackFrame::new(f.method.declaring_type.name, f.method.name, f.line_number))
                .collect()
        });

        Ok(SourceEvent::ExecutionSample(ExecutionSample { timestamp, frames }))
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<SourceEvent, SampleSourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(SampleSourceError::Io(e)));
                }
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            let event = self.decode(&line);
            if event.is_err() {
                self.failed = true;
            }
            return Some(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{"type":"jdk.ExecutionSample","values":{"startTime":"2024-01-15T12:00:00.010Z","stackTrace":{"truncated":false,"frames":[{"method":{"type":{"name":"demo.Load"},"name":"work3"},"lineNumber":12},{"method":{"type":{"name":"demo.Load"},"name":"main"},"lineNumber":4}]}}}"#;

    #[test]
    fn test_decode_execution_sample() {
        let mut source = JsonLinesSource::new(SAMPLE.as_bytes());
        let event = source.next().unwrap().unwrap();

        let SourceEvent::ExecutionSample(sample) = event else {
            panic!("expected execution sample");
        };
        let frames = sample.frames.unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], StackFrame::new("demo.Load", "work3", 12));
        assert_eq!(frames[0].key(), "demo.Load.work3");
        assert_eq!(sample.timestamp.to_rfc3339(), "2024-01-15T12:00:00.010+00:00");
        assert!(source.next().is_none());
    }

    #[test]
    fn test_other_events_and_blank_lines() {
        let input = "\n{\"type\":\"jdk.GCHeapSummary\",\"values\":{}}\n\n";
        let events: Vec<_> = JsonLinesSource::new(input.as_bytes()).collect();

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &SourceEvent::Other("jdk.GCHeapSummary".to_string())
        );
    }

    #[test]
    fn test_null_stack_trace() {
        let input = r#"{"type":"jdk.ExecutionSample","values":{"startTime":"2024-01-15T12:00:00Z","stackTrace":null}}"#;
        let event = JsonLinesSource::new(input.as_bytes()).next().unwrap().unwrap();

        match event {
            SourceEvent::ExecutionSample(sample) => assert!(sample.frames.is_none()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_missing_line_number_defaults() {
        let input = r#"{"type":"jdk.ExecutionSample","values":{"startTime":"2024-01-15T12:00:00Z","stackTrace":{"frames":[{"method":{"type":{"name":"a.B"},"name":"c"}}]}}}"#;
        let event = JsonLinesSource::new(input.as_bytes()).next().unwrap().unwrap();

        let SourceEvent::ExecutionSample(sample) = event else {
            panic!("expected execution sample");
        };
        assert_eq!(sample.frames.unwrap()[0].line, -1);
    }

    #[test]
    fn test_corrupt_line_stops_stream() {
        let input = format!("{}\n{{not json\n{}\n", SAMPLE, SAMPLE);
        let events: Vec<_> = JsonLinesSource::new(input.as_bytes()).collect();

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        match &events[1] {
            Err(SampleSourceError::Json { line, .. }) => assert_eq!(*line, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_start_time_is_corrupt() {
        let input = r#"{"type":"jdk.ExecutionSample","values":{"startTime":"yesterday"}}"#;
        let result = JsonLinesSource::new(input.as_bytes()).next().unwrap();
        assert!(matches!(result, Err(SampleSourceError::InvalidEvent { line: 1, .. })));
    }
}
