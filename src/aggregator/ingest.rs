//! Single pass over the sample source.
//!
//! Ingestion folds every execution sample into:
//! - a method -> sample count map (insertion ordered)
//! - the observation window (running min/max of sample timestamps)
//!
//! Only the running window and the count map are held in memory.

use super::selector::{MethodKey, MethodSelector};
use crate::parser::{SampleSource, SourceEvent};
use crate::utils::config::PROGRESS_INTERVAL;
use crate::utils::error::SampleSourceError;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Time span covered by the execution samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ObservationWindow {
    /// Window covering `[start, end]`; bounds are swapped if reversed
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Zero-length window at one instant
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self::new(instant, instant)
    }

    /// Widen the window to include `instant`
    pub fn include(&mut self, instant: DateTime<Utc>) {
        if instant < self.start {
            self.start = instant;
        }
        if instant > self.end {
            self.end = instant;
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        seconds_between(self.start, self.end)
    }

    /// True when the window has no positive length
    pub fn is_degenerate(&self) -> bool {
        self.end <= self.start
    }

    /// Seconds of `[from, to]` that fall inside the window (0 if disjoint)
    pub fn overlap_seconds(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
        let latest_start = from.max(self.start);
        let earliest_end = to.min(self.end);
        if earliest_end <= latest_start {
            return 0.0;
        }
        seconds_between(latest_start, earliest_end)
    }
}

/// Signed seconds from `from` to `to`
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

/// Sample counts per method, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodCounts {
    entries: Vec<(MethodKey, u64)>,
    index: HashMap<MethodKey, usize>,
    total: u64,
}

impl MethodCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one sample for `key`
    pub fn record(&mut self, key: MethodKey) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, 1));
            }
        }
        self.total += 1;
    }

    pub fn get(&self, key: &str) -> u64 {
        self.index.get(key).map_or(0, |&i| self.entries[i].1)
    }

    pub fn total_samples(&self) -> u64 {
        self.total
    }

    pub fn unique_methods(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// (method, count) pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.entries.iter().map(|(key, count)| (key.as_str(), *count))
    }
}

impl<K: Into<MethodKey>> FromIterator<K> for MethodCounts {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut counts = Self::new();
        for key in iter {
            counts.record(key.into());
        }
        counts
    }
}

/// Everything ingestion learned from the sample source
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub counts: MethodCounts,

    /// `None` when no sample was counted
    pub window: Option<ObservationWindow>,

    /// Execution samples with a null or empty stack
    pub skipped_empty_stacks: u64,

    /// Events of other kinds
    pub other_events: u64,

    /// Set when the source was cut short; counts are partial
    pub corruption: Option<SampleSourceError>,
}

impl IngestOutcome {
    pub fn is_partial(&self) -> bool {
        self.corruption.is_some()
    }

    /// Window length in seconds, 0 without samples
    pub fn duration_seconds(&self) -> f64 {
        self.window.map_or(0.0, |w| w.duration_seconds())
    }
}

/// Read the whole sample source once
///
/// **Public** - main entry point for ingestion
///
/// # Arguments
/// * `source` - Event stream
/// * `selector` - Picks one method per sample
/// * `trace_samples` - Log every sample's selection at info level
///
/// # Returns
/// Counts and window; on a corrupt source, whatever was read before the
/// corruption plus the error
pub fn ingest<S: SampleSource>(
    source: S,
    selector: &MethodSelector,
    trace_samples: bool,
) -> IngestOutcome {
    let mut outcome = IngestOutcome::default();

    for event in source {
        let sample = match event {
            Ok(SourceEvent::ExecutionSample(sample)) => sample,
            Ok(SourceEvent::Other(kind)) => {
                debug!("Ignoring event of type {}", kind);
                outcome.other_events += 1;
                continue;
            }
            Err(e) => {
                warn!(
                    "Error processing sample source: {} (keeping {} samples read so far)",
                    e,
                    outcome.counts.total_samples()
                );
                outcome.corruption = Some(e);
                break;
            }
        };

        let frames = sample.frames.as_deref().unwrap_or_default();
        let Some(selection) = selector.select(frames) else {
            outcome.skipped_empty_stacks += 1;
            continue;
        };

        match outcome.window.as_mut() {
            Some(window) => window.include(sample.timestamp),
            None => outcome.window = Some(ObservationWindow::at(sample.timestamp)),
        }

        if trace_samples {
            info!(
                "[{}-{:04}] {}: Selected {} (line {})",
                selection.tier,
                outcome.counts.total_samples() + 1,
                sample.timestamp.format("%H:%M:%S%.3f"),
                selection.key,
                selection.line
            );
        }

        outcome.counts.record(selection.key);

        let seen = outcome.counts.total_samples();
        if seen % PROGRESS_INTERVAL == 0 {
            debug!("Processed {} execution samples so far...", seen);
        }
    }

    if outcome.counts.is_empty() {
        warn!("No samples found in sample source. The recording may be empty or contain no execution samples.");
    } else {
        debug!(
            "Ingested {} samples across {} methods ({} empty stacks, {} other events)",
            outcome.counts.total_samples(),
            outcome.counts.unique_methods(),
            outcome.skipped_empty_stacks,
            outcome.other_events
        );
    }

    outcome
}
