//! Aggregation of execution samples into per-method energy.
//!
//! This module transforms the sample stream into:
//! - One attributed method per sample (tiered selection)
//! - Per-method sample counts and the observation window
//! - Ranked per-method energy rows

pub mod attribution;
pub mod ingest;
pub mod selector;

// Re-export main types and functions
pub use attribution::{aggregate, attribute_all};
pub use ingest::{ingest, seconds_between, IngestOutcome, MethodCounts, ObservationWindow};
pub use selector::{MethodKey, MethodSelector, Selection, SelectorRules, Tier};
