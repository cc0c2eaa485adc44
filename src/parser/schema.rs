//! Output JSON schema definitions for attribution reports.
//!
//! This module defines the structure of JSON files we write to disk.
//! Schema is versioned to allow future evolution.

use serde::{Deserialize, Serialize};

/// Top-level report structure written to JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Timestamp when the report was generated
    pub generated_at: String,

    /// Recording-wide totals
    pub summary: ReportSummary,

    /// Ranked methods (highest energy first, at most top-N)
    pub methods: Vec<AttributionRow>,
}

/// Recording-wide totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Observation window length in seconds
    pub duration_seconds: f64,

    /// Execution samples attributed
    pub total_samples: u64,

    /// Distinct methods seen
    pub unique_methods: usize,

    /// Energy measured over the window (J)
    pub total_energy_j: f64,

    pub total_energy_mwh: f64,

    /// Integration strategy that produced the total
    pub strategy: String,

    /// Effective measurement scope
    pub scope: String,

    /// True when the requested scope fell back to a coarser signal
    pub scope_degraded: bool,

    /// Negative counter deltas discarded as resets
    pub discarded_counter_resets: u64,

    /// True when the sample source was cut short by corruption
    pub partial_samples: bool,
}

/// One ranked method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionRow {
    /// `<type>.<method>`
    pub method: String,

    /// Samples attributed to this method
    pub samples: u64,

    /// Fraction of all samples (0..=1)
    pub share: f64,

    /// Attributed energy (J)
    pub energy_j: f64,

    /// Attributed energy (mWh)
    pub mwh: f64,

    /// Average power over the observation window (W)
    pub avg_w: f64,
}
