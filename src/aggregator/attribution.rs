//! Distribute measured energy across methods by sample share.
//!
//! Each method gets `share = samples / total_samples` of the total energy.
//! Rows are ranked by energy (highest first); truncation to top-N only
//! decides which rows are returned, never their values.

use super::ingest::MethodCounts;
use crate::parser::schema::AttributionRow;
use crate::utils::config::{JOULES_PER_MILLIWATT_HOUR, MIN_DURATION_SECS};
use log::debug;

/// Attribute energy to every method, ranked, without truncation
///
/// **Public** - used by `aggregate` and by invariant checks
///
/// # Arguments
/// * `counts` - Per-method sample counts
/// * `total_energy_j` - Energy over the observation window
/// * `duration_s` - Observation window length
pub fn attribute_all(counts: &MethodCounts, total_energy_j: f64, duration_s: f64) -> Vec<AttributionRow> {
    let total_samples = counts.total_samples();
    let duration_s = duration_s.max(MIN_DURATION_SECS);

    let mut rows: Vec<AttributionRow> = counts
        .iter()
        .map(|(method, samples)| create_row(method, samples, total_samples, total_energy_j, duration_s))
        .collect();

    // Stable: equal energies keep first-seen order
    rows.sort_by(|a, b| b.energy_j.total_cmp(&a.energy_j));
    rows
}

/// Attribute energy and keep the `top_n` highest rows
///
/// **Public** - main entry point for attribution
pub fn aggregate(
    counts: &MethodCounts,
    total_energy_j: f64,
    duration_s: f64,
    top_n: usize,
) -> Vec<AttributionRow> {
    debug!(
        "Attributing {:.3} J across {} methods (top {})",
        total_energy_j,
        counts.unique_methods(),
        top_n
    );

    let mut rows = attribute_all(counts, total_energy_j, duration_s);
    rows.truncate(top_n);
    rows
}

/// Build one row
///
/// **Private** - internal conversion
fn create_row(
    method: &str,
    samples: u64,
    total_samples: u64,
    total_energy_j: f64,
    duration_s: f64,
) -> AttributionRow {
    let share = if total_samples > 0 {
        samples as f64 / total_samples as f64
    } else {
        0.0
    };
    let energy_j = total_energy_j * share;

    AttributionRow {
        method: method.to_string(),
        samples,
        share,
        energy_j,
        mwh: energy_j / JOULES_PER_MILLIWATT_HOUR,
        avg_w: energy_j / duration_s,
    }
}
