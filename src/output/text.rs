//! Console rendering of an attribution report.

use crate::parser::schema::{AttributionReport, AttributionRow};

/// Widest method name shown before truncation
const METHOD_WIDTH: usize = 60;

/// Render the summary line and the ranked method table
///
/// **Public** - used by the attribute and validate commands
pub fn render_report(report: &AttributionReport) -> String {
    let summary = &report.summary;
    let mut lines = Vec::with_capacity(report.methods.len() + 4);

    lines.push(format!(
        "Recording duration: {:.3}s, total samples: {}, total energy: {:.3} J ({:.3} mWh)",
        summary.duration_seconds,
        group_thousands(summary.total_samples),
        summary.total_energy_j,
        summary.total_energy_mwh
    ));
    lines.push(format!(
        "Energy source: {} ({}){}",
        summary.scope,
        summary.strategy,
        if summary.scope_degraded {
            ", requested scope unavailable"
        } else {
            ""
        }
    ));
    lines.push(String::new());
    lines.push(format!(
        "{:<60} {:>10} {:>7} {:>12} {:>10} {:>10}",
        "Method", "Samples", "%", "Energy (J)", "mWh", "Avg W"
    ));
    lines.push("-".repeat(METHOD_WIDTH + 54));

    for row in &report.methods {
        lines.push(render_row(row));
    }

    lines.join("\n")
}

/// One fixed-width table row
fn render_row(row: &AttributionRow) -> String {
    format!(
        "{:<60} {:>10} {:>6.1}% {:>12.3} {:>10.3} {:>10.3}",
        truncate(&row.method, METHOD_WIDTH),
        group_thousands(row.samples),
        row.share * 100.0,
        row.energy_j,
        row.mwh,
        row.avg_w
    )
}

/// First `width` characters of `text`
fn truncate(text: &str, width: usize) -> &str {
    match text.char_indices().nth(width) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// `1234567` -> `1,234,567`
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
