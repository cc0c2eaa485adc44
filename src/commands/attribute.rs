//! Attribute command implementation.
//!
//! The attribute command:
//! 1. Reads execution samples and counts one method per sample
//! 2. Resolves the power table's column roles
//! 3. Integrates energy over the observation window
//! 4. Distributes energy across methods by sample share
//! 5. Prints the report (and writes JSON if requested)

use super::models::AttributeArgs;
use crate::aggregator::{aggregate, ingest, IngestOutcome, MethodSelector, SelectorRules};
use crate::energy::{integrate_table, EnergyOutcome};
use crate::output::{render_report, write_report};
use crate::parser::schema::{AttributionReport, AttributionRow, ReportSummary};
use crate::parser::{ColumnRules, JsonLinesSource, PowerTableReader, WallClockParser};
use crate::utils::config::{JOULES_PER_MILLIWATT_HOUR, MAX_TOP_N, SCHEMA_VERSION};
use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use std::time::Instant;

/// Execute the attribute command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Missing or unreadable input files
/// * Power table without usable energy/power columns
/// * File write errors for the JSON report
pub fn execute_attribute(args: AttributeArgs) -> Result<()> {
    let start_time = Instant::now();

    let report = run_attribution(&args)?;

    info!("Step 5/5: Writing report...");
    println!("{}", render_report(&report));

    if let Some(path) = &args.output_json {
        write_report(&report, path).context("Failed to write report JSON")?;
        info!("✓ Report written to: {}", path.display());
    }

    info!("Attribution completed in {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}

/// Run the attribution pipeline without printing
///
/// **Public** - used by `execute_attribute` and integration tests
///
/// # Returns
/// The full report; `methods` holds at most `top_n` rows
pub fn run_attribution(args: &AttributeArgs) -> Result<AttributionReport> {
    let scope = args.scope();

    info!("Samples: {}", args.samples.display());
    info!("Power table: {} (scope: {})", args.power_table.display(), scope);

    // Step 1: Samples
    info!("Step 1/5: Reading execution samples...");
    let selector = MethodSelector::new(SelectorRules::new(args.numeric_suffix, args.prefer_domain_markers));
    let source = JsonLinesSource::open(&args.samples)
        .with_context(|| format!("Failed to open sample source {}", args.samples.display()))?;
    let ingested = ingest(source, &selector, args.trace_samples);

    info!(
        "Read {} samples across {} methods over {:.3}s",
        ingested.counts.total_samples(),
        ingested.counts.unique_methods(),
        ingested.duration_seconds()
    );

    // Step 2: Column roles
    info!("Step 2/5: Resolving power table columns...");
    let rules = ColumnRules::new(scope.core_index()).context("Failed to build column rules")?;
    let clock = match args.anchor_date {
        Some(date) => WallClockParser::new(date),
        None => WallClockParser::today(),
    };
    let reader = PowerTableReader::open(&args.power_table, &rules, scope, clock)
        .with_context(|| format!("Failed to read power table {}", args.power_table.display()))?;

    for (role, index) in reader.roles().iter() {
        debug!(
            "  {} -> column {} ({})",
            role,
            index,
            reader.roles().column_name(index).unwrap_or("?")
        );
    }

    // Step 3: Energy
    info!("Step 3/5: Integrating energy...");
    let energy = integrate_table(reader, ingested.window)
        .with_context(|| format!("Failed to integrate energy from {}", args.power_table.display()))?;

    info!(
        "Total energy: {:.3} J ({}, {})",
        energy.total_j, energy.scope, energy.strategy
    );

    // Step 4: Attribution
    info!("Step 4/5: Attributing energy to top {} methods...", args.top_n);
    let methods = aggregate(
        &ingested.counts,
        energy.total_j,
        ingested.duration_seconds(),
        args.top_n,
    );

    if ingested.is_partial() {
        warn!("Report is based on a partial sample source");
    }

    Ok(build_report(&ingested, &energy, methods))
}

/// Assemble the report from the pipeline results
///
/// **Public** - keeps report assembly in one place
pub fn build_report(
    ingested: &IngestOutcome,
    energy: &EnergyOutcome,
    methods: Vec<AttributionRow>,
) -> AttributionReport {
    AttributionReport {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        summary: ReportSummary {
            duration_seconds: ingested.duration_seconds(),
            total_samples: ingested.counts.total_samples(),
            unique_methods: ingested.counts.unique_methods(),
            total_energy_j: energy.total_j,
            total_energy_mwh: energy.total_j / JOULES_PER_MILLIWATT_HOUR,
            strategy: energy.strategy.to_string(),
            scope: energy.scope.to_string(),
            scope_degraded: energy.scope_degraded,
            discarded_counter_resets: energy.discarded_resets,
            partial_samples: ingested.is_partial(),
        },
        methods,
    }
}

/// Validate attribute arguments
///
/// **Public** - can be called before execute_attribute for early validation
pub fn validate_args(args: &AttributeArgs) -> Result<()> {
    if args.top_n == 0 {
        anyhow::bail!("top must be greater than 0");
    }

    if args.top_n > MAX_TOP_N {
        anyhow::bail!("top is too large (max {})", MAX_TOP_N);
    }

    if !args.samples.is_file() {
        anyhow::bail!("Sample file not found: {}", args.samples.display());
    }

    if !args.power_table.is_file() {
        anyhow::bail!("Power table not found: {}", args.power_table.display());
    }

    if args.use_domain && args.core.is_some() {
        warn!("--use-ia takes precedence over --core");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_with_files() -> (tempfile::TempDir, AttributeArgs) {
        let dir = tempfile::tempdir().unwrap();
        let samples = dir.path().join("samples.jsonl");
        let power = dir.path().join("power.csv");
        std::fs::write(&samples, "").unwrap();
        std::fs::write(&power, "Elapsed Time,Processor Power(Watt)\n0,1\n").unwrap();

        let args = AttributeArgs {
            samples,
            power_table: power,
            ..AttributeArgs::default()
        };
        (dir, args)
    }

    #[test]
    fn test_validate_args_accepts_defaults() {
        let (_dir, args) = args_with_files();
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_top_bounds() {
        let (_dir, mut args) = args_with_files();

        args.top_n = 0;
        assert!(validate_args(&args).is_err());

        args.top_n = MAX_TOP_N + 1;
        assert!(validate_args(&args).is_err());

        args.top_n = MAX_TOP_N;
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_missing_files() {
        let (_dir, mut args) = args_with_files();
        args.power_table = PathBuf::from("/definitely/not/here.csv");

        let err = validate_args(&args).unwrap_err();
        assert!(err.to_string().contains("Power table not found"));
    }
}
