use crate::output::{read_report, render_report};
use crate::parser::{ColumnRules, PowerTableReader, Scope, WallClockParser};
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use log::warn;
use std::path::Path;

/// Print the column roles resolved for a power table
pub fn show_columns(file_path: &Path, core: Option<u32>) -> Result<()> {
    let scope = Scope::from_options(core, false);
    let rules = ColumnRules::new(scope.core_index()).context("Failed to build column rules")?;
    let reader = PowerTableReader::open(file_path, &rules, scope, WallClockParser::today())
        .with_context(|| format!("Failed to read power table {}", file_path.display()))?;
    let roles = reader.roles();

    println!("Power table: {}", file_path.display());
    println!("Columns: {}", roles.columns().len());
    println!();

    for (role, index) in roles.iter() {
        println!(
            "  {:<16} [{:>2}] {}",
            role.to_string(),
            index,
            roles.column_name(index).unwrap_or("?")
        );
    }

    println!();
    match (roles.scoped_energy(), roles.scoped_power()) {
        (None, None) if scope != Scope::Package => {
            println!("Scope {}: no columns, package energy would be used", scope)
        }
        _ => println!(
            "Scope {}{}",
            roles.scope(),
            if roles.scope_degraded() { " (filled from domain columns)" } else { "" }
        ),
    }

    Ok(())
}

/// Validate a report JSON file
pub fn validate_report_file(file_path: &Path) -> Result<()> {
    println!("Validating report: {}", file_path.display());

    let report = read_report(file_path)
        .with_context(|| format!("Failed to read report {}", file_path.display()))?;

    if report.version != SCHEMA_VERSION {
        warn!(
            "Report schema v{} differs from current v{}",
            report.version,
            SCHEMA_VERSION
        );
    }

    println!("✓ Valid report JSON");
    println!("  Version: {}", report.version);
    println!("  Generated: {}", report.generated_at);
    println!("  Methods: {}", report.methods.len());
    println!();
    println!("{}", render_report(&report));

    Ok(())
}

/// Display version information
pub fn display_version() {
    println!("joule-trace v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Attributes measured processor energy to application methods.");
}
