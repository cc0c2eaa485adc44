//! JSON report output writer.
//!
//! Writes AttributionReport structs to JSON files with proper formatting.

use crate::parser::schema::AttributionReport;
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Write a report to a JSON file
///
/// **Public** - main entry point for JSON output
///
/// # Arguments
/// * `report` - Report data to write
/// * `output_path` - Path to output JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
///
/// # Example
/// ```ignore
/// let report = build_report(&ingested, &energy, methods);
/// write_report(&report, "energy.json")?;
/// ```
pub fn write_report(report: &AttributionReport, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing report to: {}", output_path.display());

    validate_output_path(output_path)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!("Cannot create directory {}: {}", parent.display(), e))
            })?;
        }
    }

    let file = File::create(output_path)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    info!("Report written successfully ({} bytes)", calculate_file_size(output_path));

    Ok(())
}

/// Serialize a report to a pretty JSON string
///
/// **Public** - useful for tests and piping
pub fn report_to_string(report: &AttributionReport) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Validate that output path is writable
///
/// **Private** - internal validation
fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Calculate file size in bytes
///
/// **Private** - internal utility
fn calculate_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Read a report from a JSON file
///
/// **Public** - used by the validate command and tests
///
/// # Errors
/// * `OutputError::ReadFailed` - File open or read error
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_report(input_path: impl AsRef<Path>) -> Result<AttributionReport, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading report from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::ReadFailed)?;
    let report: AttributionReport = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        if e.is_io() {
            OutputError::ReadFailed(e.into())
        } else {
            OutputError::SerializationFailed(e)
        }
    })?;

    debug!(
        "Report loaded: version {}, {} methods",
        report.version,
        report.methods.len()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema::{AttributionRow, ReportSummary};
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    fn create_test_report() -> AttributionReport {
        AttributionReport {
            version: "1.0.0".to_string(),
            generated_at: "2024-01-01T00:00:00Z".to_string(),
            summary: ReportSummary {
                duration_seconds: 10.0,
                total_samples: 4,
                unique_methods: 2,
                total_energy_j: 36.0,
                total_energy_mwh: 10.0,
                strategy: "aligned-overlap".to_string(),
                scope: "package".to_string(),
                scope_degraded: false,
                discarded_counter_resets: 0,
                partial_samples: false,
            },
            methods: vec![
                AttributionRow {
                    method: "app.Model.train".to_string(),
                    samples: 3,
                    share: 0.75,
                    energy_j: 27.0,
                    mwh: 7.5,
                    avg_w: 2.7,
                },
                AttributionRow {
                    method: "app.Loader.read".to_string(),
                    samples: 1,
                    share: 0.25,
                    energy_j: 9.0,
                    mwh: 2.5,
                    avg_w: 0.9,
                },
            ],
        }
    }

    #[test]
    fn test_write_and_read_report() {
        let report = create_test_report();
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        write_report(&report, path).unwrap();
        let loaded = read_report(path).unwrap();

        assert_eq!(loaded.version, report.version);
        assert_eq!(loaded.summary, report.summary);
        assert_eq!(loaded.methods, report.methods);
    }

    #[test]
    fn test_report_to_string_has_fields() {
        let json = report_to_string(&create_test_report()).unwrap();
        assert!(json.contains("\"total_energy_j\": 36.0"));
        assert!(json.contains("\"method\": \"app.Model.train\""));
    }

    #[test]
    fn test_validate_output_path_empty() {
        let result = validate_output_path(Path::new(""));
        assert!(matches!(result, Err(OutputError::InvalidPath(_))));
    }

    #[test]
    fn test_validate_output_path_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = validate_output_path(temp_dir.path());
        assert!(matches!(result, Err(OutputError::InvalidPath(_))));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/report.json");

        write_report(&create_test_report(), &nested_path).unwrap();

        assert!(nested_path.exists());
    }

    #[test]
    fn test_read_rejects_garbage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(read_report(&path), Err(OutputError::SerializationFailed(_))));
    }

    #[test]
    fn test_read_missing_file_is_read_failed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = read_report(temp_dir.path().join("absent.json")).unwrap_err();

        assert!(matches!(err, OutputError::ReadFailed(_)));
        assert!(err.to_string().starts_with("Failed to read file"));
    }

    #[test]
    fn test_read_directory_is_not_a_write_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = read_report(temp_dir.path()).unwrap_err();

        assert!(!matches!(err, OutputError::WriteFailed(_)));
    }
}
