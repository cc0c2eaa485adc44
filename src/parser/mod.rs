//! Input parsing and report schema definitions.
//!
//! This module handles:
//! - Reading execution-sample events
//! - Discovering power table column roles
//! - Streaming power table rows
//! - Defining output schema

pub mod columns;
pub mod events;
pub mod power_table;
pub mod schema;
pub mod wall_clock;

// Re-export main types
pub use columns::{normalize_header, ColumnRole, ColumnRoleMap, ColumnRules, Scope};
pub use events::{ExecutionSample, JsonLinesSource, SampleSource, SourceEvent, StackFrame};
pub use power_table::{parse_power_table, ParseStats, PowerTableReader, PowerTableRow};
pub use schema::{AttributionReport, AttributionRow, ReportSummary};
pub use wall_clock::WallClockParser;
