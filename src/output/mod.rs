//! Output writers for attribution reports.
//!
//! This module handles presenting the report:
//! - JSON report files (pretty printed)
//! - Console summary and ranked table

pub mod json;
pub mod text;

// Re-export main functions
pub use json::{read_report, report_to_string, write_report};
pub use text::render_report;
