//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod attribute;
pub mod models;
pub mod utils;

// Re-export main command functions
pub use attribute::{build_report, execute_attribute, run_attribution, validate_args};
pub use models::AttributeArgs;
pub use utils::{display_version, show_columns, validate_report_file};
