use crate::parser::Scope;
use crate::utils::config::DEFAULT_TOP_N;
use chrono::NaiveDate;
use std::path::PathBuf;

/// Arguments for the attribute command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AttributeArgs {
    /// JSON Lines execution-sample file
    pub samples: PathBuf,

    /// Power/energy table exported by the hardware monitor
    pub power_table: PathBuf,

    /// Number of methods to report
    pub top_n: usize,

    /// Requested core index (`None` = package)
    pub core: Option<u32>,

    /// Use the integrated-accelerator (IA) domain columns
    pub use_domain: bool,

    /// Enable the domain-marker selection tier
    pub prefer_domain_markers: bool,

    /// Enable the numeric-suffix selection tier
    pub numeric_suffix: bool,

    /// Log every sample's selection
    pub trace_samples: bool,

    /// Optional JSON report path
    pub output_json: Option<PathBuf>,

    /// Date for `HH:MM:SS:mmm` wall-clock cells (`None` = today, local)
    pub anchor_date: Option<NaiveDate>,
}

impl AttributeArgs {
    /// Effective energy scope for these options
    pub fn scope(&self) -> Scope {
        Scope::from_options(self.core, self.use_domain)
    }
}

impl Default for AttributeArgs {
    fn default() -> Self {
        Self {
            samples: PathBuf::from("recording.jsonl"),
            power_table: PathBuf::from("power.csv"),
            top_n: DEFAULT_TOP_N,
            core: None,
            use_domain: false,
            prefer_domain_markers: false,
            numeric_suffix: true,
            trace_samples: false,
            output_json: None,
            anchor_date: None,
        }
    }
}
