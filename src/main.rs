//! joule-trace CLI
//!
//! Attributes processor energy to application methods by correlating
//! execution samples with a hardware power/energy table.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use joule_trace::commands::{
    display_version, execute_attribute, show_columns, validate_args, validate_report_file, AttributeArgs,
};
use joule_trace::utils::config::DEFAULT_TOP_N;

/// joule-trace - Per-method energy attribution
#[derive(Parser, Debug)]
#[command(name = "joule-trace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Attribute measured energy to the methods seen in a sample recording
    Attribute {
        /// Execution samples (JSON Lines, one event per line)
        samples: PathBuf,

        /// Power/energy table (CSV)
        power_table: PathBuf,

        /// Number of methods to report
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top: usize,

        /// Use the energy/power columns of this core
        #[arg(long)]
        core: Option<u32>,

        /// Use the integrated-accelerator (IA) domain columns (wins over --core)
        #[arg(long)]
        use_ia: bool,

        /// Prefer frames from ML/AI frameworks when choosing a method
        #[arg(long)]
        prefer_domain_markers: bool,

        /// Disable the highest-numeric-suffix selection tier
        #[arg(long)]
        no_numeric_suffix: bool,

        /// Log the method chosen for every sample
        #[arg(long)]
        trace_samples: bool,

        /// Write the report as JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,

        /// Date for HH:MM:SS:mmm wall-clock cells (YYYY-MM-DD, default today)
        #[arg(long)]
        anchor_date: Option<NaiveDate>,
    },

    /// Show the column roles resolved for a power table
    Columns {
        /// Power/energy table (CSV)
        power_table: PathBuf,

        /// Also resolve the columns of this core
        #[arg(long)]
        core: Option<u32>,
    },

    /// Validate a report JSON file
    Validate {
        /// Path to report JSON file
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Attribute {
            samples,
            power_table,
            top,
            core,
            use_ia,
            prefer_domain_markers,
            no_numeric_suffix,
            trace_samples,
            json,
            anchor_date,
        } => {
            let args = AttributeArgs {
                samples,
                power_table,
                top_n: top,
                core,
                use_domain: use_ia,
                prefer_domain_markers,
                numeric_suffix: !no_numeric_suffix,
                trace_samples,
                output_json: json,
                anchor_date,
            };

            // Validate args first
            validate_args(&args)?;

            execute_attribute(args)?;
        }

        Commands::Columns { power_table, core } => {
            show_columns(&power_table, core)?;
        }

        Commands::Validate { file } => {
            validate_report_file(&file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
