//! joule-trace
//!
//! Per-method energy attribution: correlates timestamped execution samples
//! with a hardware power/energy table and distributes the measured energy
//! across methods by sample share.
//!
//! This crate provides the core implementation for the
//! `joule-trace` CLI tool.
//!
//! ## Getting Started
//!
//! ```bash
//! joule-trace attribute recording.jsonl power.csv --top 20 --json energy.json
//! ```
//!
//! The library pipeline is:
//! `parser` (samples, power table) -> `aggregator` (method selection and
//! counting) -> `energy` (integration over the observation window) ->
//! `aggregator::attribution` -> `output`.

pub mod aggregator;
pub mod commands;
pub mod energy;
pub mod output;
pub mod parser;
pub mod utils;
