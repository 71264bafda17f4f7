//! Command-line interface for query_forge.
//!
//! Provides commands for dataset generation, taxonomy inspection, dataset
//! cleanup and perturbation, and evaluation against a live classifier.

mod commands;

pub use commands::{
    clean_records, parse_cli, parse_noisy_categories, perturb_records, run, run_with_cli, Cli,
    Commands,
};
