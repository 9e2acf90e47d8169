//! services/evaluator/src/cli.rs
//!
//! Command-line arguments for the `evaluate` binary.

use clap::Parser;
use std::path::PathBuf;

/// Grade one submission bundle and print the outcome as JSON.
#[derive(Parser, Debug)]
#[command(name = "evaluate")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to a JSON submission bundle (submission, user, problem)
    pub submission: PathBuf,

    /// Re-run evaluation for an edited submission without using a submission slot
    #[arg(long)]
    pub reevaluate: bool,
}
