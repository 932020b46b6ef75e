//! Command-line interface (CLI) of the main binary.

use crate::database::FeatureSet;
use crate::RunArgs;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Report, Result};
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

// ----------------------------------------------------------------------------
// CLI Entry Point
// ----------------------------------------------------------------------------

/// The command-line interface (CLI).
///
/// Parses user input from the command-line in the main function.
///
/// ```rust
/// use clap::Parser;
/// let input = ["hitmap", "check", "--database", "queries.fa"];
/// let args = hitmap::Cli::parse_from(input);
/// ```
#[derive(Debug, Deserialize, Parser, Serialize)]
#[clap(name = "hitmap", author, version)]
#[clap(about = "hitmap builds presence/absence heatmaps of query features across genome assemblies.")]
#[clap(trailing_var_arg = true)]
pub struct Cli {
    #[clap(subcommand)]
    #[clap(help = "Set the command.")]
    pub command: Command,

    /// Set the output [Verbosity] level.
    #[clap(short = 'v', long)]
    #[clap(value_enum, default_value_t = Verbosity::default())]
    #[clap(hide_possible_values = false)]
    #[clap(global = true)]
    #[clap(help = "Set the output verbosity level.")]
    pub verbosity: Verbosity,
}

/// CLI [commands](#variants). Used to decide which runtime [Command](#variants) the CLI arguments should be passed to.
#[derive(Debug, Deserialize, Serialize, Subcommand)]
pub enum Command {
    #[clap(about = "Run the search and build the heatmap.")]
    Run(RunArgs),
    #[clap(about = "Check that a feature database is well-formed.")]
    Check(CheckArgs),
}

// -----------------------------------------------------------------------------
// Check
// -----------------------------------------------------------------------------

/// Check that a feature database is well-formed.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct CheckArgs {
    /// Feature database (multi-FASTA).
    #[clap(short = 'd', long, required = true)]
    pub database: PathBuf,
}

/// Parse and validate a feature database, reporting a summary on success.
///
/// Validation failures (malformed headers, duplicate identifiers,
/// non-contiguous class blocks) surface as errors from [`FeatureSet::read`].
pub fn check(args: &CheckArgs) -> Result<(), Report> {
    let features = FeatureSet::read(&args.database)?;
    let classes = features.classes().into_iter().unique().collect_vec();
    info!(
        "Database checks passed: {} features across {} classes.",
        features.len(),
        classes.len()
    );
    Ok(())
}

// -----------------------------------------------------------------------------
// Verbosity
// -----------------------------------------------------------------------------

/// The output verbosity level.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ValueEnum)]
pub enum Verbosity {
    #[default]
    Info,
    Warn,
    Debug,
    Error,
}

impl Display for Verbosity {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        // Convert to lowercase for RUST_LOG env var compatibility
        let lowercase = format!("{:?}", self).to_lowercase();
        write!(f, "{lowercase}")
    }
}
