//! Command-line interface for hiercc-solver.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **precluster**: Build a cluster index from reference profiles and a hierCC table
//! - **resolve**: Assign each query isolate its closest ST and hierCC clusters
//! - **index**: Show the manifest of a published cluster index
//!
//! ## Usage
//!
//! ```text
//! # Build the index once per database release
//! hiercc-solver precluster --profiles profiles.list.gz --hiercc hiercc.tsv.gz \
//!     --output salmonella_index
//!
//! # Resolve chewBBACA allele calls against it
//! hiercc-solver resolve --input results_alleles.tsv --index salmonella_index \
//!     --hiercc hiercc.tsv.gz --output assignments.tsv
//!
//! # Compare against every reference profile instead
//! hiercc-solver resolve --input results_alleles.tsv --profiles profiles.list.gz \
//!     --hiercc hiercc.tsv.gz --output assignments.csv
//!
//! # JSON output for scripting
//! hiercc-solver index salmonella_index --format json
//! ```

use clap::{Parser, Subcommand};

pub mod index;
pub mod precluster;
pub mod resolve;

#[derive(Parser)]
#[command(name = "hiercc-solver")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Resolve cgMLST allele profiles to their closest ST and hierCC clusters")]
#[command(
    long_about = "hiercc-solver assigns isolates typed with chewBBACA to the closest sequence type (ST) of a cgMLST database such as Enterobase.\n\nReference profiles are preclustered once on a coarse hierCC level. Each query is then compared with one representative per cluster, and only the members of the nearest cluster are compared in full. For every isolate it reports:\n- The number of matching loci with the selected ST\n- The maximum number of mismatching loci\n- A confidence level named after the finest hierCC level covering that distance\n- The selected ST's full hierCC assignment"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a cluster index from reference profiles and a hierCC table
    Precluster(precluster::PreclusterArgs),

    /// Resolve query profiles to their closest ST
    Resolve(resolve::ResolveArgs),

    /// Show the manifest of a cluster index
    Index(index::IndexArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
