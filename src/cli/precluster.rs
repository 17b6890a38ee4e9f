use std::path::PathBuf;

use clap::Args;

use crate::catalog::builder::{
    BuildSummary, BuilderConfig, ClusterIndexBuilder, DEFAULT_BATCH_SIZE, DEFAULT_CLUSTER_LEVEL,
};
use crate::cli::OutputFormat;
use crate::core::profile::MissingAlleles;

#[derive(Args)]
pub struct PreclusterArgs {
    /// Reference profile table (`ST` column then one column per locus, optionally gzipped)
    #[arg(short, long, required = true)]
    pub profiles: PathBuf,

    /// hierCC table (`ST` column then one column per level, optionally gzipped)
    #[arg(long, required = true)]
    pub hiercc: PathBuf,

    /// Output index directory
    #[arg(short, long, required = true)]
    pub output: PathBuf,

    /// hierCC level to cluster on
    #[arg(long, default_value = DEFAULT_CLUSTER_LEVEL)]
    pub level: String,

    /// Reference rows read per chunk
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Allele token meaning "no call" (repeatable; defaults to '', '-', '0' and 'LNF')
    #[arg(long = "missing")]
    pub missing: Vec<String>,

    /// Replace an existing index at the output path
    #[arg(long)]
    pub force: bool,
}

/// Execute precluster subcommand
///
/// # Errors
///
/// Returns an error if the inputs cannot be read or the index cannot be published.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: PreclusterArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let missing_alleles = if args.missing.is_empty() {
        MissingAlleles::default()
    } else {
        MissingAlleles::new(args.missing.iter().cloned())
    };

    let config = BuilderConfig {
        cluster_level: args.level.clone(),
        batch_size: args.batch_size,
        missing_alleles,
        force: args.force,
    };

    if verbose {
        eprintln!(
            "Preclustering {} on {} ({} rows per chunk)",
            args.profiles.display(),
            config.cluster_level,
            config.batch_size
        );
    }

    let summary =
        ClusterIndexBuilder::new(config).build(&args.profiles, &args.hiercc, &args.output)?;

    match format {
        OutputFormat::Text => print_text_summary(&summary, &args),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Tsv => print_tsv_summary(&summary),
    }

    Ok(())
}

fn print_text_summary(summary: &BuildSummary, args: &PreclusterArgs) {
    println!("Cluster index written to {}", args.output.display());
    println!("  Cluster level:      {}", summary.cluster_level);
    println!("  Loci:               {}", summary.nr_loci);
    println!("  Profiles scanned:   {}", summary.profiles_scanned);
    println!("  Clusters:           {}", summary.clusters);
    println!("  Shards:             {}", summary.shards);
    println!("  Representatives:    {}", summary.representatives);

    if summary.missing_representatives > 0 {
        println!(
            "  Warning: {} cluster(s) have no profile for their representative ST",
            summary.missing_representatives
        );
    }
    if summary.unassigned_profiles > 0 {
        println!(
            "  Warning: {} profile(s) have no {} assignment",
            summary.unassigned_profiles, summary.cluster_level
        );
    }
}

fn print_tsv_summary(summary: &BuildSummary) {
    println!("cluster_level\tnr_loci\tprofiles_scanned\tclusters\tshards\trepresentatives\tmissing_representatives\tunassigned_profiles\tskipped_hiercc_rows");
    println!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        summary.cluster_level,
        summary.nr_loci,
        summary.profiles_scanned,
        summary.clusters,
        summary.shards,
        summary.representatives,
        summary.missing_representatives,
        summary.unassigned_profiles,
        summary.skipped_hiercc_rows
    );
}
