use std::path::PathBuf;

use clap::Args;

use crate::catalog::store::{ClusterIndex, IndexManifest};
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct IndexArgs {
    /// Cluster index directory
    #[arg(required = true)]
    pub index: PathBuf,

    /// List every locus
    #[arg(long)]
    pub all_loci: bool,
}

/// Execute index subcommand
///
/// # Errors
///
/// Returns an error if the index cannot be opened.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: IndexArgs, format: OutputFormat, _verbose: bool) -> anyhow::Result<()> {
    let index = ClusterIndex::open(&args.index)?;
    let manifest = index.manifest();

    match format {
        OutputFormat::Text => print_text(&args, manifest),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(manifest)?),
        OutputFormat::Tsv => print_tsv(manifest),
    }

    Ok(())
}

fn print_text(args: &IndexArgs, manifest: &IndexManifest) {
    println!("Cluster index: {}", args.index.display());
    println!("  Version:          {}", manifest.version);
    println!("  Cluster level:    {}", manifest.cluster_level);
    println!("  Id column:        {}", manifest.id_column);
    println!("  Loci:             {}", manifest.nr_loci);
    println!("  Clusters:         {}", manifest.clusters);
    println!("  Shards:           {}", manifest.shards);
    println!("  Representatives:  {}", manifest.representatives);
    println!(
        "  Missing alleles:  {}",
        manifest
            .missing_alleles
            .tokens()
            .iter()
            .map(|t| format!("'{t}'"))
            .collect::<Vec<_>>()
            .join(", ")
    );

    if args.all_loci {
        println!();
        println!("Loci:");
        for locus in &manifest.loci {
            println!("  {locus}");
        }
    } else if let (Some(first), Some(last)) = (manifest.loci.first(), manifest.loci.last()) {
        println!("  Locus range:      {first} .. {last}");
    }
}

fn print_tsv(manifest: &IndexManifest) {
    println!("key\tvalue");
    println!("version\t{}", manifest.version);
    println!("cluster_level\t{}", manifest.cluster_level);
    println!("id_column\t{}", manifest.id_column);
    println!("nr_loci\t{}", manifest.nr_loci);
    println!("clusters\t{}", manifest.clusters);
    println!("shards\t{}", manifest.shards);
    println!("representatives\t{}", manifest.representatives);
}
