use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::{ArgGroup, Args};
use tracing::{info, warn};

use crate::catalog::store::ClusterIndex;
use crate::cli::OutputFormat;
use crate::core::profile::{LocusNaming, MissingAlleles, CHEWBBACA_LOCUS_SUFFIX};
use crate::core::verdict::{delimiter_for, write_failures, write_verdicts};
use crate::matching::engine::{ResolutionReport, Resolver, ResolverConfig, DEFAULT_BATCH_SIZE};
use crate::matching::scan::ExhaustiveSearch;
use crate::parsing::hiercc::HierCcTable;
use crate::utils::validation::validate_batch_size;

#[derive(Args)]
#[command(group(
    ArgGroup::new("reference")
        .required(true)
        .args(["index", "profiles"])
))]
pub struct ResolveArgs {
    /// Query allele calls (chewBBACA `results_alleles.tsv`)
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Cluster index directory written by `precluster`
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Full reference profile table; compares every query with every profile
    #[arg(short, long)]
    pub profiles: Option<PathBuf>,

    /// hierCC table (`ST` column then one column per level)
    #[arg(long, required = true)]
    pub hiercc: PathBuf,

    /// Output table; comma-separated if it ends in `.csv`, tab-separated otherwise
    #[arg(short, long, required = true)]
    pub output: PathBuf,

    /// Error table for isolates that could not be resolved [default: <OUTPUT>.errors.tsv]
    #[arg(long)]
    pub errors: Option<PathBuf>,

    /// Reference rows read per chunk in exhaustive mode
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Allele token meaning "no call" (repeatable; defaults to the index's tokens)
    #[arg(long = "missing")]
    pub missing: Vec<String>,

    /// Suffix of the locus columns in the query table
    #[arg(long, default_value = CHEWBBACA_LOCUS_SUFFIX)]
    pub locus_suffix: String,

    /// Suffix removed from query ids to form isolate names
    #[arg(long, default_value = CHEWBBACA_LOCUS_SUFFIX)]
    pub isolate_suffix: String,

    /// Worker threads (defaults to all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,
}

impl ResolveArgs {
    fn config(&self, index_missing: Option<&MissingAlleles>) -> anyhow::Result<ResolverConfig> {
        let missing_alleles = if !self.missing.is_empty() {
            MissingAlleles::new(self.missing.iter().cloned())
        } else if let Some(missing) = index_missing {
            missing.clone()
        } else {
            MissingAlleles::default()
        };

        Ok(ResolverConfig {
            batch_size: validate_batch_size(self.batch_size)?,
            missing_alleles,
            query_naming: LocusNaming::with_suffix(self.locus_suffix.clone()),
            isolate_suffix: self.isolate_suffix.clone(),
        })
    }

    fn errors_path(&self) -> PathBuf {
        self.errors.clone().unwrap_or_else(|| {
            let mut name = self.output.as_os_str().to_owned();
            name.push(".errors.tsv");
            PathBuf::from(name)
        })
    }
}

/// Execute resolve subcommand
///
/// # Errors
///
/// Returns an error if an input cannot be read, the query table lacks a
/// reference locus, or the output cannot be written. Isolates that fail on
/// their own are reported in the error table and do not abort the run.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: ResolveArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| anyhow::anyhow!("Failed to initialize thread pool: {e}"))?;
    }

    let hiercc = HierCcTable::load(&args.hiercc)?;
    info!(
        "Loaded hierCC assignments for {} STs ({} levels)",
        hiercc.len(),
        hiercc.columns().len().saturating_sub(1)
    );

    let report = match (&args.index, &args.profiles) {
        (Some(index_dir), _) => {
            let index = ClusterIndex::open(index_dir)?;
            if verbose {
                eprintln!(
                    "Opened {} index with {} representatives over {} loci",
                    index.cluster_level(),
                    index.representatives().len(),
                    index.header().len()
                );
            }
            let config = args.config(Some(&index.manifest().missing_alleles))?;
            let resolver = Resolver::new(&index, &hiercc, config);
            let queries = resolver.load_queries(&args.input)?;
            resolver.resolve_all(&queries)?
        }
        (None, Some(profiles)) => {
            let search = ExhaustiveSearch::new(profiles, &hiercc, args.config(None)?)?;
            if verbose {
                eprintln!(
                    "Comparing against every profile of {} ({} loci)",
                    profiles.display(),
                    search.header().len()
                );
            }
            let queries = search.load_queries(&args.input)?;
            search.run(&queries)?
        }
        (None, None) => anyhow::bail!("one of --index or --profiles is required"),
    };

    write_report(&report, &args.output, &args.errors_path())?;

    match format {
        OutputFormat::Text => print_text_results(&report, &args.output),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Tsv => {
            write_verdicts(std::io::stdout().lock(), b'\t', &report.header, &report.verdicts)?;
        }
    }

    Ok(())
}

fn write_report(report: &ResolutionReport, output: &Path, errors: &Path) -> anyhow::Result<()> {
    let file = File::create(output)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", output.display()))?;
    write_verdicts(
        BufWriter::new(file),
        delimiter_for(output),
        &report.header,
        &report.verdicts,
    )?;

    if report.failures.is_empty() {
        if errors.is_file() {
            std::fs::remove_file(errors)?;
        }
        return Ok(());
    }

    let file = File::create(errors)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", errors.display()))?;
    write_failures(BufWriter::new(file), b'\t', &report.failures)?;
    warn!(
        "{} isolate(s) could not be resolved; see {}",
        report.failures.len(),
        errors.display()
    );
    Ok(())
}

fn print_text_results(report: &ResolutionReport, output: &Path) {
    println!(
        "Resolved {} isolate(s), {} failed; results written to {}",
        report.verdicts.len(),
        report.failures.len(),
        output.display()
    );

    if !report.verdicts.is_empty() {
        let name_width = report
            .verdicts
            .iter()
            .map(|v| v.isolate_name.len())
            .max()
            .unwrap_or(7)
            .max(7);
        println!();
        println!(
            "{:<name_width$}  {:>10}  {:>9}  {:>10}  CONFIDENCE",
            "ISOLATE", "ST", "MATCHING", "MISMATCHES"
        );
        for v in &report.verdicts {
            println!(
                "{:<name_width$}  {:>10}  {:>9}  {:>10}  {}",
                v.isolate_name,
                v.selected_st,
                format!("{}/{}", v.matching_alleles, v.nr_loci),
                v.max_mismatches,
                v.confidence_level
            );
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!("Unresolved isolates:");
        for f in &report.failures {
            println!("  {} ({}): {}", f.isolate_name, f.stage, f.message);
        }
    }
}
