//! # hiercc-solver
//!
//! A library for assigning bacterial isolates to the closest sequence type (ST)
//! of a cgMLST database and reporting that ST's hierarchical clustering (hierCC).
//!
//! Isolates typed with chewBBACA carry one allele call per core-genome locus.
//! Databases such as Enterobase publish hundreds of thousands of reference
//! profiles together with hierCC assignments at increasing distance thresholds
//! (HC0, HC2, ... HC1100). Comparing every query with every reference profile is
//! slow, so `hiercc-solver` works in two stages:
//!
//! 1. **Precluster** the reference profiles once on a coarse hierCC level and
//!    keep one representative profile per cluster.
//! 2. **Resolve** each query against the representatives, then against the
//!    members of the nearest cluster only.
//!
//! ## Features
//!
//! - **Locus alignment by name**: chewBBACA `.fasta` column suffixes are handled,
//!   column order never matters
//! - **Missing calls never match**: `LNF`, `-`, `0` and empty calls are masked
//! - **Deterministic ties**: the first candidate in file order wins
//! - **Bounded memory**: reference tables are read in chunks
//! - **Atomic index publishing**: readers never see a partial index
//! - **Confidence levels**: mismatch counts mapped to HC20 .. HC1100 or `unreliable`
//!
//! ## Example
//!
//! ```rust,no_run
//! use hiercc_solver::{ClusterIndex, HierCcTable, Resolver, ResolverConfig};
//! use std::path::Path;
//!
//! let index = ClusterIndex::open(Path::new("salmonella_index")).unwrap();
//! let hiercc = HierCcTable::load(Path::new("hiercc.tsv.gz")).unwrap();
//! let resolver = Resolver::new(&index, &hiercc, ResolverConfig::default());
//!
//! let queries = resolver.load_queries(Path::new("results_alleles.tsv")).unwrap();
//! let report = resolver.resolve_all(&queries).unwrap();
//!
//! for v in &report.verdicts {
//!     println!("{}: ST {} ({} mismatches, {})",
//!         v.isolate_name, v.selected_st, v.max_mismatches, v.confidence_level);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: Cluster index building and reading
//! - [`core`]: Core data types for STs, loci, allele calls and verdicts
//! - [`matching`]: Scoring, best-match selection and the resolvers
//! - [`parsing`]: Readers for profile and hierCC tables
//! - [`cli`]: Command-line interface implementation

pub mod catalog;
pub mod cli;
pub mod core;
pub mod matching;
pub mod parsing;
pub mod utils;

// Re-export commonly used types for convenience
pub use catalog::builder::{BuilderConfig, ClusterIndexBuilder};
pub use catalog::store::ClusterIndex;
pub use crate::core::types::*;
pub use crate::core::verdict::IsolateVerdict;
pub use matching::engine::{ResolutionReport, Resolver, ResolverConfig};
pub use matching::scan::ExhaustiveSearch;
pub use parsing::hiercc::HierCcTable;
