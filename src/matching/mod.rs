//! Nearest-profile resolution of query isolates.
//!
//! - [`scoring`]: per-row matching-locus counts between a query and a batch
//! - [`selector`]: running best-match reduction with first-seen tie breaking
//! - [`engine`]: two-stage [`engine::Resolver`] over a published cluster index
//! - [`scan`]: single-stage [`scan::ExhaustiveSearch`] over the full reference table
//!
//! ## Resolution
//!
//! Each isolate moves through the same stages, in order:
//!
//! 1. **Match representatives**: score the query against one profile per coarse cluster
//! 2. **Select cluster**: keep the representative with the most matching loci
//! 3. **Match cluster members**: score the query against every profile of that cluster
//! 4. **Select ST**: keep the member with the most matching loci
//! 5. **Look up hierCC**: fetch the selected ST's hierCC row
//! 6. **Emit**: derive mismatches and confidence level
//!
//! A locus matches only when both calls are present and identical. Ties keep
//! the candidate that appears first in file order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hiercc_solver::catalog::store::ClusterIndex;
//! use hiercc_solver::matching::engine::{Resolver, ResolverConfig};
//! use hiercc_solver::parsing::hiercc::HierCcTable;
//! use std::path::Path;
//!
//! let index = ClusterIndex::open(Path::new("salmonella_index")).unwrap();
//! let hiercc = HierCcTable::load(Path::new("hiercc.tsv.gz")).unwrap();
//! let resolver = Resolver::new(&index, &hiercc, ResolverConfig::default());
//!
//! let queries = resolver.load_queries(Path::new("results_alleles.tsv")).unwrap();
//! let report = resolver.resolve_all(&queries).unwrap();
//! for verdict in &report.verdicts {
//!     println!("{}: ST {} ({})", verdict.isolate_name, verdict.selected_st, verdict.confidence_level);
//! }
//! ```

pub mod engine;
pub mod scan;
pub mod scoring;
pub mod selector;

pub use engine::{ResolutionReport, ResolveError, Resolver, ResolverConfig};
pub use scan::ExhaustiveSearch;
