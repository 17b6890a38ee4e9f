//! Precluster index of reference profiles.
//!
//! A reference profile table can hold hundreds of thousands of STs, too many
//! to compare every query against. The index groups STs by one coarse hierCC
//! level (HC400 by default) and stores:
//!
//! - `manifest.json`: format version, cluster level, locus order and counts
//! - `representatives.tsv`: one profile per cluster, its numerically lowest ST
//! - `<LEVEL>_<value>.tsv`: one shard per cluster with all member profiles
//!
//! [`builder::ClusterIndexBuilder`] writes the index into a staging directory
//! and renames it into place, so readers never see a partial index.
//! [`store::ClusterIndex`] opens a published index read-only.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hiercc_solver::catalog::builder::{BuilderConfig, ClusterIndexBuilder};
//! use hiercc_solver::catalog::store::ClusterIndex;
//! use std::path::Path;
//!
//! let summary = ClusterIndexBuilder::new(BuilderConfig::default())
//!     .build(
//!         Path::new("profiles.list.gz"),
//!         Path::new("hiercc.tsv.gz"),
//!         Path::new("salmonella_index"),
//!     )
//!     .unwrap();
//! println!("{} shards", summary.shards);
//!
//! let index = ClusterIndex::open(Path::new("salmonella_index")).unwrap();
//! assert_eq!(index.cluster_level(), "HC400");
//! ```

pub mod builder;
pub mod store;
