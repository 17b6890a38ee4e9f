//! Core data types for cgMLST profile resolution.
//!
//! - [`types::SequenceType`]: opaque ST identifier with numeric-aware ordering
//! - [`types::ConfidenceLevel`]: hierCC-named bucket for a mismatch count
//! - [`profile::LocusHeader`]: canonical locus order shared by compared tables
//! - [`profile::LocusNaming`], [`profile::MissingAlleles`]: column and allele conventions
//! - [`verdict::IsolateVerdict`]: the assignment written for each isolate
//!
//! ## Locus naming
//!
//! | Source     | Locus column        | Missing call |
//! |------------|---------------------|--------------|
//! | Enterobase | `STMMW_00001`       | `-` or `0`   |
//! | chewBBACA  | `STMMW_00001.fasta` | `LNF`        |
//!
//! Tables are aligned by locus name after removing the naming suffix, never by
//! column position.

pub mod profile;
pub mod types;
pub mod verdict;
