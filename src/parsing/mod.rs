//! Readers for the delimited tables exchanged with Enterobase and chewBBACA.
//!
//! This module provides:
//!
//! - **Profile tables** ([`tsv`]): ST or sample id followed by one allele call per locus
//! - **Chunked scans** ([`chunks`]): bounded-size batches over very large profile tables
//! - **hierCC tables** ([`hiercc`]): ST followed by one cluster value per hierCC level
//!
//! All tables are tab-separated with a header line. Paths ending in `.gz` or
//! `.bgz` are decompressed on the fly. Allele calls are always kept as opaque
//! strings; they are categorical and must never be coerced to numbers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hiercc_solver::core::profile::{LocusNaming, MissingAlleles};
//! use hiercc_solver::parsing::chunks::ProfileChunks;
//! use hiercc_solver::parsing::tsv::read_locus_header;
//! use std::path::Path;
//!
//! let header = read_locus_header(Path::new("profiles.list.gz"), 1, &LocusNaming::bare()).unwrap();
//! let chunks = ProfileChunks::open(Path::new("profiles.list.gz"), &header, &LocusNaming::bare(), 10_000).unwrap();
//! for chunk in chunks {
//!     let chunk = chunk.unwrap();
//!     println!("{} profiles", chunk.len());
//! }
//! ```

pub mod chunks;
pub mod hiercc;
pub mod tsv;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read table: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path}: missing required column(s): {}", .missing.join(", "))]
    Schema { path: String, missing: Vec<String> },

    #[error("Invalid table format: {0}")]
    InvalidFormat(String),
}

impl ParseError {
    /// Schema errors mean the inputs come from incompatible scheme versions
    #[must_use]
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }
}

/// Check if the path is a gzipped file
#[allow(clippy::case_sensitive_file_extension_comparisons)] // Already lowercased
pub fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".bgz")
}

/// Open a file for reading, decompressing gzip/bgzip transparently
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be opened.
pub fn open_source(path: &Path) -> Result<Box<dyn Read + Send>, ParseError> {
    let file = File::open(path)?;
    if is_gzipped(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Build a tab-separated table reader over any byte source
pub fn table_reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(source)
}

/// Read only the header line of a table
///
/// # Errors
///
/// Returns `ParseError::Io`/`ParseError::Csv` if the file cannot be read, or
/// `ParseError::InvalidFormat` if the header line is empty.
pub fn read_header(path: &Path) -> Result<Vec<String>, ParseError> {
    let mut reader = table_reader(open_source(path)?);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(ParseError::InvalidFormat(format!(
            "{}: table has no header line",
            path.display()
        )));
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_gzipped() {
        assert!(is_gzipped(Path::new("profiles.list.gz")));
        assert!(is_gzipped(Path::new("profiles.TSV.BGZ")));
        assert!(!is_gzipped(Path::new("profiles.list")));
    }

    #[test]
    fn test_read_header_plain_and_gzipped() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("profiles.tsv");
        std::fs::write(&plain, "ST\tlocus1\tlocus2\n1\t1\t2\n").unwrap();
        assert_eq!(read_header(&plain).unwrap(), vec!["ST", "locus1", "locus2"]);

        let gz = dir.path().join("profiles.tsv.gz");
        let mut encoder = flate2::write::GzEncoder::new(
            std::fs::File::create(&gz).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(b"ST\tlocus1\n1\t1\n").unwrap();
        encoder.finish().unwrap();
        assert_eq!(read_header(&gz).unwrap(), vec!["ST", "locus1"]);
    }

    #[test]
    fn test_schema_error_names_columns() {
        let err = ParseError::Schema {
            path: "query.tsv".to_string(),
            missing: vec!["a.fasta".to_string(), "b.fasta".to_string()],
        };
        assert!(err.is_schema());
        assert_eq!(
            err.to_string(),
            "query.tsv: missing required column(s): a.fasta, b.fasta"
        );
    }
}
