use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::profile::{LocusHeader, LocusNaming, MissingAlleles};
use crate::parsing::tsv::{read_locus_header, ProfileTable};
use crate::parsing::ParseError;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read cluster index: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse cluster index manifest: {0}")]
    ManifestError(#[from] serde_json::Error),

    #[error("Failed to read cluster index table: {0}")]
    Parse(#[from] ParseError),

    #[error("No cluster index found in {0} (missing {MANIFEST_FILE})")]
    MissingManifest(String),

    #[error("Unsupported cluster index version {found} (expected {INDEX_VERSION})")]
    UnsupportedVersion { found: String },

    #[error("Inconsistent cluster index: {0}")]
    Inconsistent(String),

    #[error("Cluster index in {0} has no representatives")]
    EmptyIndex(String),
}

/// Index format version for compatibility checking
pub const INDEX_VERSION: &str = "1.0.0";

pub const MANIFEST_FILE: &str = "manifest.json";
pub const REPRESENTATIVES_FILE: &str = "representatives.tsv";

/// Attempts made to open a shard before giving up on transient I/O errors
const SHARD_READ_ATTEMPTS: u32 = 3;

/// Description of a published cluster index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub version: String,
    /// hierCC level the reference profiles were clustered on
    pub cluster_level: String,
    /// Id column of the reference profile table (usually `ST`)
    pub id_column: String,
    pub nr_loci: usize,
    /// Distinct cluster values in the hierCC table
    pub clusters: usize,
    /// Shard files written (clusters with at least one reference profile)
    pub shards: usize,
    /// Clusters whose representative profile was found
    pub representatives: usize,
    pub missing_alleles: MissingAlleles,
    pub loci: Vec<String>,
}

/// File name of the shard holding every member of one cluster
#[must_use]
pub fn shard_file_name(cluster_level: &str, cluster_value: &str) -> String {
    format!("{cluster_level}_{cluster_value}.tsv")
}

/// A read-only, published cluster index: representatives plus per-cluster shards
#[derive(Debug)]
pub struct ClusterIndex {
    root: PathBuf,
    manifest: IndexManifest,
    header: LocusHeader,
    representatives: ProfileTable,
}

impl ClusterIndex {
    /// Open an index directory written by [`crate::catalog::builder::ClusterIndexBuilder`]
    ///
    /// # Errors
    ///
    /// Returns `IndexError::MissingManifest` if `root` holds no index, an
    /// error if the manifest or representative table cannot be read, and
    /// `IndexError::Inconsistent` if they disagree.
    pub fn open(root: &Path) -> Result<Self, IndexError> {
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(IndexError::MissingManifest(root.display().to_string()));
        }
        let manifest: IndexManifest =
            serde_json::from_str(&std::fs::read_to_string(&manifest_path)?)?;

        if manifest.version != INDEX_VERSION {
            return Err(IndexError::UnsupportedVersion {
                found: manifest.version,
            });
        }

        Self::open_with_representatives(root, manifest, &root.join(REPRESENTATIVES_FILE))
    }

    fn open_with_representatives(
        root: &Path,
        manifest: IndexManifest,
        representatives_path: &Path,
    ) -> Result<Self, IndexError> {
        // The representative table is the trusted source of the locus order
        let header = read_locus_header(representatives_path, 2, &LocusNaming::bare())?;
        if header.loci() != manifest.loci.as_slice() {
            return Err(IndexError::Inconsistent(format!(
                "{} loci differ from manifest",
                representatives_path.display()
            )));
        }

        let representatives = ProfileTable::load(representatives_path, &header, &LocusNaming::bare())?;
        if representatives.id_column() != manifest.cluster_level {
            return Err(IndexError::Inconsistent(format!(
                "representative table is keyed by '{}', manifest says '{}'",
                representatives.id_column(),
                manifest.cluster_level
            )));
        }
        if representatives.is_empty() {
            return Err(IndexError::EmptyIndex(root.display().to_string()));
        }

        debug!(
            "Opened cluster index {} ({} representatives, {} loci)",
            root.display(),
            representatives.len(),
            header.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            header,
            representatives,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    #[must_use]
    pub fn cluster_level(&self) -> &str {
        &self.manifest.cluster_level
    }

    /// Canonical locus order shared by every table compared against this index
    #[must_use]
    pub fn header(&self) -> &LocusHeader {
        &self.header
    }

    /// One row per cluster, keyed by cluster value
    #[must_use]
    pub fn representatives(&self) -> &ProfileTable {
        &self.representatives
    }

    /// Path of a cluster's shard, or None if no shard exists for it
    #[must_use]
    pub fn shard_path(&self, cluster_value: &str) -> Option<PathBuf> {
        let path = self
            .root
            .join(shard_file_name(&self.manifest.cluster_level, cluster_value));
        path.is_file().then_some(path)
    }

    /// Read a shard as a single batch, retrying transient I/O failures
    ///
    /// # Errors
    ///
    /// Returns the last error if every attempt fails, or immediately on
    /// non-I/O errors.
    pub fn read_shard(&self, path: &Path) -> Result<ProfileTable, ParseError> {
        let mut attempt = 1;
        loop {
            match ProfileTable::load(path, &self.header, &LocusNaming::bare()) {
                Err(ParseError::Io(e))
                    if attempt < SHARD_READ_ATTEMPTS
                        && e.kind() != std::io::ErrorKind::NotFound =>
                {
                    warn!(
                        "Reading shard {} failed (attempt {attempt}/{SHARD_READ_ATTEMPTS}): {e}",
                        path.display()
                    );
                    std::thread::sleep(Duration::from_millis(100 * u64::from(attempt)));
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
