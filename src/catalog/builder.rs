//! Cluster index builder.
//!
//! The `ClusterIndexBuilder` partitions a reference profile table into one
//! shard per coarse hierCC cluster, picks the numerically lowest ST of every
//! cluster as its representative, and publishes the shards, the
//! representative table and a manifest as a single directory.
//!
//! Shard rows keep the order of the reference profile table, not the order
//! of the hierCC table; ties inside a cluster go to the earlier profile row.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::store::{
    shard_file_name, IndexManifest, INDEX_VERSION, MANIFEST_FILE, REPRESENTATIVES_FILE,
};
use crate::core::profile::{LocusHeader, LocusNaming, MissingAlleles};
use crate::core::types::SequenceType;
use crate::parsing::chunks::ProfileChunks;
use crate::parsing::hiercc::HierCcTable;
use crate::parsing::tsv::{locus_header_from_columns, ProfileTable};
use crate::parsing::{read_header, ParseError};
use crate::utils::validation::{validate_batch_size, validate_cluster_value, ValidationError};

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to write table: {0}")]
    Write(#[from] csv::Error),

    #[error("Failed to write manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hierCC table has no column for cluster level '{0}'")]
    MissingLevel(String),

    #[error("Invalid cluster value '{value}' for ST {st}: {source}")]
    InvalidClusterValue {
        value: String,
        st: String,
        source: ValidationError,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("Output already exists: {0} (use --force to replace it)")]
    Exists(String),
}

/// Default hierCC level used to precluster reference profiles
pub const DEFAULT_CLUSTER_LEVEL: &str = "HC400";

/// Default number of rows per chunk when scanning the reference table
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// hierCC column to cluster on
    pub cluster_level: String,
    /// Rows per chunk when scanning the reference table
    pub batch_size: usize,
    /// Tokens recorded in the manifest as "no call"
    pub missing_alleles: MissingAlleles,
    /// Replace an existing index at the output path
    pub force: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            cluster_level: DEFAULT_CLUSTER_LEVEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            missing_alleles: MissingAlleles::default(),
            force: false,
        }
    }
}

/// Statistics reported after a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub cluster_level: String,
    pub nr_loci: usize,
    /// Distinct cluster values in the hierCC table
    pub clusters: usize,
    /// Shards written (clusters with at least one reference profile)
    pub shards: usize,
    /// Representatives whose profile was found
    pub representatives: usize,
    /// Clusters dropped because their representative has no profile
    pub missing_representatives: usize,
    /// Reference profiles scanned
    pub profiles_scanned: usize,
    /// Reference profiles whose ST is absent from the hierCC table
    pub unassigned_profiles: usize,
    /// hierCC rows without a value at the cluster level
    pub skipped_hiercc_rows: usize,
}

/// One coarse cluster: its value, representative ST and shard state
#[derive(Debug)]
struct Cluster {
    value: String,
    representative: SequenceType,
    members: usize,
    shard_started: bool,
    representative_row: Option<Vec<String>>,
}

/// Clusters in first-appearance order of the hierCC table
#[derive(Debug, Default)]
struct ClusterAssignment {
    clusters: Vec<Cluster>,
    by_st: HashMap<String, usize>,
    skipped_rows: usize,
}

impl ClusterAssignment {
    fn from_hiercc(hiercc: &HierCcTable, level: &str) -> Result<Self, BuilderError> {
        let level_idx = hiercc
            .level_index(level)
            .ok_or_else(|| BuilderError::MissingLevel(level.to_string()))?;

        let mut assignment = Self::default();
        let mut by_value: HashMap<String, usize> = HashMap::new();

        for row in hiercc.rows() {
            let st = row[0].trim();
            let value = row[level_idx].trim();
            if st.is_empty() || value.is_empty() {
                assignment.skipped_rows += 1;
                continue;
            }

            validate_cluster_value(value).map_err(|source| BuilderError::InvalidClusterValue {
                value: value.to_string(),
                st: st.to_string(),
                source,
            })?;

            let st_type = SequenceType::new(st);
            let idx = match by_value.get(value) {
                Some(&idx) => {
                    let cluster = &mut assignment.clusters[idx];
                    if st_type < cluster.representative {
                        cluster.representative = st_type;
                    }
                    cluster.members += 1;
                    idx
                }
                None => {
                    let idx = assignment.clusters.len();
                    by_value.insert(value.to_string(), idx);
                    assignment.clusters.push(Cluster {
                        value: value.to_string(),
                        representative: st_type,
                        members: 1,
                        shard_started: false,
                        representative_row: None,
                    });
                    idx
                }
            };
            assignment.by_st.insert(st.to_string(), idx);
        }

        Ok(assignment)
    }
}

/// Builds a published cluster index from a reference profile table and a hierCC table
#[derive(Debug, Clone, Default)]
pub struct ClusterIndexBuilder {
    config: BuilderConfig,
}

impl ClusterIndexBuilder {
    #[must_use]
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// Run the full build and atomically publish the index at `output`
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::Exists` if `output` exists and `force` is not
    /// set, `BuilderError::MissingLevel` if the hierCC table lacks the cluster
    /// level, or any read/write error. Nothing is published on error.
    pub fn build(
        &self,
        profiles: &Path,
        hiercc: &Path,
        output: &Path,
    ) -> Result<BuildSummary, BuilderError> {
        let start = Instant::now();
        validate_batch_size(self.config.batch_size)?;

        if output.exists() && !self.config.force {
            return Err(BuilderError::Exists(output.display().to_string()));
        }

        let hiercc_table = HierCcTable::load(hiercc)?;
        let mut assignment =
            ClusterAssignment::from_hiercc(&hiercc_table, &self.config.cluster_level)?;
        drop(hiercc_table);

        if assignment.skipped_rows > 0 {
            warn!(
                "Skipped {} hierCC row(s) without a {} value",
                assignment.skipped_rows, self.config.cluster_level
            );
        }
        info!(
            "Grouped {} STs into {} {} clusters",
            assignment.by_st.len(),
            assignment.clusters.len(),
            self.config.cluster_level
        );

        let columns = read_header(profiles)?;
        let id_column = columns[0].clone();
        let header = locus_header_from_columns(&columns, 1, &LocusNaming::bare()).map_err(|msg| {
            ParseError::InvalidFormat(format!("{}: {msg}", profiles.display()))
        })?;

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let staging = tempfile::Builder::new()
            .prefix(".hiercc-index-")
            .tempdir_in(&parent)?;

        let mut summary =
            self.write_shards(profiles, &header, &id_column, &mut assignment, staging.path())?;
        summary.skipped_hiercc_rows = assignment.skipped_rows;

        self.write_representatives(
            &header,
            &id_column,
            &mut assignment,
            staging.path(),
            &mut summary,
        )?;

        let manifest = IndexManifest {
            version: INDEX_VERSION.to_string(),
            cluster_level: self.config.cluster_level.clone(),
            id_column: id_column.clone(),
            nr_loci: header.len(),
            clusters: summary.clusters,
            shards: summary.shards,
            representatives: summary.representatives,
            missing_alleles: self.config.missing_alleles.clone(),
            loci: header.loci().to_vec(),
        };
        let manifest_path = staging.path().join(MANIFEST_FILE);
        let writer = BufWriter::new(std::fs::File::create(&manifest_path)?);
        serde_json::to_writer_pretty(writer, &manifest)?;

        publish(staging.path(), output)?;
        // The staging directory has been moved away; dropping it is a no-op
        drop(staging);

        debug!("Cluster index build took {:.2?}", start.elapsed());
        info!(
            "Published {} shards and {} representatives to {}",
            summary.shards,
            summary.representatives,
            output.display()
        );

        Ok(summary)
    }

    /// Stream the reference table once and append each chunk's rows to their cluster shards
    fn write_shards(
        &self,
        profiles: &Path,
        header: &LocusHeader,
        id_column: &str,
        assignment: &mut ClusterAssignment,
        staging: &Path,
    ) -> Result<BuildSummary, BuilderError> {
        let mut summary = BuildSummary {
            cluster_level: self.config.cluster_level.clone(),
            nr_loci: header.len(),
            clusters: assignment.clusters.len(),
            ..BuildSummary::default()
        };

        let chunks =
            ProfileChunks::open(profiles, header, &LocusNaming::bare(), self.config.batch_size)?;

        for chunk in chunks {
            let chunk = chunk?;
            let chunk_start = Instant::now();

            // Bucket rows by cluster; rows keep their file order inside a bucket
            let mut buckets: Vec<(usize, Vec<usize>)> = Vec::new();
            let mut bucket_of: HashMap<usize, usize> = HashMap::new();

            for (row, (st, alleles)) in chunk.rows().enumerate() {
                summary.profiles_scanned += 1;
                let Some(&cluster_idx) = assignment.by_st.get(st.trim()) else {
                    summary.unassigned_profiles += 1;
                    continue;
                };

                let cluster = &mut assignment.clusters[cluster_idx];
                if cluster.representative.as_str() == st.trim()
                    && cluster.representative_row.is_none()
                {
                    cluster.representative_row = Some(alleles.to_vec());
                }

                let bucket = *bucket_of.entry(cluster_idx).or_insert_with(|| {
                    buckets.push((cluster_idx, Vec::new()));
                    buckets.len() - 1
                });
                buckets[bucket].1.push(row);
            }

            for (cluster_idx, rows) in &buckets {
                let cluster = &mut assignment.clusters[*cluster_idx];
                let path =
                    staging.join(shard_file_name(&self.config.cluster_level, &cluster.value));
                append_shard_rows(&path, &chunk, rows, header, id_column, !cluster.shard_started)?;
                if !cluster.shard_started {
                    cluster.shard_started = true;
                    summary.shards += 1;
                }
            }

            debug!(
                "Sharded {} profiles into {} clusters in {:.2?}",
                chunk.len(),
                buckets.len(),
                chunk_start.elapsed()
            );
        }

        if summary.unassigned_profiles > 0 {
            warn!(
                "{} reference profile(s) have no {} assignment and were left out of the index",
                summary.unassigned_profiles, self.config.cluster_level
            );
        }

        Ok(summary)
    }

    /// Write one row per cluster whose representative profile was found
    fn write_representatives(
        &self,
        header: &LocusHeader,
        id_column: &str,
        assignment: &mut ClusterAssignment,
        staging: &Path,
        summary: &mut BuildSummary,
    ) -> Result<(), BuilderError> {
        let file = std::fs::File::create(staging.join(REPRESENTATIVES_FILE))?;
        let mut writer = tsv_writer(BufWriter::new(file));
        let mut columns = vec![self.config.cluster_level.as_str(), id_column];
        columns.extend(header.loci().iter().map(String::as_str));
        writer.write_record(&columns)?;

        for cluster in &mut assignment.clusters {
            match cluster.representative_row.take() {
                Some(alleles) => {
                    let mut record = vec![cluster.value.as_str(), cluster.representative.as_str()];
                    record.extend(alleles.iter().map(String::as_str));
                    writer.write_record(&record)?;
                    summary.representatives += 1;
                }
                None => {
                    summary.missing_representatives += 1;
                    debug!(
                        "No profile for representative ST {} of {} {} ({} member STs)",
                        cluster.representative,
                        self.config.cluster_level,
                        cluster.value,
                        cluster.members
                    );
                }
            }
        }
        writer.flush()?;

        if summary.missing_representatives > 0 {
            warn!(
                "{} cluster(s) have no profile for their representative ST and cannot be selected",
                summary.missing_representatives
            );
        }

        Ok(())
    }
}

fn tsv_writer<W: std::io::Write>(sink: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(sink)
}

fn append_shard_rows(
    path: &Path,
    chunk: &ProfileTable,
    rows: &[usize],
    header: &LocusHeader,
    id_column: &str,
    write_header: bool,
) -> Result<(), BuilderError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = tsv_writer(BufWriter::new(file));

    if write_header {
        let mut columns = vec![id_column];
        columns.extend(header.loci().iter().map(String::as_str));
        writer.write_record(&columns)?;
    }

    for &row in rows {
        let mut record = vec![chunk.id(row)];
        record.extend(chunk.row(row).iter().map(String::as_str));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Move a fully written staging directory into place, replacing any previous index
fn publish(staging: &Path, output: &Path) -> Result<(), BuilderError> {
    if !output.exists() {
        std::fs::rename(staging, output)?;
        return Ok(());
    }

    let name = output
        .file_name()
        .map_or_else(|| "index".to_string(), |n| n.to_string_lossy().to_string());
    let previous = output.with_file_name(format!(".{name}.previous-{}", std::process::id()));

    std::fs::rename(output, &previous)?;
    if let Err(e) = std::fs::rename(staging, output) {
        // Put the old index back so readers never see a missing directory for long
        std::fs::rename(&previous, output)?;
        return Err(e.into());
    }
    if previous.is_dir() {
        std::fs::remove_dir_all(&previous)?;
    } else {
        std::fs::remove_file(&previous)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::store::ClusterIndex;

    const PROFILES: &str = "ST\tl1\tl2\tl3\n\
                            1\tA\tB\tC\n\
                            2\tA\tB\tD\n\
                            3\tX\tY\tZ\n\
                            5\tX\tY\tW\n\
                            10\tA\tQ\tC\n\
                            99\tM\tM\tM\n";

    // Cluster 7's representative (ST 4) has no profile; ST 99 has no hierCC row
    const HIERCC: &str = "ST\tHC0\tHC400 (cgST Cplx)\n\
                          1\t1\t1\n\
                          2\t2\t1\n\
                          10\t10\t1\n\
                          3\t3\t3\n\
                          5\t5\t3\n\
                          4\t4\t7\n\
                          6\t6\t7\n";

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let profiles = dir.path().join("profiles.list");
        let hiercc = dir.path().join("hiercc.tsv");
        std::fs::write(&profiles, PROFILES).unwrap();
        std::fs::write(&hiercc, HIERCC).unwrap();
        (dir, profiles, hiercc)
    }

    fn builder(batch_size: usize, force: bool) -> ClusterIndexBuilder {
        ClusterIndexBuilder::new(BuilderConfig {
            batch_size,
            force,
            ..BuilderConfig::default()
        })
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_build_index() {
        let (dir, profiles, hiercc) = setup();
        let output = dir.path().join("index");
        let summary = builder(2, false).build(&profiles, &hiercc, &output).unwrap();

        assert_eq!(summary.clusters, 3);
        assert_eq!(summary.shards, 2);
        assert_eq!(summary.representatives, 2);
        assert_eq!(summary.missing_representatives, 1);
        assert_eq!(summary.profiles_scanned, 6);
        assert_eq!(summary.unassigned_profiles, 1);

        assert_eq!(
            read(&output.join("HC400_1.tsv")),
            "ST\tl1\tl2\tl3\n1\tA\tB\tC\n2\tA\tB\tD\n10\tA\tQ\tC\n"
        );
        assert_eq!(
            read(&output.join("HC400_3.tsv")),
            "ST\tl1\tl2\tl3\n3\tX\tY\tZ\n5\tX\tY\tW\n"
        );
        assert!(!output.join("HC400_7.tsv").exists());
        assert_eq!(
            read(&output.join(REPRESENTATIVES_FILE)),
            "HC400\tST\tl1\tl2\tl3\n1\t1\tA\tB\tC\n3\t3\tX\tY\tZ\n"
        );

        let index = ClusterIndex::open(&output).unwrap();
        assert_eq!(index.manifest().shards, 2);
        assert_eq!(index.manifest().id_column, "ST");
        assert_eq!(index.header().len(), 3);
    }

    #[test]
    fn test_representative_is_numerically_lowest() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = dir.path().join("profiles.list");
        let hiercc = dir.path().join("hiercc.tsv");
        std::fs::write(&profiles, "ST\tl1\n9\tA\n10\tB\n100\tC\n").unwrap();
        std::fs::write(&hiercc, "ST\tHC400\n100\t5\n10\t5\n9\t5\n").unwrap();

        let output = dir.path().join("index");
        builder(10, false).build(&profiles, &hiercc, &output).unwrap();
        assert_eq!(
            read(&output.join(REPRESENTATIVES_FILE)),
            "HC400\tST\tl1\n5\t9\tA\n"
        );
    }

    #[test]
    fn test_build_is_idempotent() {
        let (dir, profiles, hiercc) = setup();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        builder(1, false).build(&profiles, &hiercc, &first).unwrap();
        builder(4, false).build(&profiles, &hiercc, &second).unwrap();

        for name in [MANIFEST_FILE, REPRESENTATIVES_FILE, "HC400_1.tsv", "HC400_3.tsv"] {
            assert_eq!(
                std::fs::read(first.join(name)).unwrap(),
                std::fs::read(second.join(name)).unwrap(),
                "{name} differs"
            );
        }
    }

    #[test]
    fn test_existing_output_requires_force() {
        let (dir, profiles, hiercc) = setup();
        let output = dir.path().join("index");
        builder(3, false).build(&profiles, &hiercc, &output).unwrap();

        let err = builder(3, false).build(&profiles, &hiercc, &output).unwrap_err();
        assert!(matches!(err, BuilderError::Exists(_)));

        std::fs::write(output.join("stale.tsv"), "old").unwrap();
        builder(3, true).build(&profiles, &hiercc, &output).unwrap();
        assert!(!output.join("stale.tsv").exists());
        assert!(output.join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_missing_level_publishes_nothing() {
        let (dir, profiles, hiercc) = setup();
        let output = dir.path().join("index");
        let result = ClusterIndexBuilder::new(BuilderConfig {
            cluster_level: "HC1100".to_string(),
            ..BuilderConfig::default()
        })
        .build(&profiles, &hiercc, &output);

        assert!(matches!(result, Err(BuilderError::MissingLevel(_))));
        assert!(!output.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".hiercc-index-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    fn staging_leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with(".hiercc-index-"))
            .collect()
    }

    fn snapshot(index: &Path) -> Vec<Vec<u8>> {
        [MANIFEST_FILE, REPRESENTATIVES_FILE, "HC400_1.tsv", "HC400_3.tsv"]
            .iter()
            .map(|name| std::fs::read(index.join(name)).unwrap())
            .collect()
    }

    #[test]
    fn test_failed_build_after_first_shard_cleans_staging() {
        let (dir, profiles, hiercc) = setup();
        // The second data row is ragged; the first has already been sharded
        std::fs::write(&profiles, "ST\tl1\tl2\tl3\n1\tA\tB\tC\n2\tA\tB\n").unwrap();
        let output = dir.path().join("index");

        let result = builder(1, false).build(&profiles, &hiercc, &output);
        assert!(matches!(result, Err(BuilderError::Parse(_))));
        assert!(!output.exists());
        assert!(staging_leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_failed_rebuild_keeps_published_index() {
        let (dir, profiles, hiercc) = setup();
        let output = dir.path().join("index");
        builder(2, false).build(&profiles, &hiercc, &output).unwrap();
        let before = snapshot(&output);

        let broken = dir.path().join("broken.list");
        std::fs::write(&broken, "ST\tl1\tl2\tl3\n1\tA\tB\tC\n2\tA\n").unwrap();
        let result = builder(1, true).build(&broken, &hiercc, &output);
        assert!(result.is_err());

        let after = snapshot(&output);
        assert_eq!(before, after);
        assert!(staging_leftovers(dir.path()).is_empty());
        assert!(ClusterIndex::open(&output).is_ok());
    }

    #[test]
    fn test_shards_follow_profile_table_order() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = dir.path().join("profiles.list");
        let hiercc = dir.path().join("hiercc.tsv");
        std::fs::write(&profiles, "ST\tl1\n7\tA\n2\tB\n5\tC\n").unwrap();
        std::fs::write(&hiercc, "ST\tHC400\n2\t1\n5\t1\n7\t1\n").unwrap();

        let output = dir.path().join("index");
        builder(2, false).build(&profiles, &hiercc, &output).unwrap();
        assert_eq!(read(&output.join("HC400_1.tsv")), "ST\tl1\n7\tA\n2\tB\n5\tC\n");
        assert_eq!(read(&output.join(REPRESENTATIVES_FILE)), "HC400\tST\tl1\n1\t2\tB\n");
    }

    #[test]
    fn test_unsafe_cluster_value_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = dir.path().join("profiles.list");
        let hiercc = dir.path().join("hiercc.tsv");
        std::fs::write(&profiles, "ST\tl1\n1\tA\n").unwrap();
        std::fs::write(&hiercc, "ST\tHC400\n1\t../x\n").unwrap();

        let result = builder(10, false).build(&profiles, &hiercc, &dir.path().join("index"));
        assert!(matches!(result, Err(BuilderError::InvalidClusterValue { .. })));
    }
}
