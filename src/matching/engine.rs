use std::fmt;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::store::ClusterIndex;
use crate::core::profile::{isolate_name, LocusHeader, LocusNaming, MissingAlleles};
use crate::core::types::SequenceType;
use crate::core::verdict::{verdict_header, ClusterChoice, IsolateFailure, IsolateVerdict};
use crate::matching::scoring::{score_batch, MatchResult, QueryProfile};
use crate::matching::selector::BestMatchSelector;
use crate::parsing::hiercc::HierCcTable;
use crate::parsing::tsv::ProfileTable;
use crate::parsing::ParseError;

/// Default number of reference rows scored per batch
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Errors raised while resolving a single isolate.
///
/// Most are reported per isolate and the run continues; see
/// [`ResolveError::is_fatal`].
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No shard for {level} cluster {cluster}; the index does not match its representatives")]
    ShardNotFound { level: String, cluster: String },

    #[error(
        "ST {0} is not in the hierCC table; profiles and hierCC must come from the same database release"
    )]
    UnresolvedSt(String),

    #[error("No candidate profiles in {0}")]
    NoCandidates(String),

    #[error("Assembled {found} output columns, expected {expected}")]
    MalformedRow { expected: usize, found: usize },

    #[error("Failed to read {path}: {source}")]
    Read { path: String, source: ParseError },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ResolveError {
    /// Errors that invalidate the whole run rather than one isolate
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MalformedRow { .. } | Self::Parse(_) => true,
            Self::Read { source, .. } => source.is_schema(),
            Self::ShardNotFound { .. } | Self::UnresolvedSt(_) | Self::NoCandidates(_) => false,
        }
    }

    /// Short machine-readable kind for the error table
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ShardNotFound { .. } => "shard_not_found",
            Self::UnresolvedSt(_) => "unresolved_st",
            Self::NoCandidates(_) => "no_candidates",
            Self::MalformedRow { .. } => "malformed_row",
            Self::Read { .. } => "read_error",
            Self::Parse(_) => "parse_error",
        }
    }
}

/// Steps an isolate passes through, strictly in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MatchRepresentatives,
    SelectCluster,
    MatchClusterMembers,
    SelectSt,
    LookupHierCc,
    Emit,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MatchRepresentatives => "match_representatives",
            Self::SelectCluster => "select_cluster",
            Self::MatchClusterMembers => "match_cluster_members",
            Self::SelectSt => "select_st",
            Self::LookupHierCc => "lookup_hiercc",
            Self::Emit => "emit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error tagged with the stage it happened in
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub error: ResolveError,
}

impl StageError {
    fn new(stage: Stage, error: ResolveError) -> Self {
        Self { stage, error }
    }

    fn into_failure(self, isolate: &str) -> IsolateFailure {
        IsolateFailure {
            isolate_name: isolate.to_string(),
            stage: self.stage.to_string(),
            error_kind: self.error.kind().to_string(),
            message: self.error.to_string(),
        }
    }
}

/// Configuration for resolving query profiles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Rows per batch when a table is scanned in chunks
    pub batch_size: usize,
    /// Tokens that mean "no allele call"
    pub missing_alleles: MissingAlleles,
    /// Column naming of the query table
    pub query_naming: LocusNaming,
    /// Suffix removed from query ids to form isolate names
    pub isolate_suffix: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            missing_alleles: MissingAlleles::default(),
            query_naming: LocusNaming::chewbbaca(),
            isolate_suffix: crate::core::profile::CHEWBBACA_LOCUS_SUFFIX.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Load the query table aligned to `header`, masking missing calls
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Schema` if the query lacks any locus of `header`,
    /// or an I/O or format error.
    pub fn load_queries(
        &self,
        path: &Path,
        header: &LocusHeader,
    ) -> Result<Vec<QueryProfile>, ParseError> {
        let table = ProfileTable::load(path, header, &self.query_naming)?;
        let queries = QueryProfile::from_table(&table, &self.missing_alleles, |id| {
            isolate_name(id, &self.isolate_suffix)
        });
        info!(
            "Loaded {} query profile(s) over {} loci from {}",
            queries.len(),
            header.len(),
            path.display()
        );
        Ok(queries)
    }
}

/// Outcome of a resolution run, in query order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    /// Output columns: fixed columns followed by the hierCC columns
    pub header: Vec<String>,
    pub verdicts: Vec<IsolateVerdict>,
    pub failures: Vec<IsolateFailure>,
}

impl ResolutionReport {
    /// Fold per-isolate outcomes, in query order, stopping at the first fatal error
    ///
    /// # Errors
    ///
    /// Returns the first fatal error.
    pub(crate) fn collect(
        header: Vec<String>,
        queries: &[QueryProfile],
        outcomes: Vec<Result<IsolateVerdict, StageError>>,
    ) -> Result<Self, ResolveError> {
        let mut report = Self {
            header,
            ..Self::default()
        };
        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(verdict) => {
                    if verdict.to_record().len() != report.header.len() {
                        return Err(ResolveError::MalformedRow {
                            expected: report.header.len(),
                            found: verdict.to_record().len(),
                        });
                    }
                    report.verdicts.push(verdict);
                }
                Err(e) if e.error.is_fatal() => return Err(e.error),
                Err(e) => {
                    warn!("{}: {} failed: {}", query.name, e.stage, e.error);
                    report.failures.push(e.into_failure(&query.name));
                }
            }
        }
        Ok(report)
    }
}

/// Look up the selected ST and assemble the verdict
///
/// # Errors
///
/// Returns `ResolveError::UnresolvedSt` if the ST has no hierCC row, or
/// `ResolveError::MalformedRow` if the row is ragged.
pub(crate) fn emit_verdict(
    hiercc: &HierCcTable,
    query: &QueryProfile,
    best: &MatchResult,
) -> Result<IsolateVerdict, StageError> {
    let row = hiercc.lookup(&best.candidate).ok_or_else(|| {
        StageError::new(
            Stage::LookupHierCc,
            ResolveError::UnresolvedSt(best.candidate.clone()),
        )
    })?;

    let columns = hiercc.columns();
    if row.len() != columns.len() {
        return Err(StageError::new(
            Stage::Emit,
            ResolveError::MalformedRow {
                expected: columns.len(),
                found: row.len(),
            },
        ));
    }

    let pairs = columns.iter().cloned().zip(row.iter().cloned()).collect();
    Ok(IsolateVerdict::new(
        query.name.clone(),
        SequenceType::new(best.candidate.clone()),
        best.match_count,
        query.nr_loci(),
        pairs,
    ))
}

/// Score a batch and keep its best row.
///
/// `stages` names the scoring stage, blamed for an empty batch, and the
/// selection stage that follows it.
fn nearest(
    query: &QueryProfile,
    batch: &ProfileTable,
    stages: (Stage, Stage),
    source: impl Fn() -> String,
) -> Result<MatchResult, StageError> {
    let (scoring, selection) = stages;
    if batch.is_empty() {
        return Err(StageError::new(scoring, ResolveError::NoCandidates(source())));
    }

    let mut selector = BestMatchSelector::new();
    selector.fold(score_batch(query, batch));
    selector
        .finish()
        .ok_or_else(|| StageError::new(selection, ResolveError::NoCandidates(source())))
}

/// Two-stage resolver: nearest cluster representative, then nearest member of that cluster
pub struct Resolver<'a> {
    index: &'a ClusterIndex,
    hiercc: &'a HierCcTable,
    config: ResolverConfig,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(index: &'a ClusterIndex, hiercc: &'a HierCcTable, config: ResolverConfig) -> Self {
        Self {
            index,
            hiercc,
            config,
        }
    }

    /// Output columns of this resolver's verdict table
    #[must_use]
    pub fn output_header(&self) -> Vec<String> {
        verdict_header(self.hiercc.columns())
    }

    /// Load the query table aligned to the index's locus header
    ///
    /// # Errors
    ///
    /// See [`ResolverConfig::load_queries`].
    pub fn load_queries(&self, path: &Path) -> Result<Vec<QueryProfile>, ParseError> {
        self.config.load_queries(path, self.index.header())
    }

    /// Resolve one isolate through every stage
    ///
    /// # Errors
    ///
    /// Returns the failing stage and its error.
    pub fn resolve(&self, query: &QueryProfile) -> Result<IsolateVerdict, StageError> {
        let start = Instant::now();
        let representatives = self.index.representatives();
        let level = self.index.cluster_level();

        let cluster = nearest(
            query,
            representatives,
            (Stage::MatchRepresentatives, Stage::SelectCluster),
            || format!("{level} representatives"),
        )?;
        debug!(
            "{}: nearest {level} cluster {} ({} matching of {} called loci)",
            query.name,
            cluster.candidate,
            cluster.match_count,
            query.called_loci()
        );

        let shard = self.index.shard_path(&cluster.candidate).ok_or_else(|| {
            StageError::new(
                Stage::SelectCluster,
                ResolveError::ShardNotFound {
                    level: level.to_string(),
                    cluster: cluster.candidate.clone(),
                },
            )
        })?;
        let members = self.index.read_shard(&shard).map_err(|source| {
            StageError::new(
                Stage::MatchClusterMembers,
                ResolveError::Read {
                    path: shard.display().to_string(),
                    source,
                },
            )
        })?;

        let best = nearest(
            query,
            &members,
            (Stage::MatchClusterMembers, Stage::SelectSt),
            || shard.display().to_string(),
        )?;

        let verdict = emit_verdict(self.hiercc, query, &best)?.with_cluster(ClusterChoice {
            level: level.to_string(),
            value: cluster.candidate,
            representative_matches: cluster.match_count,
        });
        debug!(
            "{}: ST {} with {}/{} matching loci ({}) in {:.2?}",
            query.name,
            verdict.selected_st,
            verdict.matching_alleles,
            verdict.nr_loci,
            verdict.confidence_level,
            start.elapsed()
        );
        Ok(verdict)
    }

    /// Resolve every query in parallel; results keep query order
    ///
    /// # Errors
    ///
    /// Returns the first fatal error in query order. Non-fatal errors are
    /// collected into [`ResolutionReport::failures`].
    pub fn resolve_all(&self, queries: &[QueryProfile]) -> Result<ResolutionReport, ResolveError> {
        let start = Instant::now();
        let outcomes: Vec<Result<IsolateVerdict, StageError>> =
            queries.par_iter().map(|query| self.resolve(query)).collect();

        let report = ResolutionReport::collect(self.output_header(), queries, outcomes)?;
        info!(
            "Resolved {} of {} isolate(s) in {:.2?}",
            report.verdicts.len(),
            queries.len(),
            start.elapsed()
        );
        Ok(report)
    }
}
