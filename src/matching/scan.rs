//! Single-stage resolution against the full reference table.
//!
//! Every query is compared with every reference profile. The table is read
//! once, in chunks, and each chunk is scored against all queries before the
//! next one is read, so memory stays bounded by the chunk size.

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::core::profile::{LocusHeader, LocusNaming};
use crate::core::verdict::{verdict_header, IsolateVerdict};
use crate::matching::engine::{
    emit_verdict, ResolutionReport, ResolveError, ResolverConfig, Stage, StageError,
};
use crate::matching::scoring::{score_batch, QueryProfile};
use crate::matching::selector::BestMatchSelector;
use crate::parsing::chunks::ProfileChunks;
use crate::parsing::hiercc::HierCcTable;
use crate::parsing::tsv::read_locus_header;
use crate::parsing::ParseError;

pub struct ExhaustiveSearch<'a> {
    profiles: &'a Path,
    header: LocusHeader,
    hiercc: &'a HierCcTable,
    config: ResolverConfig,
}

impl<'a> ExhaustiveSearch<'a> {
    /// Prepare a scan over a reference profile table (`ST` column then loci)
    ///
    /// # Errors
    ///
    /// Returns an error if the table header cannot be read.
    pub fn new(
        profiles: &'a Path,
        hiercc: &'a HierCcTable,
        config: ResolverConfig,
    ) -> Result<Self, ParseError> {
        let header = read_locus_header(profiles, 1, &LocusNaming::bare())?;
        Ok(Self {
            profiles,
            header,
            hiercc,
            config,
        })
    }

    #[must_use]
    pub fn header(&self) -> &LocusHeader {
        &self.header
    }

    /// Load the query table aligned to the reference table's loci
    ///
    /// # Errors
    ///
    /// See [`ResolverConfig::load_queries`].
    pub fn load_queries(&self, path: &Path) -> Result<Vec<QueryProfile>, ParseError> {
        self.config.load_queries(path, &self.header)
    }

    /// Scan the reference table once and resolve every query
    ///
    /// # Errors
    ///
    /// Returns an error if the reference table cannot be read, or the first
    /// fatal per-isolate error in query order.
    pub fn run(&self, queries: &[QueryProfile]) -> Result<ResolutionReport, ResolveError> {
        let start = Instant::now();
        let mut chunks = ProfileChunks::open(
            self.profiles,
            &self.header,
            &LocusNaming::bare(),
            self.config.batch_size,
        )?;

        let mut selectors = vec![BestMatchSelector::new(); queries.len()];
        for chunk in chunks.by_ref() {
            let chunk = chunk?;
            let chunk_start = Instant::now();
            // Chunks arrive in table order, so each one merges in as the later half
            selectors
                .par_iter_mut()
                .zip(queries.par_iter())
                .for_each(|(selector, query)| {
                    let mut in_chunk = BestMatchSelector::new();
                    in_chunk.fold(score_batch(query, &chunk));
                    *selector = std::mem::take(selector).merge(in_chunk);
                });
            debug!(
                "Scored {} reference profiles against {} queries in {:.2?}",
                chunk.len(),
                queries.len(),
                chunk_start.elapsed()
            );
        }

        let source = self.profiles.display().to_string();
        debug!("Scanned {} reference profiles from {source}", chunks.rows_read());
        let outcomes: Vec<Result<IsolateVerdict, StageError>> = selectors
            .into_iter()
            .zip(queries)
            .map(|(selector, query)| {
                let best = selector.finish().ok_or_else(|| StageError {
                    stage: Stage::SelectSt,
                    error: ResolveError::NoCandidates(source.clone()),
                })?;
                emit_verdict(self.hiercc, query, &best)
            })
            .collect();

        let report =
            ResolutionReport::collect(verdict_header(self.hiercc.columns()), queries, outcomes)?;
        info!(
            "Resolved {} of {} isolate(s) against {} in {:.2?}",
            report.verdicts.len(),
            queries.len(),
            source,
            start.elapsed()
        );
        Ok(report)
    }
}
