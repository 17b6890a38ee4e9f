use serde::{Deserialize, Serialize};

use crate::core::profile::MissingAlleles;
use crate::parsing::tsv::ProfileTable;

/// Number of loci a candidate shares with the query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Row id of the candidate (ST, or cluster value for representatives)
    pub candidate: String,

    /// Loci with identical, non-missing allele calls
    pub match_count: usize,
}

/// A query profile with missing calls masked out once, up front.
///
/// A masked locus can never score, so a reference row cannot earn credit for
/// sharing a missing call with the query.
#[derive(Debug, Clone)]
pub struct QueryProfile {
    /// Isolate name
    pub name: String,

    alleles: Vec<Option<String>>,
}

impl QueryProfile {
    pub fn new<'a, I>(name: impl Into<String>, alleles: I, missing: &MissingAlleles) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let alleles = alleles
            .into_iter()
            .map(|allele| (!missing.is_missing(allele)).then(|| allele.to_string()))
            .collect();
        Self {
            name: name.into(),
            alleles,
        }
    }

    /// Build one query per row of a query table
    #[must_use]
    pub fn from_table(
        table: &ProfileTable,
        missing: &MissingAlleles,
        name_of: impl Fn(&str) -> String,
    ) -> Vec<Self> {
        table
            .rows()
            .map(|(id, row)| Self::new(name_of(id), row.iter().map(String::as_str), missing))
            .collect()
    }

    #[must_use]
    pub fn nr_loci(&self) -> usize {
        self.alleles.len()
    }

    /// Number of loci with an allele call
    #[must_use]
    pub fn called_loci(&self) -> usize {
        self.alleles.iter().filter(|a| a.is_some()).count()
    }

    /// Count loci where `row` carries the same call as this query
    #[must_use]
    pub fn matches(&self, row: &[String]) -> usize {
        debug_assert_eq!(row.len(), self.alleles.len());
        self.alleles
            .iter()
            .zip(row)
            .filter(|(query, candidate)| query.as_deref() == Some(candidate.as_str()))
            .count()
    }
}

/// Score every row of a batch against the query, in row order
#[must_use]
pub fn score_batch(query: &QueryProfile, batch: &ProfileTable) -> Vec<MatchResult> {
    batch
        .rows()
        .map(|(id, row)| MatchResult {
            candidate: id.to_string(),
            match_count: query.matches(row),
        })
        .collect()
}

/// Matching loci between two raw profiles; missing calls on either side never match
#[must_use]
pub fn match_count(a: &[String], b: &[String], missing: &MissingAlleles) -> usize {
    a.iter()
        .zip(b)
        .filter(|(x, y)| x == y && !missing.is_missing(x))
        .count()
}
