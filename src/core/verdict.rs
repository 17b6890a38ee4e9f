//! Per-isolate outcomes of a resolution run and the tables they are written to.

use std::io::Write;
use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::core::types::{ConfidenceLevel, SequenceType};

/// Columns written before the hierCC columns, in order
pub const VERDICT_COLUMNS: [&str; 5] = [
    "isolate_name",
    "matching_alleles",
    "max_mismatches",
    "confidence_level",
    "nr_loci",
];

/// Columns of the per-isolate error table
pub const FAILURE_COLUMNS: [&str; 4] = ["isolate_name", "stage", "error_kind", "message"];

/// Coarse cluster chosen in the first stage of a two-stage resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterChoice {
    pub level: String,
    pub value: String,
    /// Matching loci between the query and the cluster representative
    pub representative_matches: usize,
}

/// Final assignment of one isolate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsolateVerdict {
    pub isolate_name: String,
    pub selected_st: SequenceType,
    pub matching_alleles: usize,
    pub nr_loci: usize,
    pub max_mismatches: usize,
    pub confidence_level: ConfidenceLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterChoice>,
    /// hierCC row of the selected ST as `(column, value)` pairs, ST column first
    #[serde(serialize_with = "ordered_map")]
    pub hiercc: Vec<(String, String)>,
}

impl IsolateVerdict {
    /// Build a verdict; mismatches and confidence follow from the match count
    #[must_use]
    pub fn new(
        isolate_name: impl Into<String>,
        selected_st: SequenceType,
        matching_alleles: usize,
        nr_loci: usize,
        hiercc: Vec<(String, String)>,
    ) -> Self {
        let max_mismatches = nr_loci.saturating_sub(matching_alleles);
        Self {
            isolate_name: isolate_name.into(),
            selected_st,
            matching_alleles,
            nr_loci,
            max_mismatches,
            confidence_level: ConfidenceLevel::from_mismatches(max_mismatches),
            cluster: None,
            hiercc,
        }
    }

    #[must_use]
    pub fn with_cluster(mut self, cluster: ClusterChoice) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Output row: the fixed columns followed by every hierCC value
    #[must_use]
    pub fn to_record(&self) -> Vec<String> {
        let mut record = vec![
            self.isolate_name.clone(),
            self.matching_alleles.to_string(),
            self.max_mismatches.to_string(),
            self.confidence_level.to_string(),
            self.nr_loci.to_string(),
        ];
        record.extend(self.hiercc.iter().map(|(_, value)| value.clone()));
        record
    }
}

fn ordered_map<S>(pairs: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (column, value) in pairs {
        map.serialize_entry(column, value)?;
    }
    map.end()
}

/// Header of the verdict table for a given hierCC column list
#[must_use]
pub fn verdict_header(hiercc_columns: &[String]) -> Vec<String> {
    VERDICT_COLUMNS
        .iter()
        .map(|c| (*c).to_string())
        .chain(hiercc_columns.iter().cloned())
        .collect()
}

/// An isolate that could not be resolved; the run carries on without it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsolateFailure {
    pub isolate_name: String,
    /// Resolution stage that failed
    pub stage: String,
    pub error_kind: String,
    pub message: String,
}

impl IsolateFailure {
    #[must_use]
    pub fn to_record(&self) -> [&str; 4] {
        [
            self.isolate_name.as_str(),
            self.stage.as_str(),
            self.error_kind.as_str(),
            self.message.as_str(),
        ]
    }
}

/// Field delimiter for an output path: comma for `.csv`, tab otherwise
#[must_use]
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
        _ => b'\t',
    }
}

/// Write a verdict table, header first
///
/// # Errors
///
/// Returns an error if a row cannot be written.
pub fn write_verdicts<W: Write>(
    sink: W,
    delimiter: u8,
    header: &[String],
    verdicts: &[IsolateVerdict],
) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(sink);
    writer.write_record(header)?;
    for verdict in verdicts {
        writer.write_record(verdict.to_record())?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the per-isolate error table, header first
///
/// # Errors
///
/// Returns an error if a row cannot be written.
pub fn write_failures<W: Write>(
    sink: W,
    delimiter: u8,
    failures: &[IsolateFailure],
) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(sink);
    writer.write_record(FAILURE_COLUMNS)?;
    for failure in failures {
        writer.write_record(failure.to_record())?;
    }
    writer.flush()?;
    Ok(())
}
