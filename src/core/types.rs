use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sequence type identifier from a cgMLST database
///
/// STs are opaque strings on disk. Ordering is numeric when both ids parse as
/// unsigned integers and lexicographic otherwise, with numeric ids first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceType(pub String);

impl SequenceType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.trim().parse().ok()
    }
}

impl Ord for SequenceType {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for SequenceType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for SequenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Confidence bucket for an assignment, named after the finest hierCC level
/// whose threshold is not exceeded by the number of mismatching loci
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "HC20")]
    Hc20,
    #[serde(rename = "HC50")]
    Hc50,
    #[serde(rename = "HC100")]
    Hc100,
    #[serde(rename = "HC200")]
    Hc200,
    #[serde(rename = "HC400")]
    Hc400,
    #[serde(rename = "HC1100")]
    Hc1100,
    #[serde(rename = "unreliable")]
    Unreliable,
}

impl ConfidenceLevel {
    /// Bounded buckets in ascending order; anything above the last is unreliable
    pub const THRESHOLDS: [(usize, ConfidenceLevel); 6] = [
        (20, Self::Hc20),
        (50, Self::Hc50),
        (100, Self::Hc100),
        (200, Self::Hc200),
        (400, Self::Hc400),
        (1100, Self::Hc1100),
    ];

    #[must_use]
    pub fn from_mismatches(max_mismatches: usize) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(threshold, _)| max_mismatches <= *threshold)
            .map_or(Self::Unreliable, |(_, level)| *level)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hc20 => "HC20",
            Self::Hc50 => "HC50",
            Self::Hc100 => "HC100",
            Self::Hc200 => "HC200",
            Self::Hc400 => "HC400",
            Self::Hc1100 => "HC1100",
            Self::Unreliable => "unreliable",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
