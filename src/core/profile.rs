use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Suffix chewBBACA appends to every locus column (the schema's FASTA file name)
pub const CHEWBBACA_LOCUS_SUFFIX: &str = ".fasta";

/// Tokens treated as "no allele call" unless configured otherwise
pub const DEFAULT_MISSING_TOKENS: [&str; 4] = ["", "-", "0", "LNF"];

/// The canonical, ordered locus list of a cgMLST scheme.
///
/// Derived once from a trusted table and reused to select and align the
/// columns of every other table that takes part in a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocusHeader {
    loci: Vec<String>,
}

impl LocusHeader {
    #[must_use]
    pub fn new(loci: Vec<String>) -> Self {
        Self { loci }
    }

    #[must_use]
    pub fn loci(&self) -> &[String] {
        &self.loci
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.loci.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loci.is_empty()
    }
}

/// Column naming convention of a profile table.
///
/// Reference tables use bare locus names; chewBBACA output carries a suffix.
/// `decorate` and `strip` are exact inverses of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocusNaming {
    #[serde(default)]
    suffix: String,
}

impl LocusNaming {
    /// Bare locus names, as used by Enterobase
    #[must_use]
    pub fn bare() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// chewBBACA naming (`<locus>.fasta`)
    #[must_use]
    pub fn chewbbaca() -> Self {
        Self::with_suffix(CHEWBBACA_LOCUS_SUFFIX)
    }

    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Column name of `locus` in a table using this convention
    #[must_use]
    pub fn decorate(&self, locus: &str) -> String {
        format!("{locus}{}", self.suffix)
    }

    /// Locus name of `column`, or None if the column does not follow this convention
    #[must_use]
    pub fn strip<'a>(&self, column: &'a str) -> Option<&'a str> {
        column.strip_suffix(self.suffix.as_str())
    }
}

/// Set of allele tokens that mean "no call"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct MissingAlleles {
    tokens: Vec<String>,
    lookup: HashSet<String>,
}

impl MissingAlleles {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let tokens: Vec<String> = tokens
            .into_iter()
            .map(Into::into)
            .filter(|t| seen.insert(t.clone()))
            .collect();
        Self {
            lookup: seen,
            tokens,
        }
    }

    #[must_use]
    pub fn is_missing(&self, allele: &str) -> bool {
        self.lookup.contains(allele.trim())
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl From<Vec<String>> for MissingAlleles {
    fn from(tokens: Vec<String>) -> Self {
        Self::new(tokens)
    }
}

impl From<MissingAlleles> for Vec<String> {
    fn from(missing: MissingAlleles) -> Self {
        missing.tokens
    }
}

impl Default for MissingAlleles {
    fn default() -> Self {
        Self::new(DEFAULT_MISSING_TOKENS)
    }
}

/// Remove the chewBBACA file suffix from an isolate name.
///
/// Only an exact trailing suffix is removed; `sample_fasta` stays as is.
#[must_use]
pub fn isolate_name(file: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return file.to_string();
    }
    file.strip_suffix(suffix).unwrap_or(file).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_round_trip() {
        let naming = LocusNaming::chewbbaca();
        let column = naming.decorate("STMMW_00001");
        assert_eq!(column, "STMMW_00001.fasta");
        assert_eq!(naming.strip(&column), Some("STMMW_00001"));
        assert_eq!(naming.strip("STMMW_00001"), None);
    }

    #[test]
    fn test_bare_naming_is_identity() {
        let naming = LocusNaming::bare();
        assert_eq!(naming.decorate("locus"), "locus");
        assert_eq!(naming.strip("locus"), Some("locus"));
    }

    #[test]
    fn test_missing_alleles() {
        let missing = MissingAlleles::default();
        assert!(missing.is_missing(""));
        assert!(missing.is_missing("LNF"));
        assert!(missing.is_missing("0"));
        assert!(!missing.is_missing("12"));

        let custom = MissingAlleles::new(["N", "N", "?"]);
        assert_eq!(custom.tokens(), &["N".to_string(), "?".to_string()]);
        assert!(custom.is_missing("?"));
        assert!(!custom.is_missing("0"));
    }

    #[test]
    fn test_isolate_name_strips_exact_suffix() {
        assert_eq!(isolate_name("sample1.fasta", ".fasta"), "sample1");
        // Only the suffix, not trailing characters from the suffix set
        assert_eq!(isolate_name("staff.fasta", ".fasta"), "staff");
        assert_eq!(isolate_name("sample_a", ".fasta"), "sample_a");
        assert_eq!(isolate_name("sample.fasta", ""), "sample.fasta");
    }
}
