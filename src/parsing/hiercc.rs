use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

use tracing::warn;

use crate::parsing::{open_source, table_reader, ParseError};

/// Normalize a hierCC column name.
///
/// Enterobase annotates some levels, e.g. `HC400 (cgST Cplx)`; the
/// parenthesised annotation is dropped so the level can be addressed as
/// `HC400`. Only level lookup uses the normalized name; output keeps the
/// column names as written.
#[must_use]
pub fn normalize_level_name(name: &str) -> String {
    let name = name.trim();
    match name.find(" (") {
        Some(pos) if name.ends_with(')') => name[..pos].trim_end().to_string(),
        _ => name.to_string(),
    }
}

/// Lookup table from ST to its hierarchical clonal complex assignments.
///
/// The first column is the ST; every other column is one hierCC level.
#[derive(Debug, Clone)]
pub struct HierCcTable {
    columns: Vec<String>,
    levels: Vec<String>,
    rows: Vec<Vec<String>>,
    by_st: HashMap<String, usize>,
}

impl HierCcTable {
    /// Load the full table
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io`/`ParseError::Csv` if the file cannot be read or
    /// has ragged rows, or `ParseError::InvalidFormat` if it has no columns.
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        Self::from_reader(open_source(path)?, &path.display().to_string())
    }

    /// Parse table text
    ///
    /// # Errors
    ///
    /// Same as [`HierCcTable::load`].
    pub fn parse_text(text: &str) -> Result<Self, ParseError> {
        Self::from_reader(Cursor::new(text.as_bytes().to_vec()), "<text>")
    }

    fn from_reader<R: Read>(source: R, source_name: &str) -> Result<Self, ParseError> {
        let mut reader = table_reader(source);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.first().map_or(true, |c| c.trim().is_empty()) {
            return Err(ParseError::InvalidFormat(format!(
                "{source_name}: hierCC table has no header line"
            )));
        }

        let mut rows = Vec::new();
        let mut by_st = HashMap::new();
        let mut duplicates = 0usize;

        for record in reader.records() {
            let record = record?;
            let row: Vec<String> = record.iter().map(str::to_string).collect();
            let st = row[0].clone();
            if by_st.contains_key(&st) {
                duplicates += 1;
                continue;
            }
            by_st.insert(st, rows.len());
            rows.push(row);
        }

        if duplicates > 0 {
            warn!("{source_name}: ignored {duplicates} duplicate ST row(s), keeping the first");
        }

        let levels = columns.iter().map(|c| normalize_level_name(c)).collect();
        Ok(Self {
            columns,
            levels,
            rows,
            by_st,
        })
    }

    /// Column names as written in the source, ST column first
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of a hierCC level column, by normalized name
    #[must_use]
    pub fn level_index(&self, level: &str) -> Option<usize> {
        let level = normalize_level_name(level);
        self.levels.iter().skip(1).position(|c| *c == level).map(|i| i + 1)
    }

    /// Full row of an ST, aligned with [`HierCcTable::columns`]
    #[must_use]
    pub fn lookup(&self, st: &str) -> Option<&[String]> {
        self.by_st.get(st).map(|&i| self.rows[i].as_slice())
    }

    /// Iterate rows in file order
    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
