//! Bounded-memory, single-pass scans over large profile tables.
//!
//! A [`ProfileChunks`] resolves column alignment once from the table header
//! and then yields [`ProfileTable`] batches of at most `batch_size` rows, in
//! file order, until the source is exhausted. Every row appears in exactly
//! one batch. The batch size only trades memory for throughput; it never
//! changes which rows are produced.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::core::profile::{LocusHeader, LocusNaming};
use crate::parsing::tsv::ProfileTable;
use crate::parsing::{open_source, table_reader, ParseError};

pub struct ProfileChunks {
    reader: csv::Reader<Box<dyn Read + Send>>,
    source: String,
    id_column: String,
    columns: Vec<usize>,
    batch_size: usize,
    record: StringRecord,
    rows_read: usize,
    exhausted: bool,
}

impl std::fmt::Debug for ProfileChunks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileChunks")
            .field("source", &self.source)
            .field("id_column", &self.id_column)
            .field("batch_size", &self.batch_size)
            .field("rows_read", &self.rows_read)
            .finish_non_exhaustive()
    }
}

impl ProfileChunks {
    /// Open a table file for chunked reading
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Schema` if any locus column is absent, or an I/O
    /// or format error if the header cannot be read.
    pub fn open(
        path: &Path,
        header: &LocusHeader,
        naming: &LocusNaming,
        batch_size: usize,
    ) -> Result<Self, ParseError> {
        let source = open_source(path)?;
        Self::from_reader(
            source,
            &path.display().to_string(),
            header,
            naming,
            batch_size,
        )
    }

    /// Chunk an arbitrary byte source; `source_name` is only used in error messages
    ///
    /// # Errors
    ///
    /// Same as [`ProfileChunks::open`].
    pub fn from_reader(
        source: Box<dyn Read + Send>,
        source_name: &str,
        header: &LocusHeader,
        naming: &LocusNaming,
        batch_size: usize,
    ) -> Result<Self, ParseError> {
        if batch_size == 0 {
            return Err(ParseError::InvalidFormat(
                "batch size must be at least 1".to_string(),
            ));
        }

        let mut reader = table_reader(source);
        let headers = reader.headers()?.clone();
        let id_column = headers
            .get(0)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ParseError::InvalidFormat(format!("{source_name}: table has no header line"))
            })?
            .to_string();
        let columns = resolve_columns(&headers, header, naming, source_name)?;

        Ok(Self {
            reader,
            source: source_name.to_string(),
            id_column,
            columns,
            batch_size,
            record: StringRecord::new(),
            rows_read: 0,
            exhausted: false,
        })
    }

    #[must_use]
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Number of data rows consumed so far
    #[must_use]
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    fn read_batch(&mut self) -> Result<ProfileTable, ParseError> {
        let mut table = ProfileTable::empty(self.id_column.clone(), self.columns.len());

        while table.len() < self.batch_size {
            if !self.reader.read_record(&mut self.record)? {
                self.exhausted = true;
                break;
            }
            let record = &self.record;
            let id = record.get(0).unwrap_or_default();
            table.push_row(
                id,
                self.columns
                    .iter()
                    .map(|&col| record.get(col).unwrap_or_default()),
            );
            self.rows_read += 1;
        }

        Ok(table)
    }
}

impl Iterator for ProfileChunks {
    type Item = Result<ProfileTable, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        match self.read_batch() {
            Ok(table) if table.is_empty() => None,
            Ok(table) => Some(Ok(table)),
            Err(e) => {
                // A failed scan cannot be resumed
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for ProfileChunks {}

/// Map every locus of `header` to its column index in the source table
fn resolve_columns(
    headers: &StringRecord,
    header: &LocusHeader,
    naming: &LocusNaming,
    source_name: &str,
) -> Result<Vec<usize>, ParseError> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(headers.len());
    for (i, name) in headers.iter().enumerate().skip(1) {
        if positions.insert(name, i).is_some() {
            return Err(ParseError::InvalidFormat(format!(
                "{source_name}: duplicate column '{name}'"
            )));
        }
    }

    let mut columns = Vec::with_capacity(header.len());
    let mut missing = Vec::new();
    for locus in header.loci() {
        let column = naming.decorate(locus);
        match positions.get(column.as_str()) {
            Some(&i) => columns.push(i),
            None => missing.push(column),
        }
    }

    if !missing.is_empty() {
        return Err(ParseError::Schema {
            path: source_name.to_string(),
            missing,
        });
    }

    Ok(columns)
}
