use std::io::Cursor;
use std::path::Path;

use crate::core::profile::{LocusHeader, LocusNaming};
use crate::parsing::chunks::ProfileChunks;
use crate::parsing::{read_header, ParseError};

/// An immutable, column-aligned batch of allelic profiles.
///
/// Rows hold the profile id (ST or sample name) and one allele call per locus
/// of the shared [`LocusHeader`], in header order. Allele calls are opaque
/// strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTable {
    id_column: String,
    nr_loci: usize,
    ids: Vec<String>,
    alleles: Vec<String>,
}

impl ProfileTable {
    /// Create an empty table for `nr_loci` loci
    #[must_use]
    pub fn empty(id_column: impl Into<String>, nr_loci: usize) -> Self {
        Self {
            id_column: id_column.into(),
            nr_loci,
            ids: Vec::new(),
            alleles: Vec::new(),
        }
    }

    /// Load a whole table as a single batch, restricted to the id column and `header`
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Schema` if any locus column is absent, or an I/O or
    /// format error if the file cannot be read.
    pub fn load(
        path: &Path,
        header: &LocusHeader,
        naming: &LocusNaming,
    ) -> Result<Self, ParseError> {
        let chunks = ProfileChunks::open(path, header, naming, usize::MAX)?;
        collect_single(chunks, header)
    }

    /// Parse table text, mainly for tests and small in-memory inputs
    ///
    /// # Errors
    ///
    /// Same as [`ProfileTable::load`].
    pub fn parse_text(
        text: &str,
        header: &LocusHeader,
        naming: &LocusNaming,
    ) -> Result<Self, ParseError> {
        let source = Box::new(Cursor::new(text.as_bytes().to_vec()));
        let chunks = ProfileChunks::from_reader(source, "<text>", header, naming, usize::MAX)?;
        collect_single(chunks, header)
    }

    pub(crate) fn push_row<'a, I>(&mut self, id: &str, alleles: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let before = self.alleles.len();
        self.ids.push(id.to_string());
        self.alleles.extend(alleles.into_iter().map(str::to_string));
        debug_assert_eq!(self.alleles.len() - before, self.nr_loci);
    }

    /// Name of the id column in the source file
    #[must_use]
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    #[must_use]
    pub fn nr_loci(&self) -> usize {
        self.nr_loci
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    #[must_use]
    pub fn id(&self, row: usize) -> &str {
        &self.ids[row]
    }

    /// Allele calls of one row, in locus header order
    #[must_use]
    pub fn row(&self, row: usize) -> &[String] {
        let start = row * self.nr_loci;
        &self.alleles[start..start + self.nr_loci]
    }

    /// Iterate over `(id, alleles)` pairs in file order
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.ids
            .iter()
            .enumerate()
            .map(move |(i, id)| (id.as_str(), self.row(i)))
    }
}

fn collect_single(
    mut chunks: ProfileChunks,
    header: &LocusHeader,
) -> Result<ProfileTable, ParseError> {
    let id_column = chunks.id_column().to_string();
    match chunks.next() {
        Some(table) => table,
        None => Ok(ProfileTable::empty(id_column, header.len())),
    }
}

/// Derive the locus header from a trusted table.
///
/// The first `skip` columns are identifiers; every remaining column is a
/// locus, named according to `naming`.
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` if the table has no locus columns or a
/// column does not follow the naming convention.
pub fn read_locus_header(
    path: &Path,
    skip: usize,
    naming: &LocusNaming,
) -> Result<LocusHeader, ParseError> {
    let columns = read_header(path)?;
    locus_header_from_columns(&columns, skip, naming).map_err(|msg| {
        ParseError::InvalidFormat(format!("{}: {msg}", path.display()))
    })
}

/// Derive the locus header from already-read column names
///
/// # Errors
///
/// Returns a message if there are no locus columns or a column does not
/// follow the naming convention.
pub fn locus_header_from_columns(
    columns: &[String],
    skip: usize,
    naming: &LocusNaming,
) -> Result<LocusHeader, String> {
    if columns.len() <= skip {
        return Err(format!(
            "expected at least {} columns, found {}",
            skip + 1,
            columns.len()
        ));
    }

    let loci = columns[skip..]
        .iter()
        .map(|column| {
            naming.strip(column).map(str::to_string).ok_or_else(|| {
                format!(
                    "column '{column}' does not end with locus suffix '{}'",
                    naming.suffix()
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LocusHeader::new(loci))
}
