//! Core dataset definitions: staged tables, dataset metadata and the
//! validation report produced for every staged table.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::common::error::{CoreError, CoreResult};

/// Cell spellings treated as absent, mirroring the usual CSV NA markers.
const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL"];

/// Content-derived identifier for a staged dataset.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dataset metadata stored alongside the staged table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub staged_path: PathBuf,
    pub columns: Vec<String>,
    pub rows: u64,
    pub created_ms: u64,
}

/// Repository contract for dataset metadata persistence.
pub trait DataRepo {
    fn put_dataset(&self, dataset: &Dataset) -> CoreResult<()>;
    fn get_dataset(&self, id: &DatasetId) -> CoreResult<Dataset>;
}

/// Storage type inferred for a column of a staged table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// Whether a raw cell counts as absent.
pub fn is_missing_cell(raw: &str) -> bool {
    let trimmed = raw.trim();
    MISSING_MARKERS.contains(&trimmed)
}

/// Parse a cell as a finite number, `None` for anything else.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// In-memory row-major table with a named header. Cells keep their raw
/// text; typing happens through [`Table::column_kind`].
#[derive(Clone, Debug, Default)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl Table {
    /// Build a table, rejecting duplicate column names and ragged rows.
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> CoreResult<Self> {
        let mut index = HashMap::with_capacity(header.len());
        for (pos, name) in header.iter().enumerate() {
            if index.insert(name.clone(), pos).is_some() {
                return Err(CoreError::invalid(format!("duplicate column '{name}'")));
            }
        }
        if let Some((line, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != header.len())
        {
            return Err(CoreError::invalid(format!(
                "row {line} has {} cells, header has {}",
                row.len(),
                header.len()
            )));
        }
        Ok(Self {
            header,
            rows,
            index,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.header.len()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Cell text, or `None` when the cell is absent.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .filter(|raw| !is_missing_cell(raw))
    }

    /// Non-missing cells of one column in row order.
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = &str> + '_ {
        (0..self.rows.len()).filter_map(move |row| self.cell(row, col))
    }

    /// Numeric when every present cell parses as a finite number. A column
    /// with no present cells counts as numeric.
    pub fn column_kind(&self, col: usize) -> ColumnKind {
        if self.column_values(col).all(|raw| parse_number(raw).is_some()) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Text
        }
    }

    /// Borrowed view of one row, addressable by column name.
    pub fn row(&self, row: usize) -> RowView<'_> {
        RowView { table: self, row }
    }

    /// New table holding only the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            header: self.header.clone(),
            rows: rows
                .iter()
                .filter_map(|&r| self.rows.get(r).cloned())
                .collect(),
            index: self.index.clone(),
        }
    }
}

/// One row of a [`Table`].
#[derive(Copy, Clone, Debug)]
pub struct RowView<'a> {
    table: &'a Table,
    row: usize,
}

impl<'a> RowView<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let col = self.table.column_index(column)?;
        self.table.cell(self.row, col)
    }
}

/// Summary statistics for a numeric column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Diagnostic report for a staged table. Informational only; training does
/// not read it back.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationReport {
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub target_present: bool,
    pub null_counts: BTreeMap<String, usize>,
    pub dtypes: BTreeMap<String, ColumnKind>,
    pub numeric_stats: BTreeMap<String, NumericStats>,
}
