//! Service layer responsible for staging, loading and validating tables.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::common::error::{CoreError, CoreResult};
use crate::common::ids::ContentHash;
use crate::common::time;

use super::domain::{
    parse_number, ColumnKind, DataRepo, Dataset, DatasetId, NumericStats, Table, ValidationReport,
};

/// Parse delimited text into a [`Table`]. Header names are trimmed.
pub fn read_table<R: Read>(reader: R, delimiter: u8) -> CoreResult<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(reader);

    let header: Vec<String> = rdr
        .headers()
        .map_err(|e| CoreError::invalid(format!("unreadable header: {e}")))?
        .iter()
        .map(|name| name.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| CoreError::invalid(format!("malformed row: {e}")))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Table::new(header, rows)
}

/// Load a staged, comma-separated table from disk.
pub fn load_table(path: &Path) -> CoreResult<Table> {
    let file = fs::File::open(path).map_err(|e| CoreError::io(path, e))?;
    let table = read_table(file, b',')?;
    debug!(path = %path.display(), rows = table.n_rows(), cols = table.n_cols(), "loaded table");
    Ok(table)
}

/// Write a table as comma-separated text.
pub fn write_table(table: &Table, path: &Path) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
    }
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| CoreError::internal(format!("cannot open {}: {e}", path.display())))?;
    let write_err = |e: csv::Error| CoreError::internal(format!("write {}: {e}", path.display()));
    wtr.write_record(table.header()).map_err(write_err)?;
    for row in table.rows() {
        wtr.write_record(row).map_err(write_err)?;
    }
    wtr.flush().map_err(|e| CoreError::io(path, e))?;
    Ok(())
}

/// Stage a raw delimited file: normalise the header, rewrite it as CSV under
/// `staged_path` and record its metadata in `repo`.
pub fn ingest_file(
    source: &Path,
    delimiter: u8,
    staged_path: &Path,
    repo: &dyn DataRepo,
) -> CoreResult<Dataset> {
    let file = fs::File::open(source).map_err(|e| CoreError::io(source, e))?;
    let table = read_table(file, delimiter)?;
    write_table(&table, staged_path)?;

    let staged = fs::read(staged_path).map_err(|e| CoreError::io(staged_path, e))?;
    let digest = ContentHash::hex_of(&staged);
    let dataset = Dataset {
        id: DatasetId::new(format!("ds-{}", &digest[..16])),
        staged_path: staged_path.to_path_buf(),
        columns: table.header().to_vec(),
        rows: table.n_rows() as u64,
        created_ms: time::now_ms(),
    };
    repo.put_dataset(&dataset)?;

    info!(
        dataset = %dataset.id,
        rows = dataset.rows,
        cols = dataset.columns.len(),
        path = %staged_path.display(),
        "staged dataset"
    );
    Ok(dataset)
}

/// Summarise a staged table: shape, null counts, inferred types and numeric
/// ranges.
pub fn validation_report(table: &Table, target: &str) -> ValidationReport {
    let mut null_counts = BTreeMap::new();
    let mut dtypes = BTreeMap::new();
    let mut numeric_stats = BTreeMap::new();

    for (col, name) in table.header().iter().enumerate() {
        let present = table.column_values(col).count();
        null_counts.insert(name.clone(), table.n_rows() - present);

        let kind = table.column_kind(col);
        dtypes.insert(name.clone(), kind);

        if kind == ColumnKind::Numeric && present > 0 {
            let values: Vec<f64> = table.column_values(col).filter_map(parse_number).collect();
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            numeric_stats.insert(name.clone(), NumericStats { min, max, mean });
        }
    }

    ValidationReport {
        shape: (table.n_rows(), table.n_cols()),
        columns: table.header().to_vec(),
        target_present: table.column_index(target).is_some(),
        null_counts,
        dtypes,
        numeric_stats,
    }
}

/// Down-sample to at most `max_rows` rows with a seeded draw. Tables already
/// within the limit are returned unchanged.
pub fn sample_rows(table: &Table, max_rows: usize, seed: u64) -> Table {
    if table.n_rows() <= max_rows {
        return table.clone();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, table.n_rows(), max_rows).into_vec();
    picked.sort_unstable();
    table.select_rows(&picked)
}
