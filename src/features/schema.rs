//! The feature schema: which input fields are categorical or numeric, and
//! the categorical vocabulary frozen at training time.
//!
//! The schema is the whole input contract of a trained model. It is
//! extracted once from the training table, persisted next to (and inside)
//! the model artefact, and only ever read afterwards.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::error::{CoreError, CoreResult};
use crate::common::ids::ContentHash;
use crate::data::domain::{ColumnKind, Table};

use super::encoder::MISSING_CATEGORY;

/// Bumped whenever the encoded layout produced from a schema changes.
pub const SCHEMA_FORMAT_VERSION: u32 = 1;

/// Frozen input contract of a trained model.
///
/// Encoded layout: one indicator block per categorical column (in column
/// order, each block in vocabulary order), then the numeric columns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub format_version: u32,
    pub target: String,
    #[serde(rename = "categorical")]
    pub categorical_columns: Vec<String>,
    #[serde(rename = "numeric")]
    pub numeric_columns: Vec<String>,
    /// Sorted, de-duplicated observed values per categorical column.
    pub vocabulary: BTreeMap<String, Vec<String>>,
}

impl Schema {
    /// Derive the schema of a labeled table. Column roles follow the inferred
    /// storage type; `target` is excluded from both roles. Absent categorical
    /// cells are recorded under the `"missing"` category so the default used
    /// at serving time has an indicator of its own.
    pub fn extract(table: &Table, target: &str) -> CoreResult<Self> {
        if table.column_index(target).is_none() {
            return Err(CoreError::config(format!(
                "target column '{target}' not present in table"
            )));
        }

        let mut categorical_columns = Vec::new();
        let mut numeric_columns = Vec::new();
        let mut vocabulary = BTreeMap::new();

        for (col, name) in table.header().iter().enumerate() {
            if name == target {
                continue;
            }
            match table.column_kind(col) {
                ColumnKind::Numeric => numeric_columns.push(name.clone()),
                ColumnKind::Text => {
                    let mut values: BTreeSet<String> =
                        table.column_values(col).map(str::to_string).collect();
                    if table.column_values(col).count() < table.n_rows() {
                        values.insert(MISSING_CATEGORY.to_string());
                    }
                    vocabulary.insert(name.clone(), values.into_iter().collect());
                    categorical_columns.push(name.clone());
                }
            }
        }

        if categorical_columns.is_empty() && numeric_columns.is_empty() {
            return Err(CoreError::config("table has no feature columns besides the target"));
        }

        let schema = Self {
            format_version: SCHEMA_FORMAT_VERSION,
            target: target.to_string(),
            categorical_columns,
            numeric_columns,
            vocabulary,
        };
        debug!(
            categorical = schema.categorical_columns.len(),
            numeric = schema.numeric_columns.len(),
            width = schema.width(),
            "extracted feature schema"
        );
        Ok(schema)
    }

    /// Length of every encoded vector produced from this schema.
    pub fn width(&self) -> usize {
        self.categorical_columns
            .iter()
            .map(|c| self.vocab(c).len())
            .sum::<usize>()
            + self.numeric_columns.len()
    }

    /// Vocabulary of a categorical column (empty for unknown columns).
    pub fn vocab(&self, column: &str) -> &[String] {
        self.vocabulary.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names of the encoded positions, `<column>_<value>` for indicators.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        for column in &self.categorical_columns {
            names.extend(self.vocab(column).iter().map(|v| format!("{column}_{v}")));
        }
        names.extend(self.numeric_columns.iter().cloned());
        names
    }

    /// Canonical JSON encoding. Field order is fixed by the struct and the
    /// vocabulary map is sorted, so equal schemas give equal bytes.
    pub fn canonical_json(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// SHA-256 of the canonical JSON encoding.
    pub fn fingerprint(&self) -> CoreResult<String> {
        Ok(ContentHash::hex_of(&self.canonical_json()?))
    }

    /// Structural checks applied to every schema read from disk.
    pub fn validate(&self) -> CoreResult<()> {
        if self.format_version != SCHEMA_FORMAT_VERSION {
            return Err(CoreError::ArtifactCorrupt(format!(
                "schema format version {} unsupported (expected {SCHEMA_FORMAT_VERSION})",
                self.format_version
            )));
        }

        let mut seen = BTreeSet::new();
        for column in self.categorical_columns.iter().chain(&self.numeric_columns) {
            if !seen.insert(column.as_str()) {
                return Err(CoreError::ArtifactCorrupt(format!(
                    "column '{column}' declared twice"
                )));
            }
        }
        if seen.contains(self.target.as_str()) {
            return Err(CoreError::ArtifactCorrupt(
                "target column declared as a feature".to_string(),
            ));
        }

        let declared: BTreeSet<&str> = self.categorical_columns.iter().map(String::as_str).collect();
        let with_vocab: BTreeSet<&str> = self.vocabulary.keys().map(String::as_str).collect();
        if declared != with_vocab {
            return Err(CoreError::ArtifactCorrupt(
                "vocabulary keys do not match categorical columns".to_string(),
            ));
        }
        for (column, values) in &self.vocabulary {
            if values.windows(2).any(|w| w[0] >= w[1]) {
                return Err(CoreError::ArtifactCorrupt(format!(
                    "vocabulary of '{column}' is not sorted and unique"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn bank_table() -> Table {
        Table::new(
            strings(&["age", "job", "y", "contact"]),
            vec![
                strings(&["30", "blue-collar", "no", "cellular"]),
                strings(&["41", "admin", "yes", ""]),
                strings(&["52", "admin", "no", "telephone"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn partitions_columns_in_header_order() {
        let schema = Schema::extract(&bank_table(), "y").unwrap();
        assert_eq!(schema.categorical_columns, strings(&["job", "contact"]));
        assert_eq!(schema.numeric_columns, strings(&["age"]));
        assert_eq!(schema.vocab("job"), strings(&["admin", "blue-collar"]).as_slice());
        assert_eq!(
            schema.vocab("contact"),
            strings(&["cellular", "missing", "telephone"]).as_slice()
        );
        assert_eq!(schema.width(), 2 + 3 + 1);
        schema.validate().unwrap();
    }

    #[test]
    fn extraction_is_byte_reproducible() {
        let a = Schema::extract(&bank_table(), "y").unwrap();
        let b = Schema::extract(&bank_table(), "y").unwrap();
        assert_eq!(a.canonical_json().unwrap(), b.canonical_json().unwrap());
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn feature_names_follow_layout() {
        let schema = Schema::extract(&bank_table(), "y").unwrap();
        assert_eq!(
            schema.feature_names(),
            strings(&[
                "job_admin",
                "job_blue-collar",
                "contact_cellular",
                "contact_missing",
                "contact_telephone",
                "age"
            ])
        );
    }

    #[test]
    fn missing_target_is_config_error() {
        let err = Schema::extract(&bank_table(), "label").unwrap_err();
        assert_eq!(err.code(), crate::common::error::CoreCode::Config);
    }

    #[test]
    fn target_only_table_is_config_error() {
        let table = Table::new(strings(&["y"]), vec![strings(&["yes"])]).unwrap();
        assert!(Schema::extract(&table, "y").is_err());
    }

    #[test]
    fn validate_rejects_tampered_schema() {
        let mut schema = Schema::extract(&bank_table(), "y").unwrap();
        schema.vocabulary.insert(
            "job".to_string(),
            strings(&["blue-collar", "admin"]),
        );
        assert!(schema.validate().is_err());

        let mut overlap = Schema::extract(&bank_table(), "y").unwrap();
        overlap.numeric_columns.push("job".to_string());
        assert!(overlap.validate().is_err());

        let mut version = Schema::extract(&bank_table(), "y").unwrap();
        version.format_version = 99;
        assert!(version.validate().is_err());
    }
}
