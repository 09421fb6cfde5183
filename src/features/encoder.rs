//! Schema-bound feature encoding shared by training and serving.
//!
//! Both paths go through [`encode`]: training feeds table rows, serving feeds
//! the `data` object of a request. The output width and per-position meaning
//! depend only on the [`Schema`], never on the record being encoded.

use std::borrow::Cow;

use serde_json::{Map, Number, Value};

use crate::data::domain::{is_missing_cell, parse_number, RowView, Table};

use super::schema::Schema;

/// Category substituted for absent categorical fields.
pub const MISSING_CATEGORY: &str = "missing";

/// A field value as seen by the encoder, before coercion.
#[derive(Copy, Clone, Debug)]
pub enum RawValue<'a> {
    Text(&'a str),
    Number(&'a Number),
    Bool(bool),
    /// Arrays and objects; coerced through their JSON text.
    Other(&'a Value),
}

/// Anything the encoder can look fields up in by column name. `None` means
/// the field is absent. Missing-cell markers (`""`, `NA`, ...) count as
/// absent on every implementation so rows and requests agree.
pub trait RecordView {
    fn field(&self, column: &str) -> Option<RawValue<'_>>;
}

impl RecordView for Map<String, Value> {
    fn field(&self, column: &str) -> Option<RawValue<'_>> {
        match self.get(column)? {
            Value::Null => None,
            Value::String(s) if is_missing_cell(s) => None,
            Value::String(s) => Some(RawValue::Text(s)),
            Value::Number(n) => Some(RawValue::Number(n)),
            Value::Bool(b) => Some(RawValue::Bool(*b)),
            other => Some(RawValue::Other(other)),
        }
    }
}

impl RecordView for RowView<'_> {
    fn field(&self, column: &str) -> Option<RawValue<'_>> {
        self.get(column).map(RawValue::Text)
    }
}

/// Categorical coercion: absent becomes `"missing"`, everything else its
/// text form. Whole JSON numbers render without a fraction (`2.0` becomes
/// `"2"`), matching how such values appear in a CSV column.
pub fn categorical_text(value: Option<RawValue<'_>>) -> Cow<'_, str> {
    match value {
        None => Cow::Borrowed(MISSING_CATEGORY),
        Some(RawValue::Text(s)) => Cow::Borrowed(s),
        Some(RawValue::Number(n)) => Cow::Owned(number_text(n)),
        Some(RawValue::Bool(b)) => Cow::Borrowed(if b { "true" } else { "false" }),
        Some(RawValue::Other(v)) => Cow::Owned(v.to_string()),
    }
}

fn number_text(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
            format!("{}", v as i64)
        }
        _ => n.to_string(),
    }
}

/// Numeric coercion: absent or unparseable becomes 0.
pub fn numeric_value(value: Option<RawValue<'_>>) -> f64 {
    match value {
        Some(RawValue::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Some(RawValue::Text(s)) => parse_number(s).unwrap_or(0.0),
        Some(RawValue::Bool(b)) => f64::from(u8::from(b)),
        Some(RawValue::Other(_)) | None => 0.0,
    }
}

/// Encode one record into the fixed-width vector described by `schema`.
///
/// Never fails: unknown fields are ignored, absent or malformed fields take
/// their defaults and unseen categories leave their indicator block at zero.
pub fn encode<R>(schema: &Schema, record: &R) -> Vec<f64>
where
    R: RecordView + ?Sized,
{
    let mut out = vec![0.0; schema.width()];
    let mut offset = 0;

    for column in &schema.categorical_columns {
        let vocab = schema.vocab(column);
        let text = categorical_text(record.field(column));
        if let Ok(pos) = vocab.binary_search_by(|probe| probe.as_str().cmp(&*text)) {
            out[offset + pos] = 1.0;
        }
        offset += vocab.len();
    }

    for column in &schema.numeric_columns {
        out[offset] = numeric_value(record.field(column));
        offset += 1;
    }

    out
}

/// Encode every row of a table; the training-side entry point.
pub fn encode_table(schema: &Schema, table: &Table) -> Vec<Vec<f64>> {
    (0..table.n_rows())
        .map(|row| encode(schema, &table.row(row)))
        .collect()
}
