//! Data rows and series definitions

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A single field value in a data row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value; non-finite numbers and non-numbers yield `None`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    /// Category label for this value, if it can act as one
    pub fn as_category(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "-"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// A data row as supplied by the host: field name to value, in insertion order
pub type DataPoint = IndexMap<String, FieldValue>;

/// How a series is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Bar,
    Line,
    Area,
}

/// One numeric field rendered across all rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub kind: SeriesKind,
    pub field_key: String,
}

impl SeriesSpec {
    pub fn new(kind: SeriesKind, field_key: impl Into<String>) -> Self {
        Self {
            kind,
            field_key: field_key.into(),
        }
    }
}

/// A data row with its category resolved
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub category: String,
    pub fields: DataPoint,
}

impl Row {
    /// Numeric value of `key`, ignoring absent and non-numeric fields
    pub fn value(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(FieldValue::as_f64)
    }
}

/// Rows validated against a category key and series list
///
/// Validation happens once here so render code can index rows by category
/// without re-checking field shapes on every access.
#[derive(Debug, Clone, Default)]
pub struct ChartData {
    rows: Vec<Row>,
    series: Vec<SeriesSpec>,
    category_key: String,
}

impl ChartData {
    /// Validate raw rows and series
    pub fn new(
        rows: Vec<DataPoint>,
        category_key: &str,
        series: Vec<SeriesSpec>,
    ) -> Result<Self, ConfigError> {
        if category_key.is_empty() {
            return Err(ConfigError::EmptyCategoryKey);
        }

        let mut seen = ahash::AHashSet::new();
        for spec in &series {
            if spec.field_key.is_empty() {
                return Err(ConfigError::EmptySeriesKey);
            }
            if !seen.insert(spec.field_key.as_str()) {
                return Err(ConfigError::DuplicateSeries(spec.field_key.clone()));
            }
        }

        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, fields)| {
                let category = fields
                    .get(category_key)
                    .and_then(FieldValue::as_category)
                    .ok_or_else(|| ConfigError::MissingCategory {
                        row: idx,
                        key: category_key.to_string(),
                    })?;
                Ok(Row { category, fields })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        for spec in &series {
            if !rows.iter().any(|r| r.value(&spec.field_key).is_some()) {
                tracing::debug!("Series '{}' has no numeric values", spec.field_key);
            }
        }

        Ok(Self {
            rows,
            series,
            category_key: category_key.to_string(),
        })
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn series(&self) -> &[SeriesSpec] {
        &self.series
    }

    pub fn category_key(&self) -> &str {
        &self.category_key
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Series field keys in draw order
    pub fn series_keys(&self) -> Vec<String> {
        self.series.iter().map(|s| s.field_key.clone()).collect()
    }

    /// Find a row by category label
    pub fn find(&self, category: &str) -> Option<(usize, &Row)> {
        self.rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.category == category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.category.as_str())
    }
}
