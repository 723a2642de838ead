//! Column type detection and cell value coercion.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Evidence};
use crate::input::DataTable;
use crate::model::{DataType, Value};

// Compiled once on first use.
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static DATETIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?$").unwrap()
});

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Settings for type detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDetectionConfig {
    /// Maximum non-null values examined per column.
    pub sample_size: usize,
    /// Null ratio above which a column is reported.
    pub null_ratio_threshold: f64,
    /// Share of typed values above which a string column is reported as
    /// holding inconsistent types.
    pub inconsistency_threshold: f64,
}

impl Default for TypeDetectionConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            null_ratio_threshold: 0.5,
            inconsistency_threshold: 0.5,
        }
    }
}

/// A cell value that cannot be represented as its target type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot coerce '{raw}' to {target}")]
pub struct CoercionFailure {
    pub raw: String,
    pub target: DataType,
}

/// Type profile of one column, computed from a bounded sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub data_type: DataType,
    /// Total number of values (including nulls).
    pub count: usize,
    pub null_count: usize,
    /// Number of non-null values examined.
    pub sampled: usize,
    /// Distinct values in the sample.
    pub unique_in_sample: usize,
    /// First few distinct sample values.
    pub sample_values: Vec<String>,
    /// Share of sampled values that parse as each non-string type.
    pub typed_share: IndexMap<DataType, f64>,
}

impl ColumnProfile {
    /// Fraction of values that are null.
    pub fn null_ratio(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.null_count as f64 / self.count as f64
        }
    }

    /// The non-string type covering the largest share of the sample.
    pub fn dominant_typed_share(&self) -> Option<(DataType, f64)> {
        self.typed_share
            .iter()
            .map(|(t, s)| (*t, *s))
            .fold(None, |best, (t, s)| match best {
                Some((_, bs)) if bs >= s => best,
                _ => Some((t, s)),
            })
    }
}

/// Infers column types, coerces raw cells and checks column consistency.
pub struct TypeValidator {
    config: TypeDetectionConfig,
}

impl TypeValidator {
    /// Create a validator with default settings.
    pub fn new() -> Self {
        Self::with_config(TypeDetectionConfig::default())
    }

    pub fn with_config(config: TypeDetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TypeDetectionConfig {
        &self.config
    }

    /// Detect the type of a column from its raw values.
    ///
    /// Nulls are ignored. Preference order over the sample: integer, float,
    /// boolean, date, datetime, then string.
    pub fn detect_data_type(&self, values: &[&str]) -> DataType {
        let sample = self.sample(values);
        detect_sample_type(&sample)
    }

    /// Profile a column: detected type, null counts and typed shares.
    pub fn profile_column(&self, name: &str, values: &[&str]) -> ColumnProfile {
        let null_count = values.iter().filter(|v| DataTable::is_null_value(v)).count();
        let sample = self.sample(values);
        let data_type = detect_sample_type(&sample);

        let distinct: IndexSet<&str> = sample.iter().copied().collect();
        let sample_values = distinct.iter().take(5).map(|s| s.to_string()).collect();

        let mut typed_share = IndexMap::new();
        if !sample.is_empty() {
            let total = sample.len() as f64;
            for data_type in DataType::ALL {
                if data_type == DataType::String {
                    continue;
                }
                let matching = sample.iter().filter(|v| matches_type(v, data_type)).count();
                if matching > 0 {
                    typed_share.insert(data_type, matching as f64 / total);
                }
            }
        }

        ColumnProfile {
            name: name.to_string(),
            data_type,
            count: values.len(),
            null_count,
            sampled: sample.len(),
            unique_in_sample: distinct.len(),
            sample_values,
            typed_share,
        }
    }

    /// Profile a column of a table by name.
    pub fn profile_table_column(&self, table: &DataTable, name: &str) -> ColumnProfile {
        let values: Vec<&str> = table.column_values(name).collect();
        self.profile_column(name, &values)
    }

    /// Coerce a raw cell to the target type. Null tokens become `Value::Null`.
    pub fn coerce(raw: &str, target: DataType) -> Result<Value, CoercionFailure> {
        if DataTable::is_null_value(raw) {
            return Ok(Value::Null);
        }

        let trimmed = raw.trim();
        let coerced = match target {
            DataType::String => Some(Value::String(trimmed.to_string())),
            DataType::Integer => parse_integer(trimmed).map(Value::Int),
            DataType::Float => parse_float(trimmed).map(Value::Float),
            DataType::Boolean => parse_boolean(trimmed).map(Value::Bool),
            DataType::Date => parse_date(trimmed)
                .or_else(|| parse_datetime(trimmed).map(|dt| dt.date_naive()))
                .map(Value::Date),
            DataType::DateTime => parse_datetime(trimmed).map(Value::DateTime),
        };

        coerced.ok_or_else(|| CoercionFailure {
            raw: raw.to_string(),
            target,
        })
    }

    /// Coerce a cell, keeping the raw string and recording a warning on failure.
    pub fn coerce_or_warn(
        raw: &str,
        target: DataType,
        column: &str,
        row: usize,
        diagnostics: &mut Diagnostics,
    ) -> Value {
        match Self::coerce(raw, target) {
            Ok(value) => value,
            Err(failure) => {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticKind::TypeCoercion,
                        format!("Column '{}', row {}: {}", column, row, failure),
                    )
                    .with_column(column)
                    .with_row(row)
                    .with_evidence(
                        Evidence::new()
                            .with_value(raw)
                            .with_expected(target.as_str()),
                    ),
                );
                Value::String(raw.to_string())
            }
        }
    }

    /// Column-level warnings: high null ratio, mixed types, and declared
    /// types that disagree with detection.
    pub fn column_diagnostics(
        &self,
        profile: &ColumnProfile,
        declared: Option<DataType>,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        let null_ratio = profile.null_ratio();
        if profile.count > 0 && null_ratio > self.config.null_ratio_threshold {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::HighNullRatio,
                    format!(
                        "Column '{}' is {:.1}% null ({} of {} values)",
                        profile.name,
                        null_ratio * 100.0,
                        profile.null_count,
                        profile.count
                    ),
                )
                .with_column(&profile.name)
                .with_evidence(
                    Evidence::new()
                        .with_occurrences(profile.null_count)
                        .with_percentage(null_ratio * 100.0),
                ),
            );
        }

        if profile.sampled == 0 {
            return diagnostics;
        }

        if profile.data_type == DataType::String {
            if let Some((typed, share)) = profile.dominant_typed_share() {
                if share >= self.config.inconsistency_threshold {
                    diagnostics.push(
                        Diagnostic::warning(
                            DiagnosticKind::InconsistentType,
                            format!(
                                "Column '{}' mixes types: {:.1}% of sampled values are {} \
                                 but the rest are not",
                                profile.name,
                                share * 100.0,
                                typed
                            ),
                        )
                        .with_column(&profile.name)
                        .with_evidence(
                            Evidence::new()
                                .with_percentage(share * 100.0)
                                .with_expected(typed.as_str()),
                        ),
                    );
                }
            }
        }

        if let Some(declared) = declared {
            if declared != profile.data_type && !compatible(declared, profile.data_type) {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "Column '{}': detected type '{}' differs from declared type '{}'",
                            profile.name, profile.data_type, declared
                        ),
                    )
                    .with_column(&profile.name)
                    .with_evidence(
                        Evidence::new()
                            .with_value(profile.data_type.as_str())
                            .with_expected(declared.as_str()),
                    ),
                );
            }
        }

        diagnostics
    }

    /// Non-null trimmed values, evenly strided down to the sample size.
    fn sample<'a>(&self, values: &[&'a str]) -> Vec<&'a str> {
        let non_null: Vec<&'a str> = values
            .iter()
            .filter(|v| !DataTable::is_null_value(v))
            .map(|v| v.trim())
            .collect();

        let size = self.config.sample_size.max(1);
        if non_null.len() <= size {
            return non_null;
        }

        let stride = non_null.len() as f64 / size as f64;
        (0..size)
            .map(|i| non_null[((i as f64 * stride) as usize).min(non_null.len() - 1)])
            .collect()
    }
}

impl Default for TypeValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Declared types that are a widening of the detected one.
fn compatible(declared: DataType, detected: DataType) -> bool {
    matches!(
        (declared, detected),
        (DataType::String, _)
            | (DataType::Float, DataType::Integer)
            | (DataType::DateTime, DataType::Date)
            | (DataType::Boolean, DataType::Integer)
    )
}

fn detect_sample_type(sample: &[&str]) -> DataType {
    if sample.is_empty() {
        return DataType::String;
    }

    DataType::ALL
        .into_iter()
        .find(|&t| t == DataType::String || sample.iter().all(|v| matches_type(v, t)))
        .unwrap_or(DataType::String)
}

/// Strict per-value check used for detection.
fn matches_type(value: &str, data_type: DataType) -> bool {
    match data_type {
        DataType::Integer => !value.contains('.') && value.parse::<i64>().is_ok(),
        DataType::Float => parse_float(value).is_some(),
        DataType::Boolean => matches!(
            value.to_lowercase().as_str(),
            "true" | "false" | "1" | "0"
        ),
        DataType::Date => is_date(value),
        // Date-only values sit at midnight, so a column mixing both is a datetime column.
        DataType::DateTime => {
            is_date(value) || (DATETIME_PATTERN.is_match(value) && parse_datetime(value).is_some())
        }
        DataType::String => true,
    }
}

fn is_date(value: &str) -> bool {
    DATE_PATTERN.is_match(value) && parse_date(value).is_some()
}

fn parse_integer(value: &str) -> Option<i64> {
    if let Ok(i) = value.parse::<i64>() {
        return Some(i);
    }
    // Whole floats such as "2.0" are accepted.
    let f = parse_float(value)?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_float(value: &str) -> Option<f64> {
    if !value.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_boolean(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "t" | "y" | "1" => Some(true),
        "false" | "no" | "f" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| parse_date(value).and_then(|d| d.and_hms_opt(0, 0, 0)))?;

    Some(Utc.from_utc_datetime(&naive).fixed_offset())
}
