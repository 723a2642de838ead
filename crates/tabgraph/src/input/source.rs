//! Format-independent row abstraction and source metadata.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Tsv,
    Json,
    Xml,
}

impl SourceFormat {
    /// Determine the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "tsv" => Ok(SourceFormat::Tsv),
            "json" => Ok(SourceFormat::Json),
            "xml" => Ok(SourceFormat::Xml),
            "" => Err(ImportError::UnsupportedFormat(format!(
                "'{}' has no file extension; supported formats: csv, tsv, json, xml",
                path.display()
            ))),
            other => Err(ImportError::UnsupportedFormat(format!(
                "'.{}'; supported formats: csv, tsv, json, xml",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Tsv => "tsv",
            SourceFormat::Json => "json",
            SourceFormat::Xml => "xml",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata about the source data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File name without path.
    pub file: String,
    /// Full path to the file.
    pub path: PathBuf,
    /// SHA-256 hash of the file contents.
    pub hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    pub format: SourceFormat,
    /// Encoding the bytes were decoded with.
    pub encoding: String,
    /// Number of data rows read (after skip/max).
    pub row_count: usize,
    pub column_count: usize,
    /// When the file was read.
    pub read_at: DateTime<Utc>,
}

impl SourceMetadata {
    /// Create metadata for a file that has been read.
    pub fn new(
        path: PathBuf,
        hash: String,
        size_bytes: u64,
        format: SourceFormat,
        encoding: String,
        row_count: usize,
        column_count: usize,
    ) -> Self {
        let file = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file,
            path,
            hash,
            size_bytes,
            format,
            encoding,
            row_count,
            column_count,
            read_at: Utc::now(),
        }
    }
}

/// One parsed record: column name to raw string, in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// 0-based position among data rows.
    pub index: usize,
    pub values: IndexMap<String, String>,
}

impl Row {
    pub fn new(index: usize, values: IndexMap<String, String>) -> Self {
        Self { index, values }
    }

    /// Raw value of a column ("" when absent).
    pub fn get(&self, column: &str) -> &str {
        self.values.get(column).map(String::as_str).unwrap_or("")
    }

    /// Trimmed value of a column, or None when null.
    pub fn non_null(&self, column: &str) -> Option<&str> {
        let value = self.get(column);
        if DataTable::is_null_value(value) {
            None
        } else {
            Some(value.trim())
        }
    }
}

/// Parsed rows from any source format.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    /// Column names in source order.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// True if a row cap stopped reading before the end of the source.
    pub truncated: bool,
}

impl DataTable {
    /// Create a new data table.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            truncated: false,
        }
    }

    /// Build a table from column names and row-major values (missing cells are "").
    pub fn from_records(columns: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let rows = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let mut values = IndexMap::with_capacity(columns.len());
                for (i, column) in columns.iter().enumerate() {
                    values.insert(column.clone(), record.get(i).cloned().unwrap_or_default());
                }
                Row::new(index, values)
            })
            .collect();
        Self::new(columns, rows)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Get all raw values for a column by name.
    pub fn column_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rows.iter().map(move |row| row.get(name))
    }

    /// Check if a value represents a missing/null value.
    pub fn is_null_value(value: &str) -> bool {
        let trimmed = value.trim();
        trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("na")
            || trimmed.eq_ignore_ascii_case("n/a")
            || trimmed.eq_ignore_ascii_case("null")
            || trimmed.eq_ignore_ascii_case("none")
            || trimmed.eq_ignore_ascii_case("nil")
            || trimmed == "."
            || trimmed == "-"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(SourceFormat::from_path(Path::new("a/b.CSV")).unwrap(), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_path(Path::new("x.tsv")).unwrap(), SourceFormat::Tsv);
        assert_eq!(SourceFormat::from_path(Path::new("x.json")).unwrap(), SourceFormat::Json);
        assert_eq!(SourceFormat::from_path(Path::new("x.xml")).unwrap(), SourceFormat::Xml);
        assert!(matches!(
            SourceFormat::from_path(Path::new("x.xlsx")),
            Err(ImportError::UnsupportedFormat(_))
        ));
        assert!(SourceFormat::from_path(Path::new("README")).is_err());
    }

    #[test]
    fn test_from_records_pads_missing_cells() {
        let table = DataTable::from_records(
            vec!["id".to_string(), "name".to_string()],
            vec![vec!["1".to_string()], vec!["2".to_string(), "Bob".to_string()]],
        );

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0].get("name"), "");
        assert_eq!(table.rows[1].get("name"), "Bob");
        assert_eq!(table.rows[1].index, 1);
        assert_eq!(table.column_values("id").collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn test_non_null() {
        let table = DataTable::from_records(
            vec!["a".to_string()],
            vec![vec![" x ".to_string()], vec!["NA".to_string()]],
        );
        assert_eq!(table.rows[0].non_null("a"), Some("x"));
        assert_eq!(table.rows[1].non_null("a"), None);
        assert_eq!(table.rows[1].non_null("missing"), None);
    }

    #[test]
    fn test_is_null_value() {
        assert!(DataTable::is_null_value(""));
        assert!(DataTable::is_null_value("NA"));
        assert!(DataTable::is_null_value("n/a"));
        assert!(DataTable::is_null_value("NULL"));
        assert!(DataTable::is_null_value("."));
        assert!(!DataTable::is_null_value("value"));
        assert!(!DataTable::is_null_value("0"));
    }
}
