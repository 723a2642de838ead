//! Per-call import configuration.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::value::DataType;

/// Semantic role key (`node_id`, `attribute_category`, ...) to source column.
pub type MappingConfig = IndexMap<String, String>;

/// What to do with an edge whose endpoint is not among the imported nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingEdgePolicy {
    /// Keep the edge and record a warning.
    #[default]
    Retain,
    /// Remove the edge and record a warning.
    Drop,
    /// Add a placeholder node for each missing endpoint.
    CreateNodes,
    /// Fail the import.
    Reject,
}

/// Caller-constructed configuration for a single import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub file_path: PathBuf,
    /// Encoding label understood by the WHATWG encoding standard.
    #[serde(default = "default_encoding")]
    pub file_encoding: String,
    /// CSV delimiter (None = `\t` for .tsv, auto-detect for .csv).
    #[serde(default)]
    pub delimiter: Option<u8>,
    #[serde(default)]
    pub mapping_config: MappingConfig,
    /// Declared types by source column; undeclared columns are detected.
    #[serde(default)]
    pub data_types: IndexMap<String, DataType>,
    #[serde(default)]
    pub skip_rows: usize,
    #[serde(default)]
    pub max_rows: Option<usize>,
    #[serde(default)]
    pub dangling_edges: DanglingEdgePolicy,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

impl ImportConfig {
    /// Create a configuration for a file with default settings.
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            file_encoding: default_encoding(),
            delimiter: None,
            mapping_config: MappingConfig::new(),
            data_types: IndexMap::new(),
            skip_rows: 0,
            max_rows: None,
            dangling_edges: DanglingEdgePolicy::default(),
        }
    }

    /// Map a semantic role to a source column.
    pub fn with_mapping(mut self, role: impl Into<String>, column: impl Into<String>) -> Self {
        self.mapping_config.insert(role.into(), column.into());
        self
    }

    /// Replace the whole mapping configuration.
    pub fn with_mapping_config(mut self, mapping: MappingConfig) -> Self {
        self.mapping_config = mapping;
        self
    }

    /// Declare the type of a source column.
    pub fn with_data_type(mut self, column: impl Into<String>, data_type: DataType) -> Self {
        self.data_types.insert(column.into(), data_type);
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.file_encoding = encoding.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn with_dangling_edges(mut self, policy: DanglingEdgePolicy) -> Self {
        self.dangling_edges = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ImportConfig::new("nodes.csv")
            .with_mapping("node_id", "id")
            .with_mapping("kpi_performance", "performance_score")
            .with_data_type("performance_score", DataType::Float)
            .with_delimiter(b';')
            .with_max_rows(50);

        assert_eq!(config.file_encoding, "utf-8");
        assert_eq!(config.mapping_config.len(), 2);
        assert_eq!(config.mapping_config.get("node_id").map(String::as_str), Some("id"));
        assert_eq!(config.delimiter, Some(b';'));
        assert_eq!(config.max_rows, Some(50));
        assert_eq!(config.dangling_edges, DanglingEdgePolicy::Retain);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "file_path": "edges.json",
            "mapping_config": {"edge_source": "from", "edge_target": "to"},
            "data_types": {"weight": "float"},
            "dangling_edges": "create_nodes"
        }"#;
        let config: ImportConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.file_encoding, "utf-8");
        assert_eq!(config.skip_rows, 0);
        assert_eq!(config.data_types.get("weight"), Some(&DataType::Float));
        assert_eq!(config.dangling_edges, DanglingEdgePolicy::CreateNodes);
    }

    #[test]
    fn test_declared_types_round_trip() {
        let json = r#"{
            "file_path": "events.csv",
            "mapping_config": {"node_id": "id", "attribute_ts": "ts"},
            "data_types": {"ts": "datetime", "day": "date", "ok": "boolean"}
        }"#;
        let config: ImportConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.data_types.get("ts"), Some(&DataType::DateTime));
        assert_eq!(config.data_types.get("day"), Some(&DataType::Date));

        let written = serde_json::to_value(&config).unwrap();
        assert_eq!(written["data_types"]["ts"], "datetime");
        let reread: ImportConfig = serde_json::from_value(written).unwrap();
        assert_eq!(reread.data_types, config.data_types);
    }
}
