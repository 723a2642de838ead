//! Error types for the tabgraph library.

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::{Diagnostic, DiagnosticKind, Severity};

/// Fatal errors that stop an import.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The source file does not exist.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File format not supported.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Unknown encoding label or bytes that are invalid in the encoding.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML parsing error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Structurally invalid source that the format library accepted.
    #[error("Parse error in {format} source: {message}")]
    Parse { format: String, message: String },

    /// Mapping configuration cannot drive a transformation.
    #[error("Invalid mapping configuration: {}", .0.join("; "))]
    MappingConfigInvalid(Vec<String>),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ImportError {
    /// Diagnostic kind reported for this error.
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ImportError::FileNotFound { .. } => DiagnosticKind::FileNotFound,
            ImportError::UnsupportedFormat(_) => DiagnosticKind::UnsupportedFormat,
            ImportError::Encoding(_) => DiagnosticKind::EncodingError,
            ImportError::MappingConfigInvalid(_) => DiagnosticKind::MappingConfigInvalid,
            ImportError::Io { .. }
            | ImportError::Csv(_)
            | ImportError::Json(_)
            | ImportError::Xml(_)
            | ImportError::Parse { .. }
            | ImportError::Config(_) => DiagnosticKind::ParseError,
        }
    }

    /// Convert into a fatal diagnostic for an import result.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.kind(), Severity::Error, self.to_string())
    }
}

/// Result type alias for tabgraph operations.
pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_error_lists_every_problem() {
        let err = ImportError::MappingConfigInvalid(vec![
            "missing node_id".to_string(),
            "column 'x' not found".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid mapping configuration: missing node_id; column 'x' not found"
        );
    }

    #[test]
    fn test_to_diagnostic_is_fatal() {
        let err = ImportError::FileNotFound {
            path: PathBuf::from("missing.csv"),
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.kind, DiagnosticKind::FileNotFound);
        assert_eq!(diag.severity, Severity::Error);
        assert!(diag.message.contains("missing.csv"));
    }
}
