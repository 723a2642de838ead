//! Diagnostics raised while importing.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Kind of issue detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Source file does not exist.
    FileNotFound,
    /// File extension is not csv, tsv, json or xml.
    UnsupportedFormat,
    /// Unknown encoding or undecodable bytes.
    EncodingError,
    /// Source could not be parsed into rows.
    ParseError,
    /// Mapping lacks identity roles, uses unknown roles or missing columns.
    MappingConfigInvalid,
    /// A declared type references a column the source does not have.
    UnknownColumn,
    /// Cell value could not be coerced to its target type.
    TypeCoercion,
    /// Declared type differs from the detected type.
    TypeMismatch,
    /// Column values disagree on their type.
    InconsistentType,
    /// Column is mostly null.
    HighNullRatio,
    /// Node id seen on more than one row.
    DuplicateId,
    /// Same source, target and relationship type on several edges.
    DuplicateEdge,
    /// Edge endpoint is not an imported node.
    DanglingEdgeReference,
    /// Edge from a node to itself.
    SelfLoop,
    /// Node without incident edges.
    IsolatedNode,
    /// Row resolves neither to an edge nor to a node.
    UnmappableRow,
    /// Level is missing a usable positive integer.
    InvalidLevel,
    /// Edge weight is not numeric.
    InvalidWeight,
    /// No usable rows.
    EmptyDataset,
}

impl DiagnosticKind {
    /// Get a human-readable label for the diagnostic kind.
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::FileNotFound => "File Not Found",
            DiagnosticKind::UnsupportedFormat => "Unsupported Format",
            DiagnosticKind::EncodingError => "Encoding Error",
            DiagnosticKind::ParseError => "Parse Error",
            DiagnosticKind::MappingConfigInvalid => "Invalid Mapping",
            DiagnosticKind::UnknownColumn => "Unknown Column",
            DiagnosticKind::TypeCoercion => "Type Coercion",
            DiagnosticKind::TypeMismatch => "Type Mismatch",
            DiagnosticKind::InconsistentType => "Inconsistent Type",
            DiagnosticKind::HighNullRatio => "High Null Ratio",
            DiagnosticKind::DuplicateId => "Duplicate Id",
            DiagnosticKind::DuplicateEdge => "Duplicate Edge",
            DiagnosticKind::DanglingEdgeReference => "Dangling Edge Reference",
            DiagnosticKind::SelfLoop => "Self Loop",
            DiagnosticKind::IsolatedNode => "Isolated Node",
            DiagnosticKind::UnmappableRow => "Unmappable Row",
            DiagnosticKind::InvalidLevel => "Invalid Level",
            DiagnosticKind::InvalidWeight => "Invalid Weight",
            DiagnosticKind::EmptyDataset => "Empty Dataset",
        }
    }
}

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Recoverable issue; processing continued.
    Warning,
    /// Fatal issue; the import failed.
    Error,
}

impl Severity {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }
}

/// Evidence supporting a diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// The problematic value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    /// Number of occurrences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrences: Option<usize>,
    /// Percentage of affected values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    /// Sample row indices.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sample_rows: Vec<usize>,
    /// Expected value, type or set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<JsonValue>,
}

impl Evidence {
    /// Create empty evidence.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, value: impl Into<JsonValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_occurrences(mut self, count: usize) -> Self {
        self.occurrences = Some(count);
        self
    }

    pub fn with_percentage(mut self, pct: f64) -> Self {
        self.percentage = Some(pct);
        self
    }

    pub fn with_sample_rows(mut self, rows: Vec<usize>) -> Self {
        self.sample_rows = rows;
        self
    }

    pub fn with_expected(mut self, expected: impl Into<JsonValue>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

/// A fatal error or recoverable warning generated during import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Identifier, unique within one import (assigned by [`Diagnostics`]).
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    /// Affected source column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Affected data row (0-based, after skipped rows).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(default)]
    pub evidence: Evidence,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(kind: DiagnosticKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            kind,
            severity,
            message: message.into(),
            column: None,
            row: None,
            evidence: Evidence::new(),
        }
    }

    /// Shorthand for a warning-level diagnostic.
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    /// Shorthand for an info-level diagnostic.
    pub fn info(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Info, message)
    }

    /// Shorthand for a fatal diagnostic.
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, message)
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = evidence;
        self
    }

    /// Returns true if this diagnostic fails the import.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.message)
    }
}

/// Per-invocation collector of errors and warnings.
///
/// Threaded explicitly through every pipeline stage; ids are sequential
/// within one collector.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    issued: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic, routing it by severity.
    pub fn push(&mut self, mut diagnostic: Diagnostic) {
        self.issued += 1;
        diagnostic.id = format!("diag_{:03}", self.issued);
        if diagnostic.is_fatal() {
            self.errors.push(diagnostic);
        } else {
            self.warnings.push(diagnostic);
        }
    }

    /// Record several diagnostics in order.
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Count of recorded diagnostics of a kind.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .filter(|d| d.kind == kind)
            .count()
    }

    /// Split into `(errors, warnings)`.
    pub fn into_parts(self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
        (self.errors, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_diagnostic() {
        let diag = Diagnostic::warning(DiagnosticKind::TypeCoercion, "cannot coerce 'abc' to float")
            .with_column("score")
            .with_row(4)
            .with_evidence(Evidence::new().with_value("abc").with_expected("float"));

        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.column.as_deref(), Some("score"));
        assert_eq!(diag.evidence.expected, Some(JsonValue::from("float")));
        assert!(!diag.is_fatal());
    }

    #[test]
    fn test_collector_routes_by_severity() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning(DiagnosticKind::SelfLoop, "loop"));
        diags.push(Diagnostic::error(DiagnosticKind::MappingConfigInvalid, "bad"));
        diags.push(Diagnostic::info(DiagnosticKind::IsolatedNode, "alone"));

        assert!(diags.has_errors());
        assert_eq!(diags.errors().len(), 1);
        assert_eq!(diags.warnings().len(), 2);
        assert_eq!(diags.errors()[0].id, "diag_002");
        assert_eq!(diags.warnings()[1].id, "diag_003");
    }

    #[test]
    fn test_ids_are_per_collector() {
        let mut first = Diagnostics::new();
        let mut second = Diagnostics::new();
        first.push(Diagnostic::warning(DiagnosticKind::DuplicateId, "dup"));
        second.push(Diagnostic::warning(DiagnosticKind::DuplicateId, "dup"));
        assert_eq!(first.warnings()[0].id, second.warnings()[0].id);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }
}
