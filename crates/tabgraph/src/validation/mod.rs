//! Type validation and structural checks.

mod diagnostic;
mod structure;
mod types;

pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Evidence, Severity};
pub use structure::{validate_columns, validate_graph_structure, validate_mapping_config};
pub use types::{ColumnProfile, CoercionFailure, TypeDetectionConfig, TypeValidator};
