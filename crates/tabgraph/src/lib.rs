//! tabgraph: import tabular and semi-structured data as a typed graph.
//!
//! A CSV, TSV, JSON or XML source is read into format-independent rows, a
//! declarative mapping assigns columns to node and edge roles, column types
//! are detected or declared, and every row becomes a node or an edge.
//!
//! # Core Principles
//!
//! - **Never abort on a cell**: values that fail coercion keep their raw text
//!   and produce a warning
//! - **Explicit diagnostics**: every issue is a [`Diagnostic`] in the result,
//!   collected per call with no shared state
//! - **Deterministic**: the same file and configuration give the same graph
//!
//! # Example
//!
//! ```no_run
//! use tabgraph::{ImportConfig, Importer};
//!
//! let config = ImportConfig::new("people.csv")
//!     .with_mapping("node_id", "id")
//!     .with_mapping("node_name", "name")
//!     .with_mapping("kpi_performance", "performance_score");
//!
//! let result = Importer::new().import(&config);
//! if let Some(graph) = &result.graph_data {
//!     println!("Nodes: {}", graph.nodes.len());
//! }
//! for warning in &result.warnings {
//!     println!("{}", warning);
//! }
//! ```

pub mod error;
pub mod input;
pub mod mapping;
pub mod model;
pub mod transform;
pub mod validation;

mod importer;

pub use error::{ImportError, Result};
pub use importer::{
    ImportResult, ImportStage, Importer, ImporterConfig, Preview, PreviewOptions,
};
pub use input::{DataTable, Row, SourceFormat, SourceMetadata};
pub use mapping::{resolve, suggest, MappingRole, MappingSuggestion, ResolvedMapping};
pub use model::{
    DanglingEdgePolicy, DataType, Edge, GraphData, GraphMetadata, GraphSummary, ImportConfig,
    MappingConfig, Node, Value,
};
pub use validation::{Diagnostic, DiagnosticKind, Severity};
