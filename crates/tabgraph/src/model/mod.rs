//! Data model: typed values, graph entities and import configuration.

mod config;
mod graph;
mod value;

pub use config::{DanglingEdgePolicy, ImportConfig, MappingConfig};
pub use graph::{Edge, GraphData, GraphMetadata, GraphSummary, Node, Position};
pub use value::{DataType, Value};
