//! Graph transformation: rows to nodes and edges.

mod engine;
mod outcome;

pub use engine::GraphTransformer;
pub use outcome::{RowClass, TransformOutcome};
