//! Results of turning rows into graph entities.

use serde::{Deserialize, Serialize};

use crate::model::GraphData;

/// How a single row is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowClass {
    /// Both edge endpoints are present.
    Edge,
    /// Only the node id is present.
    Node,
    /// Neither identity is present.
    Unmappable,
}

/// Graph built from a table plus row accounting.
#[derive(Debug, Clone, Default)]
pub struct TransformOutcome {
    pub graph: GraphData,
    /// Rows turned into a node or an edge.
    pub processed_rows: usize,
    pub node_rows: usize,
    pub edge_rows: usize,
    /// Rows skipped as unmappable or with an unusable identity key.
    pub skipped_rows: usize,
}

impl TransformOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, class: RowClass) {
        match class {
            RowClass::Edge => {
                self.edge_rows += 1;
                self.processed_rows += 1;
            }
            RowClass::Node => {
                self.node_rows += 1;
                self.processed_rows += 1;
            }
            RowClass::Unmappable => self.skipped_rows += 1,
        }
    }
}
