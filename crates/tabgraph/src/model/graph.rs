//! Graph entities produced by an import.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::value::{DataType, Value};

/// 2D layout coordinate. Never populated by import.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A vertex of the imported graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique, stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Hierarchy depth, always >= 1.
    pub level: u32,
    /// Typed attribute values keyed by attribute name.
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
    /// KPI values keyed by KPI name.
    #[serde(default)]
    pub kpis: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub visual_properties: Option<IndexMap<String, serde_json::Value>>,
}

impl Node {
    /// Create a node whose name defaults to its id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            level: 1,
            attributes: IndexMap::new(),
            kpis: IndexMap::new(),
            position: None,
            visual_properties: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the hierarchy level (clamped to at least 1).
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level.max(1);
        self
    }

    /// Numeric value of a KPI, if present and numeric.
    pub fn kpi(&self, name: &str) -> Option<f64> {
        self.kpis.get(name).and_then(Value::as_f64)
    }
}

/// A relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Relationship type; empty when unmapped.
    #[serde(default)]
    pub relationship_type: String,
    pub weight: f64,
    pub level: u32,
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
    #[serde(default)]
    pub kpi_components: IndexMap<String, Value>,
}

impl Edge {
    /// Create an edge with default type, weight and level.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            relationship_type: String::new(),
            weight: 1.0,
            level: 1,
            attributes: IndexMap::new(),
            kpi_components: IndexMap::new(),
        }
    }

    /// Returns true if the edge starts and ends at the same node.
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Returns true if either endpoint is the given node.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Facts about the source and the import run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphMetadata {
    /// File name without path.
    pub source_file: String,
    /// Source format (csv, tsv, json, xml).
    pub source_format: String,
    /// SHA-256 hash of the file contents.
    pub source_hash: String,
    pub encoding: String,
    /// Rows read from the source (after skip/max).
    pub total_rows: usize,
    /// Rows turned into a node or an edge.
    pub processed_rows: usize,
    pub column_count: usize,
    /// Effective column types used for coercion.
    #[serde(default)]
    pub column_types: IndexMap<String, DataType>,
    /// Number of nodes per hierarchy level.
    #[serde(default)]
    pub levels: BTreeMap<u32, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_at: Option<DateTime<Utc>>,
}

/// The graph produced by one import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    /// Nodes in first-seen order.
    pub nodes: Vec<Node>,
    /// Edges in source order.
    pub edges: Vec<Edge>,
    pub metadata: GraphMetadata,
}

impl GraphData {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a node by its id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Get all edges incident to a node.
    pub fn edges_for_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches(node_id))
    }

    /// Group nodes by hierarchy level, lowest level first.
    pub fn nodes_by_level(&self) -> BTreeMap<u32, Vec<&Node>> {
        let mut levels: BTreeMap<u32, Vec<&Node>> = BTreeMap::new();
        for node in &self.nodes {
            levels.entry(node.level).or_default().push(node);
        }
        levels
    }

    /// Returns true if the graph has neither nodes nor edges.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Summarise levels, relationship types and attribute keys.
    pub fn summary(&self) -> GraphSummary {
        let mut summary = GraphSummary {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            ..GraphSummary::default()
        };

        for node in &self.nodes {
            *summary.node_levels.entry(node.level).or_insert(0) += 1;
            summary.node_attributes.extend(node.attributes.keys().cloned());
            summary.node_kpis.extend(node.kpis.keys().cloned());
        }

        for edge in &self.edges {
            *summary
                .edge_types
                .entry(edge.relationship_type.clone())
                .or_insert(0) += 1;
            summary.edge_attributes.extend(edge.attributes.keys().cloned());
            summary.edge_attributes.extend(edge.kpi_components.keys().cloned());
        }

        summary
    }
}

/// Aggregate view of a graph, used in import logs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSummary {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub node_levels: BTreeMap<u32, usize>,
    pub edge_types: BTreeMap<String, usize>,
    pub node_attributes: BTreeSet<String>,
    pub node_kpis: BTreeSet<String>,
    /// Edge attribute and KPI component keys.
    pub edge_attributes: BTreeSet<String>,
}
