//! Graph transformer that turns mapped rows into nodes and edges.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::input::{DataTable, Row};
use crate::mapping::ResolvedMapping;
use crate::model::{DanglingEdgePolicy, DataType, Edge, GraphData, Node, Value};
use crate::validation::{Diagnostic, DiagnosticKind, Diagnostics, Evidence, TypeValidator};

use super::outcome::{RowClass, TransformOutcome};

/// Builds a [`GraphData`] from rows according to a resolved mapping.
pub struct GraphTransformer<'a> {
    mapping: &'a ResolvedMapping,
    /// Effective type per source column (declared or detected).
    column_types: &'a IndexMap<String, DataType>,
    /// Types the caller declared; identity keys must coerce to these.
    declared_types: Option<&'a IndexMap<String, DataType>>,
    policy: DanglingEdgePolicy,
    edge_attributes: IndexMap<String, String>,
    edge_kpis: IndexMap<String, String>,
}

impl<'a> GraphTransformer<'a> {
    /// Create a transformer for a mapping and the column types to coerce with.
    pub fn new(mapping: &'a ResolvedMapping, column_types: &'a IndexMap<String, DataType>) -> Self {
        Self {
            mapping,
            column_types,
            declared_types: None,
            policy: DanglingEdgePolicy::default(),
            edge_attributes: mapping.effective_edge_attributes(),
            edge_kpis: mapping.effective_edge_kpis(),
        }
    }

    /// Check identity keys against caller-declared types.
    pub fn with_declared_types(mut self, declared: &'a IndexMap<String, DataType>) -> Self {
        self.declared_types = Some(declared);
        self
    }

    pub fn with_dangling_edges(mut self, policy: DanglingEdgePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Classify a row as an edge, a node or unmappable.
    pub fn classify(&self, row: &Row) -> RowClass {
        let present = |column: &Option<String>| {
            column
                .as_deref()
                .is_some_and(|c| row.non_null(c).is_some())
        };

        if present(&self.mapping.edge_source) && present(&self.mapping.edge_target) {
            RowClass::Edge
        } else if present(&self.mapping.node_id) {
            RowClass::Node
        } else {
            RowClass::Unmappable
        }
    }

    /// Transform every row of a table.
    ///
    /// Per-row problems are recorded as warnings and never abort the batch.
    pub fn transform(&self, table: &DataTable, diagnostics: &mut Diagnostics) -> TransformOutcome {
        let mut outcome = TransformOutcome::new();
        let mut nodes: IndexMap<String, Node> = IndexMap::new();
        let mut occurrences: IndexMap<String, Vec<usize>> = IndexMap::new();
        let mut edges = Vec::new();
        let mut edge_ordinal = 0;

        for row in &table.rows {
            let class = match self.classify(row) {
                RowClass::Edge => self.edge_row(row, edge_ordinal, diagnostics).map(|edge| {
                    edge_ordinal += 1;
                    edges.push(edge);
                    RowClass::Edge
                }),
                RowClass::Node => self.node_row(row, diagnostics).map(|node| {
                    occurrences.entry(node.id.clone()).or_default().push(row.index);
                    // IndexMap::insert keeps the first-seen position.
                    nodes.insert(node.id.clone(), node);
                    RowClass::Node
                }),
                RowClass::Unmappable => {
                    diagnostics.push(
                        Diagnostic::warning(
                            DiagnosticKind::UnmappableRow,
                            format!(
                                "Row {} has no node id and no complete edge endpoints; skipped",
                                row.index
                            ),
                        )
                        .with_row(row.index),
                    );
                    None
                }
            };
            outcome.record(class.unwrap_or(RowClass::Unmappable));
        }

        for (id, rows) in occurrences.iter().filter(|(_, rows)| rows.len() > 1) {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::DuplicateId,
                    format!(
                        "Node id '{}' appears in {} rows; values from row {} were kept",
                        id,
                        rows.len(),
                        rows.last().copied().unwrap_or_default()
                    ),
                )
                .with_evidence(
                    Evidence::new()
                        .with_value(id.as_str())
                        .with_occurrences(rows.len())
                        .with_sample_rows(rows.clone()),
                ),
            );
        }

        let mut graph = GraphData::new();
        graph.nodes = nodes.into_values().collect();
        graph.edges = edges;
        self.apply_dangling_policy(&mut graph, diagnostics);

        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            skipped = outcome.skipped_rows,
            "Transformed rows into graph"
        );

        outcome.graph = graph;
        outcome
    }

    fn node_row(&self, row: &Row, diagnostics: &mut Diagnostics) -> Option<Node> {
        let id_column = self.mapping.node_id.as_deref()?;
        let id = self.identity_key(row, id_column, diagnostics)?;

        let mut node = Node::new(id.as_str());
        if let Some(name) = self.mapping.node_name.as_deref().and_then(|c| row.non_null(c)) {
            node.name = name.to_string();
        }
        if let Some(column) = self.mapping.node_level.as_deref() {
            node.level = self.level(row, column, diagnostics);
        }
        node.attributes = self.typed_values(row, &self.mapping.attributes, None, diagnostics);
        node.kpis = self.typed_values(row, &self.mapping.kpis, Some(DataType::Float), diagnostics);

        Some(node)
    }

    fn edge_row(&self, row: &Row, ordinal: usize, diagnostics: &mut Diagnostics) -> Option<Edge> {
        let source = self.identity_key(row, self.mapping.edge_source.as_deref()?, diagnostics)?;
        let target = self.identity_key(row, self.mapping.edge_target.as_deref()?, diagnostics)?;

        let mut edge = Edge::new(format!("{}->{}#{}", source, target, ordinal), source, target);
        if let Some(rel) = self.mapping.edge_type.as_deref().and_then(|c| row.non_null(c)) {
            edge.relationship_type = rel.to_string();
        }
        if let Some(column) = self.mapping.edge_weight.as_deref() {
            edge.weight = self.weight(row, column, diagnostics);
        }
        if let Some(column) = self.mapping.edge_level.as_deref() {
            edge.level = self.level(row, column, diagnostics);
        }
        edge.attributes = self.typed_values(row, &self.edge_attributes, None, diagnostics);
        edge.kpi_components =
            self.typed_values(row, &self.edge_kpis, Some(DataType::Float), diagnostics);

        Some(edge)
    }

    /// Stable string key for an identity column, or None if unusable.
    fn identity_key(
        &self,
        row: &Row,
        column: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<String> {
        let Some(raw) = row.non_null(column) else {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::UnmappableRow,
                    format!("Row {}: identity column '{}' is empty; skipped", row.index, column),
                )
                .with_column(column)
                .with_row(row.index),
            );
            return None;
        };

        if let Some(declared) = self.declared_types.and_then(|d| d.get(column)) {
            if let Err(failure) = TypeValidator::coerce(raw, *declared) {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticKind::TypeCoercion,
                        format!(
                            "Row {}: identity column '{}': {}; row skipped",
                            row.index, column, failure
                        ),
                    )
                    .with_column(column)
                    .with_row(row.index)
                    .with_evidence(
                        Evidence::new()
                            .with_value(raw)
                            .with_expected(declared.as_str()),
                    ),
                );
                return None;
            }
        }

        Some(raw.to_string())
    }

    /// Hierarchy level, floor-clamped to 1.
    fn level(&self, row: &Row, column: &str, diagnostics: &mut Diagnostics) -> u32 {
        let Some(raw) = row.non_null(column) else {
            return 1;
        };

        let (level, problem) = match TypeValidator::coerce(raw, DataType::Integer) {
            Ok(Value::Int(n)) if n >= 1 => (u32::try_from(n).unwrap_or(u32::MAX), None),
            Ok(_) => (1, Some("is not positive; clamped to 1")),
            Err(_) => (1, Some("is not an integer; defaulted to 1")),
        };

        if let Some(problem) = problem {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::InvalidLevel,
                    format!("Row {}: level '{}' {}", row.index, raw, problem),
                )
                .with_column(column)
                .with_row(row.index)
                .with_evidence(Evidence::new().with_value(raw).with_expected("integer >= 1")),
            );
        }
        level
    }

    /// Edge weight, defaulting to 1.0 when not numeric.
    fn weight(&self, row: &Row, column: &str, diagnostics: &mut Diagnostics) -> f64 {
        let Some(raw) = row.non_null(column) else {
            return 1.0;
        };

        match TypeValidator::coerce(raw, DataType::Float) {
            Ok(Value::Float(weight)) => weight,
            _ => {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticKind::InvalidWeight,
                        format!(
                            "Row {}: weight '{}' is not numeric; defaulted to 1.0",
                            row.index, raw
                        ),
                    )
                    .with_column(column)
                    .with_row(row.index)
                    .with_evidence(Evidence::new().with_value(raw).with_expected("float")),
                );
                1.0
            }
        }
    }

    /// Coerce the mapped columns of a row, skipping nulls.
    ///
    /// `target` overrides the column type (KPIs are always float).
    fn typed_values(
        &self,
        row: &Row,
        roles: &IndexMap<String, String>,
        target: Option<DataType>,
        diagnostics: &mut Diagnostics,
    ) -> IndexMap<String, Value> {
        let mut values = IndexMap::with_capacity(roles.len());
        for (name, column) in roles {
            let raw = row.get(column);
            if DataTable::is_null_value(raw) {
                continue;
            }
            let data_type = target
                .or_else(|| self.column_types.get(column).copied())
                .unwrap_or_default();
            let value =
                TypeValidator::coerce_or_warn(raw, data_type, column, row.index, diagnostics);
            values.insert(name.clone(), value);
        }
        values
    }

    fn apply_dangling_policy(&self, graph: &mut GraphData, diagnostics: &mut Diagnostics) {
        if !matches!(
            self.policy,
            DanglingEdgePolicy::Drop | DanglingEdgePolicy::CreateNodes
        ) {
            return;
        }

        let known: IndexSet<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        let is_missing = |id: &str| !known.contains(id);

        if self.policy == DanglingEdgePolicy::Drop {
            let before = graph.edges.len();
            graph.edges.retain(|edge| {
                let dangling = is_missing(&edge.source) || is_missing(&edge.target);
                if dangling {
                    diagnostics.push(
                        Diagnostic::warning(
                            DiagnosticKind::DanglingEdgeReference,
                            format!(
                                "Edge '{}' references a node that was not imported; dropped",
                                edge.id
                            ),
                        )
                        .with_evidence(Evidence::new().with_value(vec![
                            edge.source.as_str(),
                            edge.target.as_str(),
                        ])),
                    );
                }
                !dangling
            });
            debug!(dropped = before - graph.edges.len(), "Dropped dangling edges");
            return;
        }

        let created: IndexSet<String> = graph
            .edges
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .filter(|id| is_missing(id))
            .map(str::to_string)
            .collect();

        if !created.is_empty() {
            let listed: Vec<&str> = created.iter().map(String::as_str).take(10).collect();
            diagnostics.push(
                Diagnostic::info(
                    DiagnosticKind::DanglingEdgeReference,
                    format!(
                        "Created {} node(s) for edge endpoints that were not imported: {}",
                        created.len(),
                        listed.join(", ")
                    ),
                )
                .with_evidence(Evidence::new().with_value(listed).with_occurrences(created.len())),
            );
            graph.nodes.extend(created.into_iter().map(Node::new));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::resolve;
    use crate::model::MappingConfig;
    use crate::validation::Severity;

    fn table(columns: &[&str], rows: &[&[&str]]) -> DataTable {
        DataTable::from_records(
            columns.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn mapping(pairs: &[(&str, &str)]) -> ResolvedMapping {
        let config: MappingConfig = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        resolve(&config).unwrap()
    }

    fn types(pairs: &[(&str, DataType)]) -> IndexMap<String, DataType> {
        pairs.iter().map(|(k, t)| (k.to_string(), *t)).collect()
    }

    // === Nodes ===

    #[test]
    fn test_node_rows() {
        let data = table(
            &["id", "name", "category", "performance_score"],
            &[
                &["1", "Alice", "eng", "85.5"],
                &["2", "Bob", "ops", "72"],
                &["3", "", "eng", ""],
            ],
        );
        let resolved = mapping(&[
            ("node_id", "id"),
            ("node_name", "name"),
            ("attribute_category", "category"),
            ("kpi_performance", "performance_score"),
        ]);
        let column_types = types(&[("category", DataType::String)]);
        let mut diags = Diagnostics::new();

        let outcome = GraphTransformer::new(&resolved, &column_types).transform(&data, &mut diags);

        assert_eq!(outcome.processed_rows, 3);
        let nodes = &outcome.graph.nodes;
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].name, "Alice");
        assert_eq!(nodes[0].attributes["category"], Value::String("eng".to_string()));
        assert_eq!(nodes[0].kpis["performance"], Value::Float(85.5));
        assert_eq!(nodes[1].kpis["performance"], Value::Float(72.0));
        assert_eq!(nodes[2].name, "3");
        assert!(nodes[2].kpis.is_empty());
        assert!(diags.warnings().is_empty());
    }

    #[test]
    fn test_duplicate_ids_last_write_wins() {
        let data = table(
            &["id", "name"],
            &[&["a", "First"], &["b", "Other"], &["a", "Second"]],
        );
        let resolved = mapping(&[("node_id", "id"), ("node_name", "name")]);
        let column_types = IndexMap::new();
        let mut diags = Diagnostics::new();

        let outcome = GraphTransformer::new(&resolved, &column_types).transform(&data, &mut diags);

        let nodes = &outcome.graph.nodes;
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "a");
        assert_eq!(nodes[0].name, "Second");
        assert_eq!(outcome.processed_rows, 3);

        assert_eq!(diags.count(DiagnosticKind::DuplicateId), 1);
        assert_eq!(diags.warnings()[0].evidence.occurrences, Some(2));
        assert_eq!(diags.warnings()[0].evidence.sample_rows, vec![0, 2]);
    }

    #[test]
    fn test_levels_are_clamped() {
        let data = table(
            &["id", "level"],
            &[&["a", "2"], &["b", "0"], &["c", "-3"], &["d", "top"], &["e", ""], &["f", "3.0"]],
        );
        let resolved = mapping(&[("node_id", "id"), ("node_level", "level")]);
        let column_types = IndexMap::new();
        let mut diags = Diagnostics::new();

        let outcome = GraphTransformer::new(&resolved, &column_types).transform(&data, &mut diags);
        let levels: Vec<u32> = outcome.graph.nodes.iter().map(|n| n.level).collect();

        assert_eq!(levels, vec![2, 1, 1, 1, 1, 3]);
        assert_eq!(diags.count(DiagnosticKind::InvalidLevel), 3);
    }

    #[test]
    fn test_attribute_coercion_failure_keeps_raw() {
        let data = table(&["id", "age"], &[&["a", "41"], &["b", "unknown"]]);
        let resolved = mapping(&[("node_id", "id"), ("attribute_age", "age")]);
        let column_types = types(&[("age", DataType::Integer)]);
        let mut diags = Diagnostics::new();

        let outcome = GraphTransformer::new(&resolved, &column_types).transform(&data, &mut diags);

        assert_eq!(outcome.graph.nodes[0].attributes["age"], Value::Int(41));
        assert_eq!(
            outcome.graph.nodes[1].attributes["age"],
            Value::String("unknown".to_string())
        );
        assert_eq!(diags.count(DiagnosticKind::TypeCoercion), 1);
    }

    #[test]
    fn test_unusable_identity_is_skipped() {
        let data = table(&["id", "name"], &[&["1", "ok"], &["x", "bad"], &["", "none"]]);
        let resolved = mapping(&[("node_id", "id"), ("node_name", "name")]);
        let column_types = types(&[("id", DataType::Integer)]);
        let declared = column_types.clone();
        let mut diags = Diagnostics::new();

        let outcome = GraphTransformer::new(&resolved, &column_types)
            .with_declared_types(&declared)
            .transform(&data, &mut diags);

        assert_eq!(outcome.graph.nodes.len(), 1);
        assert_eq!(outcome.processed_rows, 1);
        assert_eq!(outcome.skipped_rows, 2);
        assert_eq!(diags.count(DiagnosticKind::TypeCoercion), 1);
        assert_eq!(diags.count(DiagnosticKind::UnmappableRow), 1);
    }

    // === Edges ===

    fn edge_table() -> DataTable {
        table(
            &["from", "to", "rel", "weight", "since"],
            &[
                &["a", "b", "reports_to", "0.5", "2020"],
                &["b", "c", "", "heavy", ""],
                &["c", "", "peer", "1", "2021"],
            ],
        )
    }

    #[test]
    fn test_edge_levels_default_and_clamp() {
        let data = table(
            &["from", "to", "tier"],
            &[&["a", "b", "2"], &["b", "c", ""], &["c", "a", "0"], &["a", "c", "-1"]],
        );
        let resolved = mapping(&[
            ("edge_source", "from"),
            ("edge_target", "to"),
            ("edge_level", "tier"),
        ]);
        let column_types = IndexMap::new();
        let mut diags = Diagnostics::new();

        let outcome = GraphTransformer::new(&resolved, &column_types).transform(&data, &mut diags);
        let levels: Vec<u32> = outcome.graph.edges.iter().map(|e| e.level).collect();

        assert_eq!(levels, vec![2, 1, 1, 1]);
        assert_eq!(diags.count(DiagnosticKind::InvalidLevel), 2);
        let clamped = diags
            .warnings()
            .iter()
            .find(|d| d.kind == DiagnosticKind::InvalidLevel)
            .unwrap();
        assert_eq!(clamped.row, Some(2));
        assert_eq!(clamped.column.as_deref(), Some("tier"));

        // Without an edge_level mapping every edge sits at level 1.
        let unlevelled = mapping(&[("edge_source", "from"), ("edge_target", "to")]);
        let outcome = GraphTransformer::new(&unlevelled, &column_types)
            .transform(&data, &mut Diagnostics::new());
        assert!(outcome.graph.edges.iter().all(|e| e.level == 1));
    }

    #[test]
    fn test_edge_rows() {
        let data = edge_table();
        let resolved = mapping(&[
            ("edge_source", "from"),
            ("edge_target", "to"),
            ("edge_type", "rel"),
            ("edge_weight", "weight"),
            ("attribute_since", "since"),
        ]);
        let column_types = types(&[("since", DataType::Integer)]);
        let mut diags = Diagnostics::new();

        let outcome = GraphTransformer::new(&resolved, &column_types).transform(&data, &mut diags);
        let edges = &outcome.graph.edges;

        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].id, "a->b#0");
        assert_eq!(edges[0].relationship_type, "reports_to");
        assert_eq!(edges[0].weight, 0.5);
        assert_eq!(edges[0].attributes["since"], Value::Int(2020));
        assert_eq!(edges[1].id, "b->c#1");
        assert_eq!(edges[1].relationship_type, "");
        assert_eq!(edges[1].weight, 1.0);
        assert!(edges[1].attributes.is_empty());

        assert_eq!(diags.count(DiagnosticKind::InvalidWeight), 1);
        assert_eq!(diags.count(DiagnosticKind::UnmappableRow), 1);
        assert_eq!(outcome.processed_rows, 2);
        assert_eq!(outcome.skipped_rows, 1);
    }

    #[test]
    fn test_mixed_rows() {
        let data = table(
            &["id", "from", "to"],
            &[&["a", "", ""], &["b", "", ""], &["", "a", "b"], &["", "", ""]],
        );
        let resolved = mapping(&[
            ("node_id", "id"),
            ("edge_source", "from"),
            ("edge_target", "to"),
        ]);
        let column_types = IndexMap::new();
        let transformer = GraphTransformer::new(&resolved, &column_types);

        assert_eq!(transformer.classify(&data.rows[0]), RowClass::Node);
        assert_eq!(transformer.classify(&data.rows[2]), RowClass::Edge);
        assert_eq!(transformer.classify(&data.rows[3]), RowClass::Unmappable);
    }

    // === Dangling edges ===

    fn dangling_table() -> DataTable {
        table(
            &["id", "from", "to"],
            &[&["a", "", ""], &["", "a", "ghost"], &["", "a", "a"]],
        )
    }

    fn run_policy(policy: DanglingEdgePolicy) -> (TransformOutcome, Diagnostics) {
        let data = dangling_table();
        let resolved = mapping(&[
            ("node_id", "id"),
            ("edge_source", "from"),
            ("edge_target", "to"),
        ]);
        let column_types = IndexMap::new();
        let mut diags = Diagnostics::new();
        let outcome = GraphTransformer::new(&resolved, &column_types)
            .with_dangling_edges(policy)
            .transform(&data, &mut diags);
        (outcome, diags)
    }

    #[test]
    fn test_dangling_retained_by_default() {
        let (outcome, diags) = run_policy(DanglingEdgePolicy::Retain);
        assert_eq!(outcome.graph.edges.len(), 2);
        assert_eq!(outcome.graph.nodes.len(), 1);
        assert_eq!(diags.count(DiagnosticKind::DanglingEdgeReference), 0);
    }

    #[test]
    fn test_dangling_dropped() {
        let (outcome, diags) = run_policy(DanglingEdgePolicy::Drop);
        assert_eq!(outcome.graph.edges.len(), 1);
        assert_eq!(outcome.graph.edges[0].id, "a->a#1");
        assert_eq!(diags.count(DiagnosticKind::DanglingEdgeReference), 1);
    }

    #[test]
    fn test_dangling_creates_nodes() {
        let (outcome, diags) = run_policy(DanglingEdgePolicy::CreateNodes);
        assert_eq!(outcome.graph.nodes.len(), 2);
        assert_eq!(outcome.graph.nodes[1].id, "ghost");
        assert_eq!(outcome.graph.nodes[1].level, 1);
        assert_eq!(diags.warnings()[0].severity, Severity::Info);
    }
}
