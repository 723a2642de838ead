//! Structural checks on mapping configurations, columns and built graphs.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::diagnostic::{Diagnostic, DiagnosticKind, Evidence, Severity};
use super::types::TypeValidator;
use crate::error::ImportError;
use crate::input::DataTable;
use crate::mapping::{resolve, ResolvedMapping};
use crate::model::{DanglingEdgePolicy, DataType, GraphData, MappingConfig};

/// Maximum ids listed in aggregated diagnostics.
const MAX_LISTED_IDS: usize = 10;

/// Check a mapping configuration against the source columns.
///
/// Fatal when neither `node_id` nor both edge endpoints are mapped, when a
/// role key is unknown, or when a mapped column does not exist. The column
/// check is skipped when `available_columns` is empty.
pub fn validate_mapping_config(
    mapping: &MappingConfig,
    available_columns: &[String],
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    match resolve(mapping) {
        Ok(_) => {}
        Err(ImportError::MappingConfigInvalid(problems)) => {
            for problem in problems {
                diagnostics.push(Diagnostic::error(DiagnosticKind::MappingConfigInvalid, problem));
            }
        }
        Err(other) => diagnostics.push(other.to_diagnostic()),
    }

    let mapped = |role: &str| mapping.get(role).is_some_and(|c| !c.trim().is_empty());
    let has_node = mapped("node_id");
    let has_source = mapped("edge_source");
    let has_target = mapped("edge_target");

    if !has_node && !(has_source && has_target) {
        diagnostics.push(
            Diagnostic::error(
                DiagnosticKind::MappingConfigInvalid,
                "Mapping must include 'node_id' or both 'edge_source' and 'edge_target'",
            )
            .with_evidence(
                Evidence::new().with_expected(vec!["node_id", "edge_source+edge_target"]),
            ),
        );
    } else if has_source != has_target {
        let (present, absent) = if has_source {
            ("edge_source", "edge_target")
        } else {
            ("edge_target", "edge_source")
        };
        diagnostics.push(Diagnostic::warning(
            DiagnosticKind::MappingConfigInvalid,
            format!(
                "'{}' is mapped without '{}'; no edges will be built",
                present, absent
            ),
        ));
    }

    if !available_columns.is_empty() {
        for (role, column) in mapping {
            if column.trim().is_empty() {
                continue;
            }
            if !available_columns.iter().any(|c| c == column.trim()) {
                diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::MappingConfigInvalid,
                        format!(
                            "Role '{}' references column '{}' which is not in the source",
                            role, column
                        ),
                    )
                    .with_column(column.as_str())
                    .with_evidence(
                        Evidence::new()
                            .with_value(column.as_str())
                            .with_expected(available_columns.to_vec()),
                    ),
                );
            }
        }
    }

    diagnostics
}

/// Decide the type of every column and report column-level problems.
///
/// Declared types win over detection. Mapped and declared columns are
/// checked for high null ratios, mixed types and declared/detected
/// mismatches; declared columns missing from the source are reported.
pub fn validate_columns(
    table: &DataTable,
    mapping: &ResolvedMapping,
    data_types: &IndexMap<String, DataType>,
    validator: &TypeValidator,
) -> (IndexMap<String, DataType>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let mut column_types = IndexMap::with_capacity(table.column_count());

    let mapped: HashSet<&str> = mapping.roles().into_iter().map(|(_, c)| c).collect();

    for column in &table.columns {
        let profile = validator.profile_table_column(table, column);
        let declared = data_types.get(column).copied();

        if declared.is_some() || mapped.contains(column.as_str()) {
            diagnostics.extend(validator.column_diagnostics(&profile, declared));
        }
        column_types.insert(column.clone(), declared.unwrap_or(profile.data_type));
    }

    if !table.columns.is_empty() {
        for (column, data_type) in data_types {
            if !table.has_column(column) {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticKind::UnknownColumn,
                        format!(
                            "Type '{}' declared for column '{}' which is not in the source",
                            data_type, column
                        ),
                    )
                    .with_column(column.as_str()),
                );
            }
        }
    }

    (column_types, diagnostics)
}

/// Check a built graph for duplicate ids, dangling references, self loops,
/// isolated nodes and duplicate edges.
///
/// Dangling references are fatal under [`DanglingEdgePolicy::Reject`] and
/// warnings otherwise.
pub fn validate_graph_structure(graph: &GraphData, policy: DanglingEdgePolicy) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let mut id_counts: IndexMap<&str, usize> = IndexMap::new();
    for node in &graph.nodes {
        *id_counts.entry(node.id.as_str()).or_insert(0) += 1;
    }
    for (id, count) in id_counts.iter().filter(|(_, count)| **count > 1) {
        diagnostics.push(
            Diagnostic::warning(
                DiagnosticKind::DuplicateId,
                format!("Node id '{}' appears {} times", id, count),
            )
            .with_evidence(Evidence::new().with_value(*id).with_occurrences(*count)),
        );
    }

    let dangling_severity = match policy {
        DanglingEdgePolicy::Reject => Severity::Error,
        _ => Severity::Warning,
    };
    for edge in &graph.edges {
        let missing: Vec<&str> = [edge.source.as_str(), edge.target.as_str()]
            .into_iter()
            .filter(|id| !id_counts.contains_key(id))
            .collect::<indexmap::IndexSet<_>>()
            .into_iter()
            .collect();
        if !missing.is_empty() {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::DanglingEdgeReference,
                    dangling_severity,
                    format!(
                        "Edge '{}' references unknown node(s): {}",
                        edge.id,
                        missing.join(", ")
                    ),
                )
                .with_evidence(Evidence::new().with_value(missing)),
            );
        }

        if edge.is_self_loop() {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::SelfLoop,
                    format!("Edge '{}' connects node '{}' to itself", edge.id, edge.source),
                )
                .with_evidence(Evidence::new().with_value(edge.source.as_str())),
            );
        }
    }

    let mut edge_groups: IndexMap<(&str, &str, &str), usize> = IndexMap::new();
    for edge in &graph.edges {
        *edge_groups
            .entry((
                edge.source.as_str(),
                edge.target.as_str(),
                edge.relationship_type.as_str(),
            ))
            .or_insert(0) += 1;
    }
    for ((source, target, rel), count) in edge_groups.iter().filter(|(_, c)| **c > 1) {
        let label = if rel.is_empty() {
            String::new()
        } else {
            format!(" ({})", rel)
        };
        diagnostics.push(
            Diagnostic::warning(
                DiagnosticKind::DuplicateEdge,
                format!("Edge {} -> {}{} appears {} times", source, target, label, count),
            )
            .with_evidence(Evidence::new().with_occurrences(*count)),
        );
    }

    if !graph.edges.is_empty() {
        let connected: HashSet<&str> = graph
            .edges
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();
        let isolated: Vec<&str> = graph
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !connected.contains(id))
            .collect();

        if !isolated.is_empty() {
            let listed: Vec<&str> = isolated.iter().take(MAX_LISTED_IDS).copied().collect();
            diagnostics.push(
                Diagnostic::info(
                    DiagnosticKind::IsolatedNode,
                    format!(
                        "{} node(s) have no incident edges: {}{}",
                        isolated.len(),
                        listed.join(", "),
                        if isolated.len() > MAX_LISTED_IDS { ", ..." } else { "" }
                    ),
                )
                .with_evidence(
                    Evidence::new()
                        .with_value(listed)
                        .with_occurrences(isolated.len())
                        .with_percentage(isolated.len() as f64 / graph.nodes.len() as f64 * 100.0),
                ),
            );
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Node};

    fn mapping(pairs: &[(&str, &str)]) -> MappingConfig {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn fatal(diags: &[Diagnostic]) -> usize {
        diags.iter().filter(|d| d.is_fatal()).count()
    }

    // === Mapping checks ===

    #[test]
    fn test_valid_node_mapping() {
        let diags = validate_mapping_config(
            &mapping(&[("node_id", "id"), ("node_name", "name")]),
            &cols(&["id", "name"]),
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_missing_identity_is_fatal() {
        let diags = validate_mapping_config(
            &mapping(&[("node_name", "name"), ("edge_source", "from")]),
            &cols(&["name", "from"]),
        );
        assert_eq!(fatal(&diags), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::MappingConfigInvalid);

        let empty = validate_mapping_config(&MappingConfig::new(), &[]);
        assert_eq!(fatal(&empty), 1);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let diags = validate_mapping_config(
            &mapping(&[("node_id", "id"), ("attribute_dept", "department")]),
            &cols(&["id", "dept"]),
        );
        assert_eq!(fatal(&diags), 1);
        assert_eq!(diags[0].column.as_deref(), Some("department"));
    }

    #[test]
    fn test_column_check_skipped_without_columns() {
        let diags = validate_mapping_config(&mapping(&[("node_id", "id")]), &[]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_unknown_role_is_fatal() {
        let diags = validate_mapping_config(
            &mapping(&[("node_id", "id"), ("parent", "id")]),
            &cols(&["id"]),
        );
        assert_eq!(fatal(&diags), 1);
    }

    #[test]
    fn test_lone_endpoint_warns() {
        let diags = validate_mapping_config(
            &mapping(&[("node_id", "id"), ("edge_target", "manager")]),
            &cols(&["id", "manager"]),
        );
        assert_eq!(fatal(&diags), 0);
        assert_eq!(diags.len(), 1);
    }

    // === Column checks ===

    #[test]
    fn test_validate_columns_effective_types() {
        let table = DataTable::from_records(
            cols(&["id", "score", "note"]),
            vec![
                cols(&["1", "1.5", "a"]),
                cols(&["2", "x", "b"]),
                cols(&["3", "2.5", "c"]),
            ],
        );
        let resolved = resolve(&mapping(&[("node_id", "id"), ("kpi_score", "score")])).unwrap();
        let mut declared = IndexMap::new();
        declared.insert("note".to_string(), DataType::String);
        declared.insert("ghost".to_string(), DataType::Integer);

        let (types, diags) = validate_columns(&table, &resolved, &declared, &TypeValidator::new());

        assert_eq!(types["id"], DataType::Integer);
        assert_eq!(types["score"], DataType::String);
        assert_eq!(types["note"], DataType::String);
        assert!(diags.iter().any(|d| d.kind == DiagnosticKind::InconsistentType
            && d.column.as_deref() == Some("score")));
        assert!(diags.iter().any(|d| d.kind == DiagnosticKind::UnknownColumn
            && d.column.as_deref() == Some("ghost")));
    }

    // === Graph checks ===

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> GraphData {
        let mut graph = GraphData::new();
        graph.nodes = nodes.iter().map(|id| Node::new(*id)).collect();
        graph.edges = edges
            .iter()
            .enumerate()
            .map(|(i, (s, t))| Edge::new(format!("{s}->{t}#{i}"), *s, *t))
            .collect();
        graph
    }

    #[test]
    fn test_clean_graph() {
        let g = graph(&["a", "b"], &[("a", "b")]);
        assert!(validate_graph_structure(&g, DanglingEdgePolicy::Retain).is_empty());
    }

    #[test]
    fn test_dangling_edges() {
        let g = graph(&["a"], &[("a", "x"), ("y", "y")]);

        let retained = validate_graph_structure(&g, DanglingEdgePolicy::Retain);
        let dangling: Vec<_> = retained
            .iter()
            .filter(|d| d.kind == DiagnosticKind::DanglingEdgeReference)
            .collect();
        assert_eq!(dangling.len(), 2);
        assert!(dangling.iter().all(|d| d.severity == Severity::Warning));

        let rejected = validate_graph_structure(&g, DanglingEdgePolicy::Reject);
        assert_eq!(fatal(&rejected), 2);
    }

    #[test]
    fn test_self_loop_and_isolated() {
        let g = graph(&["a", "b", "c"], &[("a", "a")]);
        let diags = validate_graph_structure(&g, DanglingEdgePolicy::Retain);

        assert!(diags.iter().any(|d| d.kind == DiagnosticKind::SelfLoop));
        let isolated: Vec<_> = diags
            .iter()
            .filter(|d| d.kind == DiagnosticKind::IsolatedNode)
            .collect();
        assert_eq!(isolated.len(), 1);
        assert_eq!(isolated[0].severity, Severity::Info);
        assert_eq!(isolated[0].evidence.occurrences, Some(2));
    }

    #[test]
    fn test_no_isolated_report_without_edges() {
        let g = graph(&["a", "b"], &[]);
        assert!(validate_graph_structure(&g, DanglingEdgePolicy::Retain).is_empty());
    }

    #[test]
    fn test_duplicates() {
        let g = graph(&["a", "a", "b"], &[("a", "b"), ("a", "b")]);
        let diags = validate_graph_structure(&g, DanglingEdgePolicy::Retain);

        let dup_ids: Vec<_> = diags
            .iter()
            .filter(|d| d.kind == DiagnosticKind::DuplicateId)
            .collect();
        assert_eq!(dup_ids.len(), 1);
        assert_eq!(dup_ids[0].evidence.occurrences, Some(2));
        assert_eq!(
            diags.iter().filter(|d| d.kind == DiagnosticKind::DuplicateEdge).count(),
            1
        );
    }
}
