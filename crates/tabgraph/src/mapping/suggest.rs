//! Mapping suggestions from column names.
//!
//! Suggestions come from a fixed priority table of canonical names per role.
//! A column matches a role when its normalized name equals one of the role's
//! names (confidence 1.0 for the first name, decreasing for later aliases) or
//! contains one as a whole `_`-separated token sequence (confidence 0.6).
//! Candidates are assigned greedily by confidence, then table order, then
//! column order; every role and every column is used at most once.
//!
//! Columns left over become `kpi_<name>` when the name reads as a metric and
//! `attribute_<name>` otherwise, both at low confidence.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::MappingConfig;

/// Canonical names per role, highest priority first.
const ROLE_TABLE: &[(&str, &[&str])] = &[
    ("node_id", &["node_id", "id", "nodeid", "identifier", "key", "uuid"]),
    ("edge_source", &["source", "from", "src", "start", "source_id", "from_id"]),
    ("edge_target", &["target", "to", "dst", "end", "target_id", "to_id"]),
    ("node_name", &["node_name", "name", "nodename", "title", "label"]),
    ("node_level", &["node_level", "level", "depth", "tier"]),
    (
        "edge_type",
        &["edge_type", "relationship_type", "relationship", "relation", "type", "rel_type"],
    ),
    ("edge_weight", &["edge_weight", "weight", "strength"]),
];

const METRIC_WORDS: &[&str] = &["score", "kpi", "metric", "rate", "performance"];

const EXACT_CONFIDENCE: f64 = 1.0;
const ALIAS_STEP: f64 = 0.05;
const ALIAS_FLOOR: f64 = 0.8;
const PARTIAL_CONFIDENCE: f64 = 0.6;
const KPI_CONFIDENCE: f64 = 0.4;
const ATTRIBUTE_CONFIDENCE: f64 = 0.3;

/// A single suggested role assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedField {
    pub role: String,
    pub column: String,
    /// 0.0 - 1.0
    pub confidence: f64,
}

/// A best-effort, possibly partial mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingSuggestion {
    pub mapping: MappingConfig,
    /// Suggested fields in column order.
    pub fields: Vec<SuggestedField>,
}

impl MappingSuggestion {
    /// Confidence of the suggestion for a role.
    pub fn confidence(&self, role: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|f| f.role == role)
            .map(|f| f.confidence)
    }

    /// Returns true if the suggestion maps a node or edge identity.
    pub fn has_identity(&self) -> bool {
        self.mapping.contains_key("node_id")
            || (self.mapping.contains_key("edge_source")
                && self.mapping.contains_key("edge_target"))
    }
}

/// Suggest a mapping configuration for a set of column names.
pub fn suggest(columns: &[String]) -> MappingSuggestion {
    let normalized: Vec<String> = columns.iter().map(|c| normalize(c)).collect();

    // (confidence, role priority, column index)
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for (priority, (_, names)) in ROLE_TABLE.iter().enumerate() {
        for (index, column) in normalized.iter().enumerate() {
            if let Some(confidence) = match_confidence(column, names) {
                candidates.push((confidence, priority, index));
            }
        }
    }
    candidates.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then(a.1.cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });

    let mut assigned: Vec<Option<(usize, f64)>> = vec![None; columns.len()];
    let mut used_roles = HashSet::new();
    for (confidence, priority, index) in candidates {
        if assigned[index].is_some() || used_roles.contains(&priority) {
            continue;
        }
        used_roles.insert(priority);
        assigned[index] = Some((priority, confidence));
    }

    // Edge details only make sense with both endpoints.
    let has_edges = ["edge_source", "edge_target"]
        .iter()
        .all(|role| assigned.iter().flatten().any(|(p, _)| ROLE_TABLE[*p].0 == *role));
    if !has_edges {
        for slot in assigned.iter_mut() {
            let optional_edge_role = matches!(
                slot,
                Some((p, _)) if matches!(ROLE_TABLE[*p].0, "edge_type" | "edge_weight")
            );
            if optional_edge_role {
                *slot = None;
            }
        }
    }

    let mut suggestion = MappingSuggestion::default();
    for (index, column) in columns.iter().enumerate() {
        let (role, confidence) = match assigned[index] {
            Some((priority, confidence)) => (ROLE_TABLE[priority].0.to_string(), confidence),
            None => fallback_role(&normalized[index], index, &suggestion.mapping),
        };
        suggestion.mapping.insert(role.clone(), column.clone());
        suggestion.fields.push(SuggestedField {
            role,
            column: column.clone(),
            confidence,
        });
    }

    suggestion
}

fn match_confidence(column: &str, names: &[&str]) -> Option<f64> {
    if column.is_empty() {
        return None;
    }

    let compact = column.replace('_', "");
    if let Some(position) = names
        .iter()
        .position(|name| *name == column || name.replace('_', "") == compact)
    {
        return Some((EXACT_CONFIDENCE - ALIAS_STEP * position as f64).max(ALIAS_FLOOR));
    }

    let padded = format!("_{}_", column);
    names
        .iter()
        .any(|name| padded.contains(&format!("_{}_", name)))
        .then_some(PARTIAL_CONFIDENCE)
}

fn fallback_role(column: &str, index: usize, taken: &MappingConfig) -> (String, f64) {
    let base = if column.is_empty() {
        format!("column_{}", index + 1)
    } else {
        column.to_string()
    };

    let is_metric = METRIC_WORDS.iter().any(|word| column.contains(word));
    let (prefix, confidence) = if is_metric {
        ("kpi_", KPI_CONFIDENCE)
    } else {
        ("attribute_", ATTRIBUTE_CONFIDENCE)
    };

    let mut role = format!("{}{}", prefix, base);
    let mut n = 2;
    while taken.contains_key(&role) {
        role = format!("{}{}_{}", prefix, base, n);
        n += 1;
    }
    (role, confidence)
}

/// Lowercase, with runs of non-alphanumerics collapsed to `_`.
fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}
