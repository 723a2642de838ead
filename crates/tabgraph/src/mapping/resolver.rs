//! Interpretation of mapping configurations into structured role assignments.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};
use crate::model::MappingConfig;

/// A semantic role a source column can play.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingRole {
    NodeId,
    NodeName,
    NodeLevel,
    /// `attribute_<name>`
    Attribute(String),
    /// `kpi_<name>`
    Kpi(String),
    EdgeSource,
    EdgeTarget,
    EdgeType,
    EdgeWeight,
    EdgeLevel,
    /// `edge_attribute_<name>`
    EdgeAttribute(String),
    /// `edge_kpi_<name>`
    EdgeKpi(String),
}

// Longest prefixes first so `edge_attribute_x` never reads as an attribute.
const NAMED_PREFIXES: &[(&str, fn(String) -> MappingRole)] = &[
    ("edge_attribute_", MappingRole::EdgeAttribute),
    ("edge_kpi_", MappingRole::EdgeKpi),
    ("attribute_", MappingRole::Attribute),
    ("kpi_", MappingRole::Kpi),
];

impl MappingRole {
    /// The mapping key for this role.
    pub fn key(&self) -> String {
        match self {
            MappingRole::NodeId => "node_id".to_string(),
            MappingRole::NodeName => "node_name".to_string(),
            MappingRole::NodeLevel => "node_level".to_string(),
            MappingRole::Attribute(name) => format!("attribute_{}", name),
            MappingRole::Kpi(name) => format!("kpi_{}", name),
            MappingRole::EdgeSource => "edge_source".to_string(),
            MappingRole::EdgeTarget => "edge_target".to_string(),
            MappingRole::EdgeType => "edge_type".to_string(),
            MappingRole::EdgeWeight => "edge_weight".to_string(),
            MappingRole::EdgeLevel => "edge_level".to_string(),
            MappingRole::EdgeAttribute(name) => format!("edge_attribute_{}", name),
            MappingRole::EdgeKpi(name) => format!("edge_kpi_{}", name),
        }
    }
}

impl fmt::Display for MappingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for MappingRole {
    type Err = String;

    fn from_str(key: &str) -> std::result::Result<Self, Self::Err> {
        let role = match key {
            "node_id" => MappingRole::NodeId,
            "node_name" => MappingRole::NodeName,
            "node_level" => MappingRole::NodeLevel,
            "edge_source" => MappingRole::EdgeSource,
            "edge_target" => MappingRole::EdgeTarget,
            "edge_type" => MappingRole::EdgeType,
            "edge_weight" => MappingRole::EdgeWeight,
            "edge_level" => MappingRole::EdgeLevel,
            _ => {
                let (prefix, build) = NAMED_PREFIXES
                    .iter()
                    .find(|(prefix, _)| key.starts_with(prefix))
                    .ok_or_else(|| format!("unknown mapping role '{}'", key))?;
                let name = &key[prefix.len()..];
                if name.trim().is_empty() {
                    return Err(format!("mapping role '{}' has an empty name", key));
                }
                build(name.to_string())
            }
        };
        Ok(role)
    }
}

/// Role assignments grouped by what they build.
///
/// Named roles map the attribute/KPI name to its source column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMapping {
    pub node_id: Option<String>,
    pub node_name: Option<String>,
    pub node_level: Option<String>,
    pub attributes: IndexMap<String, String>,
    pub kpis: IndexMap<String, String>,
    pub edge_source: Option<String>,
    pub edge_target: Option<String>,
    pub edge_type: Option<String>,
    pub edge_weight: Option<String>,
    pub edge_level: Option<String>,
    pub edge_attributes: IndexMap<String, String>,
    pub edge_kpis: IndexMap<String, String>,
}

impl ResolvedMapping {
    /// Returns true if rows can become nodes.
    pub fn has_node_identity(&self) -> bool {
        self.node_id.is_some()
    }

    /// Returns true if rows can become edges.
    pub fn has_edge_identity(&self) -> bool {
        self.edge_source.is_some() && self.edge_target.is_some()
    }

    /// Attribute roles applied to edge rows.
    ///
    /// Generic `attribute_*` roles also apply to edges when no node identity
    /// is mapped; explicit edge roles take precedence.
    pub fn effective_edge_attributes(&self) -> IndexMap<String, String> {
        merge_for_edges(&self.edge_attributes, &self.attributes, self.has_node_identity())
    }

    /// KPI component roles applied to edge rows (see
    /// [`effective_edge_attributes`](Self::effective_edge_attributes)).
    pub fn effective_edge_kpis(&self) -> IndexMap<String, String> {
        merge_for_edges(&self.edge_kpis, &self.kpis, self.has_node_identity())
    }

    /// Every mapped `(role, column)` pair in a stable order.
    pub fn roles(&self) -> Vec<(MappingRole, &str)> {
        let mut roles = Vec::new();
        let singles = [
            (MappingRole::NodeId, &self.node_id),
            (MappingRole::NodeName, &self.node_name),
            (MappingRole::NodeLevel, &self.node_level),
            (MappingRole::EdgeSource, &self.edge_source),
            (MappingRole::EdgeTarget, &self.edge_target),
            (MappingRole::EdgeType, &self.edge_type),
            (MappingRole::EdgeWeight, &self.edge_weight),
            (MappingRole::EdgeLevel, &self.edge_level),
        ];
        for (role, column) in singles {
            if let Some(column) = column {
                roles.push((role, column.as_str()));
            }
        }
        for (name, column) in &self.attributes {
            roles.push((MappingRole::Attribute(name.clone()), column.as_str()));
        }
        for (name, column) in &self.kpis {
            roles.push((MappingRole::Kpi(name.clone()), column.as_str()));
        }
        for (name, column) in &self.edge_attributes {
            roles.push((MappingRole::EdgeAttribute(name.clone()), column.as_str()));
        }
        for (name, column) in &self.edge_kpis {
            roles.push((MappingRole::EdgeKpi(name.clone()), column.as_str()));
        }
        roles
    }

    fn assign(&mut self, role: MappingRole, column: String) {
        match role {
            MappingRole::NodeId => self.node_id = Some(column),
            MappingRole::NodeName => self.node_name = Some(column),
            MappingRole::NodeLevel => self.node_level = Some(column),
            MappingRole::Attribute(name) => {
                self.attributes.insert(name, column);
            }
            MappingRole::Kpi(name) => {
                self.kpis.insert(name, column);
            }
            MappingRole::EdgeSource => self.edge_source = Some(column),
            MappingRole::EdgeTarget => self.edge_target = Some(column),
            MappingRole::EdgeType => self.edge_type = Some(column),
            MappingRole::EdgeWeight => self.edge_weight = Some(column),
            MappingRole::EdgeLevel => self.edge_level = Some(column),
            MappingRole::EdgeAttribute(name) => {
                self.edge_attributes.insert(name, column);
            }
            MappingRole::EdgeKpi(name) => {
                self.edge_kpis.insert(name, column);
            }
        }
    }
}

fn merge_for_edges(
    explicit: &IndexMap<String, String>,
    generic: &IndexMap<String, String>,
    has_nodes: bool,
) -> IndexMap<String, String> {
    let mut merged = IndexMap::new();
    if !has_nodes {
        merged.extend(generic.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Group mapping keys by role.
///
/// Entries with an empty column are treated as unmapped. Unknown role keys
/// are collected and reported together as `MappingConfigInvalid`.
pub fn resolve(mapping: &MappingConfig) -> Result<ResolvedMapping> {
    let mut resolved = ResolvedMapping::default();
    let mut problems = Vec::new();

    for (key, column) in mapping {
        let column = column.trim();
        if column.is_empty() {
            continue;
        }
        match key.trim().parse::<MappingRole>() {
            Ok(role) => resolved.assign(role, column.to_string()),
            Err(problem) => problems.push(problem),
        }
    }

    if problems.is_empty() {
        Ok(resolved)
    } else {
        Err(ImportError::MappingConfigInvalid(problems))
    }
}
