//! Persisted project format (JSON value-tree level).
//!
//! The file-level I/O lives in the storage crate; this module converts
//! between [`Project`] and `serde_json::Value`, applying legacy-format
//! migration and structural repair on the way in. Loading is tolerant per
//! entry: a malformed node, edge, or settings sheet is skipped and reported,
//! never fatal -- one bad entry must not void an otherwise-valid project.
//!
//! Format outline (all keys namespaced `pipeworks:` where ambiguous):
//!
//! ```json
//! {
//!   "pipeworks:project-type": "project",
//!   "pipeworks:project-format-version": 1,
//!   "metadata": { ... },
//!   "data-types": { ... },
//!   "settings": { "data-storage": { ... }, ... },
//!   "graph": { "nodes": [...], "edges": [...], "aliases": { ... } },
//!   "compartments": { "compartment-graph": { ... } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::CoreError;
use crate::graph::PipelineGraph;
use crate::id::{CompartmentId, NodeId};
use crate::node::PipelineNode;
use crate::phase::ProjectPhase;
use crate::project::{DataStorageSettings, Project, PROJECT_FORMAT_VERSION};
use crate::report::ValidationReport;
use crate::slot::SlotRef;

/// One serialized edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct EdgeRecord {
    source_node: NodeId,
    source_slot: String,
    target_node: NodeId,
    target_slot: String,
}

/// Serializes a graph into its `{nodes, edges, aliases}` form.
pub fn graph_to_json(graph: &PipelineGraph) -> Result<Value, CoreError> {
    let mut nodes = Vec::new();
    for node in graph.nodes() {
        nodes.push(serde_json::to_value(node)?);
    }

    let mut edges = Vec::new();
    for (source, target) in graph.edges() {
        edges.push(serde_json::to_value(EdgeRecord {
            source_node: source.node,
            source_slot: source.slot,
            target_node: target.node,
            target_slot: target.slot,
        })?);
    }

    let mut aliases = Map::new();
    for (id, alias) in graph.aliases() {
        aliases.insert(id.to_string(), Value::String(alias.clone()));
    }

    Ok(json!({ "nodes": nodes, "edges": edges, "aliases": aliases }))
}

/// Rebuilds a graph from its serialized form.
///
/// Malformed or unconnectable entries are skipped with a report entry;
/// the rest of the graph still loads.
pub fn graph_from_json(
    value: &Value,
    report: &mut ValidationReport,
    section: &str,
) -> PipelineGraph {
    let mut graph = PipelineGraph::new();
    let Some(object) = value.as_object() else {
        report.error(section, "expected an object with 'nodes' and 'edges'");
        return graph;
    };

    if let Some(nodes) = object.get("nodes").and_then(Value::as_array) {
        for entry in nodes {
            match serde_json::from_value::<PipelineNode>(entry.clone()) {
                Ok(node) => {
                    let id = node.id;
                    if let Err(err) = graph.insert_node(node, None) {
                        report.warn(section, format!("skipped node {}: {}", id, err));
                    }
                }
                Err(err) => {
                    report.warn(section, format!("skipped malformed node entry: {}", err));
                }
            }
        }
    }

    if let Some(aliases) = object.get("aliases").and_then(Value::as_object) {
        for (key, alias) in aliases {
            if let (Ok(uuid), Some(alias)) = (Uuid::parse_str(key), alias.as_str()) {
                let _ = graph.set_alias(NodeId(uuid), alias);
            }
        }
    }

    if let Some(edges) = object.get("edges").and_then(Value::as_array) {
        for entry in edges {
            match serde_json::from_value::<EdgeRecord>(entry.clone()) {
                Ok(record) => {
                    let source = SlotRef::output(record.source_node, record.source_slot);
                    let target = SlotRef::input(record.target_node, record.target_slot);
                    if let Err(err) = graph.connect(&source, &target) {
                        report.warn(
                            section,
                            format!("skipped edge {} -> {}: {}", source, target, err),
                        );
                    }
                }
                Err(err) => {
                    report.warn(section, format!("skipped malformed edge entry: {}", err));
                }
            }
        }
    }

    graph
}

impl Project {
    /// Serializes the project to its persisted JSON form.
    pub fn to_json(&self) -> Result<Value, CoreError> {
        let mut root = Map::new();
        root.insert("pipeworks:project-type".into(), json!("project"));
        root.insert(
            "pipeworks:project-format-version".into(),
            json!(PROJECT_FORMAT_VERSION),
        );
        root.insert("metadata".into(), serde_json::to_value(&self.metadata)?);
        root.insert("data-types".into(), serde_json::to_value(&self.data_types)?);

        let mut settings = Map::new();
        settings.insert(
            DataStorageSettings::SHEET_ID.into(),
            serde_json::to_value(&self.settings)?,
        );
        for (key, sheet) in &self.unloaded_settings {
            if key != DataStorageSettings::SHEET_ID {
                settings.insert(key.clone(), sheet.clone());
            }
        }
        root.insert("settings".into(), Value::Object(settings));

        root.insert("graph".into(), graph_to_json(&self.detail_graph)?);
        let mut compartments = Map::new();
        compartments.insert(
            "compartment-graph".into(),
            graph_to_json(&self.compartment_graph)?,
        );
        root.insert("compartments".into(), Value::Object(compartments));

        Ok(Value::Object(root))
    }

    /// Loads a project from its persisted JSON form.
    ///
    /// Runs under the `Loading` phase, so no synchronizer is triggered on a
    /// partially-built graph; the synchronizers run exactly once at the end,
    /// followed by legacy migration repair. Structural problems are reported
    /// and repaired, never fatal.
    pub fn from_json(value: &Value, report: &mut ValidationReport) -> Result<Project, CoreError> {
        let mut project = Project::new();
        project.phase.enter(ProjectPhase::Loading)?;
        let result = project.load_from_json(value, report);
        project.phase.leave();
        result?;
        // Load is not an edit: consumers see the loaded state, not repairs.
        project.events.clear();
        Ok(project)
    }

    fn load_from_json(
        &mut self,
        value: &Value,
        report: &mut ValidationReport,
    ) -> Result<(), CoreError> {
        let Some(root) = value.as_object() else {
            return Err(CoreError::InvalidFormat {
                reason: "project file is not a JSON object".into(),
            });
        };

        if let Some(version) = root
            .get("pipeworks:project-format-version")
            .and_then(Value::as_u64)
        {
            if version != PROJECT_FORMAT_VERSION as u64 {
                report.warn(
                    "project",
                    format!(
                        "unknown project format version {}; attempting to load anyway",
                        version
                    ),
                );
            }
        }

        if let Some(metadata) = root.get("metadata") {
            match serde_json::from_value(metadata.clone()) {
                Ok(parsed) => self.metadata = parsed,
                Err(err) => report.error("metadata", format!("could not be parsed: {}", err)),
            }
        }

        if let Some(types) = root.get("data-types") {
            match serde_json::from_value(types.clone()) {
                Ok(parsed) => self.data_types = parsed,
                Err(err) => report.error("data-types", format!("could not be parsed: {}", err)),
            }
        }

        if let Some(settings) = root.get("settings").and_then(Value::as_object) {
            for (key, sheet) in settings {
                if key == DataStorageSettings::SHEET_ID {
                    match serde_json::from_value(sheet.clone()) {
                        Ok(parsed) => self.settings = parsed,
                        Err(err) => report.error(
                            format!("settings sheet '{}'", key),
                            format!("could not be parsed and was skipped: {}", err),
                        ),
                    }
                } else {
                    // Unknown sheet: keep the raw data so saving does not
                    // lose it.
                    self.unloaded_settings.insert(key.clone(), sheet.clone());
                    report.warn(
                        format!("settings sheet '{}'", key),
                        "unknown sheet id; the data is preserved but not interpreted",
                    );
                }
            }
        }

        // The detail graph loads first; compartment membership is checked
        // only after the compartment graph is available.
        self.detail_graph =
            graph_from_json(root.get("graph").unwrap_or(&Value::Null), report, "graph");
        let compartment_section = root
            .get("compartments")
            .and_then(|c| c.get("compartment-graph"))
            .unwrap_or(&Value::Null);
        self.compartment_graph =
            graph_from_json(compartment_section, report, "compartment-graph");

        self.migrate_legacy_compartments(report);
        self.run_synchronizers()?;
        self.repair_orphan_nodes(report);
        Ok(())
    }

    /// Resolves legacy string compartment tags against the compartment
    /// graph. Resolvable nodes are reassigned (including their UI location
    /// keys); unresolvable nodes are deleted and reported.
    fn migrate_legacy_compartments(&mut self, report: &mut ValidationReport) {
        for (node_id, tag) in self.detail_graph.legacy_compartment_tags() {
            match self.compartment_graph.find_node(&tag) {
                Some(stand_in) => {
                    let resolved = CompartmentId::of_node(stand_in);
                    info!(legacy = %tag, compartment = %resolved, "resolved legacy compartment tag");
                    if let Some(node) = self.detail_graph.node_mut(node_id) {
                        node.compartment = Some(resolved);
                        node.legacy_compartment = None;
                        let locations = std::mem::take(&mut node.locations);
                        for (key, value) in locations {
                            let new_key = if key == "DEFAULT" {
                                String::new()
                            } else {
                                self.compartment_graph
                                    .find_node(&key)
                                    .map(|n| CompartmentId::of_node(n).to_string())
                                    .unwrap_or_default()
                            };
                            node.locations.insert(new_key, value);
                        }
                    }
                }
                None => {
                    let name = self
                        .detail_graph
                        .node(node_id)
                        .map(|n| n.name.clone())
                        .unwrap_or_else(|| node_id.to_string());
                    report.warn(
                        format!("node '{}'", name),
                        format!(
                            "references unknown legacy compartment '{}'; the node was removed",
                            tag
                        ),
                    );
                    let _ = self.detail_graph.remove_node(node_id);
                }
            }
        }
    }

    /// Deletes detail nodes whose compartment is missing or unknown.
    fn repair_orphan_nodes(&mut self, report: &mut ValidationReport) {
        for node_id in self.detail_graph.node_ids() {
            let Some((name, valid)) = self.detail_graph.node(node_id).map(|n| {
                (
                    n.name.clone(),
                    n.compartment
                        .map_or(false, |c| self.compartments.contains_key(&c)),
                )
            }) else {
                continue;
            };
            if !valid {
                report.warn(
                    format!("node '{}'", name),
                    "node has no valid compartment; it was removed automatically",
                );
                let _ = self.detail_graph.remove_node(node_id);
            }
        }
    }
}
