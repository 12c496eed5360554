//! PipelineGraph: the generic directed container both layers are built on.
//!
//! [`PipelineGraph`] stores [`PipelineNode`]s in a petgraph `StableGraph`
//! with [`SlotEdge`] weights recording which slots an edge connects. The
//! container has no domain knowledge of compartments -- the project owns two
//! instances (detail graph and compartment graph) and the synchronizers keep
//! them consistent.
//!
//! Connections are validated eagerly: slot roles, data-type compatibility,
//! and per-`(source slot, target slot)` uniqueness are checked before any
//! mutation, so a failed `connect` leaves the graph untouched. Removing a
//! node cascades to its edges. Cycle detection is deliberately absent;
//! acyclicity is a property of execution ordering, which lives elsewhere.
//!
//! Besides UUIDs, every node carries a human-readable alias ID derived from
//! its name (`"Detect blobs"` becomes `detect-blobs`, uniquified with a
//! numeric suffix). Aliases appear in the serialized form and are accepted
//! by [`find_node`](PipelineGraph::find_node).

use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::id::{CompartmentId, NodeId};
use crate::node::PipelineNode;
use crate::slot::{SlotDef, SlotDirection, SlotRef};

/// Edge weight: which output slot feeds which input slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SlotEdge {
    pub source_slot: String,
    pub target_slot: String,
}

/// Generic directed graph of pipeline nodes.
#[derive(Debug, Clone, Default)]
pub struct PipelineGraph {
    graph: StableGraph<PipelineNode, SlotEdge, Directed, u32>,
    /// NodeId -> petgraph index
    indices: HashMap<NodeId, NodeIndex<u32>>,
    /// Human-readable unique ids, both directions
    alias_to_node: HashMap<String, NodeId>,
    node_to_alias: HashMap<NodeId, String>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Node operations
    // -----------------------------------------------------------------------

    /// Inserts a node, optionally reassigning its compartment, and assigns a
    /// fresh alias ID derived from the node name.
    ///
    /// Fails with [`CoreError::DuplicateNode`] if the node's ID is already
    /// present.
    pub fn insert_node(
        &mut self,
        mut node: PipelineNode,
        compartment: Option<CompartmentId>,
    ) -> Result<NodeId, CoreError> {
        if self.indices.contains_key(&node.id) {
            return Err(CoreError::DuplicateNode { id: node.id });
        }
        if compartment.is_some() {
            node.compartment = compartment;
        }
        let id = node.id;
        let alias = self.unique_alias(&node.name);
        let idx = self.graph.add_node(node);
        self.indices.insert(id, idx);
        self.alias_to_node.insert(alias.clone(), id);
        self.node_to_alias.insert(id, alias);
        Ok(id)
    }

    /// Removes a node and all its connected edges, returning the node.
    pub fn remove_node(&mut self, id: NodeId) -> Result<PipelineNode, CoreError> {
        let idx = self
            .indices
            .remove(&id)
            .ok_or(CoreError::NodeNotFound { id })?;
        if let Some(alias) = self.node_to_alias.remove(&id) {
            self.alias_to_node.remove(&alias);
        }
        self.graph
            .remove_node(idx)
            .ok_or(CoreError::NodeNotFound { id })
    }

    pub fn node(&self, id: NodeId) -> Option<&PipelineNode> {
        self.indices.get(&id).and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut PipelineNode> {
        match self.indices.get(&id) {
            Some(&idx) => self.graph.node_weight_mut(idx),
            None => None,
        }
    }

    /// Iterates over all node weights, in unspecified order.
    pub fn nodes(&self) -> impl Iterator<Item = &PipelineNode> {
        self.graph.node_weights()
    }

    /// All node IDs, in unspecified order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.indices.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Reassigns a node's compartment tag.
    pub fn set_compartment(
        &mut self,
        id: NodeId,
        compartment: Option<CompartmentId>,
    ) -> Result<(), CoreError> {
        let node = self
            .node_mut(id)
            .ok_or(CoreError::NodeNotFound { id })?;
        node.compartment = compartment;
        Ok(())
    }

    /// IDs of all nodes tagged with the given compartment.
    pub fn nodes_in_compartment(&self, compartment: CompartmentId) -> Vec<NodeId> {
        self.nodes()
            .filter(|n| n.compartment == Some(compartment))
            .map(|n| n.id)
            .collect()
    }

    /// Removes every node tagged with the given compartment, cascading their
    /// edges. Returns the number of removed nodes.
    pub fn remove_nodes_in_compartment(&mut self, compartment: CompartmentId) -> usize {
        let doomed = self.nodes_in_compartment(compartment);
        let count = doomed.len();
        for id in doomed {
            let _ = self.remove_node(id);
        }
        count
    }

    // -----------------------------------------------------------------------
    // Slot operations
    // -----------------------------------------------------------------------

    /// Adds a slot to a node.
    pub fn add_slot(
        &mut self,
        id: NodeId,
        direction: SlotDirection,
        slot: SlotDef,
    ) -> Result<(), CoreError> {
        let node = self
            .node_mut(id)
            .ok_or(CoreError::NodeNotFound { id })?;
        match direction {
            SlotDirection::Input => node.add_input_slot(&slot.name, slot.data_type),
            SlotDirection::Output => node.add_output_slot(&slot.name, slot.data_type),
        }
    }

    /// Removes a slot from a node, disconnecting any edges attached to it
    /// first. Returns the removed definition.
    pub fn remove_slot(
        &mut self,
        id: NodeId,
        direction: SlotDirection,
        name: &str,
    ) -> Result<SlotDef, CoreError> {
        let idx = *self
            .indices
            .get(&id)
            .ok_or(CoreError::NodeNotFound { id })?;

        let doomed: Vec<EdgeIndex<u32>> = match direction {
            SlotDirection::Output => self
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .filter(|e| e.weight().source_slot == name)
                .map(|e| e.id())
                .collect(),
            SlotDirection::Input => self
                .graph
                .edges_directed(idx, Direction::Incoming)
                .filter(|e| e.weight().target_slot == name)
                .map(|e| e.id())
                .collect(),
        };
        for edge in doomed {
            self.graph.remove_edge(edge);
        }

        let node = &mut self.graph[idx];
        let removed = match direction {
            SlotDirection::Input => node.inputs.shift_remove(name),
            SlotDirection::Output => node.outputs.shift_remove(name),
        };
        removed.ok_or(CoreError::SlotNotFound {
            node: id,
            slot: name.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Edge operations
    // -----------------------------------------------------------------------

    /// Connects an output slot to an input slot.
    ///
    /// Fails with `InvalidDirection` if slot roles don't match, `TypeMismatch`
    /// if the target slot does not accept the source's data type, and
    /// `DuplicateEdge` if the pair is already connected. No partial mutation
    /// occurs on failure.
    pub fn connect(&mut self, source: &SlotRef, target: &SlotRef) -> Result<(), CoreError> {
        if source.direction != SlotDirection::Output {
            return Err(CoreError::InvalidDirection {
                slot: source.slot.clone(),
                expected: SlotDirection::Output,
            });
        }
        if target.direction != SlotDirection::Input {
            return Err(CoreError::InvalidDirection {
                slot: target.slot.clone(),
                expected: SlotDirection::Input,
            });
        }

        let (source_idx, source_type) = self.resolve_slot(source)?;
        let (target_idx, target_type) = self.resolve_slot(target)?;

        if !source_type.compatible_with(target_type) {
            return Err(CoreError::TypeMismatch {
                source_type,
                target_type,
            });
        }

        for edge in self.graph.edges_connecting(source_idx, target_idx) {
            if edge.weight().source_slot == source.slot
                && edge.weight().target_slot == target.slot
            {
                return Err(CoreError::DuplicateEdge {
                    from: source.clone(),
                    to: target.clone(),
                });
            }
        }

        self.graph.add_edge(
            source_idx,
            target_idx,
            SlotEdge {
                source_slot: source.slot.clone(),
                target_slot: target.slot.clone(),
            },
        );
        Ok(())
    }

    /// Removes the edge between the given slots.
    pub fn disconnect(
        &mut self,
        source: &SlotRef,
        target: &SlotRef,
    ) -> Result<(), CoreError> {
        let source_idx = *self
            .indices
            .get(&source.node)
            .ok_or(CoreError::NodeNotFound { id: source.node })?;
        let target_idx = *self
            .indices
            .get(&target.node)
            .ok_or(CoreError::NodeNotFound { id: target.node })?;

        let found = self
            .graph
            .edges_connecting(source_idx, target_idx)
            .find(|e| {
                e.weight().source_slot == source.slot && e.weight().target_slot == target.slot
            })
            .map(|e| e.id());

        match found {
            Some(edge) => {
                self.graph.remove_edge(edge);
                Ok(())
            }
            None => Err(CoreError::EdgeNotFound {
                from: source.clone(),
                to: target.clone(),
            }),
        }
    }

    /// Output slots currently feeding the given input slot.
    pub fn source_slots(&self, target: &SlotRef) -> Vec<SlotRef> {
        let Some(&idx) = self.indices.get(&target.node) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().target_slot == target.slot)
            .map(|e| SlotRef::output(self.graph[e.source()].id, e.weight().source_slot.clone()))
            .collect()
    }

    /// Input slots currently fed by the given output slot.
    pub fn target_slots(&self, source: &SlotRef) -> Vec<SlotRef> {
        let Some(&idx) = self.indices.get(&source.node) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| e.weight().source_slot == source.slot)
            .map(|e| SlotRef::input(self.graph[e.target()].id, e.weight().target_slot.clone()))
            .collect()
    }

    /// All edges as `(source, target)` slot-reference pairs.
    pub fn edges(&self) -> Vec<(SlotRef, SlotRef)> {
        self.graph
            .edge_indices()
            .filter_map(|e| {
                let (s, t) = self.graph.edge_endpoints(e)?;
                let w = self.graph.edge_weight(e)?;
                Some((
                    SlotRef::output(self.graph[s].id, w.source_slot.clone()),
                    SlotRef::input(self.graph[t].id, w.target_slot.clone()),
                ))
            })
            .collect()
    }

    /// All edges leaving the given node, regardless of slot.
    pub fn outgoing_edges(&self, node: NodeId) -> Vec<(SlotRef, SlotRef)> {
        let Some(&idx) = self.indices.get(&node) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| {
                (
                    SlotRef::output(self.graph[e.source()].id, e.weight().source_slot.clone()),
                    SlotRef::input(self.graph[e.target()].id, e.weight().target_slot.clone()),
                )
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Alias IDs and lookup
    // -----------------------------------------------------------------------

    /// Finds a node by UUID string, alias ID, or (as a last resort) exact
    /// name match.
    pub fn find_node(&self, key: &str) -> Option<NodeId> {
        if let Ok(uuid) = Uuid::parse_str(key) {
            let id = NodeId(uuid);
            if self.indices.contains_key(&id) {
                return Some(id);
            }
        }
        if let Some(&id) = self.alias_to_node.get(key) {
            return Some(id);
        }
        self.nodes().find(|n| n.name == key).map(|n| n.id)
    }

    /// The alias ID of a node, if assigned.
    pub fn alias(&self, id: NodeId) -> Option<&str> {
        self.node_to_alias.get(&id).map(String::as_str)
    }

    /// All `(node, alias)` pairs, for serialization.
    pub fn aliases(&self) -> &HashMap<NodeId, String> {
        &self.node_to_alias
    }

    /// Assigns an explicit alias to a node, replacing its current one.
    /// Fails if another node already holds the alias.
    pub fn set_alias(&mut self, id: NodeId, alias: &str) -> Result<(), CoreError> {
        if !self.indices.contains_key(&id) {
            return Err(CoreError::NodeNotFound { id });
        }
        if let Some(&existing) = self.alias_to_node.get(alias) {
            if existing != id {
                return Err(CoreError::DuplicateNode { id: existing });
            }
            return Ok(());
        }
        if let Some(old) = self.node_to_alias.remove(&id) {
            self.alias_to_node.remove(&old);
        }
        self.alias_to_node.insert(alias.to_string(), id);
        self.node_to_alias.insert(id, alias.to_string());
        Ok(())
    }

    /// Re-derives alias IDs from node names. With `force`, all aliases are
    /// regenerated; otherwise only nodes without one are assigned.
    pub fn rebuild_alias_ids(&mut self, force: bool) {
        if force {
            self.alias_to_node.clear();
            self.node_to_alias.clear();
        }
        let pending: Vec<(NodeId, String)> = self
            .nodes()
            .filter(|n| force || !self.node_to_alias.contains_key(&n.id))
            .map(|n| (n.id, n.name.clone()))
            .collect();
        for (id, name) in pending {
            let alias = self.unique_alias(&name);
            self.alias_to_node.insert(alias.clone(), id);
            self.node_to_alias.insert(id, alias);
        }
    }

    /// Nodes still carrying an unresolved legacy compartment tag.
    pub fn legacy_compartment_tags(&self) -> Vec<(NodeId, String)> {
        self.nodes()
            .filter_map(|n| {
                n.legacy_compartment
                    .as_ref()
                    .map(|tag| (n.id, tag.clone()))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn resolve_slot(&self, r: &SlotRef) -> Result<(NodeIndex<u32>, crate::data_type::DataTypeId), CoreError> {
        let idx = *self
            .indices
            .get(&r.node)
            .ok_or(CoreError::NodeNotFound { id: r.node })?;
        let node = &self.graph[idx];
        let slot = match r.direction {
            SlotDirection::Output => node.outputs.get(&r.slot),
            SlotDirection::Input => node.inputs.get(&r.slot),
        };
        match slot {
            Some(def) => Ok((idx, def.data_type)),
            None => {
                // A slot present on the opposite side is a role error, not a
                // missing slot.
                let opposite = match r.direction {
                    SlotDirection::Output => node.inputs.contains_key(&r.slot),
                    SlotDirection::Input => node.outputs.contains_key(&r.slot),
                };
                if opposite {
                    Err(CoreError::InvalidDirection {
                        slot: r.slot.clone(),
                        expected: r.direction,
                    })
                } else {
                    Err(CoreError::SlotNotFound {
                        node: r.node,
                        slot: r.slot.clone(),
                    })
                }
            }
        }
    }

    fn unique_alias(&self, name: &str) -> String {
        let base = jsonify(name);
        if !self.alias_to_node.contains_key(&base) {
            return base;
        }
        let mut counter = 2;
        loop {
            let candidate = format!("{}-{}", base, counter);
            if !self.alias_to_node.contains_key(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Lowercases a display name into a dash-separated identifier.
fn jsonify(name: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        "node".to_string()
    } else {
        out
    }
}
