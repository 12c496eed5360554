//! The consistency-synchronization engine.
//!
//! Two passes keep the detail graph consistent with the compartment graph:
//!
//! 1. [`synchronize_compartment_outputs`] guarantees exactly one
//!    compartment-output adapter per declared output slot of a compartment
//!    (rename, delete stale, reuse/create missing).
//! 2. [`synchronize_visibility`] recomputes all adapter visibility sets from
//!    the compartment graph's edges, then repairs detail edges that violate
//!    them by minting pass-through interface nodes and rewiring.
//!
//! Both are plain functions of `(graphs, compartments, factory)`; they do
//! not emit notifications themselves. The project orchestrator turns their
//! `changed` results into a single batched event per pass, which is what
//! makes a no-op second invocation observable as a no-op (no event).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::compartment::Compartment;
use crate::data_type::DataTypeId;
use crate::error::CoreError;
use crate::factory::NodeFactory;
use crate::graph::PipelineGraph;
use crate::id::{CompartmentId, NodeId};
use crate::node::NodeKind;
use crate::slot::SlotRef;

/// Result of a visibility pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityOutcome {
    /// Whether any visibility set or any detail edge changed.
    pub changed: bool,
    /// Number of invalid edges removed.
    pub removed_edges: usize,
}

/// Reconciles a compartment's adapter nodes with its declared output slots.
///
/// Returns whether the detail graph was mutated. After this pass, exactly
/// one `CompartmentOutput` adapter tagged `(compartment, slot)` exists per
/// declared slot -- no duplicates, no missing adapters.
pub fn synchronize_compartment_outputs(
    detail: &mut PipelineGraph,
    compartment_graph: &PipelineGraph,
    compartment: &mut Compartment,
    factory: &dyn NodeFactory,
) -> Result<bool, CoreError> {
    let mut changed = false;

    // Rename pass: the map key is authoritative for the adapter's tag.
    let entries: Vec<(String, NodeId)> = compartment
        .output_adapters
        .iter()
        .map(|(name, id)| (name.clone(), *id))
        .collect();
    for (slot_name, adapter_id) in &entries {
        if let Some(node) = detail.node_mut(*adapter_id) {
            node.set_output_slot_name(slot_name);
        }
    }

    let declared = compartment.declared_outputs(compartment_graph);
    let declared_names: HashSet<&str> = declared.iter().map(|s| s.name.as_str()).collect();

    // Deletion pass: adapters whose slot is no longer declared go away,
    // edges included.
    for (slot_name, adapter_id) in &entries {
        if declared_names.contains(slot_name.as_str()) {
            continue;
        }
        compartment.output_adapters.shift_remove(slot_name);
        if detail.node(*adapter_id).is_some() {
            detail.remove_node(*adapter_id)?;
        }
        debug!(compartment = %compartment.id, slot = %slot_name, "removed stale compartment output adapter");
        changed = true;
    }

    // Creation pass: reuse an existing tagged adapter, fall back to a legacy
    // untagged one when the compartment declares a single output, else mint
    // a new node.
    for slot in &declared {
        if compartment.output_adapters.contains_key(&slot.name) {
            continue;
        }

        let mut found = detail
            .nodes()
            .find(|n| {
                n.compartment == Some(compartment.id)
                    && n.output_slot_name() == Some(slot.name.as_str())
            })
            .map(|n| n.id);

        if found.is_none() && declared.len() == 1 {
            found = detail
                .nodes()
                .find(|n| {
                    n.compartment == Some(compartment.id) && n.output_slot_name() == Some("")
                })
                .map(|n| n.id);
            if let Some(id) = found {
                info!(node = %id, slot = %slot.name, "matched legacy compartment output to declared slot");
            }
        }

        let adapter_id = match found {
            Some(id) => {
                if let Some(node) = detail.node_mut(id) {
                    node.set_output_slot_name(&slot.name);
                }
                id
            }
            None => {
                let node = factory.compartment_output(slot);
                let id = detail.insert_node(node, Some(compartment.id))?;
                changed = true;
                id
            }
        };
        compartment.output_adapters.insert(slot.name.clone(), adapter_id);
    }

    Ok(changed)
}

/// Recomputes adapter visibility from the compartment graph and repairs
/// detail edges that violate it.
///
/// Fully recomputes every compartment-output adapter's `visible_in` set
/// (never patched incrementally), then scans all detail edges: an edge is
/// invalid when its source node is not visible in the target node's
/// compartment. Invalid edges are grouped by `(source node, target
/// compartment)`; each group gets a pass-through `IoInterface` inside the
/// target compartment (unless one with an identical input signature already
/// lives there) and the source's outgoing edges into that compartment are
/// rewired through it, slot name by slot name. All invalid edges are then
/// disconnected.
pub fn synchronize_visibility(
    detail: &mut PipelineGraph,
    compartment_graph: &PipelineGraph,
    compartments: &IndexMap<CompartmentId, Compartment>,
    factory: &dyn NodeFactory,
) -> Result<VisibilityOutcome, CoreError> {
    // Snapshot the previous sets and clear them.
    let mut previous: HashMap<NodeId, BTreeSet<CompartmentId>> = HashMap::new();
    for compartment in compartments.values() {
        for &adapter_id in compartment.output_adapters.values() {
            if let Some(node) = detail.node_mut(adapter_id) {
                previous.insert(adapter_id, std::mem::take(&mut node.visible_in));
            }
        }
    }

    // Recompute from the compartment graph: an edge `A[out:S] -> B[in]`
    // makes A's adapter for S visible in B.
    for target in compartment_graph.nodes() {
        if !matches!(target.kind, NodeKind::Compartment) {
            continue;
        }
        let Some(input) = target.first_input_slot() else {
            continue;
        };
        let target_compartment = CompartmentId::of_node(target.id);
        for source in compartment_graph.source_slots(&SlotRef::input(target.id, &input.name)) {
            let Some(source_compartment) =
                compartments.get(&CompartmentId::of_node(source.node))
            else {
                continue;
            };
            if let Some(&adapter_id) = source_compartment.output_adapters.get(&source.slot) {
                if let Some(node) = detail.node_mut(adapter_id) {
                    node.visible_in.insert(target_compartment);
                }
            }
        }
    }

    // Detect visibility changes against the snapshot.
    let mut changed = false;
    'outer: for compartment in compartments.values() {
        for &adapter_id in compartment.output_adapters.values() {
            let current = detail
                .node(adapter_id)
                .map(|n| n.visible_in.clone())
                .unwrap_or_default();
            let old = previous.remove(&adapter_id).unwrap_or_default();
            if current != old {
                changed = true;
                break 'outer;
            }
        }
    }

    // Scan for edges violating the recomputed visibility.
    let mut invalid: Vec<(SlotRef, SlotRef)> = Vec::new();
    for (source, target) in detail.edges() {
        let Some(source_node) = detail.node(source.node) else {
            continue;
        };
        let Some(target_node) = detail.node(target.node) else {
            continue;
        };
        if !source_node.is_visible_in(target_node.compartment) {
            invalid.push((source, target));
        }
    }

    // Repair: one interface per (source node, target compartment) group.
    let mut handled: HashSet<(NodeId, CompartmentId)> = HashSet::new();
    for (source, target) in &invalid {
        let Some(target_compartment) = detail.node(target.node).and_then(|n| n.compartment)
        else {
            continue;
        };
        if !handled.insert((source.node, target_compartment)) {
            continue;
        }

        let Some(source_node) = detail.node(source.node) else {
            continue;
        };
        if !matches!(source_node.kind, NodeKind::CompartmentOutput { .. }) {
            continue;
        }
        let source_name = source_node.name.clone();
        let source_locations = source_node.locations.clone();
        let pass_through = source_node.ordered_output_slots();
        let signature: BTreeMap<String, DataTypeId> = source_node.output_signature();

        let already_repaired = detail.nodes().any(|n| {
            n.compartment == Some(target_compartment)
                && matches!(n.kind, NodeKind::IoInterface)
                && n.input_signature() == signature
        });
        if already_repaired {
            continue;
        }

        let mut adapter = factory.io_interface(&source_name);
        adapter.set_pass_through_slots(&pass_through);
        adapter.locations = source_locations;
        let adapter_id = detail.insert_node(adapter, Some(target_compartment))?;
        debug!(
            source = %source.node,
            compartment = %target_compartment,
            interface = %adapter_id,
            "inserted pass-through interface for invalid cross-compartment edges"
        );

        // Rewire every outgoing edge of the source that lands in the target
        // compartment, preserving slot-name correspondence.
        for (from, to) in detail.outgoing_edges(source.node) {
            let to_compartment = detail.node(to.node).and_then(|n| n.compartment);
            if to_compartment == Some(target_compartment) {
                detail.connect(&SlotRef::output(adapter_id, &from.slot), &to)?;
            }
        }
    }

    // Apply: drop the collected invalid edges.
    for (source, target) in &invalid {
        detail.disconnect(source, target)?;
        changed = true;
    }

    Ok(VisibilityOutcome {
        changed,
        removed_edges: invalid.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataTypeId;
    use crate::factory::StandardNodeFactory;
    use crate::node::PipelineNode;
    use crate::slot::SlotDef;

    fn stand_in(name: &str, outputs: &[&str]) -> PipelineNode {
        let mut node = PipelineNode::new(name, NodeKind::Compartment);
        node.add_input_slot("in", DataTypeId::ANY).unwrap();
        for slot in outputs {
            node.add_output_slot(slot, DataTypeId::IMAGE).unwrap();
        }
        node
    }

    fn setup_compartment(
        compartment_graph: &mut PipelineGraph,
        name: &str,
        outputs: &[&str],
    ) -> Compartment {
        let node = compartment_graph.insert_node(stand_in(name, outputs), None).unwrap();
        Compartment::new(CompartmentId::of_node(node), name, node)
    }

    #[test]
    fn creates_one_adapter_per_declared_slot() {
        let mut detail = PipelineGraph::new();
        let mut compartment_graph = PipelineGraph::new();
        let mut compartment = setup_compartment(&mut compartment_graph, "A", &["x", "y"]);

        let changed = synchronize_compartment_outputs(
            &mut detail,
            &compartment_graph,
            &mut compartment,
            &StandardNodeFactory,
        )
        .unwrap();

        assert!(changed);
        assert_eq!(compartment.output_adapters.len(), 2);
        assert_eq!(detail.node_count(), 2);
        for (slot, adapter_id) in &compartment.output_adapters {
            let adapter = detail.node(*adapter_id).unwrap();
            assert_eq!(adapter.output_slot_name(), Some(slot.as_str()));
            assert_eq!(adapter.compartment, Some(compartment.id));
        }
    }

    #[test]
    fn second_run_is_a_no_op() {
        let mut detail = PipelineGraph::new();
        let mut compartment_graph = PipelineGraph::new();
        let mut compartment = setup_compartment(&mut compartment_graph, "A", &["x"]);

        synchronize_compartment_outputs(
            &mut detail,
            &compartment_graph,
            &mut compartment,
            &StandardNodeFactory,
        )
        .unwrap();
        let first = compartment.output_adapters.clone();

        let changed = synchronize_compartment_outputs(
            &mut detail,
            &compartment_graph,
            &mut compartment,
            &StandardNodeFactory,
        )
        .unwrap();

        assert!(!changed);
        assert_eq!(compartment.output_adapters, first);
        assert_eq!(detail.node_count(), 1);
    }

    #[test]
    fn rediscovers_adapters_after_map_loss() {
        // Simulates reload: the adapter exists in the graph but the handle's
        // map is empty. The tagged adapter must be reused, not duplicated.
        let mut detail = PipelineGraph::new();
        let mut compartment_graph = PipelineGraph::new();
        let mut compartment = setup_compartment(&mut compartment_graph, "A", &["x"]);

        synchronize_compartment_outputs(
            &mut detail,
            &compartment_graph,
            &mut compartment,
            &StandardNodeFactory,
        )
        .unwrap();
        let adapter_id = compartment.output_adapters["x"];

        compartment.output_adapters.clear();
        synchronize_compartment_outputs(
            &mut detail,
            &compartment_graph,
            &mut compartment,
            &StandardNodeFactory,
        )
        .unwrap();

        assert_eq!(compartment.output_adapters["x"], adapter_id);
        assert_eq!(detail.node_count(), 1);
    }

    #[test]
    fn legacy_untagged_adapter_is_claimed_for_single_output() {
        let mut detail = PipelineGraph::new();
        let mut compartment_graph = PipelineGraph::new();
        let mut compartment = setup_compartment(&mut compartment_graph, "A", &["out"]);

        // An old save: adapter tagged to the compartment but with no slot
        // name.
        let legacy = PipelineNode::with_slots(
            "Output",
            NodeKind::CompartmentOutput {
                output_slot_name: String::new(),
            },
            vec![SlotDef::new("out", DataTypeId::IMAGE)],
            vec![SlotDef::new("out", DataTypeId::IMAGE)],
        );
        let legacy_id = detail.insert_node(legacy, Some(compartment.id)).unwrap();

        synchronize_compartment_outputs(
            &mut detail,
            &compartment_graph,
            &mut compartment,
            &StandardNodeFactory,
        )
        .unwrap();

        assert_eq!(compartment.output_adapters["out"], legacy_id);
        assert_eq!(detail.node(legacy_id).unwrap().output_slot_name(), Some("out"));
        assert_eq!(detail.node_count(), 1);
    }

    #[test]
    fn legacy_fallback_requires_single_declared_output() {
        let mut detail = PipelineGraph::new();
        let mut compartment_graph = PipelineGraph::new();
        let mut compartment = setup_compartment(&mut compartment_graph, "A", &["x", "y"]);

        let legacy = PipelineNode::new(
            "Output",
            NodeKind::CompartmentOutput {
                output_slot_name: String::new(),
            },
        );
        let legacy_id = detail.insert_node(legacy, Some(compartment.id)).unwrap();

        synchronize_compartment_outputs(
            &mut detail,
            &compartment_graph,
            &mut compartment,
            &StandardNodeFactory,
        )
        .unwrap();

        // Two fresh adapters; the untagged node is left alone.
        assert_eq!(compartment.output_adapters.len(), 2);
        assert!(!compartment
            .output_adapters
            .values()
            .any(|&id| id == legacy_id));
        assert_eq!(detail.node_count(), 3);
    }

    #[test]
    fn undeclared_slot_drops_adapter_and_its_edges() {
        let mut detail = PipelineGraph::new();
        let mut compartment_graph = PipelineGraph::new();
        let mut compartment = setup_compartment(&mut compartment_graph, "C", &["x", "y"]);

        synchronize_compartment_outputs(
            &mut detail,
            &compartment_graph,
            &mut compartment,
            &StandardNodeFactory,
        )
        .unwrap();
        let x_adapter = compartment.output_adapters["x"];
        let y_adapter = compartment.output_adapters["y"];

        // Redeclare ["y"] only.
        compartment_graph
            .remove_slot(compartment.node, crate::slot::SlotDirection::Output, "x")
            .unwrap();
        synchronize_compartment_outputs(
            &mut detail,
            &compartment_graph,
            &mut compartment,
            &StandardNodeFactory,
        )
        .unwrap();

        assert!(detail.node(x_adapter).is_none());
        assert_eq!(compartment.output_adapters.len(), 1);
        // The survivor is retained, not recreated.
        assert_eq!(compartment.output_adapters["y"], y_adapter);
    }
}
