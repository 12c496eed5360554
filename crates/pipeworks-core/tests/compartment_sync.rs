//! End-to-end tests of the compartment synchronization engine: adapter
//! lifecycle, visibility repair, compartment removal, and idempotence.

use proptest::prelude::*;

use pipeworks_core::{
    CompartmentId, DataTypeId, NodeKind, PipelineNode, Project, ProjectEvent, SlotRef,
};

fn consumer_node(name: &str) -> PipelineNode {
    let mut node = PipelineNode::new(name, NodeKind::Ordinary);
    node.add_input_slot("in", DataTypeId::IMAGE).unwrap();
    node.add_output_slot("out", DataTypeId::IMAGE).unwrap();
    node
}

/// Checks that every remaining detail edge satisfies the visibility
/// invariant: the source node is visible in the target's compartment.
fn assert_visibility_invariant(project: &Project) {
    for (source, target) in project.detail_graph().edges() {
        let source_node = project.detail_graph().node(source.node).unwrap();
        let target_node = project.detail_graph().node(target.node).unwrap();
        assert!(
            source_node.is_visible_in(target_node.compartment),
            "edge {} -> {} violates visibility",
            source,
            target
        );
    }
}

/// Two compartments wired `A -> B`, a node in B fed from A's adapter:
/// exactly one `(A, "out")` adapter exists and the edge is valid.
#[test]
fn wired_compartments_share_data_through_one_adapter() {
    let mut project = Project::new();
    let a = project.add_compartment("A").unwrap();
    let b = project.add_compartment("B").unwrap();
    project
        .declare_compartment_output(a, "out", DataTypeId::IMAGE)
        .unwrap();
    project.connect_compartments(a, b).unwrap();

    let adapters: Vec<_> = project
        .detail_graph()
        .nodes()
        .filter(|n| {
            n.compartment == Some(a) && n.output_slot_name() == Some("out")
        })
        .collect();
    assert_eq!(adapters.len(), 1);
    let adapter_id = adapters[0].id;

    let consumer = project
        .detail_graph_mut()
        .insert_node(consumer_node("Blur"), Some(b))
        .unwrap();
    project
        .detail_graph_mut()
        .connect(
            &SlotRef::output(adapter_id, "out"),
            &SlotRef::input(consumer, "in"),
        )
        .unwrap();

    // A further pass must keep the edge: B is in the adapter's visibility.
    project.compartment_graph_changed().unwrap();
    assert_eq!(project.detail_graph().edge_count(), 1);
    assert_visibility_invariant(&project);
}

/// Removing the upstream compartment leaves no dangling consumers: the
/// consumer ends up wired to a pass-through interface with the same slot.
#[test]
fn removing_upstream_compartment_rewires_consumers() {
    let mut project = Project::new();
    let a = project.add_compartment("A").unwrap();
    let b = project.add_compartment("B").unwrap();
    project
        .declare_compartment_output(a, "out", DataTypeId::IMAGE)
        .unwrap();
    project.connect_compartments(a, b).unwrap();

    let adapter_id = project.compartment(a).unwrap().output_adapters["out"];
    let consumer = project
        .detail_graph_mut()
        .insert_node(consumer_node("Blur"), Some(b))
        .unwrap();
    project
        .detail_graph_mut()
        .connect(
            &SlotRef::output(adapter_id, "out"),
            &SlotRef::input(consumer, "in"),
        )
        .unwrap();
    project.take_events();

    project.remove_compartment(a).unwrap();

    // A's adapter and stand-in are gone.
    assert!(project.compartment(a).is_none());
    assert!(project.detail_graph().node(adapter_id).is_none());

    // The consumer's input is fed by an interface in B carrying slot "out".
    let sources = project
        .detail_graph()
        .source_slots(&SlotRef::input(consumer, "in"));
    assert_eq!(sources.len(), 1);
    let interface = project.detail_graph().node(sources[0].node).unwrap();
    assert!(matches!(interface.kind, NodeKind::IoInterface));
    assert_eq!(interface.compartment, Some(b));
    assert!(interface.output_slot("out").is_some());

    // No edge references a removed node.
    for (source, target) in project.detail_graph().edges() {
        assert!(project.detail_graph().node(source.node).is_some());
        assert!(project.detail_graph().node(target.node).is_some());
    }
    assert_visibility_invariant(&project);

    let events = project.take_events();
    assert!(events.contains(&ProjectEvent::CompartmentRemoved { compartment: a }));
}

/// Disconnecting two compartments invalidates the cross-compartment edge;
/// the repair inserts an interface and rewires instead of leaving the
/// consumer dangling.
#[test]
fn narrowing_visibility_repairs_invalid_edges() {
    let mut project = Project::new();
    let a = project.add_compartment("A").unwrap();
    let b = project.add_compartment("B").unwrap();
    project
        .declare_compartment_output(a, "out", DataTypeId::IMAGE)
        .unwrap();
    project.connect_compartments(a, b).unwrap();

    let adapter_id = project.compartment(a).unwrap().output_adapters["out"];
    let consumer = project
        .detail_graph_mut()
        .insert_node(consumer_node("Blur"), Some(b))
        .unwrap();
    project
        .detail_graph_mut()
        .connect(
            &SlotRef::output(adapter_id, "out"),
            &SlotRef::input(consumer, "in"),
        )
        .unwrap();
    project.take_events();

    // Unwire the compartments and resynchronize.
    let a_node = project.compartment(a).unwrap().node;
    let b_node = project.compartment(b).unwrap().node;
    project
        .compartment_graph_mut()
        .disconnect(
            &SlotRef::output(a_node, "out"),
            &SlotRef::input(b_node, "in"),
        )
        .unwrap();
    project.compartment_graph_changed().unwrap();

    // The adapter no longer reaches into B...
    let adapter = project.detail_graph().node(adapter_id).unwrap();
    assert!(!adapter.visible_in.contains(&b));
    assert!(project
        .detail_graph()
        .target_slots(&SlotRef::output(adapter_id, "out"))
        .is_empty());

    // ...and the consumer was rewired to a fresh interface inside B.
    let sources = project
        .detail_graph()
        .source_slots(&SlotRef::input(consumer, "in"));
    assert_eq!(sources.len(), 1);
    let interface = project.detail_graph().node(sources[0].node).unwrap();
    assert!(matches!(interface.kind, NodeKind::IoInterface));
    assert_eq!(interface.compartment, Some(b));
    assert_visibility_invariant(&project);

    // The repair produced exactly one batched notification.
    assert_eq!(project.take_events(), vec![ProjectEvent::GraphChanged]);
}

/// Two distinct upstream compartments feeding the same downstream
/// compartment are both repaired in a single pass (one interface per
/// source node, not one per target compartment).
#[test]
fn every_invalid_source_gets_its_own_interface() {
    let mut project = Project::new();
    let a1 = project.add_compartment("A1").unwrap();
    let a2 = project.add_compartment("A2").unwrap();
    let b = project.add_compartment("B").unwrap();
    project
        .declare_compartment_output(a1, "first", DataTypeId::IMAGE)
        .unwrap();
    project
        .declare_compartment_output(a2, "second", DataTypeId::TABLE)
        .unwrap();
    project.connect_compartments(a1, b).unwrap();
    project.connect_compartments(a2, b).unwrap();

    let first_adapter = project.compartment(a1).unwrap().output_adapters["first"];
    let second_adapter = project.compartment(a2).unwrap().output_adapters["second"];

    let mut merge = PipelineNode::new("Merge", NodeKind::Ordinary);
    merge.add_input_slot("image", DataTypeId::IMAGE).unwrap();
    merge.add_input_slot("table", DataTypeId::TABLE).unwrap();
    let merge_id = project
        .detail_graph_mut()
        .insert_node(merge, Some(b))
        .unwrap();
    project
        .detail_graph_mut()
        .connect(
            &SlotRef::output(first_adapter, "first"),
            &SlotRef::input(merge_id, "image"),
        )
        .unwrap();
    project
        .detail_graph_mut()
        .connect(
            &SlotRef::output(second_adapter, "second"),
            &SlotRef::input(merge_id, "table"),
        )
        .unwrap();
    project.take_events();

    // Unwire both upstream compartments in one batch.
    let b_node = project.compartment(b).unwrap().node;
    for (compartment, slot) in [(a1, "first"), (a2, "second")] {
        let stand_in = project.compartment(compartment).unwrap().node;
        project
            .compartment_graph_mut()
            .disconnect(
                &SlotRef::output(stand_in, slot),
                &SlotRef::input(b_node, "in"),
            )
            .unwrap();
    }
    project.compartment_graph_changed().unwrap();

    // Both inputs of the merge node are fed again, each from its own
    // pass-through interface.
    for slot in ["image", "table"] {
        let sources = project
            .detail_graph()
            .source_slots(&SlotRef::input(merge_id, slot));
        assert_eq!(sources.len(), 1, "input '{}' left dangling", slot);
        let interface = project.detail_graph().node(sources[0].node).unwrap();
        assert!(matches!(interface.kind, NodeKind::IoInterface));
        assert_eq!(interface.compartment, Some(b));
    }
    assert_visibility_invariant(&project);
}

/// A second synchronization pass with no intervening edits is a no-op:
/// no events, no node or edge changes.
#[test]
fn second_pass_without_edits_changes_nothing() {
    let mut project = Project::new();
    let a = project.add_compartment("A").unwrap();
    let b = project.add_compartment("B").unwrap();
    project
        .declare_compartment_output(a, "out", DataTypeId::IMAGE)
        .unwrap();
    project.connect_compartments(a, b).unwrap();

    project.compartment_graph_changed().unwrap();
    project.take_events();
    let nodes_before = project.detail_graph().node_count();
    let edges_before = project.detail_graph().edge_count();

    project.compartment_graph_changed().unwrap();

    assert!(project.take_events().is_empty());
    assert_eq!(project.detail_graph().node_count(), nodes_before);
    assert_eq!(project.detail_graph().edge_count(), edges_before);
}

/// Redeclaring `["x", "y"]` as `["y"]` deletes the `x` adapter and keeps
/// the `y` adapter untouched.
#[test]
fn redeclaring_outputs_deletes_only_stale_adapters() {
    let mut project = Project::new();
    let c = project.add_compartment("C").unwrap();
    project
        .declare_compartment_output(c, "x", DataTypeId::IMAGE)
        .unwrap();
    project
        .declare_compartment_output(c, "y", DataTypeId::TABLE)
        .unwrap();

    let x_adapter = project.compartment(c).unwrap().output_adapters["x"];
    let y_adapter = project.compartment(c).unwrap().output_adapters["y"];

    project.remove_compartment_output(c, "x").unwrap();

    assert!(project.detail_graph().node(x_adapter).is_none());
    let compartment = project.compartment(c).unwrap();
    assert_eq!(compartment.output_adapters.len(), 1);
    assert_eq!(compartment.output_adapters["y"], y_adapter);
}

proptest! {
    /// Over arbitrary small compartment topologies, a synchronization pass
    /// with no intervening edits emits nothing, and every declared output
    /// slot is realized by exactly one adapter.
    #[test]
    fn synchronization_is_idempotent_over_random_topologies(
        output_counts in proptest::collection::vec(0usize..3, 4),
        edges in proptest::collection::vec((0usize..4, 0usize..4), 0..8),
    ) {
        let mut project = Project::new();
        let mut compartments: Vec<CompartmentId> = Vec::new();
        for index in 0..4 {
            compartments.push(project.add_compartment(&format!("C{}", index)).unwrap());
        }
        for (index, &count) in output_counts.iter().enumerate() {
            for slot in 0..count {
                project
                    .declare_compartment_output(
                        compartments[index],
                        &format!("out{}", slot),
                        DataTypeId::IMAGE,
                    )
                    .unwrap();
            }
        }
        for (source, target) in edges {
            if source == target {
                continue;
            }
            // Sources without declared outputs and repeated pairs are
            // rejected; both are fine here.
            let _ = project.connect_compartments(compartments[source], compartments[target]);
        }
        project.take_events();

        project.compartment_graph_changed().unwrap();
        prop_assert!(project.take_events().is_empty());

        for &id in &compartments {
            let compartment = project.compartment(id).unwrap();
            let declared = compartment.declared_outputs(project.compartment_graph());
            prop_assert_eq!(declared.len(), compartment.output_adapters.len());
            for slot in &declared {
                let adapter_id = compartment.output_adapters[&slot.name];
                let adapter = project.detail_graph().node(adapter_id).unwrap();
                prop_assert_eq!(adapter.output_slot_name(), Some(slot.name.as_str()));
                prop_assert_eq!(adapter.compartment, Some(id));
            }
            // Exactly one adapter per (compartment, slot) in the graph.
            for slot in &declared {
                let count = project
                    .detail_graph()
                    .nodes()
                    .filter(|n| {
                        n.compartment == Some(id)
                            && n.output_slot_name() == Some(slot.name.as_str())
                    })
                    .count();
                prop_assert_eq!(count, 1);
            }
        }
    }
}
