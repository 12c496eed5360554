//! Adapter node construction.
//!
//! The synchronizers never instantiate nodes themselves; they receive a
//! [`NodeFactory`] capability, keeping them pure functions of
//! `(graphs, factory)` and testable without global state.

use crate::node::{NodeKind, PipelineNode};
use crate::slot::SlotDef;

/// Creates the synthetic adapter nodes the synchronizers insert.
pub trait NodeFactory {
    /// A compartment-output adapter for one declared slot: a pass-through
    /// node tagged with the slot name.
    fn compartment_output(&self, slot: &SlotDef) -> PipelineNode;

    /// An empty pass-through interface node; the caller copies the slot
    /// signature onto it.
    fn io_interface(&self, name: &str) -> PipelineNode;
}

/// Default factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardNodeFactory;

impl NodeFactory for StandardNodeFactory {
    fn compartment_output(&self, slot: &SlotDef) -> PipelineNode {
        PipelineNode::with_slots(
            slot.name.clone(),
            NodeKind::CompartmentOutput {
                output_slot_name: slot.name.clone(),
            },
            vec![slot.clone()],
            vec![slot.clone()],
        )
    }

    fn io_interface(&self, name: &str) -> PipelineNode {
        PipelineNode::new(name, NodeKind::IoInterface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataTypeId;

    #[test]
    fn compartment_output_is_a_tagged_pass_through() {
        let factory = StandardNodeFactory;
        let node = factory.compartment_output(&SlotDef::new("out", DataTypeId::IMAGE));

        assert_eq!(node.output_slot_name(), Some("out"));
        assert_eq!(node.inputs.len(), 1);
        assert_eq!(node.outputs.len(), 1);
        assert_eq!(node.input_signature(), node.output_signature());
    }

    #[test]
    fn io_interface_starts_without_slots() {
        let factory = StandardNodeFactory;
        let node = factory.io_interface("Analysis output");

        assert!(matches!(node.kind, NodeKind::IoInterface));
        assert!(node.inputs.is_empty());
        assert!(node.outputs.is_empty());
    }
}
