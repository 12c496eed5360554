//! Node model for both graph layers.
//!
//! A [`PipelineNode`] is the weight stored in a [`crate::graph::PipelineGraph`].
//! The detail graph holds `Ordinary`, `CompartmentOutput`, and `IoInterface`
//! nodes; the compartment graph holds `Compartment` stand-in nodes whose
//! output-slot list is the compartment's *declared* output set.
//!
//! Node kinds form a closed tagged union dispatched by exhaustive matching;
//! kind-specific data (the compartment-output slot tag) lives on the variant.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data_type::DataTypeId;
use crate::error::CoreError;
use crate::id::{CompartmentId, NodeId};
use crate::slot::SlotDef;

/// Canvas position of a node, tracked per view mode per compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

/// The closed set of node kinds.
///
/// `CompartmentOutput` and `IoInterface` are synthetic pass-through adapters
/// owned by the synchronizers; users never create them directly.
/// `Compartment` appears only in the compartment graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodeKind {
    /// An ordinary processing node in the detail graph.
    Ordinary,
    /// A compartment's stand-in node in the compartment graph.
    Compartment,
    /// Adapter representing one declared compartment output slot in the
    /// detail graph. `output_slot_name` ties the adapter to the declared
    /// slot; the empty string marks a legacy untagged adapter.
    #[serde(rename_all = "kebab-case")]
    CompartmentOutput { output_slot_name: String },
    /// Pass-through adapter minted during visibility repair and compartment
    /// removal.
    IoInterface,
}

/// A node in a pipeline graph.
///
/// Slots are ordered and name-unique per direction. `visible_in` is the set
/// of compartments into which this node's outputs may legally be connected;
/// it is recomputed wholesale by the visibility synchronizer and only ever
/// populated on adapter nodes. `legacy_compartment` carries the old
/// string-typed compartment tag until migration resolves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineNode {
    pub id: NodeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compartment: Option<CompartmentId>,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, SlotDef>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, SlotDef>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub visible_in: BTreeSet<CompartmentId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub locations: BTreeMap<String, BTreeMap<String, Location>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_compartment: Option<String>,
}

impl PipelineNode {
    /// Creates a new node with a random ID and no slots.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        PipelineNode {
            id: NodeId::random(),
            name: name.into(),
            compartment: None,
            kind,
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            visible_in: BTreeSet::new(),
            locations: BTreeMap::new(),
            legacy_compartment: None,
        }
    }

    /// Creates a node with the given slot lists. Later slots win on duplicate
    /// names; intended for construction from trusted sources (factories,
    /// deserialization glue).
    pub fn with_slots(
        name: impl Into<String>,
        kind: NodeKind,
        inputs: Vec<SlotDef>,
        outputs: Vec<SlotDef>,
    ) -> Self {
        let mut node = Self::new(name, kind);
        for slot in inputs {
            node.inputs.insert(slot.name.clone(), slot);
        }
        for slot in outputs {
            node.outputs.insert(slot.name.clone(), slot);
        }
        node
    }

    /// Adds an input slot. Fails if the name is already taken on the input
    /// side.
    pub fn add_input_slot(
        &mut self,
        name: &str,
        data_type: DataTypeId,
    ) -> Result<(), CoreError> {
        if self.inputs.contains_key(name) {
            return Err(CoreError::DuplicateSlot {
                node: self.id,
                slot: name.to_string(),
            });
        }
        self.inputs
            .insert(name.to_string(), SlotDef::new(name, data_type));
        Ok(())
    }

    /// Adds an output slot. Fails if the name is already taken on the output
    /// side.
    pub fn add_output_slot(
        &mut self,
        name: &str,
        data_type: DataTypeId,
    ) -> Result<(), CoreError> {
        if self.outputs.contains_key(name) {
            return Err(CoreError::DuplicateSlot {
                node: self.id,
                slot: name.to_string(),
            });
        }
        self.outputs
            .insert(name.to_string(), SlotDef::new(name, data_type));
        Ok(())
    }

    pub fn input_slot(&self, name: &str) -> Option<&SlotDef> {
        self.inputs.get(name)
    }

    pub fn output_slot(&self, name: &str) -> Option<&SlotDef> {
        self.outputs.get(name)
    }

    /// First declared input slot, in declaration order.
    pub fn first_input_slot(&self) -> Option<&SlotDef> {
        self.inputs.first().map(|(_, def)| def)
    }

    /// First declared output slot, in declaration order.
    pub fn first_output_slot(&self) -> Option<&SlotDef> {
        self.outputs.first().map(|(_, def)| def)
    }

    /// Whether this node is a synthetic adapter.
    pub fn is_adapter(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::CompartmentOutput { .. } | NodeKind::IoInterface
        )
    }

    /// The declared-slot tag of a compartment-output adapter.
    pub fn output_slot_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::CompartmentOutput { output_slot_name } => Some(output_slot_name),
            _ => None,
        }
    }

    /// Updates the declared-slot tag. No-op on other node kinds.
    pub fn set_output_slot_name(&mut self, name: &str) {
        if let NodeKind::CompartmentOutput { output_slot_name } = &mut self.kind {
            if output_slot_name != name {
                *output_slot_name = name.to_string();
            }
        }
    }

    /// Whether this node's outputs may be consumed inside `compartment`.
    ///
    /// A node is always visible in its own compartment; cross-compartment
    /// visibility requires membership in `visible_in`.
    pub fn is_visible_in(&self, compartment: Option<CompartmentId>) -> bool {
        if self.compartment == compartment {
            return true;
        }
        compartment.map_or(false, |c| self.visible_in.contains(&c))
    }

    /// Unordered input-slot signature, for pass-through identity checks.
    pub fn input_signature(&self) -> BTreeMap<String, DataTypeId> {
        self.inputs
            .values()
            .map(|s| (s.name.clone(), s.data_type))
            .collect()
    }

    /// Unordered output-slot signature, for pass-through identity checks.
    pub fn output_signature(&self) -> BTreeMap<String, DataTypeId> {
        self.outputs
            .values()
            .map(|s| (s.name.clone(), s.data_type))
            .collect()
    }

    /// Output slots in declaration order.
    pub fn ordered_output_slots(&self) -> Vec<SlotDef> {
        self.outputs.values().cloned().collect()
    }

    /// Replaces both slot lists with a mirrored pass-through configuration:
    /// one input and one output per given slot.
    pub fn set_pass_through_slots(&mut self, slots: &[SlotDef]) {
        self.inputs.clear();
        self.outputs.clear();
        for slot in slots {
            self.inputs.insert(slot.name.clone(), slot.clone());
            self.outputs.insert(slot.name.clone(), slot.clone());
        }
    }
}
