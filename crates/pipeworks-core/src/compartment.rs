//! Compartment handles.
//!
//! A compartment is simultaneously a stand-in node in the compartment graph
//! and a region tag on detail-graph nodes. The handle tracks the mapping
//! from declared output slot names to the adapter nodes realizing them in
//! the detail graph; the *declared* slots themselves are read from the
//! stand-in node.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::graph::PipelineGraph;
use crate::id::{CompartmentId, NodeId};
use crate::slot::SlotDef;

/// A named logical grouping of detail-graph nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Compartment {
    pub id: CompartmentId,
    pub name: String,
    /// The stand-in node in the compartment graph.
    pub node: NodeId,
    /// Declared output slot name -> adapter node in the detail graph.
    /// Maintained exclusively by the output-slot synchronizer.
    pub output_adapters: IndexMap<String, NodeId>,
}

impl Compartment {
    pub fn new(id: CompartmentId, name: impl Into<String>, node: NodeId) -> Self {
        Compartment {
            id,
            name: name.into(),
            node,
            output_adapters: IndexMap::new(),
        }
    }

    /// The output slots currently declared on the stand-in node, in
    /// declaration order. Empty if the stand-in node is gone.
    pub fn declared_outputs(&self, compartment_graph: &PipelineGraph) -> Vec<SlotDef> {
        compartment_graph
            .node(self.node)
            .map(|n| n.ordered_output_slots())
            .unwrap_or_default()
    }
}
