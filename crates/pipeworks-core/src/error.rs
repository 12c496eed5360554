//! Core error types for pipeworks-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! all anticipated failure modes in the graph data model and the
//! synchronization engine. Structural problems discovered during load are
//! deliberately *not* represented here -- those are repaired in place and
//! reported through [`crate::report::ValidationReport`].

use thiserror::Error;

use crate::data_type::DataTypeId;
use crate::id::{CompartmentId, NodeId};
use crate::phase::ProjectPhase;
use crate::slot::{SlotDirection, SlotRef};

/// Core errors produced by the pipeworks-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Attempting to register a data type name that already exists.
    #[error("duplicate data type name: '{name}'")]
    DuplicateTypeName { name: String },

    /// A node was not found in the graph.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// Attempting to insert a node whose ID is already present.
    #[error("node already present: {id}")]
    DuplicateNode { id: NodeId },

    /// A slot was not found on the given node.
    #[error("slot not found: node {node} has no slot '{slot}'")]
    SlotNotFound { node: NodeId, slot: String },

    /// Attempting to add a slot whose name is already taken on that side of
    /// the node.
    #[error("duplicate slot: node {node} already declares '{slot}'")]
    DuplicateSlot { node: NodeId, slot: String },

    /// A slot was used with the wrong role (input where an output is
    /// required, or vice versa).
    #[error("invalid direction: slot '{slot}' is not an {expected} slot")]
    InvalidDirection { slot: String, expected: SlotDirection },

    /// The source slot's data type is not accepted by the target slot.
    #[error("type mismatch: {source_type} is not accepted by {target_type}")]
    TypeMismatch {
        source_type: DataTypeId,
        target_type: DataTypeId,
    },

    /// The requested edge already exists.
    #[error("duplicate edge: {from} -> {to}")]
    DuplicateEdge { from: SlotRef, to: SlotRef },

    /// No edge exists between the given slots.
    #[error("edge not found: {from} -> {to}")]
    EdgeNotFound { from: SlotRef, to: SlotRef },

    /// A node declares no slots on the required side.
    #[error("node {node} declares no {direction} slots")]
    NoSlots {
        node: NodeId,
        direction: SlotDirection,
    },

    /// A compartment ID was not found in the project.
    #[error("compartment not found: {id}")]
    CompartmentNotFound { id: CompartmentId },

    /// A guarded phase was entered while another phase was active.
    #[error("illegal phase transition: {from} -> {to}")]
    IllegalPhaseTransition {
        from: ProjectPhase,
        to: ProjectPhase,
    },

    /// JSON serialization or deserialization failed at the project level.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The project JSON does not have the expected overall shape.
    #[error("invalid project format: {reason}")]
    InvalidFormat { reason: String },
}
