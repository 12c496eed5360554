//! Named, typed, directional connection points.
//!
//! Slots are the only valid edge endpoints in a pipeline graph. A node
//! declares an ordered set of input and output [`SlotDef`]s; edges are
//! addressed by [`SlotRef`] (owning node + direction + slot name).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data_type::DataTypeId;
use crate::id::NodeId;

/// Which side of a node a slot sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotDirection {
    Input,
    Output,
}

impl fmt::Display for SlotDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotDirection::Input => write!(f, "input"),
            SlotDirection::Output => write!(f, "output"),
        }
    }
}

/// A slot declaration on a node: a name plus the accepted data type.
///
/// Slot names are unique per direction within a node; the owning node and
/// direction are implied by where the definition is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SlotDef {
    pub name: String,
    pub data_type: DataTypeId,
}

impl SlotDef {
    pub fn new(name: impl Into<String>, data_type: DataTypeId) -> Self {
        SlotDef {
            name: name.into(),
            data_type,
        }
    }
}

/// Reference to a slot on a specific node. Edge endpoints are always
/// expressed as slot references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SlotRef {
    pub node: NodeId,
    pub direction: SlotDirection,
    pub slot: String,
}

impl SlotRef {
    /// Reference to an output slot.
    pub fn output(node: NodeId, slot: impl Into<String>) -> Self {
        SlotRef {
            node,
            direction: SlotDirection::Output,
            slot: slot.into(),
        }
    }

    /// Reference to an input slot.
    pub fn input(node: NodeId, slot: impl Into<String>) -> Self {
        SlotRef {
            node,
            direction: SlotDirection::Input,
            slot: slot.into(),
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}:{}]", self.node, self.direction, self.slot)
    }
}
