//! Stable ID newtypes for graph entities.
//!
//! Both IDs are distinct newtype wrappers over [`Uuid`], providing type safety
//! so that a `NodeId` cannot be accidentally used where a `CompartmentId` is
//! expected. UUIDs (rather than graph indices) are used for identity because
//! they must survive save/load round trips and legacy-format migration.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable node identifier within a [`crate::graph::PipelineGraph`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

/// Compartment identity. A compartment's ID is the UUID of its stand-in node
/// in the compartment graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CompartmentId(pub Uuid);

impl NodeId {
    /// Generates a fresh random node ID.
    pub fn random() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl CompartmentId {
    /// Derives the compartment ID from its stand-in node in the compartment
    /// graph.
    pub fn of_node(node: NodeId) -> Self {
        CompartmentId(node.0)
    }

    /// Returns the stand-in node ID this compartment ID was derived from.
    pub fn as_node(self) -> NodeId {
        NodeId(self.0)
    }
}

// Display implementations -- just print the inner UUID.

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CompartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
