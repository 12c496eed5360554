pub mod compartment;
pub mod data_type;
pub mod error;
pub mod factory;
pub mod graph;
pub mod id;
pub mod node;
pub mod notify;
pub mod persist;
pub mod phase;
pub mod project;
pub mod report;
pub mod slot;
pub mod sync;

// Re-export commonly used types
pub use compartment::Compartment;
pub use data_type::{DataTypeId, DataTypeRegistry};
pub use error::CoreError;
pub use factory::{NodeFactory, StandardNodeFactory};
pub use graph::{PipelineGraph, SlotEdge};
pub use id::{CompartmentId, NodeId};
pub use node::{Location, NodeKind, PipelineNode};
pub use notify::{Notification, NotificationInbox, ProjectEvent};
pub use phase::{PhaseState, ProjectPhase};
pub use project::{DataStorageSettings, Project, ProjectMetadata, PROJECT_FORMAT_VERSION};
pub use report::{ValidationEntry, ValidationLevel, ValidationReport};
pub use slot::{SlotDef, SlotDirection, SlotRef};
pub use sync::{synchronize_compartment_outputs, synchronize_visibility, VisibilityOutcome};
