//! User notifications and change events.
//!
//! Two separate channels, both drained by the caller:
//! - [`NotificationInbox`]: non-blocking user-facing alerts (invalid user
//!   directories and similar), never used by the synchronizers.
//! - [`ProjectEvent`]: structural change notifications. The orchestrator
//!   pushes at most one `GraphChanged` per synchronization pass and never
//!   pushes when nothing changed, so consumers (renderers, caches) can rely
//!   on events meaning actual work.

use serde::{Deserialize, Serialize};

use crate::id::CompartmentId;

/// A non-blocking user-facing alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Stable identifier, e.g. `pipeworks:invalid-project-user-directory`.
    pub id: String,
    pub heading: String,
    pub description: String,
}

impl Notification {
    pub fn new(
        id: impl Into<String>,
        heading: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Notification {
            id: id.into(),
            heading: heading.into(),
            description: description.into(),
        }
    }
}

/// Inbox collecting notifications during an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationInbox {
    notifications: Vec<Notification>,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

/// Structural change notifications produced by the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectEvent {
    /// The detail graph changed as the result of a synchronization pass.
    /// Batched: one event per pass, regardless of how many repairs ran.
    GraphChanged,
    /// A compartment was removed, including its nodes and adapters.
    CompartmentRemoved { compartment: CompartmentId },
}
