//! Project phase state machine.
//!
//! Bulk operations (whole-project deserialization, alias rebuilding) must
//! not trigger the synchronizers while graphs are partially built. Instead
//! of ad-hoc boolean flags, the project carries an explicit phase with
//! guarded entry: re-entering a phase is a detectable
//! [`CoreError::IllegalPhaseTransition`], not a silently skipped branch.

use std::fmt;

use crate::error::CoreError;

/// The project's current bulk-operation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectPhase {
    /// Normal operation; synchronizers run after compartment-graph edits.
    Idle,
    /// Whole-project deserialization in progress.
    Loading,
    /// Bulk alias/ID rebuilding in progress.
    Rebuilding,
}

impl fmt::Display for ProjectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectPhase::Idle => write!(f, "idle"),
            ProjectPhase::Loading => write!(f, "loading"),
            ProjectPhase::Rebuilding => write!(f, "rebuilding"),
        }
    }
}

/// Guarded phase holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseState {
    current: ProjectPhase,
}

impl PhaseState {
    pub fn new() -> Self {
        PhaseState {
            current: ProjectPhase::Idle,
        }
    }

    pub fn current(&self) -> ProjectPhase {
        self.current
    }

    /// Enters a bulk phase. Fails unless the current phase is `Idle`;
    /// entering `Idle` itself is also illegal (use [`leave`](Self::leave)).
    pub fn enter(&mut self, phase: ProjectPhase) -> Result<(), CoreError> {
        if self.current != ProjectPhase::Idle || phase == ProjectPhase::Idle {
            return Err(CoreError::IllegalPhaseTransition {
                from: self.current,
                to: phase,
            });
        }
        self.current = phase;
        Ok(())
    }

    /// Returns to `Idle`.
    pub fn leave(&mut self) {
        self.current = ProjectPhase::Idle;
    }

    /// Whether synchronizer triggers are currently suppressed.
    pub fn suppresses_synchronization(&self) -> bool {
        self.current != ProjectPhase::Idle
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::new()
    }
}
