//! Validation reporting.
//!
//! Structural problems found during load and repair are appended to a
//! [`ValidationReport`] instead of aborting -- the report is the single
//! channel through which the user learns what was silently fixed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    Warning,
    Error,
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationLevel::Warning => write!(f, "warning"),
            ValidationLevel::Error => write!(f, "error"),
        }
    }
}

/// One report entry: severity, message, and the context it refers to
/// (a node display name, settings sheet id, file section, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationEntry {
    pub level: ValidationLevel,
    pub message: String,
    pub context: String,
}

/// Ordered list of validation entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    entries: Vec<ValidationEntry>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: ValidationLevel, context: impl Into<String>, message: impl Into<String>) {
        self.entries.push(ValidationEntry {
            level,
            message: message.into(),
            context: context.into(),
        });
    }

    pub fn warn(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.push(ValidationLevel::Warning, context, message);
    }

    pub fn error(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.push(ValidationLevel::Error, context, message);
    }

    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.level == ValidationLevel::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.level == ValidationLevel::Error)
            .count()
    }

    /// Appends all entries of another report.
    pub fn merge(&mut self, other: ValidationReport) {
        self.entries.extend(other.entries);
    }
}
