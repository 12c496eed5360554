//! DataTypeId and DataTypeRegistry for slot typing.
//!
//! Every data type flowing through the pipeline has a unique [`DataTypeId`]
//! providing O(1) identity comparison. The [`DataTypeRegistry`] manages type
//! registration and lookup, pre-registering the common image-analysis types
//! on construction.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Unique identifier for a slot data type.
///
/// The inner value is an index into the [`DataTypeRegistry`]'s name vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataTypeId(pub u32);

impl fmt::Display for DataTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataTypeId({})", self.0)
    }
}

/// Pre-registered DataTypeId constants for built-in types.
impl DataTypeId {
    /// Wildcard type: accepts anything when used on an input slot.
    pub const ANY: DataTypeId = DataTypeId(0);
    pub const IMAGE: DataTypeId = DataTypeId(1);
    pub const TABLE: DataTypeId = DataTypeId(2);
    pub const MASK: DataTypeId = DataTypeId(3);
    pub const ROI: DataTypeId = DataTypeId(4);

    /// Whether a value of this type may flow into a slot accepting `target`.
    ///
    /// Types are nominal: compatible when identical, or when the target slot
    /// accepts the wildcard [`DataTypeId::ANY`].
    pub fn compatible_with(self, target: DataTypeId) -> bool {
        self == target || target == DataTypeId::ANY
    }
}

/// Registry of all data types in a project, providing nominal identity via
/// [`DataTypeId`].
///
/// On construction, the registry pre-registers the 5 built-in types:
/// - `DataTypeId(0)` = `any`
/// - `DataTypeId(1)` = `image`
/// - `DataTypeId(2)` = `table`
/// - `DataTypeId(3)` = `mask`
/// - `DataTypeId(4)` = `roi`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTypeRegistry {
    /// Type names indexed by DataTypeId.0
    names: Vec<String>,
    /// Reverse lookup
    ids: HashMap<String, DataTypeId>,
    /// Next available ID
    next_id: u32,
}

impl DataTypeRegistry {
    /// Number of built-in types pre-registered on construction.
    const BUILTIN_COUNT: u32 = 5;

    /// Creates a new registry with the built-in types pre-registered.
    pub fn new() -> Self {
        let names: Vec<String> = ["any", "image", "table", "mask", "roi"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let ids = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), DataTypeId(i as u32)))
            .collect();

        DataTypeRegistry {
            names,
            ids,
            next_id: Self::BUILTIN_COUNT,
        }
    }

    /// Registers a named type and returns its new [`DataTypeId`].
    ///
    /// Returns [`CoreError::DuplicateTypeName`] if the name already exists.
    pub fn register(&mut self, name: &str) -> Result<DataTypeId, CoreError> {
        if self.ids.contains_key(name) {
            return Err(CoreError::DuplicateTypeName {
                name: name.to_string(),
            });
        }
        let id = DataTypeId(self.next_id);
        self.next_id += 1;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    /// Looks up a type name by its [`DataTypeId`].
    pub fn name(&self, id: DataTypeId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    /// Looks up a [`DataTypeId`] by name.
    pub fn get_by_name(&self, name: &str) -> Option<DataTypeId> {
        self.ids.get(name).copied()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the registry is empty. Never true in practice, since built-ins
    /// are registered on construction.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for DataTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
