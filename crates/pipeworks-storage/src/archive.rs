//! Write-only archiving targets.
//!
//! During export, nodes are written into a [`DataStorage`] -- a write-only
//! sink addressed by relative paths. The core never reads from a storage
//! target; unpacking archives is a separate concern.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use pipeworks_core::PipelineNode;

use crate::error::StorageError;

/// A write-only archiving target.
pub trait DataStorage {
    /// Writes a file at the given path relative to the storage root,
    /// creating intermediate directories as needed.
    fn write(&mut self, relative_path: &Path, bytes: &[u8]) -> Result<(), StorageError>;
}

/// Directory-backed storage.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileSystemStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DataStorage for FileSystemStorage {
    fn write(&mut self, relative_path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let target = self.root.join(relative_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, bytes)?;
        Ok(())
    }
}

/// In-memory storage, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, relative_path: &Path) -> Option<&[u8]> {
        self.files.get(relative_path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl DataStorage for MemoryStorage {
    fn write(&mut self, relative_path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        self.files.insert(relative_path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

/// Serializes one node into the storage target as `<node uuid>.json`.
pub fn write_node(node: &PipelineNode, storage: &mut dyn DataStorage) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(node)?;
    let file = format!("{}.json", node.id);
    storage.write(Path::new(&file), &bytes)
}
