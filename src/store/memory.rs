//! In-memory node store

use super::{NodeStore, StoreError};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A [`NodeStore`] backed by a path-indexed hash map
///
/// Useful as the target of [`VerkleTrie::flush`](crate::VerkleTrie::flush)
/// and as a stand-in for disk or network backends in tests.
#[derive(Default)]
pub struct MemoryNodeStore {
    nodes: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryNodeStore {
    /// Create a new empty store
    pub fn new() -> Self {
        MemoryNodeStore {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// Store serialized node data at a path, replacing any previous entry
    pub fn put(&self, path: &[u8], data: Vec<u8>) {
        self.nodes.write().insert(path.to_vec(), data);
    }

    /// Remove the entry at a path, returning it
    pub fn remove(&self, path: &[u8]) -> Option<Vec<u8>> {
        self.nodes.write().remove(path)
    }

    pub fn contains(&self, path: &[u8]) -> bool {
        self.nodes.read().contains_key(path)
    }

    /// Number of stored nodes
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

impl NodeStore for MemoryNodeStore {
    fn resolve(&self, path: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.nodes
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(hex::encode(path)))
    }
}
