//! Node storage collaborators
//!
//! The trie never owns persistence. It asks a [`NodeStore`] for the serialized
//! form of a node whenever traversal reaches a placeholder, and hands resident
//! nodes back out through [`VerkleTrie::flush`](crate::VerkleTrie::flush).
//! Nodes travel as bincode-encoded [`StoredNode`]s.

mod memory;
mod stored;

pub use memory::MemoryNodeStore;
pub use stored::StoredNode;

use thiserror::Error;

/// Errors reported by a node store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("No node stored at path [{0}]")]
    NotFound(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Resolves trie paths to serialized nodes
///
/// A path is the sequence of key bytes leading from the root to the node,
/// at most [`STEM_SIZE`](crate::STEM_SIZE) bytes long; the root is the empty
/// path. Implementations may block on disk or network I/O and may retry
/// internally; a returned error aborts the trie operation in progress.
pub trait NodeStore: Send + Sync {
    /// Fetch the serialized node stored at `path`
    fn resolve(&self, path: &[u8]) -> std::result::Result<Vec<u8>, StoreError>;
}
