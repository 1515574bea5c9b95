//! Verkle trie for authenticated key-value state
//!
//! This implements a 256-ary trie where:
//! - Internal nodes consume one stem byte per level
//! - Leaves hold the up to 256 values sharing a 31-byte stem
//! - Every node caches a vector commitment over its children or values,
//!   recomputed lazily after mutations
//! - Subtrees may be absent from memory and are resolved through a node store

mod batch;
mod node;
mod resolver;
mod tree;

pub use batch::Batch;
pub use node::{
    leaf_vector, stem_scalar, value_scalars, Half, InternalNode, LeafCommitments, LeafNode, Node,
};
pub use tree::VerkleTrie;
