//! # verkle_trie
//!
//! A cryptographically authenticated key-value trie built for small
//! membership and non-membership proofs, intended for stateless-client
//! blockchain state.
//!
//! ## Core Concepts
//!
//! - **Keys**: 32 bytes, split into a 31-byte stem and a 1-byte suffix
//! - **Leaves**: hold up to 256 values sharing one stem, committed in two halves
//! - **Internal nodes**: fan out over 256 children, one key byte per level
//! - **Placeholders**: subtrees known only by commitment, resolved on demand
//!   through a [`NodeStore`]
//! - **Multi-proofs**: batched openings proving presence or absence of keys
//!
//! Commitments are cached per node and recomputed lazily: mutations only mark
//! the path dirty, [`VerkleTrie::commit`] (or any read of a commitment) brings
//! them up to date.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use verkle_trie::{Blake3Committer, MemoryNodeStore, ProofBuilder, TrieConfig, VerkleTrie};
//!
//! let mut trie = VerkleTrie::new(
//!     Arc::new(Blake3Committer::new()),
//!     Arc::new(MemoryNodeStore::new()),
//!     TrieConfig::default(),
//! );
//! trie.insert([0u8; 32], [1u8; 32])?;
//! let root = trie.commit();
//! let proof = ProofBuilder::new(&trie).build([[0u8; 32]])?;
//! ```

pub mod commit;
pub mod model;
pub mod proof;
pub mod store;
pub mod trie;

mod config;
mod error;

pub use commit::{Blake3Committer, CommitmentEngine, OpeningProof};
pub use config::TrieConfig;
pub use error::{Error, Result};
pub use model::{Key, Point, Scalar, Stem, Suffix, Value};
pub use proof::{AbsenceStub, CancelFlag, KeyProof, MultiProof, ProofBuilder};
pub use store::{MemoryNodeStore, NodeStore, StoreError, StoredNode};
pub use trie::{Batch, Node, VerkleTrie};

/// Number of children of an internal node and of value slots in a leaf
pub const NODE_WIDTH: usize = 256;

/// Length of a key stem in bytes
pub const STEM_SIZE: usize = 31;

/// Length of a key in bytes
pub const KEY_SIZE: usize = 32;

/// Length of a value in bytes
pub const VALUE_SIZE: usize = 32;

/// Tracing target for everything emitted by this crate
pub const COMPONENT: &str = "verkle-trie";
