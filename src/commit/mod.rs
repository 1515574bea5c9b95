//! Vector commitment engines
//!
//! The trie only consumes the [`CommitmentEngine`] contract. [`Blake3Committer`]
//! is a hash-based engine used when no elliptic-curve backend is plugged in.

mod merkle;
mod traits;

pub use merkle::Blake3Committer;
pub use traits::{CommitmentEngine, OpeningProof};
