//! Commitment engine trait definition

use crate::model::{Point, Scalar};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-specific encoding of an opening proof
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningProof(Vec<u8>);

impl OpeningProof {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        OpeningProof(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for OpeningProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpeningProof({} bytes)", self.0.len())
    }
}

/// Trait for committing to vectors of up to 256 scalars
///
/// Every method must be a pure function of its inputs so a single engine can
/// be shared between concurrent proof builds. Vectors shorter than
/// [`NODE_WIDTH`](crate::NODE_WIDTH) are implicitly zero-padded; how an
/// engine treats longer vectors is up to the engine, the trie never builds
/// one.
pub trait CommitmentEngine: Send + Sync {
    /// Commit to a vector of scalars
    fn commit(&self, vector: &[Scalar]) -> Point;

    /// Recompute a commitment after some entries changed
    ///
    /// `vector` is the full updated vector and `changes` lists
    /// `(index, old, new)` for each changed entry. Engines with homomorphic
    /// commitments can derive the result from `old` alone.
    /// Default implementation commits to `vector` from scratch.
    fn update(&self, old: &Point, vector: &[Scalar], changes: &[(u8, Scalar, Scalar)]) -> Point {
        let _ = (old, changes);
        self.commit(vector)
    }

    /// Map a commitment into the scalar field so it can be committed to by a parent
    fn to_scalar(&self, commitment: &Point) -> Scalar;

    /// Prove the value of `vector[index]`
    fn open(&self, vector: &[Scalar], index: u8) -> OpeningProof;

    /// Check that `commitment` opens to `value` at `index`
    fn verify(&self, commitment: &Point, index: u8, value: &Scalar, proof: &OpeningProof) -> bool;
}
