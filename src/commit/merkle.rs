//! BLAKE3 Merkle vector commitment

use super::{CommitmentEngine, OpeningProof};
use crate::model::{Point, Scalar};
use crate::NODE_WIDTH;

const LEAF_TAG: u8 = 0x00;
const NODE_TAG: u8 = 0x01;
const POINT_TAG: u8 = 0x02;

/// Depth of the binary tree over [`NODE_WIDTH`] leaves
const TREE_DEPTH: usize = 8;

/// A vector commitment built as a binary BLAKE3 Merkle tree over 256 slots
///
/// The commitment is the Merkle root, an opening proof is the list of
/// sibling hashes from the slot up to the root. Binding, deterministic and
/// stateless; not homomorphic, so [`CommitmentEngine::update`] recomputes.
/// Vectors longer than [`NODE_WIDTH`] are truncated to their first 256
/// entries.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Committer;

impl Blake3Committer {
    pub fn new() -> Self {
        Blake3Committer
    }

    fn leaf_hash(index: u8, value: &Scalar) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[LEAF_TAG, index]);
        hasher.update(value.as_bytes());
        *hasher.finalize().as_bytes()
    }

    fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[NODE_TAG]);
        hasher.update(left);
        hasher.update(right);
        *hasher.finalize().as_bytes()
    }

    /// All levels of the tree, leaves first, root last
    ///
    /// Entries past [`NODE_WIDTH`] are ignored.
    fn levels(vector: &[Scalar]) -> Vec<Vec<[u8; 32]>> {
        let leaves: Vec<[u8; 32]> = (0..NODE_WIDTH)
            .map(|i| Self::leaf_hash(i as u8, vector.get(i).unwrap_or(&Scalar::ZERO)))
            .collect();

        let mut levels = Vec::with_capacity(TREE_DEPTH + 1);
        levels.push(leaves);
        while levels[levels.len() - 1].len() > 1 {
            let next: Vec<[u8; 32]> = levels[levels.len() - 1]
                .chunks(2)
                .map(|pair| Self::node_hash(&pair[0], &pair[1]))
                .collect();
            levels.push(next);
        }
        levels
    }
}

impl CommitmentEngine for Blake3Committer {
    fn commit(&self, vector: &[Scalar]) -> Point {
        let levels = Self::levels(vector);
        Point::from_bytes(levels[TREE_DEPTH][0])
    }

    fn to_scalar(&self, commitment: &Point) -> Scalar {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[POINT_TAG]);
        hasher.update(commitment.as_bytes());
        Scalar::from_bytes(*hasher.finalize().as_bytes())
    }

    fn open(&self, vector: &[Scalar], index: u8) -> OpeningProof {
        let levels = Self::levels(vector);
        let mut position = index as usize;
        let mut bytes = Vec::with_capacity(TREE_DEPTH * 32);
        for level in levels.iter().take(TREE_DEPTH) {
            bytes.extend_from_slice(&level[position ^ 1]);
            position >>= 1;
        }
        OpeningProof::from_bytes(bytes)
    }

    fn verify(&self, commitment: &Point, index: u8, value: &Scalar, proof: &OpeningProof) -> bool {
        let bytes = proof.as_bytes();
        if bytes.len() != TREE_DEPTH * 32 {
            return false;
        }

        let mut position = index as usize;
        let mut current = Self::leaf_hash(index, value);
        for sibling in bytes.chunks_exact(32) {
            let mut sib = [0u8; 32];
            sib.copy_from_slice(sibling);
            current = if position & 1 == 0 {
                Self::node_hash(&current, &sib)
            } else {
                Self::node_hash(&sib, &current)
            };
            position >>= 1;
        }
        current == *commitment.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vector() -> Vec<Scalar> {
        (0..NODE_WIDTH)
            .map(|i| Scalar::from_le_slice(&(i as u64 * 7 + 1).to_le_bytes()))
            .collect()
    }

    #[test]
    fn test_commit_deterministic() {
        let engine = Blake3Committer::new();
        let v = sample_vector();
        assert_eq!(engine.commit(&v), engine.commit(&v));
    }

    #[test]
    fn test_short_vector_is_zero_padded() {
        let engine = Blake3Committer::new();
        let short = vec![Scalar::ONE];
        let mut padded = vec![Scalar::ZERO; NODE_WIDTH];
        padded[0] = Scalar::ONE;
        assert_eq!(engine.commit(&short), engine.commit(&padded));
    }

    #[test]
    fn test_wide_vector_is_truncated() {
        let engine = Blake3Committer::new();
        let v = sample_vector();
        let mut wide = v.clone();
        wide.push(Scalar::ONE);
        assert_eq!(engine.commit(&wide), engine.commit(&v));
        assert!(engine.verify(&engine.commit(&v), 255, &v[255], &engine.open(&wide, 255)));
    }

    #[test]
    fn test_commit_sensitive_to_each_slot() {
        let engine = Blake3Committer::new();
        let v = sample_vector();
        let base = engine.commit(&v);
        for i in [0usize, 1, 127, 128, 255] {
            let mut changed = v.clone();
            changed[i] = Scalar::ZERO;
            assert_ne!(engine.commit(&changed), base, "slot {i}");
        }
    }

    #[test]
    fn test_open_verify() {
        let engine = Blake3Committer::new();
        let v = sample_vector();
        let c = engine.commit(&v);

        for index in [0u8, 1, 42, 200, 255] {
            let proof = engine.open(&v, index);
            assert!(engine.verify(&c, index, &v[index as usize], &proof));
            assert!(!engine.verify(&c, index, &Scalar::ZERO, &proof));
            assert!(!engine.verify(&c, index.wrapping_add(1), &v[index as usize], &proof));
        }
    }

    #[test]
    fn test_verify_rejects_truncated_proof() {
        let engine = Blake3Committer::new();
        let v = sample_vector();
        let c = engine.commit(&v);
        let proof = engine.open(&v, 3);
        let truncated = OpeningProof::from_bytes(proof.as_bytes()[..32].to_vec());
        assert!(!engine.verify(&c, 3, &v[3], &truncated));
    }

    #[test]
    fn test_update_matches_commit() {
        let engine = Blake3Committer::new();
        let mut v = sample_vector();
        let old = engine.commit(&v);
        let before = v[9];
        v[9] = Scalar::ONE;
        let updated = engine.update(&old, &v, &[(9, before, Scalar::ONE)]);
        assert_eq!(updated, engine.commit(&v));
    }
}
