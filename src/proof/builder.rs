//! Multi-proof construction

use super::cancel::CancelFlag;
use super::multiproof::{AbsenceStub, KeyProof, MultiProof, Opening, OpeningKey, Target};
use crate::commit::CommitmentEngine;
use crate::model::{Key, Point, Scalar, Stem};
use crate::trie::{leaf_vector, Half, InternalNode, LeafNode, Node, VerkleTrie};
use crate::{Error, Result, COMPONENT};
use std::collections::{BTreeSet, HashMap};

/// Builds proofs of presence or absence against a trie's current root
///
/// Building never mutates the trie: dirty commitments are computed once, on a
/// copy-on-write snapshot that is dropped afterwards. Every placeholder on a
/// proven path must be resolved beforehand (see [`VerkleTrie::prefetch`]).
pub struct ProofBuilder<'a> {
    trie: &'a VerkleTrie,
    cancel: Option<CancelFlag>,
}

impl<'a> ProofBuilder<'a> {
    pub fn new(trie: &'a VerkleTrie) -> Self {
        ProofBuilder { trie, cancel: None }
    }

    /// Abort the build with [`Error::Cancelled`] once `flag` is set
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Build one proof covering every key in `keys`
    pub fn build<K: AsRef<[u8]>>(&self, keys: impl IntoIterator<Item = K>) -> Result<MultiProof> {
        let keys = keys
            .into_iter()
            .map(|key| Key::from_slice(key.as_ref()))
            .collect::<Result<BTreeSet<Key>>>()?;

        let mut snapshot = self.trie.snapshot();
        let root = snapshot.commit();
        let mut session = Session {
            engine: snapshot.engine(),
            proof: MultiProof::new(root),
            vectors: HashMap::new(),
        };
        for key in &keys {
            if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                tracing::debug!(target: COMPONENT, proven = session.proof.keys.len(), "Proof build cancelled");
                return Err(Error::Cancelled);
            }
            session.prove(snapshot.root_node(), key)?;
        }

        tracing::debug!(
            target: COMPONENT,
            keys = keys.len(),
            openings = session.proof.openings.len(),
            root = %session.proof.root.short(),
            "Built multi-proof"
        );
        Ok(session.proof)
    }
}

/// State of one build: the proof so far and the node vectors already computed
struct Session<'e> {
    engine: &'e dyn CommitmentEngine,
    proof: MultiProof,
    vectors: HashMap<Vec<u8>, Vec<Scalar>>,
}

impl Session<'_> {
    fn prove(&mut self, root: &InternalNode, key: &Key) -> Result<()> {
        let stem = key.stem();
        let mut node = root;
        let mut path = Vec::new();

        loop {
            let index = stem[path.len()];
            let vector = self.internal_vector(&path, node);
            let commitment = self.commitment(&path)?;
            self.open(&path, Target::Node, index, commitment, &vector);
            path.push(index);

            match node.child(index) {
                Node::Empty => {
                    let stub = self.stub(path, None, Half::slot(key.suffix()));
                    self.proof.keys.insert(*key, KeyProof::StemAbsent(stub));
                    return Ok(());
                }
                Node::Hashed(_) => {
                    return Err(Error::ProofConstruction {
                        key: key.to_hex(),
                        reason: format!("subtree at path [{}] is not resident", hex::encode(&path)),
                    });
                }
                Node::Internal(child) => {
                    let vector = self.internal_vector(&path, child);
                    let commitment = child
                        .clean_commitment()
                        .unwrap_or_else(|| self.engine.commit(&vector));
                    self.proof.commitments.insert(path.clone(), commitment);
                    node = child.as_ref();
                }
                Node::Leaf(leaf) => {
                    self.prove_leaf(leaf, &stem, key, path);
                    return Ok(());
                }
            }
        }
    }

    fn prove_leaf(&mut self, leaf: &LeafNode, stem: &Stem, key: &Key, path: Vec<u8>) {
        let engine = self.engine;
        let commitments = leaf.compute(engine);
        let vector = leaf_vector(engine, leaf.stem(), &commitments.c1, &commitments.c2);
        self.proof.commitments.insert(path.clone(), commitments.commitment);
        self.open(&path, Target::Node, 0, commitments.commitment, &vector);
        self.open(&path, Target::Node, 1, commitments.commitment, &vector);

        let suffix = key.suffix();
        let slot = Half::slot(suffix);
        if leaf.stem() != stem {
            let stub = self.stub(path, Some(*leaf.stem()), slot);
            self.proof.keys.insert(*key, KeyProof::StemAbsent(stub));
            return;
        }

        let half = Half::of(suffix);
        let half_commitment = match half {
            Half::Lower => commitments.c1,
            Half::Upper => commitments.c2,
        };
        self.open(&path, Target::Node, half.leaf_index(), commitments.commitment, &vector);
        let half_vector = leaf.half_vector(half);
        self.open(&path, Target::half(half), slot, half_commitment, &half_vector);
        self.open(&path, Target::half(half), slot + 1, half_commitment, &half_vector);

        let proof = match leaf.get(suffix) {
            Some(value) => KeyProof::Present {
                leaf_path: path,
                value: *value,
            },
            None => KeyProof::Absent { leaf_path: path },
        };
        self.proof.keys.insert(*key, proof);
    }

    fn stub(&mut self, path: Vec<u8>, other_stem: Option<Stem>, slot: u8) -> AbsenceStub {
        let zero = self.engine.commit(&[]);
        self.open(&path, Target::StubLower, slot, zero, &[]);
        self.open(&path, Target::StubUpper, slot, zero, &[]);
        AbsenceStub {
            path,
            other_stem,
            c1: zero,
            c2: zero,
        }
    }

    fn internal_vector(&mut self, path: &[u8], node: &InternalNode) -> Vec<Scalar> {
        let engine = self.engine;
        self.vectors
            .entry(path.to_vec())
            .or_insert_with(|| node.vector(engine))
            .clone()
    }

    fn commitment(&self, path: &[u8]) -> Result<Point> {
        self.proof
            .commitments
            .get(path)
            .copied()
            .ok_or_else(|| Error::invariant(format!("no commitment recorded for path [{}]", hex::encode(path))))
    }

    /// Record an opening unless the proof already has it
    fn open(&mut self, path: &[u8], target: Target, index: u8, commitment: Point, vector: &[Scalar]) {
        let key = OpeningKey {
            path: path.to_vec(),
            target,
            index,
        };
        if self.proof.openings.contains_key(&key) {
            return;
        }
        let value = vector.get(index as usize).copied().unwrap_or(Scalar::ZERO);
        let proof = self.engine.open(vector, index);
        self.proof.openings.insert(
            key,
            Opening {
                commitment,
                value,
                proof,
            },
        );
    }
}
