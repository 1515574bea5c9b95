//! Multi-proof structure and checking

use crate::commit::{CommitmentEngine, OpeningProof};
use crate::model::{Key, Point, Scalar, Stem, Value};
use crate::trie::{stem_scalar, value_scalars, Half};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which commitment of the node at a path an opening refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Target {
    /// The node's own commitment (internal node or leaf)
    Node,
    /// A leaf's `c1`
    Lower,
    /// A leaf's `c2`
    Upper,
    /// `c1` of an absence stub
    StubLower,
    /// `c2` of an absence stub
    StubUpper,
}

impl Target {
    pub(crate) fn half(half: Half) -> Target {
        match half {
            Half::Lower => Target::Lower,
            Half::Upper => Target::Upper,
        }
    }
}

/// Identifies one opening inside a multi-proof
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OpeningKey {
    pub path: Vec<u8>,
    pub target: Target,
    pub index: u8,
}

/// A commitment opened at one index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    pub commitment: Point,
    pub value: Scalar,
    pub proof: OpeningProof,
}

/// Stand-in for a leaf that does not exist
///
/// `c1` and `c2` commit to the zero vector and are opened to zero at the
/// key's slot, pinning down that neither values nor extension data hide
/// behind the missing stem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceStub {
    /// Path of the slot where a leaf for the stem would live
    pub path: Vec<u8>,
    /// Stem of a different leaf occupying that slot, if any
    pub other_stem: Option<Stem>,
    pub c1: Point,
    pub c2: Point,
}

/// What a multi-proof establishes about one key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyProof {
    /// The key's leaf holds `value`
    Present { leaf_path: Vec<u8>, value: Value },
    /// The key's leaf exists but the slot is empty
    Absent { leaf_path: Vec<u8> },
    /// No leaf exists for the key's stem
    StemAbsent(AbsenceStub),
}

impl KeyProof {
    pub fn value(&self) -> Option<&Value> {
        match self {
            KeyProof::Present { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Proof of presence or absence for a set of keys against one root
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiProof {
    pub root: Point,
    /// Commitment of every node on the proven paths, by path
    pub commitments: BTreeMap<Vec<u8>, Point>,
    pub openings: BTreeMap<OpeningKey, Opening>,
    pub keys: BTreeMap<Key, KeyProof>,
}

impl MultiProof {
    pub(crate) fn new(root: Point) -> Self {
        let mut commitments = BTreeMap::new();
        commitments.insert(Vec::new(), root);
        MultiProof {
            root,
            commitments,
            openings: BTreeMap::new(),
            keys: BTreeMap::new(),
        }
    }

    pub fn opening(&self, path: &[u8], target: Target, index: u8) -> Option<&Opening> {
        self.openings.get(&OpeningKey {
            path: path.to_vec(),
            target,
            index,
        })
    }

    fn opened(&self, path: &[u8], target: Target, index: u8) -> Option<&Scalar> {
        self.opening(path, target, index).map(|o| &o.value)
    }

    /// Check the proof against its root
    ///
    /// Every opening is verified by `engine`; this only checks that the
    /// openings chain from the root down to each key's claim.
    pub fn check(&self, engine: &dyn CommitmentEngine) -> bool {
        let root_path: &[u8] = &[];
        if self.commitments.get(root_path) != Some(&self.root) {
            return false;
        }
        for (key, opening) in &self.openings {
            if key.target == Target::Node && self.commitments.get(&key.path) != Some(&opening.commitment) {
                return false;
            }
            if !engine.verify(&opening.commitment, key.index, &opening.value, &opening.proof) {
                return false;
            }
        }
        self.keys
            .iter()
            .all(|(key, proof)| self.check_key(engine, key, proof))
    }

    /// Each step along `path` opens the parent to the child's commitment
    fn check_path(&self, engine: &dyn CommitmentEngine, path: &[u8]) -> bool {
        (0..path.len()).all(|depth| {
            let (Some(value), Some(child)) = (
                self.opened(&path[..depth], Target::Node, path[depth]),
                self.commitments.get(&path[..=depth]),
            ) else {
                return false;
            };
            *value == engine.to_scalar(child)
        })
    }

    /// The leaf at `path` opens to `stem` at its metadata slots
    fn check_leaf_stem(&self, path: &[u8], stem: &Stem) -> bool {
        self.opened(path, Target::Node, 0) == Some(&Scalar::ONE)
            && self.opened(path, Target::Node, 1) == Some(&stem_scalar(stem))
    }

    fn check_key(&self, engine: &dyn CommitmentEngine, key: &Key, proof: &KeyProof) -> bool {
        let stem = key.stem();
        let suffix = key.suffix();
        let slot = Half::slot(suffix);

        match proof {
            KeyProof::Present { leaf_path, .. } | KeyProof::Absent { leaf_path } => {
                if leaf_path.is_empty()
                    || !stem.starts_with(leaf_path)
                    || !self.check_path(engine, leaf_path)
                    || !self.check_leaf_stem(leaf_path, &stem)
                {
                    return false;
                }
                let half = Half::of(suffix);
                let target = Target::half(half);
                let (Some(half_commitment), Some(low), Some(high)) = (
                    self.opened(leaf_path, Target::Node, half.leaf_index()),
                    self.opening(leaf_path, target, slot),
                    self.opening(leaf_path, target, slot + 1),
                ) else {
                    return false;
                };
                let expected = value_scalars(proof.value());
                low.commitment == high.commitment
                    && *half_commitment == engine.to_scalar(&low.commitment)
                    && (low.value, high.value) == expected
            }
            KeyProof::StemAbsent(stub) => {
                let Some((&last, parent)) = stub.path.split_last() else {
                    return false;
                };
                if !stem.starts_with(&stub.path) {
                    return false;
                }
                let slot_ok = match &stub.other_stem {
                    None => {
                        self.check_path(engine, parent)
                            && self.opened(parent, Target::Node, last) == Some(&Scalar::ZERO)
                    }
                    Some(other) => {
                        *other != stem
                            && other.starts_with(&stub.path)
                            && self.check_path(engine, &stub.path)
                            && self.check_leaf_stem(&stub.path, other)
                    }
                };
                let zero = engine.commit(&[]);
                let stub_opens_zero = |target: Target, commitment: &Point| {
                    self.opening(&stub.path, target, slot)
                        .is_some_and(|o| o.commitment == *commitment && o.value.is_zero())
                };
                slot_ok
                    && stub.c1 == zero
                    && stub.c2 == zero
                    && stub_opens_zero(Target::StubLower, &stub.c1)
                    && stub_opens_zero(Target::StubUpper, &stub.c2)
            }
        }
    }
}
