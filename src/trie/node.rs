//! Trie node types and their commitments
//!
//! Commitments are cached in the node that owns them. Mutations only flag a
//! node dirty and record, in a per-node pending overlay, what each changed
//! slot contributed at the last commitment; [`InternalNode::commit`] and
//! [`LeafNode::commit`] fold the overlay into a fresh commitment and clear it.

use crate::commit::CommitmentEngine;
use crate::model::{Point, Scalar, Stem, Suffix, Value};
use crate::store::StoredNode;
use crate::{Error, Result, NODE_WIDTH, STEM_SIZE};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Number of values committed by each half of a leaf
const HALF_WIDTH: usize = NODE_WIDTH / 2;

/// A node in the verkle trie
///
/// Children are shared through `Arc` so cloning a subtree is cheap; the first
/// write to a shared node copies it.
#[derive(Clone, Debug, Default)]
pub enum Node {
    /// Nothing stored under this slot
    #[default]
    Empty,
    /// A subtree that is not resident in memory, known only by its commitment
    Hashed(Point),
    Internal(Arc<InternalNode>),
    Leaf(Arc<LeafNode>),
}

impl Node {
    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    /// The node's commitment if it is known without recomputation
    pub fn cached_commitment(&self) -> Option<Point> {
        match self {
            Node::Empty => None,
            Node::Hashed(point) => Some(*point),
            Node::Internal(node) => node.clean_commitment(),
            Node::Leaf(leaf) => leaf.clean_commitment(),
        }
    }

    /// Bring the commitment up to date, caching it in the node
    ///
    /// Returns `None` for an empty slot.
    pub fn commit(&mut self, engine: &dyn CommitmentEngine) -> Option<Point> {
        if let Some(point) = self.cached_commitment() {
            return Some(point);
        }
        match self {
            Node::Empty => None,
            Node::Hashed(point) => Some(*point),
            Node::Internal(node) => Some(Arc::make_mut(node).commit(engine)),
            Node::Leaf(leaf) => Some(Arc::make_mut(leaf).commit(engine)),
        }
    }

    /// Compute the commitment without touching any cache
    pub fn compute_commitment(&self, engine: &dyn CommitmentEngine) -> Option<Point> {
        match self {
            Node::Empty => None,
            Node::Hashed(point) => Some(*point),
            Node::Internal(node) => Some(node.compute_commitment(engine)),
            Node::Leaf(leaf) => Some(leaf.compute(engine).commitment),
        }
    }

    /// The scalar this node contributes to its parent, if known without recomputation
    pub(crate) fn clean_scalar(&self, engine: &dyn CommitmentEngine) -> Option<Scalar> {
        match self {
            Node::Empty => Some(Scalar::ZERO),
            _ => self
                .cached_commitment()
                .map(|point| engine.to_scalar(&point)),
        }
    }

    /// Materialise a node received from the store at `path`
    pub(crate) fn from_stored(stored: StoredNode, path: &[u8]) -> Result<Node> {
        if stored.depth() as usize != path.len() {
            return Err(Error::resolution(
                path,
                format!("stored node has depth {}", stored.depth()),
            ));
        }
        match stored {
            StoredNode::Internal { depth, children } => {
                if path.len() >= STEM_SIZE {
                    return Err(Error::resolution(
                        path,
                        format!("internal node has depth {depth}"),
                    ));
                }
                let mut node = InternalNode::new(depth);
                for (index, point) in children {
                    node.children[index as usize] = Node::Hashed(point);
                }
                Ok(Node::Internal(Arc::new(node)))
            }
            StoredNode::Leaf {
                depth,
                stem,
                values,
            } => {
                if !stem.starts_with(path) {
                    return Err(Error::resolution(
                        path,
                        format!("leaf for stem {} does not belong here", stem.to_hex()),
                    ));
                }
                let mut leaf = LeafNode::new(stem, depth);
                for (suffix, value) in values {
                    leaf.values[suffix as usize] = Some(value);
                }
                if leaf.is_empty() {
                    return Err(Error::resolution(path, "stored leaf has no values"));
                }
                Ok(Node::Leaf(Arc::new(leaf)))
            }
        }
    }

    /// Serialized form of a resident, committed node
    pub(crate) fn to_stored(&self) -> Result<Option<StoredNode>> {
        match self {
            Node::Empty | Node::Hashed(_) => Ok(None),
            Node::Internal(node) => node.to_stored().map(Some),
            Node::Leaf(leaf) => Ok(Some(leaf.to_stored())),
        }
    }
}

/// An inner node fanning out over one byte of the stem
#[derive(Clone, Debug)]
pub struct InternalNode {
    depth: u8,
    children: Vec<Node>,
    commitment: Option<Point>,
    dirty: bool,
    /// slot -> scalar the slot contributed when `commitment` was computed
    pending: BTreeMap<u8, Scalar>,
}

impl InternalNode {
    /// Create an empty internal node matching stem byte `depth`
    pub fn new(depth: u8) -> Self {
        InternalNode {
            depth,
            children: vec![Node::Empty; NODE_WIDTH],
            commitment: None,
            dirty: true,
            pending: BTreeMap::new(),
        }
    }

    /// Index into the stem consumed by this node
    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child(&self, index: u8) -> &Node {
        &self.children[index as usize]
    }

    /// Iterate over non-empty children
    pub fn children(&self) -> impl Iterator<Item = (u8, &Node)> {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, child)| !child.is_empty())
            .map(|(i, child)| (i as u8, child))
    }

    pub(crate) fn child_mut(&mut self, index: u8) -> &mut Node {
        &mut self.children[index as usize]
    }

    /// Replace a child without touching commitments
    ///
    /// Only for swaps that keep the child's commitment: resolving or
    /// evicting a placeholder.
    pub(crate) fn replace_child(&mut self, index: u8, node: Node) {
        self.children[index as usize] = node;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Take `commitment` as this node's commitment without recomputing it
    pub(crate) fn assume_commitment(&mut self, commitment: Point) {
        self.commitment = Some(commitment);
        self.dirty = false;
        self.pending.clear();
    }

    pub fn clean_commitment(&self) -> Option<Point> {
        if self.dirty {
            None
        } else {
            self.commitment
        }
    }

    /// Whether every slot is empty
    pub fn is_empty(&self) -> bool {
        self.children.iter().all(Node::is_empty)
    }

    /// The only child, if the node has exactly one and it is a resident leaf
    pub(crate) fn sole_leaf(&self) -> Option<Arc<LeafNode>> {
        let mut occupied = self.children.iter().filter(|child| !child.is_empty());
        match (occupied.next(), occupied.next()) {
            (Some(Node::Leaf(leaf)), None) => Some(Arc::clone(leaf)),
            _ => None,
        }
    }

    /// Flag slot `index` as changed
    ///
    /// `prior` is the scalar the slot contributed before the change, when it
    /// was known; without it the next commit recomputes from scratch.
    pub(crate) fn mark_dirty(&mut self, index: u8, prior: Option<Scalar>) {
        if self.commitment.is_some() && !self.pending.contains_key(&index) {
            match prior {
                Some(scalar) => {
                    self.pending.insert(index, scalar);
                }
                None => {
                    self.commitment = None;
                    self.pending.clear();
                }
            }
        }
        self.dirty = true;
    }

    /// Recompute this node's commitment and every dirty descendant's
    pub fn commit(&mut self, engine: &dyn CommitmentEngine) -> Point {
        if let Some(point) = self.clean_commitment() {
            return point;
        }

        let vector: Vec<Scalar> = self
            .children
            .iter_mut()
            .map(|child| match child.commit(engine) {
                Some(point) => engine.to_scalar(&point),
                None => Scalar::ZERO,
            })
            .collect();

        let commitment = match self.commitment {
            Some(old) if !self.pending.is_empty() => {
                let changes: Vec<(u8, Scalar, Scalar)> = self
                    .pending
                    .iter()
                    .map(|(&index, &prior)| (index, prior, vector[index as usize]))
                    .collect();
                engine.update(&old, &vector, &changes)
            }
            _ => engine.commit(&vector),
        };

        self.commitment = Some(commitment);
        self.dirty = false;
        self.pending.clear();
        commitment
    }

    /// Commitment computed from the current children without caching
    pub fn compute_commitment(&self, engine: &dyn CommitmentEngine) -> Point {
        match self.clean_commitment() {
            Some(point) => point,
            None => engine.commit(&self.vector(engine)),
        }
    }

    /// The 256-wide vector this node commits to
    pub(crate) fn vector(&self, engine: &dyn CommitmentEngine) -> Vec<Scalar> {
        self.children
            .iter()
            .map(|child| match child.compute_commitment(engine) {
                Some(point) => engine.to_scalar(&point),
                None => Scalar::ZERO,
            })
            .collect()
    }

    fn to_stored(&self) -> Result<StoredNode> {
        let children = self
            .children()
            .map(|(index, child)| {
                child.cached_commitment().map(|point| (index, point)).ok_or_else(|| {
                    Error::invariant(format!(
                        "child {index} of internal node at depth {} is not committed",
                        self.depth
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(StoredNode::Internal {
            depth: self.depth,
            children,
        })
    }
}

/// One of the two value halves of a leaf
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Half {
    /// Suffixes 0..=127, committed by `c1`
    Lower,
    /// Suffixes 128..=255, committed by `c2`
    Upper,
}

impl Half {
    pub fn of(suffix: Suffix) -> Half {
        if (suffix as usize) < HALF_WIDTH {
            Half::Lower
        } else {
            Half::Upper
        }
    }

    /// Slot of the half's commitment within the leaf commitment vector
    pub fn leaf_index(self) -> u8 {
        match self {
            Half::Lower => 2,
            Half::Upper => 3,
        }
    }

    /// First of the two slots a suffix occupies within its half's vector
    pub fn slot(suffix: Suffix) -> u8 {
        ((suffix as usize % HALF_WIDTH) * 2) as u8
    }

    fn suffixes(self) -> std::ops::Range<usize> {
        match self {
            Half::Lower => 0..HALF_WIDTH,
            Half::Upper => HALF_WIDTH..NODE_WIDTH,
        }
    }
}

/// Low and high scalars encoding an optional value
///
/// The low scalar carries a 2^128 marker so a stored all-zero value does not
/// commit like an absent one.
pub fn value_scalars(value: Option<&Value>) -> (Scalar, Scalar) {
    match value {
        None => (Scalar::ZERO, Scalar::ZERO),
        Some(value) => {
            let bytes = value.as_bytes();
            let mut low = [0u8; 32];
            low[..16].copy_from_slice(&bytes[..16]);
            low[16] = 1;
            (Scalar::from_bytes(low), Scalar::from_le_slice(&bytes[16..]))
        }
    }
}

/// Scalar encoding of a stem
pub fn stem_scalar(stem: &Stem) -> Scalar {
    Scalar::from_le_slice(stem.as_bytes())
}

/// The vector a leaf commitment is computed over: `[1, stem, c1, c2]`
pub fn leaf_vector(engine: &dyn CommitmentEngine, stem: &Stem, c1: &Point, c2: &Point) -> Vec<Scalar> {
    vec![
        Scalar::ONE,
        stem_scalar(stem),
        engine.to_scalar(c1),
        engine.to_scalar(c2),
    ]
}

/// The commitments of a leaf
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafCommitments {
    pub c1: Point,
    pub c2: Point,
    pub commitment: Point,
}

/// A terminal node holding the values of one stem
#[derive(Clone, Debug)]
pub struct LeafNode {
    stem: Stem,
    depth: u8,
    values: Vec<Option<Value>>,
    c1: Option<Point>,
    c2: Option<Point>,
    commitment: Option<Point>,
    dirty_lower: bool,
    dirty_upper: bool,
    /// suffix -> value held when the half commitments were last computed
    pending: BTreeMap<u8, Option<Value>>,
}

impl LeafNode {
    /// Create a leaf with no values at trie depth `depth`
    pub fn new(stem: Stem, depth: u8) -> Self {
        LeafNode {
            stem,
            depth,
            values: vec![None; NODE_WIDTH],
            c1: None,
            c2: None,
            commitment: None,
            dirty_lower: true,
            dirty_upper: true,
            pending: BTreeMap::new(),
        }
    }

    pub fn stem(&self) -> &Stem {
        &self.stem
    }

    /// Create a leaf holding a single value
    pub fn with_value(stem: Stem, depth: u8, suffix: Suffix, value: Value) -> Self {
        let mut leaf = LeafNode::new(stem, depth);
        leaf.set(suffix, value);
        leaf
    }

    /// Length of the trie path leading to this leaf
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Leaf commitments do not cover depth, so moving a leaf keeps them valid
    pub(crate) fn set_depth(&mut self, depth: u8) {
        self.depth = depth;
    }

    pub fn get(&self, suffix: Suffix) -> Option<&Value> {
        self.values[suffix as usize].as_ref()
    }

    /// Iterate over occupied slots
    pub fn values(&self) -> impl Iterator<Item = (Suffix, &Value)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, value)| value.as_ref().map(|v| (i as Suffix, v)))
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Store a value, returning the previous one
    ///
    /// Always dirties the leaf, even when the value is unchanged.
    pub fn set(&mut self, suffix: Suffix, value: Value) -> Option<Value> {
        self.mark_dirty(suffix);
        self.values[suffix as usize].replace(value)
    }

    /// Clear a slot, returning its value
    pub fn remove(&mut self, suffix: Suffix) -> Option<Value> {
        if self.values[suffix as usize].is_none() {
            return None;
        }
        self.mark_dirty(suffix);
        self.values[suffix as usize].take()
    }

    fn mark_dirty(&mut self, suffix: Suffix) {
        let prior = self.values[suffix as usize];
        self.pending.entry(suffix).or_insert(prior);
        match Half::of(suffix) {
            Half::Lower => self.dirty_lower = true,
            Half::Upper => self.dirty_upper = true,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_lower || self.dirty_upper
    }

    pub fn clean_commitment(&self) -> Option<Point> {
        if self.is_dirty() {
            None
        } else {
            self.commitment
        }
    }

    /// The cached half commitments, once the leaf has been committed
    pub fn cached_halves(&self) -> Option<(Point, Point)> {
        if self.is_dirty() {
            return None;
        }
        self.c1.zip(self.c2)
    }

    /// The 256-wide vector committed by one half
    pub fn half_vector(&self, half: Half) -> Vec<Scalar> {
        let mut vector = Vec::with_capacity(NODE_WIDTH);
        for value in &self.values[half.suffixes()] {
            let (low, high) = value_scalars(value.as_ref());
            vector.push(low);
            vector.push(high);
        }
        vector
    }

    fn commit_half(&mut self, half: Half, engine: &dyn CommitmentEngine) -> Point {
        let (cached, dirty) = match half {
            Half::Lower => (self.c1, self.dirty_lower),
            Half::Upper => (self.c2, self.dirty_upper),
        };
        if let (Some(point), false) = (cached, dirty) {
            return point;
        }

        let vector = self.half_vector(half);
        let Some(old) = cached else {
            return engine.commit(&vector);
        };

        let mut changes = Vec::new();
        for (&suffix, prior) in &self.pending {
            if Half::of(suffix) != half {
                continue;
            }
            let slot = Half::slot(suffix);
            let (old_low, old_high) = value_scalars(prior.as_ref());
            changes.push((slot, old_low, vector[slot as usize]));
            changes.push((slot + 1, old_high, vector[slot as usize + 1]));
        }
        if changes.is_empty() {
            engine.commit(&vector)
        } else {
            engine.update(&old, &vector, &changes)
        }
    }

    /// Recompute dirty half commitments and the leaf commitment
    pub fn commit(&mut self, engine: &dyn CommitmentEngine) -> Point {
        if let Some(point) = self.clean_commitment() {
            return point;
        }

        let c1 = self.commit_half(Half::Lower, engine);
        let c2 = self.commit_half(Half::Upper, engine);
        let commitment = engine.commit(&leaf_vector(engine, &self.stem, &c1, &c2));

        self.c1 = Some(c1);
        self.c2 = Some(c2);
        self.commitment = Some(commitment);
        self.dirty_lower = false;
        self.dirty_upper = false;
        self.pending.clear();
        commitment
    }

    /// All commitments of this leaf, computed without caching
    pub fn compute(&self, engine: &dyn CommitmentEngine) -> LeafCommitments {
        if let (Some((c1, c2)), Some(commitment)) = (self.cached_halves(), self.clean_commitment()) {
            return LeafCommitments { c1, c2, commitment };
        }
        let c1 = match (self.c1, self.dirty_lower) {
            (Some(point), false) => point,
            _ => engine.commit(&self.half_vector(Half::Lower)),
        };
        let c2 = match (self.c2, self.dirty_upper) {
            (Some(point), false) => point,
            _ => engine.commit(&self.half_vector(Half::Upper)),
        };
        let commitment = engine.commit(&leaf_vector(engine, &self.stem, &c1, &c2));
        LeafCommitments { c1, c2, commitment }
    }

    fn to_stored(&self) -> StoredNode {
        StoredNode::Leaf {
            depth: self.depth,
            stem: self.stem,
            values: self.values().map(|(suffix, value)| (suffix, *value)).collect(),
        }
    }
}
