//! Verkle trie implementation

use super::batch::Batch;
use super::node::{InternalNode, LeafNode, Node};
use super::resolver::NodeResolver;
use crate::commit::CommitmentEngine;
use crate::model::{Key, Point, Stem, Value};
use crate::store::NodeStore;
use crate::{Error, Result, TrieConfig, COMPONENT, STEM_SIZE};
use std::sync::Arc;

/// A verkle trie over 32-byte keys and values
///
/// The root is always an internal node at depth 0. Subtrees that are not
/// resident are represented by [`Node::Hashed`] placeholders and fetched
/// through the injected [`NodeStore`] when a walk reaches them.
///
/// Mutations take `&mut self`, so writers are serialised by the borrow
/// checker; readers (`get`, proof building) only need `&self` and may run
/// concurrently on a quiescent trie or on a [`snapshot`](Self::snapshot).
#[derive(Clone)]
pub struct VerkleTrie {
    root: Arc<InternalNode>,
    engine: Arc<dyn CommitmentEngine>,
    resolver: Arc<NodeResolver>,
}

impl VerkleTrie {
    /// Create a new empty trie
    pub fn new(
        engine: Arc<dyn CommitmentEngine>,
        store: Arc<dyn NodeStore>,
        config: TrieConfig,
    ) -> Self {
        VerkleTrie {
            root: Arc::new(InternalNode::new(0)),
            resolver: Arc::new(NodeResolver::new(store, engine.clone(), config)),
            engine,
        }
    }

    /// Load a trie from a root commitment
    ///
    /// The root node is fetched from the store immediately; everything below
    /// it stays a placeholder until a walk needs it.
    pub fn open(
        engine: Arc<dyn CommitmentEngine>,
        store: Arc<dyn NodeStore>,
        config: TrieConfig,
        root: Point,
    ) -> Result<Self> {
        let resolver = Arc::new(NodeResolver::new(store, engine.clone(), config));
        let root = match resolver.resolve_owned(&[], &root)? {
            Node::Internal(node) => node,
            _ => return Err(Error::resolution(&[], "root is not an internal node")),
        };
        Ok(VerkleTrie {
            root,
            engine,
            resolver,
        })
    }

    pub fn engine(&self) -> &dyn CommitmentEngine {
        self.engine.as_ref()
    }

    pub(crate) fn root_node(&self) -> &InternalNode {
        &self.root
    }

    /// Insert or overwrite a value
    ///
    /// Both `key` and `value` must be exactly 32 bytes. Placeholders on the
    /// path are resolved before anything is modified, so a failed resolution
    /// leaves the trie unchanged.
    pub fn insert(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        let key = Key::from_slice(key.as_ref())?;
        let value = Value::from_slice(value.as_ref())?;
        tracing::trace!(target: COMPONENT, %key, "Insert");
        Arc::make_mut(&mut self.root).insert(&key, value, &self.resolver)
    }

    /// Get a value by key
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Value>> {
        let key = Key::from_slice(key.as_ref())?;
        Ok(self
            .get_leaf(&key.stem())?
            .and_then(|leaf| leaf.get(key.suffix()).copied()))
    }

    /// Find the leaf holding a stem, resolving placeholders on the way
    pub fn get_leaf(&self, stem: &Stem) -> Result<Option<Arc<LeafNode>>> {
        let mut current = self.root.child(stem[0]).clone();
        let mut path_len = 1;
        loop {
            match current {
                Node::Empty => return Ok(None),
                Node::Leaf(leaf) => {
                    return Ok(if leaf.stem() == stem { Some(leaf) } else { None });
                }
                Node::Hashed(point) => {
                    current = self.resolver.resolve_shared(stem.path(path_len), &point)?;
                }
                Node::Internal(node) => {
                    if path_len >= STEM_SIZE || node.depth() as usize != path_len {
                        return Err(Error::invariant(format!(
                            "internal node at depth {} found at path length {path_len}",
                            node.depth()
                        )));
                    }
                    current = node.child(stem[path_len]).clone();
                    path_len += 1;
                }
            }
        }
    }

    /// Remove a value, returning whether it existed
    ///
    /// Leaves left without values are removed and internal nodes left empty
    /// collapse; an internal node left with a single leaf is replaced by
    /// that leaf, so the root does not depend on the order of writes.
    pub fn delete(&mut self, key: impl AsRef<[u8]>) -> Result<bool> {
        let key = Key::from_slice(key.as_ref())?;
        tracing::trace!(target: COMPONENT, %key, "Delete");

        // Collapsing may resolve siblings after the value is gone, so work on
        // a copy-on-write overlay and publish it only on success
        let mut root = Arc::clone(&self.root);
        let removed = Arc::make_mut(&mut root).delete(&key, &self.resolver)?;
        if removed {
            self.root = root;
        }
        Ok(removed)
    }

    /// Whether any commitment is out of date
    pub fn is_dirty(&self) -> bool {
        self.root.is_dirty()
    }

    /// Recompute every dirty commitment and return the root commitment
    pub fn commit(&mut self) -> Point {
        if let Some(point) = self.root.clean_commitment() {
            return point;
        }
        let root = Arc::make_mut(&mut self.root).commit(self.engine.as_ref());
        tracing::debug!(target: COMPONENT, root = %root.short(), "Committed trie");
        root
    }

    /// The root commitment, computed without caching if the trie is dirty
    pub fn root_commitment(&self) -> Point {
        self.root.compute_commitment(self.engine.as_ref())
    }

    /// Commit, then hand every resident node to `sink` as `(path, bytes)`
    ///
    /// The bytes decode as a [`StoredNode`](crate::StoredNode). Placeholders
    /// are skipped: their nodes are already in the store.
    pub fn flush<F>(&mut self, mut sink: F) -> Result<Point>
    where
        F: FnMut(&[u8], Vec<u8>),
    {
        let root = self.commit();
        let mut path = Vec::with_capacity(STEM_SIZE);
        let count = flush_node(&Node::Internal(self.root.clone()), &mut path, &mut sink)?;
        tracing::debug!(target: COMPONENT, nodes = count, root = %root.short(), "Flushed trie");
        Ok(root)
    }

    /// Replace the resident subtree at `path` with a placeholder
    ///
    /// The subtree must already be in the store (see [`flush`](Self::flush))
    /// for later walks to resolve it. Returns `false` if nothing resident
    /// lives at `path`. The root cannot be evicted.
    pub fn evict(&mut self, path: &[u8]) -> Result<bool> {
        let Some((&last, parents)) = path.split_last() else {
            return Ok(false);
        };
        if path.len() > STEM_SIZE {
            return Ok(false);
        }
        self.commit();

        let mut node = Arc::make_mut(&mut self.root);
        for &index in parents {
            match node.child_mut(index) {
                Node::Internal(child) => node = Arc::make_mut(child),
                _ => return Ok(false),
            }
        }

        let point = match node.child(last) {
            Node::Internal(_) | Node::Leaf(_) => node.child(last).cached_commitment(),
            Node::Empty | Node::Hashed(_) => None,
        };
        let Some(point) = point else {
            return Ok(false);
        };
        node.replace_child(last, Node::Hashed(point));
        tracing::debug!(target: COMPONENT, path = %hex::encode(path), "Evicted subtree");
        Ok(true)
    }

    /// Resolve every placeholder on the paths of `keys`
    pub fn prefetch<K: AsRef<[u8]>>(&mut self, keys: impl IntoIterator<Item = K>) -> Result<()> {
        for key in keys {
            let key = Key::from_slice(key.as_ref())?;
            Arc::make_mut(&mut self.root).resolve_path(&key.stem(), &self.resolver)?;
        }
        Ok(())
    }

    /// A copy-on-write snapshot
    ///
    /// Nodes are shared until either trie writes to them.
    pub fn snapshot(&self) -> VerkleTrie {
        self.clone()
    }

    /// Apply a batch of staged writes and return the new root commitment
    ///
    /// The writes go to a copy-on-write overlay of the trie that replaces it
    /// only once every write succeeded, so a resolution failure leaves the
    /// trie unchanged.
    pub fn apply(&mut self, batch: Batch) -> Result<Point> {
        let ops = batch.into_ops();
        let mut overlay = Arc::clone(&self.root);
        let root = Arc::make_mut(&mut overlay);
        for (key, op) in &ops {
            match op {
                Some(value) => root.insert(key, *value, &self.resolver)?,
                None => {
                    root.delete(key, &self.resolver)?;
                }
            }
        }
        self.root = overlay;
        tracing::debug!(target: COMPONENT, ops = ops.len(), "Applied batch");
        Ok(self.commit())
    }
}

fn flush_node(
    node: &Node,
    path: &mut Vec<u8>,
    sink: &mut dyn FnMut(&[u8], Vec<u8>),
) -> Result<usize> {
    let Some(stored) = node.to_stored()? else {
        return Ok(0);
    };
    sink(path.as_slice(), stored.encode()?);

    let mut count = 1;
    if let Node::Internal(inner) = node {
        for (index, child) in inner.children() {
            path.push(index);
            count += flush_node(child, path, sink)?;
            path.pop();
        }
    }
    Ok(count)
}

/// Build the internal node at `depth` separating an existing leaf from a new key
fn split_leaf(depth: u8, existing: Arc<LeafNode>, key: &Key, value: Value) -> Result<InternalNode> {
    let stem = key.stem();
    let d = depth as usize;
    if d >= STEM_SIZE {
        return Err(Error::invariant(format!(
            "stems {} and {} do not diverge",
            existing.stem().to_hex(),
            stem.to_hex()
        )));
    }

    let mut node = InternalNode::new(depth);
    let existing_index = existing.stem()[d];
    let new_index = stem[d];
    if existing_index == new_index {
        let child = split_leaf(depth + 1, existing, key, value)?;
        node.replace_child(new_index, Node::Internal(Arc::new(child)));
    } else {
        let mut existing = existing;
        Arc::make_mut(&mut existing).set_depth(depth + 1);
        node.replace_child(existing_index, Node::Leaf(existing));
        node.replace_child(
            new_index,
            Node::Leaf(Arc::new(LeafNode::with_value(stem, depth + 1, key.suffix(), value))),
        );
    }
    Ok(node)
}

impl InternalNode {
    fn resolve_child(&mut self, index: u8, stem: &Stem, resolver: &NodeResolver) -> Result<()> {
        if let Node::Hashed(point) = self.child(index) {
            let point = *point;
            let path = stem.path(self.depth() as usize + 1);
            let node = resolver.resolve_owned(path, &point)?;
            self.replace_child(index, node);
        }
        Ok(())
    }

    /// Resolve the only remaining child if it is a placeholder, so a lone
    /// leaf can be pulled up
    fn resolve_sole_child(&mut self, stem: &Stem, resolver: &NodeResolver) -> Result<()> {
        let index = {
            let mut occupied = self.children().map(|(index, _)| index);
            match (occupied.next(), occupied.next()) {
                (Some(index), None) => index,
                _ => return Ok(()),
            }
        };
        if let Node::Hashed(point) = self.child(index) {
            let point = *point;
            let mut path = stem.path(self.depth() as usize).to_vec();
            path.push(index);
            let node = resolver.resolve_owned(&path, &point)?;
            self.replace_child(index, node);
        }
        Ok(())
    }

    pub(crate) fn resolve_path(&mut self, stem: &Stem, resolver: &NodeResolver) -> Result<()> {
        let index = stem[self.depth() as usize];
        self.resolve_child(index, stem, resolver)?;
        if let Node::Internal(child) = self.child_mut(index) {
            Arc::make_mut(child).resolve_path(stem, resolver)?;
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, key: &Key, value: Value, resolver: &NodeResolver) -> Result<()> {
        let stem = key.stem();
        let depth = self.depth();
        let index = stem[depth as usize];
        self.resolve_child(index, &stem, resolver)?;
        let prior = self.child(index).clean_scalar(resolver.engine());

        let slot = self.child_mut(index);
        match slot {
            Node::Empty => {
                *slot = Node::Leaf(Arc::new(LeafNode::with_value(
                    stem,
                    depth + 1,
                    key.suffix(),
                    value,
                )));
            }
            Node::Leaf(leaf) if leaf.stem() == &stem => {
                Arc::make_mut(leaf).set(key.suffix(), value);
            }
            Node::Leaf(leaf) => {
                let existing = Arc::clone(leaf);
                let split = split_leaf(depth + 1, existing, key, value)?;
                tracing::debug!(
                    target: COMPONENT,
                    path = %hex::encode(stem.path(depth as usize + 1)),
                    "Split leaf into internal node"
                );
                *slot = Node::Internal(Arc::new(split));
            }
            Node::Internal(child) => Arc::make_mut(child).insert(key, value, resolver)?,
            Node::Hashed(_) => {
                return Err(Error::invariant("placeholder left on insert path"));
            }
        }

        self.mark_dirty(index, prior);
        Ok(())
    }

    pub(crate) fn delete(&mut self, key: &Key, resolver: &NodeResolver) -> Result<bool> {
        let stem = key.stem();
        let suffix = key.suffix();
        let depth = self.depth();
        let index = stem[depth as usize];
        self.resolve_child(index, &stem, resolver)?;
        let prior = self.child(index).clean_scalar(resolver.engine());

        let slot = self.child_mut(index);
        let removed = match slot {
            Node::Empty => false,
            Node::Leaf(leaf) if leaf.stem() != &stem || leaf.get(suffix).is_none() => false,
            Node::Leaf(leaf) => {
                Arc::make_mut(leaf).remove(suffix);
                if leaf.is_empty() {
                    *slot = Node::Empty;
                }
                true
            }
            Node::Internal(child) => {
                let child = Arc::make_mut(child);
                let removed = child.delete(key, resolver)?;
                if removed {
                    child.resolve_sole_child(&stem, resolver)?;
                    if child.is_empty() {
                        *slot = Node::Empty;
                    } else if let Some(mut leaf) = child.sole_leaf() {
                        Arc::make_mut(&mut leaf).set_depth(depth + 1);
                        *slot = Node::Leaf(leaf);
                        tracing::debug!(
                            target: COMPONENT,
                            path = %hex::encode(stem.path(depth as usize + 1)),
                            "Collapsed internal node into its only leaf"
                        );
                    }
                }
                removed
            }
            Node::Hashed(_) => {
                return Err(Error::invariant("placeholder left on delete path"));
            }
        };

        if removed {
            self.mark_dirty(index, prior);
        }
        Ok(removed)
    }
}
