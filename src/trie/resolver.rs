//! Materialisation of placeholder nodes from a node store

use super::node::Node;
use crate::commit::CommitmentEngine;
use crate::model::Point;
use crate::store::{NodeStore, StoredNode};
use crate::{Error, Result, TrieConfig, COMPONENT};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Turns placeholders into resident nodes
///
/// Nodes resolved for reading are kept in a path-indexed cache so repeated
/// reads through the same placeholder do not hit the store again. A cached
/// node is only reused while its commitment matches the placeholder being
/// resolved.
pub(crate) struct NodeResolver {
    store: Arc<dyn NodeStore>,
    engine: Arc<dyn CommitmentEngine>,
    config: TrieConfig,
    cache: RwLock<HashMap<Vec<u8>, Node>>,
}

impl NodeResolver {
    pub fn new(
        store: Arc<dyn NodeStore>,
        engine: Arc<dyn CommitmentEngine>,
        config: TrieConfig,
    ) -> Self {
        NodeResolver {
            store,
            engine,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &dyn CommitmentEngine {
        self.engine.as_ref()
    }

    /// Resolve a placeholder for a read, filling the cache
    pub fn resolve_shared(&self, path: &[u8], expected: &Point) -> Result<Node> {
        if let Some(node) = self.cache.read().get(path) {
            if node.cached_commitment().as_ref() == Some(expected) {
                tracing::trace!(target: COMPONENT, path = %hex::encode(path), "Resolution cache hit");
                return Ok(node.clone());
            }
        }

        let node = self.fetch(path, expected)?;
        let limit = self.config.resolution_cache_limit;
        if limit > 0 {
            let mut cache = self.cache.write();
            if cache.len() >= limit {
                cache.clear();
            }
            cache.insert(path.to_vec(), node.clone());
        }
        Ok(node)
    }

    /// Resolve a placeholder that is about to be spliced into the trie
    ///
    /// A cached copy is moved out of the cache so the trie holds the only
    /// reference and can mutate it without copying.
    pub fn resolve_owned(&self, path: &[u8], expected: &Point) -> Result<Node> {
        if let Some(node) = self.cache.write().remove(path) {
            if node.cached_commitment().as_ref() == Some(expected) {
                return Ok(node);
            }
        }
        self.fetch(path, expected)
    }

    /// Number of nodes currently cached
    #[cfg(test)]
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }

    #[cfg(test)]
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    fn fetch(&self, path: &[u8], expected: &Point) -> Result<Node> {
        let data = self
            .store
            .resolve(path)
            .map_err(|e| Error::resolution(path, e.to_string()))?;
        let stored = StoredNode::decode(&data)
            .map_err(|e| Error::resolution(path, format!("corrupt node data: {e}")))?;
        let mut node = Node::from_stored(stored, path)?;

        if !self.config.verify_resolved_nodes {
            if let Node::Internal(inner) = &mut node {
                // Trusted store: adopt the placeholder commitment as is
                Arc::make_mut(inner).assume_commitment(*expected);
            }
        }
        let actual = node
            .commit(self.engine())
            .ok_or_else(|| Error::resolution(path, "stored node has no commitment"))?;
        if actual != *expected {
            return Err(Error::resolution(
                path,
                format!(
                    "commitment mismatch: expected {}, found {}",
                    expected.short(),
                    actual.short()
                ),
            ));
        }

        tracing::debug!(
            target: COMPONENT,
            path = %hex::encode(path),
            commitment = %expected.short(),
            "Resolved node from store"
        );
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::Blake3Committer;
    use crate::model::{Stem, Value};
    use crate::store::MemoryNodeStore;

    fn leaf_bytes() -> Vec<u8> {
        StoredNode::Leaf {
            depth: 1,
            stem: Stem::from_bytes([9u8; 31]),
            values: vec![(4, Value::repeat_byte(4))],
        }
        .encode()
        .unwrap()
    }

    fn setup(config: TrieConfig) -> (Arc<MemoryNodeStore>, NodeResolver, Point) {
        let store = Arc::new(MemoryNodeStore::new());
        store.put(&[9], leaf_bytes());
        let engine: Arc<dyn CommitmentEngine> = Arc::new(Blake3Committer::new());
        let mut node = Node::from_stored(StoredNode::decode(&leaf_bytes()).unwrap(), &[9]).unwrap();
        let expected = node.commit(engine.as_ref()).unwrap();
        let resolver = NodeResolver::new(store.clone(), engine, config);
        (store, resolver, expected)
    }

    #[test]
    fn test_shared_resolution_is_cached() {
        let (store, resolver, expected) = setup(TrieConfig::default());

        let node = resolver.resolve_shared(&[9], &expected).unwrap();
        assert!(matches!(node, Node::Leaf(_)));
        assert_eq!(resolver.cached(), 1);

        store.remove(&[9]);
        assert!(resolver.resolve_shared(&[9], &expected).is_ok());
    }

    #[test]
    fn test_owned_resolution_takes_from_cache() {
        let (_store, resolver, expected) = setup(TrieConfig::default());
        resolver.resolve_shared(&[9], &expected).unwrap();
        resolver.resolve_owned(&[9], &expected).unwrap();
        assert_eq!(resolver.cached(), 0);
    }

    #[test]
    fn test_commitment_mismatch_rejected() {
        let (_store, resolver, _expected) = setup(TrieConfig::default());
        let wrong = Point::from_bytes([1u8; 32]);
        let err = resolver.resolve_shared(&[9], &wrong).unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        assert_eq!(resolver.cached(), 0);
    }

    #[test]
    fn test_missing_node_is_resolution_error() {
        let (_store, resolver, expected) = setup(TrieConfig::default());
        let err = resolver.resolve_shared(&[8], &expected).unwrap_err();
        assert!(matches!(err, Error::Resolution { ref path, .. } if path == "08"));
    }

    #[test]
    fn test_cache_disabled() {
        let config = TrieConfig {
            resolution_cache_limit: 0,
            ..TrieConfig::default()
        };
        let (_store, resolver, expected) = setup(config);
        resolver.resolve_shared(&[9], &expected).unwrap();
        assert_eq!(resolver.cached(), 0);
    }

    #[test]
    fn test_full_cache_is_cleared() {
        let config = TrieConfig {
            resolution_cache_limit: 1,
            ..TrieConfig::default()
        };
        let (store, resolver, expected) = setup(config);

        let other = StoredNode::Leaf {
            depth: 1,
            stem: Stem::from_bytes([8u8; 31]),
            values: vec![(0, Value::repeat_byte(8))],
        };
        let mut other_node = Node::from_stored(other.clone(), &[8]).unwrap();
        let other_expected = other_node.commit(resolver.engine()).unwrap();
        store.put(&[8], other.encode().unwrap());

        resolver.resolve_shared(&[9], &expected).unwrap();
        resolver.resolve_shared(&[8], &other_expected).unwrap();
        assert_eq!(resolver.cached(), 1);

        // [9] was dropped from the cache, so it must come from the store again
        store.remove(&[9]);
        assert!(matches!(
            resolver.resolve_shared(&[9], &expected),
            Err(Error::Resolution { .. })
        ));
        assert!(resolver.resolve_shared(&[8], &other_expected).is_ok());
    }

    #[test]
    fn test_corrupt_data_rejected() {
        let (store, resolver, expected) = setup(TrieConfig::default());
        store.put(&[9], vec![0xde, 0xad]);
        resolver.clear_cache();
        let err = resolver.resolve_shared(&[9], &expected).unwrap_err();
        assert!(err.to_string().contains("corrupt node data"));
    }
}
