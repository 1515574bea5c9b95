//! Trie Integration Tests
//!
//! These tests exercise the public API end-to-end: mutation, commitments,
//! proofs, and lazy resolution of subtrees through a node store.
//!
//! Run with:
//! ```bash
//! cargo test --test trie_integration
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use verkle_trie::{
    Batch, Blake3Committer, CancelFlag, CommitmentEngine, Error, Key, KeyProof, MemoryNodeStore,
    NodeStore, Point, ProofBuilder, StoreError, TrieConfig, Value, VerkleTrie,
};

fn engine() -> Arc<dyn CommitmentEngine> {
    Arc::new(Blake3Committer::new())
}

fn new_trie() -> VerkleTrie {
    VerkleTrie::new(engine(), Arc::new(MemoryNodeStore::new()), TrieConfig::default())
}

/// Key with the given leading stem bytes and suffix, zeros elsewhere
fn key(prefix: &[u8], suffix: u8) -> [u8; 32] {
    let mut k = [0u8; 32];
    k[..prefix.len()].copy_from_slice(prefix);
    k[31] = suffix;
    k
}

/// A store whose reads can be switched off
struct FlakyStore {
    inner: MemoryNodeStore,
    failing: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        FlakyStore {
            inner: MemoryNodeStore::new(),
            failing: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl NodeStore for FlakyStore {
    fn resolve(&self, path: &[u8]) -> Result<Vec<u8>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        self.inner.resolve(path)
    }
}

/// Populate a trie, flush it into `store`, and reopen it from the root
fn persisted_trie(store: Arc<FlakyStore>, keys: &[[u8; 32]], config: TrieConfig) -> (VerkleTrie, Point) {
    let mut trie = new_trie();
    for (i, k) in keys.iter().enumerate() {
        trie.insert(k, [i as u8 + 1; 32]).unwrap();
    }
    let root = trie
        .flush(|path, bytes| store.inner.put(path, bytes))
        .unwrap();
    let reopened = VerkleTrie::open(engine(), store, config, root).unwrap();
    (reopened, root)
}

// ============================================================================
// Mutation Tests
// ============================================================================

#[test]
fn test_same_stem_shares_leaf() {
    let mut trie = new_trie();
    let a = key(&[], 0);
    let b = key(&[], 1);
    trie.insert(a, [1u8; 32]).unwrap();
    trie.insert(b, [2u8; 32]).unwrap();

    let stem = Key::from_bytes(a).stem();
    assert_eq!(stem, Key::from_bytes(b).stem());
    let leaf = trie.get_leaf(&stem).unwrap().unwrap();
    assert_eq!(leaf.len(), 2);
    assert_eq!(trie.get(a).unwrap(), Some(Value::repeat_byte(1)));
    assert_eq!(trie.get(b).unwrap(), Some(Value::repeat_byte(2)));

    assert!(trie.delete(a).unwrap());
    assert_eq!(trie.get(a).unwrap(), None);
    assert_eq!(trie.get(b).unwrap(), Some(Value::repeat_byte(2)));
    let leaf = trie.get_leaf(&stem).unwrap().unwrap();
    assert!(!leaf.is_empty());
}

#[test]
fn test_stems_differing_in_first_byte() {
    let mut trie = new_trie();
    let a = key(&[0x00], 0);
    let b = key(&[0x01], 0);
    trie.insert(a, [1u8; 32]).unwrap();
    trie.insert(b, [2u8; 32]).unwrap();

    assert_eq!(trie.get(a).unwrap(), Some(Value::repeat_byte(1)));
    assert_eq!(trie.get(b).unwrap(), Some(Value::repeat_byte(2)));

    let leaf_a = trie.get_leaf(&Key::from_bytes(a).stem()).unwrap().unwrap();
    let leaf_b = trie.get_leaf(&Key::from_bytes(b).stem()).unwrap().unwrap();
    assert!(!Arc::ptr_eq(&leaf_a, &leaf_b));
    assert_eq!(leaf_a.depth(), 1);
    assert_eq!(leaf_b.depth(), 1);
}

#[test]
fn test_round_trip_and_delete_all() {
    let mut trie = new_trie();
    let empty_root = trie.commit();

    let keys: Vec<[u8; 32]> = (0..64u8)
        .map(|i| key(&[i % 4, i % 3, i], i.wrapping_mul(37)))
        .collect();
    for k in &keys {
        trie.insert(k, [k[2]; 32]).unwrap();
    }
    for k in &keys {
        assert_eq!(trie.get(k).unwrap(), Some(Value::repeat_byte(k[2])));
    }
    assert_ne!(trie.commit(), empty_root);

    for k in &keys {
        assert!(trie.delete(k).unwrap());
        assert_eq!(trie.get(k).unwrap(), None);
    }
    assert_eq!(trie.commit(), empty_root);
}

#[test]
fn test_root_independent_of_history() {
    let keys = [
        key(&[1, 2, 3], 0),
        key(&[1, 2, 4], 9),
        key(&[1, 7], 200),
        key(&[5], 5),
    ];

    let mut forward = new_trie();
    for k in &keys {
        forward.insert(k, [7u8; 32]).unwrap();
    }

    let mut backward = new_trie();
    backward.insert(key(&[1, 2, 3, 4, 5], 1), [1u8; 32]).unwrap();
    for k in keys.iter().rev() {
        backward.insert(k, [7u8; 32]).unwrap();
    }
    backward.delete(key(&[1, 2, 3, 4, 5], 1)).unwrap();

    assert_eq!(forward.commit(), backward.commit());
}

// ============================================================================
// Commitment Tests
// ============================================================================

#[test]
fn test_commitment_sensitivity() {
    let mut trie = new_trie();
    let target = key(&[1, 0], 0);
    let sibling = key(&[2, 0], 0);
    trie.insert(target, [1u8; 32]).unwrap();
    trie.insert(key(&[1, 1], 0), [1u8; 32]).unwrap();
    trie.insert(sibling, [2u8; 32]).unwrap();
    let root = trie.commit();
    let before = ProofBuilder::new(&trie).build([target, sibling]).unwrap();

    trie.insert(target, [9u8; 32]).unwrap();
    let after_root = trie.commit();
    let after = ProofBuilder::new(&trie).build([target, sibling]).unwrap();

    assert_ne!(after_root, root);
    assert_ne!(before.commitments[&vec![1]], after.commitments[&vec![1]]);
    assert_ne!(before.commitments[&vec![1, 0]], after.commitments[&vec![1, 0]]);
    assert_eq!(before.commitments[&vec![2]], after.commitments[&vec![2]]);
}

#[test]
fn test_commit_idempotent() {
    let mut trie = new_trie();
    trie.insert(key(&[3], 3), [3u8; 32]).unwrap();
    let first = trie.commit();
    assert_eq!(trie.commit(), first);
    assert_eq!(trie.root_commitment(), first);
}

// ============================================================================
// Proof Tests
// ============================================================================

#[test]
fn test_proofs_for_present_and_absent_keys() {
    let mut trie = new_trie();
    let present = key(&[4, 4], 130);
    trie.insert(present, [4u8; 32]).unwrap();
    trie.insert(key(&[4, 5], 0), [5u8; 32]).unwrap();
    trie.insert(key(&[6], 6), [6u8; 32]).unwrap();
    trie.commit();

    let missing_slot = key(&[4, 4], 131);
    let missing_stem = key(&[9], 0);
    let proof = ProofBuilder::new(&trie)
        .build([present, missing_slot, missing_stem])
        .unwrap();

    assert!(proof.check(trie.engine()));
    assert_eq!(
        proof.keys[&Key::from_bytes(present)].value(),
        Some(&Value::repeat_byte(4))
    );
    assert!(matches!(
        proof.keys[&Key::from_bytes(missing_slot)],
        KeyProof::Absent { .. }
    ));
    assert!(matches!(
        proof.keys[&Key::from_bytes(missing_stem)],
        KeyProof::StemAbsent(_)
    ));
}

#[test]
fn test_proof_on_empty_trie() {
    let trie = new_trie();
    let proof = ProofBuilder::new(&trie).build([key(&[1], 1)]).unwrap();
    assert!(proof.check(trie.engine()));
    assert!(matches!(
        proof.keys.values().next(),
        Some(KeyProof::StemAbsent(stub)) if stub.path == vec![1] && stub.other_stem.is_none()
    ));
}

#[test]
fn test_proof_does_not_verify_with_other_value() {
    let mut trie = new_trie();
    let k = key(&[1], 1);
    trie.insert(k, [1u8; 32]).unwrap();
    trie.commit();

    let mut proof = ProofBuilder::new(&trie).build([k]).unwrap();
    if let Some(KeyProof::Present { value, .. }) = proof.keys.get_mut(&Key::from_bytes(k)) {
        *value = Value::repeat_byte(2);
    }
    assert!(!proof.check(trie.engine()));
}

#[test]
fn test_concurrent_proof_builds() {
    let mut trie = new_trie();
    let keys: Vec<[u8; 32]> = (0..32u8).map(|i| key(&[i, i / 2], i)).collect();
    for k in &keys {
        trie.insert(k, [k[0]; 32]).unwrap();
    }
    let root = trie.commit();
    let snapshot = trie.snapshot();

    std::thread::scope(|s| {
        let handles: Vec<_> = keys
            .chunks(8)
            .map(|chunk| {
                let snapshot = &snapshot;
                s.spawn(move || ProofBuilder::new(snapshot).build(chunk).unwrap())
            })
            .collect();
        for handle in handles {
            let proof = handle.join().unwrap();
            assert_eq!(proof.root, root);
            assert!(proof.check(snapshot.engine()));
        }
    });
}

#[test]
fn test_cancelled_proof_build() {
    let mut trie = new_trie();
    trie.insert(key(&[1], 0), [1u8; 32]).unwrap();

    let flag = CancelFlag::new();
    let builder = ProofBuilder::new(&trie).with_cancel(flag.clone());
    assert!(builder.build([key(&[1], 0)]).is_ok());

    flag.cancel();
    assert!(matches!(builder.build([key(&[1], 0)]), Err(Error::Cancelled)));
}

// ============================================================================
// Lazy Resolution Tests
// ============================================================================

#[test]
fn test_reopened_trie_resolves_lazily() {
    let store = Arc::new(FlakyStore::new());
    let keys = [key(&[1, 1], 0), key(&[1, 2], 0), key(&[2], 5)];
    let (mut trie, root) = persisted_trie(store.clone(), &keys, TrieConfig::default());

    assert_eq!(trie.commit(), root);
    assert_eq!(trie.get(keys[1]).unwrap(), Some(Value::repeat_byte(2)));
    assert_eq!(trie.get(key(&[1, 3], 0)).unwrap(), None);

    trie.insert(key(&[1, 3], 0), [9u8; 32]).unwrap();
    let mut fresh = new_trie();
    for (i, k) in keys.iter().enumerate() {
        fresh.insert(k, [i as u8 + 1; 32]).unwrap();
    }
    fresh.insert(key(&[1, 3], 0), [9u8; 32]).unwrap();
    assert_eq!(trie.commit(), fresh.commit());
}

#[test]
fn test_failed_resolution_leaves_trie_unchanged() {
    let store = Arc::new(FlakyStore::new());
    let keys = [key(&[1], 0), key(&[2], 0)];
    let (mut trie, root) = persisted_trie(store.clone(), &keys, TrieConfig::default());

    store.set_failing(true);
    assert!(matches!(
        trie.insert(key(&[1], 1), [5u8; 32]),
        Err(Error::Resolution { .. })
    ));
    assert!(matches!(trie.delete(key(&[2], 0)), Err(Error::Resolution { .. })));
    assert!(matches!(trie.get(key(&[1], 0)), Err(Error::Resolution { .. })));
    assert!(!trie.is_dirty());
    assert_eq!(trie.commit(), root);

    store.set_failing(false);
    assert_eq!(trie.get(key(&[1], 0)).unwrap(), Some(Value::repeat_byte(1)));
}

#[test]
fn test_missing_subtree_is_an_error() {
    let store = Arc::new(FlakyStore::new());
    let (trie, _root) = persisted_trie(store.clone(), &[key(&[7], 0)], TrieConfig::default());

    assert!(store.inner.remove(&[7]).is_some());
    assert!(!store.inner.contains(&[7]));
    assert!(matches!(
        trie.get(key(&[7], 0)),
        Err(Error::Resolution { ref path, .. }) if path == "07"
    ));
}

#[test]
fn test_proof_requires_resident_path() {
    let store = Arc::new(FlakyStore::new());
    let k = key(&[3, 3], 3);
    let (mut trie, root) = persisted_trie(store, &[k, key(&[3, 4], 0)], TrieConfig::default());

    assert!(matches!(
        ProofBuilder::new(&trie).build([k]),
        Err(Error::ProofConstruction { .. })
    ));

    trie.prefetch([k]).unwrap();
    let proof = ProofBuilder::new(&trie).build([k]).unwrap();
    assert_eq!(proof.root, root);
    assert!(proof.check(trie.engine()));
}

#[test]
fn test_evict_and_resolve_again() {
    let store = Arc::new(FlakyStore::new());
    let mut trie = VerkleTrie::new(engine(), store.clone(), TrieConfig::default());
    trie.insert(key(&[1, 1], 1), [1u8; 32]).unwrap();
    trie.insert(key(&[1, 2], 2), [2u8; 32]).unwrap();
    let root = trie.flush(|path, bytes| store.inner.put(path, bytes)).unwrap();
    assert!(store.inner.contains(&[]));
    assert!(store.inner.contains(&[1, 2]));

    assert!(trie.evict(&[1]).unwrap());
    assert_eq!(trie.root_commitment(), root);
    assert_eq!(trie.get(key(&[1, 2], 2)).unwrap(), Some(Value::repeat_byte(2)));

    // The remaining sibling is still a placeholder and gets pulled up
    assert!(trie.delete(key(&[1, 2], 2)).unwrap());
    assert_eq!(trie.get(key(&[1, 1], 1)).unwrap(), Some(Value::repeat_byte(1)));
    let leaf = trie.get_leaf(&Key::from_bytes(key(&[1, 1], 1)).stem()).unwrap().unwrap();
    assert_eq!(leaf.depth(), 1);

    let mut fresh = new_trie();
    fresh.insert(key(&[1, 1], 1), [1u8; 32]).unwrap();
    assert_eq!(trie.commit(), fresh.commit());
}

#[test]
fn test_trusted_store_skips_internal_verification() {
    let store = Arc::new(FlakyStore::new());
    let config = TrieConfig {
        verify_resolved_nodes: false,
        ..TrieConfig::default()
    };
    let keys = [key(&[1, 1], 0), key(&[1, 2], 0)];
    let (mut trie, root) = persisted_trie(store, &keys, config);

    assert_eq!(trie.get(keys[0]).unwrap(), Some(Value::repeat_byte(1)));
    assert_eq!(trie.commit(), root);
}

// ============================================================================
// Batch Tests
// ============================================================================

#[test]
fn test_batch_matches_sequential_writes() {
    let mut sequential = new_trie();
    sequential.insert(key(&[1], 0), [1u8; 32]).unwrap();
    sequential.insert(key(&[1, 5], 0), [2u8; 32]).unwrap();
    sequential.delete(key(&[1], 0)).unwrap();

    let mut batched = new_trie();
    let mut batch = Batch::new();
    batch.insert(key(&[1], 0), [1u8; 32]).unwrap();
    batch.insert(key(&[1, 5], 0), [2u8; 32]).unwrap();
    batch.delete(key(&[1], 0)).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.staged(&Key::from_bytes(key(&[1], 0))), Some(None));

    assert_eq!(batched.apply(batch).unwrap(), sequential.commit());
    assert_eq!(batched.get(key(&[1], 0)).unwrap(), None);
}

#[test]
fn test_failed_batch_applies_nothing() {
    let store = Arc::new(FlakyStore::new());
    let keys = [key(&[2], 0), key(&[3], 0)];
    let (mut trie, root) = persisted_trie(store.clone(), &keys, TrieConfig::default());

    // Resolve [2] so that only the write under [3] hits the store
    trie.prefetch([key(&[2], 0)]).unwrap();
    store.set_failing(true);

    let mut batch = Batch::new();
    batch.insert(key(&[2], 1), [8u8; 32]).unwrap();
    batch.insert(key(&[3], 1), [8u8; 32]).unwrap();
    assert!(trie.apply(batch).is_err());

    assert_eq!(trie.get(key(&[2], 1)).unwrap(), None);
    assert!(!trie.is_dirty());
    assert_eq!(trie.commit(), root);
}
