//! Staged writes applied to a trie in one step

use crate::model::{Key, Value};
use crate::Result;
use std::collections::BTreeMap;

/// A set of pending puts and deletes
///
/// A batch is independent of any trie until [`VerkleTrie::apply`](crate::VerkleTrie::apply),
/// so several batches can be prepared concurrently without observing each
/// other. Later writes to the same key replace earlier ones.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    /// key -> Some(value) to store, None to delete
    ops: BTreeMap<Key, Option<Value>>,
}

impl Batch {
    pub fn new() -> Self {
        Batch {
            ops: BTreeMap::new(),
        }
    }

    /// Stage a write
    pub fn insert(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        let key = Key::from_slice(key.as_ref())?;
        let value = Value::from_slice(value.as_ref())?;
        self.ops.insert(key, Some(value));
        Ok(())
    }

    /// Stage a deletion
    pub fn delete(&mut self, key: impl AsRef<[u8]>) -> Result<()> {
        let key = Key::from_slice(key.as_ref())?;
        self.ops.insert(key, None);
        Ok(())
    }

    /// The staged operation for a key: `Some(Some(v))` for a write,
    /// `Some(None)` for a deletion, `None` if the key is untouched
    pub fn staged(&self, key: &Key) -> Option<Option<Value>> {
        self.ops.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> BTreeMap<Key, Option<Value>> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut batch = Batch::new();
        let key = Key::from_bytes([1u8; 32]);

        batch.insert(key, [1u8; 32]).unwrap();
        assert_eq!(batch.staged(&key), Some(Some(Value::repeat_byte(1))));

        batch.delete(key).unwrap();
        assert_eq!(batch.staged(&key), Some(None));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let mut batch = Batch::new();
        assert!(batch.insert([0u8; 4], [0u8; 32]).is_err());
        assert!(batch.delete([0u8; 33]).is_err());
        assert!(batch.is_empty());
    }
}
