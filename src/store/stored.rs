//! Serialized node form exchanged with a node store

use crate::model::{Point, Stem, Value};
use crate::Result;
use serde::{Deserialize, Serialize};

/// A node as handed to and received from a [`NodeStore`](super::NodeStore)
///
/// Internal nodes carry only the commitments of their non-empty children;
/// those children come back as placeholders and are resolved on demand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredNode {
    Internal {
        depth: u8,
        /// (slot, child commitment) for every non-empty slot, ascending
        children: Vec<(u8, Point)>,
    },
    Leaf {
        depth: u8,
        stem: Stem,
        /// (suffix, value) for every occupied slot, ascending
        values: Vec<(u8, Value)>,
    },
}

impl StoredNode {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }

    pub fn depth(&self) -> u8 {
        match self {
            StoredNode::Internal { depth, .. } | StoredNode::Leaf { depth, .. } => *depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_roundtrip() {
        let node = StoredNode::Leaf {
            depth: 2,
            stem: Stem::from_bytes([7u8; 31]),
            values: vec![(0, Value::repeat_byte(1)), (200, Value::repeat_byte(2))],
        };
        let bytes = node.encode().unwrap();
        assert_eq!(StoredNode::decode(&bytes).unwrap(), node);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(StoredNode::decode(&[0xff, 0xff, 0xff]).is_err());
    }
}
