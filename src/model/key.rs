//! Fixed-size keys, stems and values

use crate::{Error, Result, KEY_SIZE, STEM_SIZE, VALUE_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// Last byte of a key, selecting a value slot inside a leaf
pub type Suffix = u8;

/// A 32-byte trie key: a 31-byte [`Stem`] followed by a one-byte [`Suffix`]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// Create a key from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Key(bytes)
    }

    /// Create a key from a slice, rejecting anything that is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| Error::InvalidLength {
            kind: "key",
            expected: KEY_SIZE,
            found: bytes.len(),
        })?;
        Ok(Key(arr))
    }

    /// Join a stem and a suffix into a key
    pub fn from_stem(stem: &Stem, suffix: Suffix) -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        bytes[..STEM_SIZE].copy_from_slice(stem.as_bytes());
        bytes[STEM_SIZE] = suffix;
        Key(bytes)
    }

    /// The first 31 bytes, identifying the leaf
    pub fn stem(&self) -> Stem {
        let mut stem = [0u8; STEM_SIZE];
        stem.copy_from_slice(&self.0[..STEM_SIZE]);
        Stem(stem)
    }

    /// The last byte, identifying the slot within the leaf
    pub fn suffix(&self) -> Suffix {
        self.0[STEM_SIZE]
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; KEY_SIZE]> for Key {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Key(bytes)
    }
}

impl TryFrom<&[u8]> for Key {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Key::from_slice(bytes)
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.to_hex())
    }
}

/// The 31-byte prefix shared by every key stored in one leaf
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stem([u8; STEM_SIZE]);

impl Stem {
    pub fn from_bytes(bytes: [u8; STEM_SIZE]) -> Self {
        Stem(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; STEM_SIZE] {
        &self.0
    }

    /// Whether this stem lies under the given trie path
    pub fn starts_with(&self, path: &[u8]) -> bool {
        self.0.starts_with(path)
    }

    /// The trie path of the node at `depth` on the way to this stem
    pub fn path(&self, depth: usize) -> &[u8] {
        &self.0[..depth.min(STEM_SIZE)]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Index<usize> for Stem {
    type Output = u8;

    fn index(&self, depth: usize) -> &u8 {
        &self.0[depth]
    }
}

impl fmt::Debug for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stem({})", self.to_hex())
    }
}

/// A 32-byte stored value
///
/// An absent value is modelled as `Option<Value>::None`; an all-zero
/// value is a real value and commits differently.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Value([u8; VALUE_SIZE]);

impl Value {
    pub fn from_bytes(bytes: [u8; VALUE_SIZE]) -> Self {
        Value(bytes)
    }

    /// Create a value from a slice, rejecting anything that is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; VALUE_SIZE] = bytes.try_into().map_err(|_| Error::InvalidLength {
            kind: "value",
            expected: VALUE_SIZE,
            found: bytes.len(),
        })?;
        Ok(Value(arr))
    }

    /// A value with every byte set to `byte`
    pub fn repeat_byte(byte: u8) -> Self {
        Value([byte; VALUE_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; VALUE_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; VALUE_SIZE]> for Value {
    fn from(bytes: [u8; VALUE_SIZE]) -> Self {
        Value(bytes)
    }
}

impl TryFrom<&[u8]> for Value {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Value::from_slice(bytes)
    }
}

impl AsRef<[u8]> for Value {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", self.to_hex())
    }
}
