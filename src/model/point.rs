//! Commitment points and scalar field elements
//!
//! Both are opaque 32-byte encodings owned by the [`CommitmentEngine`](crate::CommitmentEngine)
//! in use. Scalars are little-endian.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A vector commitment produced by a commitment engine
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point([u8; 32]);

impl Point {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Point(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get a short prefix for display
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({})", self.short())
    }
}

/// An element of the commitment scheme's scalar field
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scalar([u8; 32]);

impl Scalar {
    pub const ZERO: Scalar = Scalar([0u8; 32]);

    pub const ONE: Scalar = {
        let mut bytes = [0u8; 32];
        bytes[0] = 1;
        Scalar(bytes)
    };

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Scalar(bytes)
    }

    /// Build a scalar from up to 32 little-endian bytes
    pub fn from_le_slice(bytes: &[u8]) -> Self {
        let mut out = [0u8; 32];
        let len = bytes.len().min(32);
        out[..len].copy_from_slice(&bytes[..len]);
        Scalar(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({})", hex::encode(self.0))
    }
}
