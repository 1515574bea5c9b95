//! Core data types for the verkle trie

mod key;
mod point;

pub use key::{Key, Stem, Suffix, Value};
pub use point::{Point, Scalar};
