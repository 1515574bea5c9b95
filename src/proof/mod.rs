//! Membership and non-membership proofs
//!
//! A [`MultiProof`] bundles, for a set of keys, the commitments along every
//! key's path and the opening proofs tying each commitment to its parent.
//! Paths shared by several keys appear once.

mod builder;
mod cancel;
mod multiproof;

pub use builder::ProofBuilder;
pub use cancel::CancelFlag;
pub use multiproof::{AbsenceStub, KeyProof, MultiProof, Opening, OpeningKey, Target};
