//! Proofs are used to verify the consistency of a tree.
//!
//! A proof is a list of sibling hashes, leaf first, that recomputes the root
//! from a leaf.
//!
//! A proof can be compacted into a bitmask of the siblings that are default
//! nodes plus the list of the remaining ones. A compact proof can be
//! decompacted back into the original proof.
mod compact;
mod sibling_path;
mod sparse;
mod witness;

pub use compact::{CompactCsmtProof, CsmtProof};
pub use sibling_path::{verify_sibling_path, SiblingPath};
pub use sparse::{
    compute_root, verify_non_membership, verify_proof, CompactSparseMerkleProof,
    SparseMerkleProof,
};
pub use witness::LowLeafWitness;

/// Serializes a bitmask as the hex encoding of the big-endian integer whose
/// bit `i` is bit `i` of the mask.
mod bitmask_hex {
    use bitvec::{order::Lsb0, vec::BitVec};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bits: &BitVec<u8, Lsb0>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut bits = bits.clone();
        bits.set_uninitialized(false);
        let mut bytes = bits.into_vec();
        bytes.reverse();
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BitVec<u8, Lsb0>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        let mut bytes = if digits.len() % 2 == 1 {
            hex::decode(format!("0{digits}"))
        } else {
            hex::decode(digits)
        }
        .map_err(D::Error::custom)?;
        bytes.reverse();
        Ok(BitVec::from_vec(bytes))
    }
}
