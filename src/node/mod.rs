mod codec;
mod compact;
mod hash;
mod leaf;

use sha2::{Digest, Sha256};

use crate::ThreadSafe;

pub use codec::{FieldCodec, TreeOptions};
pub use compact::{CompactNode, TreeHasher};
pub use hash::{
    bit_index, count_common_prefix, decode_fields, encode_fields, HashValue, HASH_SIZE,
};
pub use leaf::LinkedLeaf;

/// Two-ary and n-ary compression function required to hash the nodes in the
/// trees. Implementations must be pure and deterministic.
pub trait Hasher: ThreadSafe {
    /// Hashes an ordered pair of children into their parent.
    fn compress(&self, left: &HashValue, right: &HashValue) -> HashValue;

    /// Hashes an arbitrary number of values.
    fn compress_many(&self, inputs: &[HashValue]) -> HashValue;

    /// Identity of the hash function. Two hashers with the same id must
    /// produce the same outputs, the default node cache relies on it.
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl Hasher for Sha256 {
    fn compress(&self, left: &HashValue, right: &HashValue) -> HashValue {
        let mut hasher = Sha256::new();
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        HashValue::new(hasher.finalize().into())
    }

    fn compress_many(&self, inputs: &[HashValue]) -> HashValue {
        let mut hasher = Sha256::new();
        for input in inputs {
            hasher.update(input.as_bytes());
        }
        HashValue::new(hasher.finalize().into())
    }
}

#[cfg(test)]
mod test {
    use super::{HashValue, Hasher};
    use hex_literal::hex;
    use sha2::Sha256;

    #[test]
    fn test_sha256_compress() {
        let hasher = Sha256::default();
        assert_eq!(
            hasher.compress(&HashValue::ZERO, &HashValue::ZERO),
            HashValue::new(hex!(
                "f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b"
            ))
        );
    }

    #[test]
    fn test_compress_many_matches_compress() {
        let hasher = Sha256::default();
        let a = HashValue::from_u64(1);
        let b = HashValue::from_u64(2);
        assert_eq!(hasher.compress(&a, &b), hasher.compress_many(&[a, b]));
        assert_eq!(
            hasher.compress_many(&[HashValue::ZERO]),
            HashValue::new(hex!(
                "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
            ))
        );
    }

    #[test]
    fn test_hasher_id() {
        assert!(Sha256::default().id().contains("Sha256"));
    }
}
