use std::fmt::{Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::TreeError;

/// Size in bytes of every hash, path and field value handled by the trees.
pub const HASH_SIZE: usize = 32;

/// A fixed width big-endian value. Node hashes, key paths, leaf values and
/// linked-list pointers all live in this domain.
///
/// Ordering is numeric: comparing two values compares the unsigned integers
/// their big-endian bytes encode.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HashValue([u8; HASH_SIZE]);

impl HashValue {
    /// The zero value. Used as the empty leaf and as the null pointer.
    pub const ZERO: Self = Self([0; HASH_SIZE]);

    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Encodes a small integer.
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0; HASH_SIZE];
        bytes[HASH_SIZE - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Decodes a small integer, `None` if the value does not fit in 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.0[..HASH_SIZE - 8].iter().any(|byte| *byte != 0) {
            return None;
        }
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&self.0[HASH_SIZE - 8..]);
        Some(u64::from_be_bytes(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; HASH_SIZE]
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex string, with or without `0x` prefix. Short strings are
    /// left padded with zeros.
    pub fn from_hex(s: &str) -> Result<Self, TreeError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() > HASH_SIZE * 2 {
            return Err(TreeError::Decode(format!(
                "hex value {s} is longer than {HASH_SIZE} bytes"
            )));
        }
        let padded = format!("{:0>width$}", digits, width = HASH_SIZE * 2);
        let mut bytes = [0; HASH_SIZE];
        hex::decode_to_slice(padded, &mut bytes)
            .map_err(|e| TreeError::Decode(format!("invalid hex value {s}: {e}")))?;
        Ok(Self(bytes))
    }

    /// Returns bit `index` of the numeric value, bit 0 being the least
    /// significant one.
    pub fn bit(&self, index: usize) -> bool {
        (self.0[HASH_SIZE - 1 - index / 8] >> (index % 8)) & 1 == 1
    }

    /// Keeps the `bits` least significant bits and clears the others.
    pub fn truncate(&self, bits: usize) -> Self {
        let mut bytes = self.0;
        for (i, byte) in bytes.iter_mut().rev().enumerate() {
            let low = i * 8;
            if low >= bits {
                *byte = 0;
            } else if bits - low < 8 {
                *byte &= (1u8 << (bits - low)) - 1;
            }
        }
        Self(bytes)
    }
}

impl From<[u8; HASH_SIZE]> for HashValue {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<HashValue> for [u8; HASH_SIZE] {
    fn from(value: HashValue) -> Self {
        value.0
    }
}

impl Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Debug for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashValue({})", self.to_hex())
    }
}

impl FromStr for HashValue {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for HashValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for HashValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Bit of `path` consumed at `depth` (0 is the root) in a tree of `height`
/// levels. Returns 1 when the path goes right.
pub fn bit_index(path: &HashValue, height: usize, depth: usize) -> u8 {
    path.bit(height - 1 - depth) as u8
}

/// Number of leading levels two paths share in a tree of `height` levels.
pub fn count_common_prefix(a: &HashValue, b: &HashValue, height: usize) -> usize {
    (0..height)
        .take_while(|depth| bit_index(a, height, *depth) == bit_index(b, height, *depth))
        .count()
}

/// Concatenates values into the byte layout used by the stores.
pub fn encode_fields(fields: &[HashValue]) -> Vec<u8> {
    fields.iter().flat_map(|f| f.0).collect()
}

/// Splits bytes produced by [`encode_fields`] back into values.
pub fn decode_fields(bytes: &[u8]) -> Option<Vec<HashValue>> {
    if bytes.len() % HASH_SIZE != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(HASH_SIZE)
            .map(|chunk| {
                let mut value = [0; HASH_SIZE];
                value.copy_from_slice(chunk);
                HashValue(value)
            })
            .collect(),
    )
}

#[cfg(test)]
mod test {
    use super::{bit_index, count_common_prefix, decode_fields, encode_fields, HashValue};
    use hex_literal::hex;

    #[test]
    fn test_u64_conversion() {
        let value = HashValue::from_u64(0x0102);
        assert_eq!(
            value.as_bytes(),
            &hex!("0000000000000000000000000000000000000000000000000000000000000102")
        );
        assert_eq!(value.to_u64(), Some(0x0102));
        assert_eq!(HashValue::new([1; 32]).to_u64(), None);
    }

    #[test]
    fn test_ordering_is_numeric() {
        assert!(HashValue::from_u64(5) < HashValue::from_u64(10));
        assert!(HashValue::from_u64(u64::MAX) < HashValue::new([1; 32]));
        assert!(HashValue::ZERO < HashValue::from_u64(1));
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(HashValue::from_hex("0x0a").unwrap(), HashValue::from_u64(10));
        assert_eq!(HashValue::from_hex("ff").unwrap(), HashValue::from_u64(255));
        let value = HashValue::new([7; 32]);
        assert_eq!(value.to_string().parse::<HashValue>().unwrap(), value);
        assert!(HashValue::from_hex("zz").is_err());
        assert!(HashValue::from_hex(&"0".repeat(66)).is_err());
    }

    #[test]
    fn test_serde_uses_hex() {
        let value = HashValue::from_u64(1);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(
            json,
            "\"0000000000000000000000000000000000000000000000000000000000000001\""
        );
        assert_eq!(serde_json::from_str::<HashValue>(&json).unwrap(), value);
    }

    #[test]
    fn test_bit_index() {
        // 0b101 in a 3 level tree goes right, left, right.
        let path = HashValue::from_u64(0b101);
        assert_eq!(bit_index(&path, 3, 0), 1);
        assert_eq!(bit_index(&path, 3, 1), 0);
        assert_eq!(bit_index(&path, 3, 2), 1);
        assert_eq!(bit_index(&HashValue::new([0x80; 32]), 256, 0), 1);
    }

    #[test]
    fn test_truncate() {
        let value = HashValue::new([0xff; 32]);
        assert_eq!(value.truncate(256), value);
        assert_eq!(value.truncate(12), HashValue::from_u64(0xfff));
        assert_eq!(value.truncate(0), HashValue::ZERO);
    }

    #[test]
    fn test_common_prefix() {
        let a = HashValue::from_u64(0b1100);
        let b = HashValue::from_u64(0b1110);
        assert_eq!(count_common_prefix(&a, &b, 4), 2);
        assert_eq!(count_common_prefix(&a, &a, 4), 4);
    }

    #[test]
    fn test_field_encoding() {
        let fields = vec![HashValue::from_u64(1), HashValue::new([9; 32])];
        let bytes = encode_fields(&fields);
        assert_eq!(bytes.len(), 64);
        assert_eq!(decode_fields(&bytes).unwrap(), fields);
        assert!(decode_fields(&bytes[..10]).is_none());
    }
}
