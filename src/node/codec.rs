use serde::{Deserialize, Serialize};

use super::{HashValue, Hasher, HASH_SIZE};
use crate::TreeError;

/// Conversion of keys and values to and from the hash domain.
pub trait FieldCodec: Sized {
    fn to_fields(&self) -> Vec<HashValue>;
    fn from_fields(fields: &[HashValue]) -> Result<Self, TreeError>;
}

impl FieldCodec for HashValue {
    fn to_fields(&self) -> Vec<HashValue> {
        vec![*self]
    }

    fn from_fields(fields: &[HashValue]) -> Result<Self, TreeError> {
        match fields {
            [value] => Ok(*value),
            _ => Err(TreeError::Decode(format!(
                "expected 1 field, got {}",
                fields.len()
            ))),
        }
    }
}

impl FieldCodec for u64 {
    fn to_fields(&self) -> Vec<HashValue> {
        vec![HashValue::from_u64(*self)]
    }

    fn from_fields(fields: &[HashValue]) -> Result<Self, TreeError> {
        HashValue::from_fields(fields)?
            .to_u64()
            .ok_or_else(|| TreeError::Decode("value does not fit in a u64".to_string()))
    }
}

/// Strings are encoded as their byte length followed by 32 byte chunks, the
/// last one right padded with zeros.
impl FieldCodec for String {
    fn to_fields(&self) -> Vec<HashValue> {
        let bytes = self.as_bytes();
        let mut fields = Vec::with_capacity(1 + bytes.len().div_ceil(HASH_SIZE));
        fields.push(HashValue::from_u64(bytes.len() as u64));
        for chunk in bytes.chunks(HASH_SIZE) {
            let mut field = [0; HASH_SIZE];
            field[..chunk.len()].copy_from_slice(chunk);
            fields.push(HashValue::new(field));
        }
        fields
    }

    fn from_fields(fields: &[HashValue]) -> Result<Self, TreeError> {
        let (len, chunks) = fields
            .split_first()
            .ok_or_else(|| TreeError::Decode("missing string length".to_string()))?;
        let len = len
            .to_u64()
            .ok_or_else(|| TreeError::Decode("invalid string length".to_string()))?
            as usize;
        if chunks.len() != len.div_ceil(HASH_SIZE) {
            return Err(TreeError::Decode(format!(
                "string of {len} bytes cannot span {} fields",
                chunks.len()
            )));
        }
        let mut bytes: Vec<u8> = chunks.iter().flat_map(|c| *c.as_bytes()).collect();
        bytes.truncate(len);
        String::from_utf8(bytes).map_err(|e| TreeError::Decode(e.to_string()))
    }
}

/// How keys and values are mapped into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeOptions {
    /// Hash the key encoding to obtain the leaf path. When disabled the key
    /// must encode to a single field which is used as the path.
    pub hash_key: bool,
    /// Hash the value encoding to obtain the leaf. When disabled the value
    /// must encode to a single field which is used as the leaf.
    pub hash_value: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            hash_key: true,
            hash_value: true,
        }
    }
}

impl TreeOptions {
    /// Path of the leaf holding `key`.
    pub fn key_path<K: FieldCodec, H: Hasher>(
        &self,
        hasher: &H,
        key: &K,
    ) -> Result<HashValue, TreeError> {
        Self::digest(hasher, &key.to_fields(), self.hash_key)
    }

    /// Leaf hash committed for `value`.
    pub fn value_hash<V: FieldCodec, H: Hasher>(
        &self,
        hasher: &H,
        value: &V,
    ) -> Result<HashValue, TreeError> {
        Self::digest(hasher, &value.to_fields(), self.hash_value)
    }

    fn digest<H: Hasher>(
        hasher: &H,
        fields: &[HashValue],
        hash: bool,
    ) -> Result<HashValue, TreeError> {
        match (hash, fields) {
            (true, _) => Ok(hasher.compress_many(fields)),
            (false, [single]) => Ok(*single),
            (false, _) => Err(TreeError::UnsupportedValueEncoding {
                fields: fields.len(),
                max: 1,
            }),
        }
    }
}
