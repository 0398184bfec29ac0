use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::{FieldCodec, HashValue, Hasher};
use crate::TreeError;

/// A leaf of an indexed tree. Populated leaves form a linked list sorted by
/// `value`; `next_value == 0` terminates the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedLeaf {
    pub value: HashValue,
    pub next_index: u64,
    pub next_value: HashValue,
}

impl LinkedLeaf {
    pub fn new(value: HashValue, next_index: u64, next_value: HashValue) -> Self {
        Self {
            value,
            next_index,
            next_value,
        }
    }

    /// The `(0, 0, 0)` leaf stored at index 0 of every indexed tree.
    pub fn sentinel() -> Self {
        Self::default()
    }

    /// Returns the hash of the leaf. This function performs a hash.
    pub fn hash<H: Hasher>(&self, hasher: &H) -> HashValue {
        hasher.compress_many(&self.to_fields())
    }

    /// True if `value` sorts strictly between this leaf and its successor,
    /// which proves `value` is absent from the list.
    pub fn brackets(&self, value: &HashValue) -> bool {
        self.value < *value && (self.next_value > *value || self.next_value.is_zero())
    }
}

impl FieldCodec for LinkedLeaf {
    fn to_fields(&self) -> Vec<HashValue> {
        vec![
            self.value,
            HashValue::from_u64(self.next_index),
            self.next_value,
        ]
    }

    fn from_fields(fields: &[HashValue]) -> Result<Self, TreeError> {
        let [value, next_index, next_value] = fields else {
            return Err(TreeError::Decode(format!(
                "linked leaf needs 3 fields, got {}",
                fields.len()
            )));
        };
        let next_index = next_index
            .to_u64()
            .ok_or_else(|| TreeError::Decode("next index does not fit in a u64".to_string()))?;
        Ok(Self::new(*value, next_index, *next_value))
    }
}

impl Display for LinkedLeaf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LinkedLeaf {{ value: {}, next_index: {}, next_value: {} }}",
            self.value, self.next_index, self.next_value
        )
    }
}

#[cfg(test)]
mod test {
    use super::LinkedLeaf;
    use crate::{FieldCodec, HashValue, Hasher};
    use sha2::Sha256;

    fn v(value: u64) -> HashValue {
        HashValue::from_u64(value)
    }

    #[test]
    fn test_linked_leaf_hash() {
        let hasher = Sha256::default();
        let leaf = LinkedLeaf::new(v(5), 2, v(10));
        assert_eq!(
            leaf.hash(&hasher),
            hasher.compress_many(&[v(5), v(2), v(10)])
        );
        assert_ne!(leaf.hash(&hasher), LinkedLeaf::sentinel().hash(&hasher));
    }

    #[test]
    fn test_linked_leaf_fields() {
        let leaf = LinkedLeaf::new(v(5), 2, v(10));
        assert_eq!(LinkedLeaf::from_fields(&leaf.to_fields()).unwrap(), leaf);
        assert!(LinkedLeaf::from_fields(&[v(1)]).is_err());
    }

    #[test]
    fn test_brackets() {
        let leaf = LinkedLeaf::new(v(5), 2, v(10));
        assert!(leaf.brackets(&v(7)));
        assert!(!leaf.brackets(&v(5)));
        assert!(!leaf.brackets(&v(10)));
        let tail = LinkedLeaf::new(v(15), 0, HashValue::ZERO);
        assert!(tail.brackets(&v(100)));
    }

    #[test]
    fn test_linked_leaf_display() {
        assert_eq!(
            format!("{}", LinkedLeaf::new(v(1), 2, v(3))),
            format!(
                "LinkedLeaf {{ value: {}, next_index: 2, next_value: {} }}",
                v(1),
                v(3)
            )
        );
    }
}
