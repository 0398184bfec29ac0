use std::fmt::Display;

use super::{HashValue, Hasher};
use crate::TreeError;

/// Tag prepended to the preimage of a leaf.
fn leaf_prefix() -> HashValue {
    HashValue::ZERO
}

/// Tag prepended to the preimage of an inner node.
fn node_prefix() -> HashValue {
    HashValue::from_u64(1)
}

/// Decoded preimage of a node of the compact tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactNode {
    /// A shortcut leaf carrying its full path.
    Leaf {
        path: HashValue,
        value_hash: HashValue,
    },
    /// An inner node with two children.
    Inner { left: HashValue, right: HashValue },
}

impl CompactNode {
    /// Encodes the node as `[tag, a, b]`.
    pub fn to_data(&self) -> Vec<HashValue> {
        match self {
            Self::Leaf { path, value_hash } => vec![leaf_prefix(), *path, *value_hash],
            Self::Inner { left, right } => vec![node_prefix(), *left, *right],
        }
    }

    pub fn from_data(data: &[HashValue]) -> Result<Self, TreeError> {
        let [tag, a, b] = data else {
            return Err(TreeError::Decode(format!(
                "node preimage needs 3 fields, got {}",
                data.len()
            )));
        };
        if *tag == leaf_prefix() {
            Ok(Self::Leaf {
                path: *a,
                value_hash: *b,
            })
        } else if *tag == node_prefix() {
            Ok(Self::Inner { left: *a, right: *b })
        } else {
            Err(TreeError::Decode(format!("unknown node tag {tag}")))
        }
    }
}

impl Display for CompactNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leaf { path, value_hash } => {
                write!(f, "Leaf {{ path: {path}, value_hash: {value_hash} }}")
            }
            Self::Inner { left, right } => write!(f, "Inner {{ left: {left}, right: {right} }}"),
        }
    }
}

/// Domain separated hashing used by the compact tree. Leaves and inner nodes
/// are hashed with distinct tags so their preimages never collide, and empty
/// subtrees are represented by the placeholder at every level.
#[derive(Debug, Clone, Default)]
pub struct TreeHasher<H> {
    hasher: H,
}

impl<H: Hasher> TreeHasher<H> {
    pub fn new(hasher: H) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Hash of an empty subtree, whatever its height.
    pub fn placeholder(&self) -> HashValue {
        HashValue::ZERO
    }

    /// Hashes a value encoding.
    pub fn digest(&self, data: &[HashValue]) -> HashValue {
        self.hasher.compress_many(data)
    }

    /// Returns the hash and the preimage of a leaf.
    pub fn digest_leaf(
        &self,
        path: HashValue,
        value_hash: HashValue,
    ) -> (HashValue, Vec<HashValue>) {
        let data = CompactNode::Leaf { path, value_hash }.to_data();
        (self.hasher.compress_many(&data), data)
    }

    /// Returns the hash and the preimage of an inner node.
    pub fn digest_node(&self, left: HashValue, right: HashValue) -> (HashValue, Vec<HashValue>) {
        let data = CompactNode::Inner { left, right }.to_data();
        (self.hasher.compress_many(&data), data)
    }

    pub fn parse_leaf(&self, data: &[HashValue]) -> Result<(HashValue, HashValue), TreeError> {
        match CompactNode::from_data(data)? {
            CompactNode::Leaf { path, value_hash } => Ok((path, value_hash)),
            CompactNode::Inner { .. } => Err(TreeError::Decode(
                "expected a leaf preimage, found an inner node".to_string(),
            )),
        }
    }

    pub fn parse_node(&self, data: &[HashValue]) -> Result<(HashValue, HashValue), TreeError> {
        match CompactNode::from_data(data)? {
            CompactNode::Inner { left, right } => Ok((left, right)),
            CompactNode::Leaf { .. } => Err(TreeError::Decode(
                "expected an inner node preimage, found a leaf".to_string(),
            )),
        }
    }

    pub fn is_leaf(&self, data: &[HashValue]) -> bool {
        matches!(CompactNode::from_data(data), Ok(CompactNode::Leaf { .. }))
    }
}
