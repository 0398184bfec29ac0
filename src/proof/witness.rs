use serde::{Deserialize, Serialize};

use super::{verify_sibling_path, SiblingPath};
use crate::{HashValue, Hasher, LinkedLeaf};

/// Membership witness of a low leaf of an indexed tree: the leaf, its index
/// and its sibling path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowLeafWitness {
    pub leaf: LinkedLeaf,
    pub index: u64,
    pub sibling_path: SiblingPath,
}

impl LowLeafWitness {
    /// Placeholder witness for values that need none: zeros, and values whose
    /// low leaf is part of the same batch.
    pub fn empty(height: usize) -> Self {
        Self {
            leaf: LinkedLeaf::default(),
            index: 0,
            sibling_path: SiblingPath::empty(height),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.leaf == LinkedLeaf::default()
            && self.index == 0
            && self.sibling_path.nodes().iter().all(HashValue::is_zero)
    }

    /// Checks that the leaf sits at `index` in the tree of root `root`.
    pub fn verify_membership<H: Hasher>(&self, hasher: &H, root: &HashValue) -> bool {
        verify_sibling_path(
            hasher,
            self.index,
            self.leaf.hash(hasher),
            &self.sibling_path,
            root,
        )
    }

    /// Checks that `value` is absent from the tree of root `root`: the leaf is
    /// in the tree and `value` sorts strictly between it and its successor.
    pub fn verify_non_membership<H: Hasher>(
        &self,
        hasher: &H,
        root: &HashValue,
        value: &HashValue,
    ) -> bool {
        self.leaf.brackets(value) && self.verify_membership(hasher, root)
    }
}
