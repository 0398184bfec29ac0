use serde::{Deserialize, Serialize};

use crate::{walk_up, HashValue, Hasher, TreeError};

/// Sibling hashes of a leaf, leaf first. The length always equals the height
/// of the tree the path was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiblingPath {
    nodes: Vec<HashValue>,
}

impl SiblingPath {
    /// Creates a sibling path, failing if `nodes` does not hold exactly
    /// `height` hashes.
    pub fn new(height: usize, nodes: Vec<HashValue>) -> Result<Self, TreeError> {
        if nodes.len() != height {
            return Err(TreeError::InvalidProofShape(format!(
                "sibling path of a tree of height {height} cannot hold {} nodes",
                nodes.len()
            )));
        }
        Ok(Self { nodes })
    }

    /// A path made of zeros, used as a placeholder witness.
    pub fn empty(height: usize) -> Self {
        Self {
            nodes: vec![HashValue::ZERO; height],
        }
    }

    pub fn height(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[HashValue] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<HashValue> {
        self.nodes
    }

    /// Path from the root of the subtree of `subtree_height` levels holding
    /// the leaf up to the root of the tree.
    pub fn subtree_sibling_path(&self, subtree_height: usize) -> Result<Self, TreeError> {
        if subtree_height > self.height() {
            return Err(TreeError::InvalidArgument(format!(
                "subtree height {subtree_height} exceeds tree height {}",
                self.height()
            )));
        }
        Ok(Self {
            nodes: self.nodes[subtree_height..].to_vec(),
        })
    }

    /// Recomputes the root from the leaf at `index`.
    pub fn compute_root<H: Hasher>(&self, hasher: &H, index: u64, leaf: HashValue) -> HashValue {
        walk_up(
            hasher,
            &HashValue::from_u64(index),
            leaf,
            &self.nodes,
            |_, _, _, _| {},
        )
    }
}

/// Checks that `leaf` sits at `index` in the tree of root `root`.
pub fn verify_sibling_path<H: Hasher>(
    hasher: &H,
    index: u64,
    leaf: HashValue,
    path: &SiblingPath,
    root: &HashValue,
) -> bool {
    if path.height() < 64 && index >> path.height() != 0 {
        return false;
    }
    path.compute_root(hasher, index, leaf) == *root
}
