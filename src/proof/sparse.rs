use bitvec::{order::Lsb0, vec::BitVec};
use serde::{Deserialize, Serialize};

use super::SiblingPath;
use crate::{walk_up, HashValue, Hasher, TreeError};

/// A merkle proof of a sparse merkle tree for a given path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseMerkleProof {
    pub root: HashValue,
    pub side_nodes: SiblingPath,
}

impl SparseMerkleProof {
    pub fn new(root: HashValue, side_nodes: SiblingPath) -> Self {
        Self { root, side_nodes }
    }

    pub fn height(&self) -> usize {
        self.side_nodes.height()
    }

    /// Compacts the proof against the default nodes of its tree. Side node
    /// `i` sits `i` levels above the leaf and is dropped when it equals
    /// `defaults[height - i]`.
    pub fn compact(&self, defaults: &[HashValue]) -> Result<CompactSparseMerkleProof, TreeError> {
        let height = self.height();
        check_defaults(defaults, height)?;
        let mut bit_mask = BitVec::with_capacity(height);
        let mut side_nodes = Vec::new();
        for (i, node) in self.side_nodes.nodes().iter().enumerate() {
            if *node == defaults[height - i] {
                bit_mask.push(true);
            } else {
                bit_mask.push(false);
                side_nodes.push(*node);
            }
        }
        Ok(CompactSparseMerkleProof {
            side_nodes,
            bit_mask,
            root: self.root,
        })
    }
}

/// A proof of which the default side nodes are replaced by a bitmask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactSparseMerkleProof {
    pub side_nodes: Vec<HashValue>,
    #[serde(with = "super::bitmask_hex")]
    pub bit_mask: BitVec<u8, Lsb0>,
    pub root: HashValue,
}

impl CompactSparseMerkleProof {
    /// Decompacts the proof into a proof of `defaults.len() - 1` side nodes.
    pub fn decompact(&self, defaults: &[HashValue]) -> Result<SparseMerkleProof, TreeError> {
        let height = defaults.len().checked_sub(1).ok_or_else(|| {
            TreeError::InvalidProofShape("default nodes cannot be empty".to_string())
        })?;
        if let Some(bit) = self.bit_mask.iter_ones().find(|i| *i >= height) {
            return Err(TreeError::InvalidProofShape(format!(
                "bitmask marks level {bit} of a path of {height}"
            )));
        }
        let omitted = self.bit_mask.count_ones();
        if omitted + self.side_nodes.len() != height {
            return Err(TreeError::InvalidProofShape(format!(
                "{omitted} default and {} explicit side nodes do not make a path of {height}",
                self.side_nodes.len()
            )));
        }
        let mut explicit = self.side_nodes.iter();
        let mut nodes = Vec::with_capacity(height);
        for i in 0..height {
            if self.bit_mask.get(i).is_some_and(|bit| *bit) {
                nodes.push(defaults[height - i]);
            } else {
                let node = explicit.next().ok_or_else(|| {
                    TreeError::InvalidProofShape("bitmask is longer than the path".to_string())
                })?;
                nodes.push(*node);
            }
        }
        Ok(SparseMerkleProof::new(
            self.root,
            SiblingPath::new(height, nodes)?,
        ))
    }

    pub fn to_json(&self) -> Result<String, TreeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn check_defaults(defaults: &[HashValue], height: usize) -> Result<(), TreeError> {
    if defaults.len() != height + 1 {
        return Err(TreeError::InvalidProofShape(format!(
            "proof of height {height} needs {} default nodes, got {}",
            height + 1,
            defaults.len()
        )));
    }
    Ok(())
}

/// Recomputes the root from a leaf and its side nodes.
pub fn compute_root<H: Hasher>(
    hasher: &H,
    side_nodes: &SiblingPath,
    path: &HashValue,
    leaf: HashValue,
) -> HashValue {
    walk_up(hasher, path, leaf, side_nodes.nodes(), |_, _, _, _| {})
}

/// Verify a membership proof: `value_hash` is the leaf stored at `path` in
/// the tree of root `root`.
pub fn verify_proof<H: Hasher>(
    hasher: &H,
    proof: &SparseMerkleProof,
    root: &HashValue,
    path: &HashValue,
    value_hash: &HashValue,
) -> bool {
    compute_root(hasher, &proof.side_nodes, path, *value_hash) == *root
}

/// Verify a non-membership proof: the leaf at `path` is empty in the tree of
/// root `root`.
pub fn verify_non_membership<H: Hasher>(
    hasher: &H,
    proof: &SparseMerkleProof,
    root: &HashValue,
    path: &HashValue,
) -> bool {
    verify_proof(hasher, proof, root, path, &HashValue::ZERO)
}
