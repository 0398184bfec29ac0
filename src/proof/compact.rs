use bitvec::{order::Lsb0, vec::BitVec};
use serde::{Deserialize, Serialize};

use crate::{bit_index, HashValue, Hasher, TreeError, TreeHasher};

/// A proof of the compact sparse merkle tree.
///
/// Leaves sit at the shallowest depth where their path is unique, so the
/// number of side nodes varies between 0 and the height of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsmtProof {
    pub root: HashValue,
    /// Side nodes, leaf first.
    pub side_nodes: Vec<HashValue>,
    /// Preimage of the leaf found in place of the proven path, when another
    /// key occupies it.
    pub non_membership_leaf_data: Option<Vec<HashValue>>,
    /// Preimage of the first side node, needed to apply a deletion from the
    /// proof alone.
    pub sibling_data: Option<Vec<HashValue>>,
}

impl CsmtProof {
    /// Rejects malformed proofs before any hashing happens.
    pub fn sanity_check<H: Hasher>(&self, th: &TreeHasher<H>, height: usize) -> bool {
        if self.side_nodes.len() > height {
            return false;
        }
        if let Some(data) = &self.non_membership_leaf_data {
            if th.parse_leaf(data).is_err() {
                return false;
            }
        }
        if let Some(data) = &self.sibling_data {
            match self.side_nodes.first() {
                Some(first) if th.digest(data) == *first => {}
                _ => return false,
            }
        }
        true
    }

    /// Verify the proof for `path`. `value_hash` is `None` for a
    /// non-membership proof.
    pub fn verify<H: Hasher>(
        &self,
        th: &TreeHasher<H>,
        height: usize,
        root: &HashValue,
        path: &HashValue,
        value_hash: Option<&HashValue>,
    ) -> bool {
        self.verify_with_updates(th, height, root, path, value_hash).0
    }

    /// Verify the proof and return the `(hash, preimage)` pairs of every node
    /// recomputed on the way to the root.
    pub fn verify_with_updates<H: Hasher>(
        &self,
        th: &TreeHasher<H>,
        height: usize,
        root: &HashValue,
        path: &HashValue,
        value_hash: Option<&HashValue>,
    ) -> (bool, Vec<(HashValue, Vec<HashValue>)>) {
        let mut updates = Vec::new();
        if !self.sanity_check(th, height) {
            return (false, updates);
        }
        let mut current = match (value_hash, &self.non_membership_leaf_data) {
            (None, None) => th.placeholder(),
            (None, Some(data)) => {
                let Ok((actual_path, actual_value_hash)) = th.parse_leaf(data) else {
                    return (false, updates);
                };
                // The leaf of the proven path cannot prove its own absence.
                if actual_path == *path {
                    return (false, updates);
                }
                let (hash, data) = th.digest_leaf(actual_path, actual_value_hash);
                updates.push((hash, data));
                hash
            }
            (Some(value_hash), _) => {
                let (hash, data) = th.digest_leaf(*path, *value_hash);
                updates.push((hash, data));
                hash
            }
        };
        let len = self.side_nodes.len();
        for (i, node) in self.side_nodes.iter().enumerate() {
            let (hash, data) = if bit_index(path, height, len - 1 - i) == 1 {
                th.digest_node(*node, current)
            } else {
                th.digest_node(current, *node)
            };
            updates.push((hash, data));
            current = hash;
        }
        (current == *root, updates)
    }

    /// Replaces the placeholder side nodes by a bitmask.
    pub fn compact<H: Hasher>(
        &self,
        th: &TreeHasher<H>,
        height: usize,
    ) -> Result<CompactCsmtProof, TreeError> {
        if !self.sanity_check(th, height) {
            return Err(TreeError::InvalidProofShape(
                "proof does not pass the sanity check".to_string(),
            ));
        }
        let mut bit_mask = BitVec::with_capacity(self.side_nodes.len());
        let mut side_nodes = Vec::new();
        for node in &self.side_nodes {
            if *node == th.placeholder() {
                bit_mask.push(true);
            } else {
                bit_mask.push(false);
                side_nodes.push(*node);
            }
        }
        Ok(CompactCsmtProof {
            root: self.root,
            side_nodes,
            non_membership_leaf_data: self.non_membership_leaf_data.clone(),
            bit_mask,
            num_side_nodes: self.side_nodes.len(),
            sibling_data: self.sibling_data.clone(),
        })
    }
}

/// A compact sparse merkle tree proof with the placeholder side nodes
/// replaced by a bitmask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactCsmtProof {
    pub root: HashValue,
    pub side_nodes: Vec<HashValue>,
    pub non_membership_leaf_data: Option<Vec<HashValue>>,
    #[serde(with = "super::bitmask_hex")]
    pub bit_mask: BitVec<u8, Lsb0>,
    pub num_side_nodes: usize,
    pub sibling_data: Option<Vec<HashValue>>,
}

impl CompactCsmtProof {
    pub fn decompact<H: Hasher>(
        &self,
        th: &TreeHasher<H>,
        height: usize,
    ) -> Result<CsmtProof, TreeError> {
        if self.num_side_nodes > height {
            return Err(TreeError::InvalidProofShape(format!(
                "{} side nodes exceed the height {height}",
                self.num_side_nodes
            )));
        }
        if self.bit_mask.iter_ones().any(|i| i >= self.num_side_nodes)
            || self.bit_mask.count_ones() + self.side_nodes.len() != self.num_side_nodes
        {
            return Err(TreeError::InvalidProofShape(format!(
                "bitmask does not describe {} side nodes",
                self.num_side_nodes
            )));
        }
        let mut explicit = self.side_nodes.iter();
        let mut side_nodes = Vec::with_capacity(self.num_side_nodes);
        for i in 0..self.num_side_nodes {
            if self.bit_mask.get(i).is_some_and(|bit| *bit) {
                side_nodes.push(th.placeholder());
            } else {
                let node = explicit.next().ok_or_else(|| {
                    TreeError::InvalidProofShape("missing explicit side node".to_string())
                })?;
                side_nodes.push(*node);
            }
        }
        let proof = CsmtProof {
            root: self.root,
            side_nodes,
            non_membership_leaf_data: self.non_membership_leaf_data.clone(),
            sibling_data: self.sibling_data.clone(),
        };
        if !proof.sanity_check(th, height) {
            return Err(TreeError::InvalidProofShape(
                "decompacted proof does not pass the sanity check".to_string(),
            ));
        }
        Ok(proof)
    }

    pub fn to_json(&self) -> Result<String, TreeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        Ok(serde_json::from_str(json)?)
    }
}
