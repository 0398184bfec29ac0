//! A compact representation of a sparse merkle tree.
//!
//! This implementation optimizes storage by compacting subtrees that contain only a single leaf.
//! Instead of storing all intermediate branch nodes, a leaf sits at the shallowest depth where
//! its path is unique. Leaves commit to their full path, and empty subtrees hash to the
//! placeholder whatever their height.

use std::{collections::HashMap, marker::PhantomData};

use sha2::Sha256;
use tracing::{debug, trace};

use super::{check_height, commit_or_discard};
use crate::{
    bit_index, count_common_prefix, CompactCsmtProof, CsmtProof, FieldCodec, HashValue, Hasher,
    MemoryStore, Store, StoreError, TreeError, TreeHasher, TreeOptions, HASH_SIZE,
};

/// Node preimages staged during a batch of updates, `None` marking a
/// deletion.
type PendingNodes = HashMap<HashValue, Option<Vec<HashValue>>>;

/// Result of a walk from the root towards a path.
struct Branch {
    /// Side nodes, leaf first.
    side_nodes: Vec<HashValue>,
    /// Nodes on the path, leaf first. The first one is the leaf found in place
    /// of the path, or the placeholder.
    path_nodes: Vec<HashValue>,
    /// Preimage of the leaf found, if any.
    leaf_data: Option<Vec<HashValue>>,
    /// Preimage of the side node closest to the leaf.
    sibling_data: Option<Vec<HashValue>>,
}

/// A compact sparse merkle tree implementation.
///
/// # Type Parameters
///
/// * `K`: The key type, mapped to a path through its field encoding
/// * `V`: The value type
/// * `S`: The store holding node preimages and values
/// * `H`: The hash function implementation that implements the [`Hasher`] trait
pub struct CompactSparseMerkleTree<K, V, S = MemoryStore, H = Sha256> {
    /// The store backend for node preimages and values
    store: S,
    /// Domain separated hasher
    th: TreeHasher<H>,
    options: TreeOptions,
    /// Number of bits of a path
    height: usize,
    root: HashValue,
    _phantom: PhantomData<(K, V)>,
}

impl<K: FieldCodec, V: FieldCodec, S: Store, H: Hasher> CompactSparseMerkleTree<K, V, S, H> {
    /// Creates an empty tree and writes its root to the store.
    pub fn build(
        mut store: S,
        hasher: H,
        height: usize,
        options: TreeOptions,
    ) -> Result<Self, TreeError> {
        check_height(height, HASH_SIZE * 8)?;
        let th = TreeHasher::new(hasher);
        let root = th.placeholder();
        store.clear_prepare_operation_cache();
        store.prepare_update_root(root);
        commit_or_discard(&mut store)?;
        debug!(height, "built compact sparse merkle tree");
        Ok(Self {
            store,
            th,
            options,
            height,
            root,
            _phantom: PhantomData,
        })
    }

    /// Loads a tree from the root committed in the store.
    pub fn import(
        store: S,
        hasher: H,
        height: usize,
        options: TreeOptions,
    ) -> Result<Self, TreeError> {
        check_height(height, HASH_SIZE * 8)?;
        let root = store.get_root()?;
        debug!(height, %root, "imported compact sparse merkle tree");
        Ok(Self {
            store,
            th: TreeHasher::new(hasher),
            options,
            height,
            root,
            _phantom: PhantomData,
        })
    }

    /// Returns the committed root of the tree.
    ///
    /// If the tree is empty, returns the placeholder.
    pub fn root(&self) -> HashValue {
        self.root
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    pub fn tree_hasher(&self) -> &TreeHasher<H> {
        &self.th
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Path of the leaf holding `key`.
    pub fn key_path(&self, key: &K) -> Result<HashValue, TreeError> {
        Ok(self
            .options
            .key_path(self.th.hasher(), key)?
            .truncate(self.height))
    }

    pub(crate) fn value_hash(&self, value: &V) -> Result<HashValue, TreeError> {
        self.options.value_hash(self.th.hasher(), value)
    }

    /// Gets the committed value of `key`, `None` if absent.
    pub fn get(&self, key: &K) -> Result<Option<V>, TreeError> {
        let path = self.key_path(key)?;
        match self.store.get_value(&path.to_hex()) {
            Ok(fields) => Ok(Some(V::from_fields(&fields)?)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn has(&self, key: &K) -> Result<bool, TreeError> {
        Ok(self.get(key)?.is_some())
    }

    /// Sets the value of `key`, `None` deleting it. Returns the new root.
    pub fn update(&mut self, key: &K, value: Option<&V>) -> Result<HashValue, TreeError> {
        self.update_all([(key, value)])
    }

    /// Applies every update and commits them at once. Returns the new root.
    pub fn update_all<'a, I>(&mut self, entries: I) -> Result<HashValue, TreeError>
    where
        I: IntoIterator<Item = (&'a K, Option<&'a V>)>,
        K: 'a,
        V: 'a,
    {
        self.store.clear_prepare_operation_cache();
        let mut pending = PendingNodes::new();
        let mut root = self.root;
        for (key, value) in entries {
            match self.update_for_root(root, key, value, &mut pending) {
                Ok(new_root) => root = new_root,
                Err(err) => {
                    self.store.clear_prepare_operation_cache();
                    return Err(err);
                }
            }
        }
        self.store.prepare_update_root(root);
        commit_or_discard(&mut self.store)?;
        debug!(%root, "committed compact sparse merkle tree update");
        self.root = root;
        Ok(root)
    }

    pub fn delete(&mut self, key: &K) -> Result<HashValue, TreeError> {
        self.update(key, None)
    }

    /// Membership or non-membership proof of `key` against the committed root.
    pub fn prove(&self, key: &K) -> Result<CsmtProof, TreeError> {
        self.do_prove(key, false)
    }

    /// Like [`prove`](Self::prove) but carrying the preimage of the closest
    /// side node, so that the proof can be used to delete the key from a
    /// deep subtree.
    pub fn prove_updatable(&self, key: &K) -> Result<CsmtProof, TreeError> {
        self.do_prove(key, true)
    }

    pub fn prove_compact(&self, key: &K) -> Result<CompactCsmtProof, TreeError> {
        self.prove(key)?.compact(&self.th, self.height)
    }

    /// Verify `proof` for `key` against the committed root. `value` is `None`
    /// for a non-membership proof.
    pub fn verify(&self, proof: &CsmtProof, key: &K, value: Option<&V>) -> Result<bool, TreeError> {
        let path = self.key_path(key)?;
        let value_hash = value.map(|value| self.value_hash(value)).transpose()?;
        Ok(proof.verify(
            &self.th,
            self.height,
            &self.root,
            &path,
            value_hash.as_ref(),
        ))
    }

    /// Erases the store and resets the tree to the empty root.
    pub fn clear(&mut self) -> Result<(), TreeError> {
        self.store.clear()?;
        let root = self.th.placeholder();
        self.store.prepare_update_root(root);
        commit_or_discard(&mut self.store)?;
        self.root = root;
        Ok(())
    }

    fn do_prove(&self, key: &K, updatable: bool) -> Result<CsmtProof, TreeError> {
        let path = self.key_path(key)?;
        let branch = self.side_nodes_for_root(&path, self.root, updatable, &PendingNodes::new())?;
        // A different leaf in place of the path proves non-membership.
        let non_membership_leaf_data = match branch.leaf_data {
            Some(data) if self.th.parse_leaf(&data)?.0 != path => Some(data),
            _ => None,
        };
        Ok(CsmtProof {
            root: self.root,
            side_nodes: branch.side_nodes,
            non_membership_leaf_data,
            sibling_data: branch.sibling_data,
        })
    }

    fn get_node(
        &self,
        hash: &HashValue,
        pending: &PendingNodes,
    ) -> Result<Vec<HashValue>, TreeError> {
        match pending.get(hash) {
            Some(Some(data)) => Ok(data.clone()),
            Some(None) => Err(TreeError::NotFound(hash.to_hex())),
            None => Ok(self.store.get_nodes(&hash.to_hex())?),
        }
    }

    fn put_node(&mut self, hash: HashValue, data: Vec<HashValue>, pending: &mut PendingNodes) {
        self.store.prepare_put_nodes(&hash.to_hex(), data.clone());
        pending.insert(hash, Some(data));
    }

    fn del_node(&mut self, hash: HashValue, pending: &mut PendingNodes) {
        self.store.prepare_del_nodes(&hash.to_hex());
        pending.insert(hash, None);
    }

    fn side_nodes_for_root(
        &self,
        path: &HashValue,
        root: HashValue,
        with_sibling_data: bool,
        pending: &PendingNodes,
    ) -> Result<Branch, TreeError> {
        let mut branch = Branch {
            side_nodes: Vec::with_capacity(self.height),
            path_nodes: vec![root],
            leaf_data: None,
            sibling_data: None,
        };
        // If the root is a placeholder, there are no side nodes to return.
        if root == self.th.placeholder() {
            return Ok(branch);
        }
        let mut current = self.get_node(&root, pending)?;
        // If the root is a leaf, there are no side nodes either.
        if self.th.is_leaf(&current) {
            branch.leaf_data = Some(current);
            return Ok(branch);
        }
        let mut depth = 0;
        loop {
            if depth == self.height {
                return Err(TreeError::Storage(format!(
                    "no leaf below {root} within {} levels",
                    self.height
                )));
            }
            let (left, right) = self.th.parse_node(&current)?;
            let (next, sibling) = if bit_index(path, self.height, depth) == 1 {
                (right, left)
            } else {
                (left, right)
            };
            branch.side_nodes.push(sibling);
            branch.path_nodes.push(next);
            if next == self.th.placeholder() {
                break;
            }
            current = self.get_node(&next, pending)?;
            if self.th.is_leaf(&current) {
                branch.leaf_data = Some(current);
                break;
            }
            depth += 1;
        }
        if with_sibling_data {
            if let Some(sibling) = branch.side_nodes.last() {
                if *sibling != self.th.placeholder() {
                    branch.sibling_data = Some(self.get_node(sibling, pending)?);
                }
            }
        }
        branch.side_nodes.reverse();
        branch.path_nodes.reverse();
        Ok(branch)
    }

    fn update_for_root(
        &mut self,
        root: HashValue,
        key: &K,
        value: Option<&V>,
        pending: &mut PendingNodes,
    ) -> Result<HashValue, TreeError> {
        let path = self.key_path(key)?;
        let branch = self.side_nodes_for_root(&path, root, false, pending)?;
        match value {
            Some(value) => {
                let value_hash = self.value_hash(value)?;
                let new_root =
                    self.update_with_side_nodes(root, &path, value_hash, branch, pending)?;
                self.store.prepare_put_value(&path.to_hex(), value.to_fields());
                Ok(new_root)
            }
            None => match self.delete_with_side_nodes(&path, branch, pending)? {
                Some(new_root) => {
                    self.store.prepare_del_value(&path.to_hex());
                    Ok(new_root)
                }
                None => {
                    trace!(%path, "key already empty");
                    Ok(root)
                }
            },
        }
    }

    fn update_with_side_nodes(
        &mut self,
        root: HashValue,
        path: &HashValue,
        value_hash: HashValue,
        branch: Branch,
        pending: &mut PendingNodes,
    ) -> Result<HashValue, TreeError> {
        let height = self.height;
        let placeholder = self.th.placeholder();
        let old_leaf = branch.path_nodes[0];
        // Number of levels the new path shares with the leaf found in its place.
        let (common_prefix, old_value_hash) = if old_leaf == placeholder {
            (height, None)
        } else {
            let data = branch.leaf_data.as_ref().ok_or_else(|| {
                TreeError::Storage(format!("leaf {old_leaf} has no preimage"))
            })?;
            let (actual_path, old_value_hash) = self.th.parse_leaf(data)?;
            (
                count_common_prefix(path, &actual_path, height),
                Some(old_value_hash),
            )
        };
        if common_prefix == height && old_value_hash == Some(value_hash) {
            trace!(%path, "value unchanged");
            return Ok(root);
        }

        let (leaf_hash, leaf_data) = self.th.digest_leaf(*path, value_hash);
        self.put_node(leaf_hash, leaf_data, pending);
        let mut current = leaf_hash;

        if common_prefix != height {
            // The leaf in place moves down next to the new one.
            let (hash, data) = if bit_index(path, height, common_prefix) == 1 {
                self.th.digest_node(old_leaf, current)
            } else {
                self.th.digest_node(current, old_leaf)
            };
            self.put_node(hash, data, pending);
            current = hash;
        } else if old_value_hash.is_some() {
            self.del_node(old_leaf, pending);
        }
        // All remaining path nodes are orphaned
        for node in branch.path_nodes.iter().skip(1) {
            self.del_node(*node, pending);
        }

        let offset = height - branch.side_nodes.len();
        for i in 0..height {
            let side_node = if i < offset {
                // Below the old leaf depth only the split needs placeholder siblings.
                if common_prefix != height && common_prefix > height - 1 - i {
                    placeholder
                } else {
                    continue;
                }
            } else {
                branch.side_nodes[i - offset]
            };
            let (hash, data) = if bit_index(path, height, height - 1 - i) == 1 {
                self.th.digest_node(side_node, current)
            } else {
                self.th.digest_node(current, side_node)
            };
            self.put_node(hash, data, pending);
            current = hash;
        }
        trace!(%path, %current, "staged leaf update");
        Ok(current)
    }

    /// Returns `None` when the key is already empty.
    fn delete_with_side_nodes(
        &mut self,
        path: &HashValue,
        branch: Branch,
        pending: &mut PendingNodes,
    ) -> Result<Option<HashValue>, TreeError> {
        let placeholder = self.th.placeholder();
        if branch.path_nodes[0] == placeholder {
            return Ok(None);
        }
        let Some(leaf_data) = branch.leaf_data.as_ref() else {
            return Err(TreeError::Storage(format!(
                "leaf {} has no preimage",
                branch.path_nodes[0]
            )));
        };
        // A different key occupies the path.
        if self.th.parse_leaf(leaf_data)?.0 != *path {
            return Ok(None);
        }
        // All nodes above the deleted leaf are now orphaned
        for node in &branch.path_nodes {
            self.del_node(*node, pending);
        }

        let len = branch.side_nodes.len();
        let mut current: Option<HashValue> = None;
        let mut non_placeholder_reached = false;
        for (i, side_node) in branch.side_nodes.iter().enumerate() {
            let node = match current {
                Some(node) => node,
                None => {
                    let side_data = self.get_node(side_node, pending)?;
                    if self.th.is_leaf(&side_data) {
                        // The leaf sibling bubbles up the tree.
                        current = Some(*side_node);
                        continue;
                    }
                    // A node sibling stays in place.
                    non_placeholder_reached = true;
                    placeholder
                }
            };
            if !non_placeholder_reached {
                if *side_node == placeholder {
                    continue;
                }
                non_placeholder_reached = true;
            }
            let (hash, data) = if bit_index(path, self.height, len - 1 - i) == 1 {
                self.th.digest_node(*side_node, node)
            } else {
                self.th.digest_node(node, *side_node)
            };
            self.put_node(hash, data, pending);
            current = Some(hash);
        }
        Ok(Some(current.unwrap_or(placeholder)))
    }
}
