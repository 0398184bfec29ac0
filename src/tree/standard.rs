//! Append-only merkle tree addressed by leaf index

use std::{collections::BTreeMap, sync::Arc};

use sha2::Sha256;
use tracing::debug;

use super::{check_height, commit_or_discard, DefaultNodeCache, MerkleTree};
use crate::{HashValue, Hasher, MemoryStore, SiblingPath, Store, StoreError, TreeError};

/// Leaf indices are `u64`, so trees cannot be higher than this.
pub const MAX_STANDARD_HEIGHT: usize = 64;

/// Append-only merkle tree.
///
/// Nodes are stored one per record under `"{name}:{level}:{index}"`, level 0
/// being the root and level `height` the leaves. Nodes never written are the
/// default node of their level. The `"{name}"` record holds the committed
/// root, height and size.
///
/// Appended leaves stay in an in-memory cache until [`MerkleTree::commit`].
pub struct StandardTree<S = MemoryStore, H = Sha256> {
    store: S,
    hasher: H,
    name: String,
    defaults: Arc<[HashValue]>,
    root: HashValue,
    size: u64,
    cached_size: Option<u64>,
    cache: BTreeMap<String, HashValue>,
}

impl<S: Store, H: Hasher> StandardTree<S, H> {
    /// Creates an empty tree named `name` and persists its metadata.
    pub fn build(
        store: S,
        hasher: H,
        cache: &DefaultNodeCache,
        name: &str,
        height: usize,
    ) -> Result<Self, TreeError> {
        check_height(height, MAX_STANDARD_HEIGHT)?;
        let defaults = cache.get(&hasher, height);
        let mut tree = Self {
            store,
            hasher,
            name: name.to_string(),
            root: defaults[0],
            defaults,
            size: 0,
            cached_size: None,
            cache: BTreeMap::new(),
        };
        tree.store.clear_prepare_operation_cache();
        tree.stage_meta();
        commit_or_discard(&mut tree.store)?;
        debug!(name, height, "built standard tree");
        Ok(tree)
    }

    /// Loads the tree named `name` from its metadata record.
    pub fn import(
        store: S,
        hasher: H,
        cache: &DefaultNodeCache,
        name: &str,
    ) -> Result<Self, TreeError> {
        let meta = store.get_nodes(name)?;
        let [root, depth, size] = meta.as_slice() else {
            return Err(TreeError::Storage(format!(
                "metadata of {name} holds {} fields",
                meta.len()
            )));
        };
        let height = depth
            .to_u64()
            .and_then(|depth| usize::try_from(depth).ok())
            .ok_or_else(|| TreeError::Storage(format!("invalid height {depth} for {name}")))?;
        check_height(height, MAX_STANDARD_HEIGHT)?;
        let size = size
            .to_u64()
            .ok_or_else(|| TreeError::Storage(format!("invalid size {size} for {name}")))?;
        debug!(name, height, size, "imported standard tree");
        Ok(Self {
            defaults: cache.get(&hasher, height),
            store,
            hasher,
            name: name.to_string(),
            root: *root,
            size,
            cached_size: None,
            cache: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Default nodes, root first.
    pub fn default_nodes(&self) -> &[HashValue] {
        &self.defaults
    }

    /// Greatest leaf index of the tree, `2^height - 1`.
    pub fn max_index(&self) -> u64 {
        u64::MAX >> (MAX_STANDARD_HEIGHT - self.height())
    }

    /// Path from the root of the subtree of `subtree_height` levels holding
    /// the next free leaf up to the root.
    pub fn subtree_sibling_path(
        &self,
        subtree_height: usize,
        include_uncommitted: bool,
    ) -> Result<SiblingPath, TreeError> {
        let next_index = self.num_leaves(include_uncommitted);
        self.sibling_path(next_index, include_uncommitted)?
            .subtree_sibling_path(subtree_height)
    }

    /// Erases the store and resets the tree to the empty tree.
    pub fn clear(&mut self) -> Result<(), TreeError> {
        self.store.clear()?;
        self.cache.clear();
        self.cached_size = None;
        self.root = self.defaults[0];
        self.size = 0;
        self.stage_meta();
        commit_or_discard(&mut self.store)
    }

    pub(crate) fn node_key(&self, level: usize, index: u64) -> String {
        format!("{}:{}:{}", self.name, level, index)
    }

    pub(crate) fn leaf_key(&self, index: u64) -> String {
        format!("{}:leaf:{}", self.name, index)
    }

    fn check_index(&self, index: u64) -> Result<(), TreeError> {
        if index > self.max_index() {
            return Err(TreeError::IndexOutOfBounds {
                index,
                max_index: self.max_index(),
            });
        }
        Ok(())
    }

    fn stored_value_at(&self, level: usize, index: u64) -> Result<Option<HashValue>, TreeError> {
        let key = self.node_key(level, index);
        match self.store.get_nodes(&key) {
            Ok(record) => match record.as_slice() {
                [value] => Ok(Some(*value)),
                _ => Err(TreeError::Storage(format!(
                    "node {key} holds {} values",
                    record.len()
                ))),
            },
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Value of the node at `level` and `index`, the default node of the
    /// level if it was never written.
    pub(crate) fn latest_value_at(
        &self,
        level: usize,
        index: u64,
        include_uncommitted: bool,
    ) -> Result<HashValue, TreeError> {
        if include_uncommitted {
            if let Some(value) = self.cache.get(&self.node_key(level, index)) {
                return Ok(*value);
            }
        }
        Ok(self
            .stored_value_at(level, index)?
            .unwrap_or(self.defaults[level]))
    }

    fn add_leaf_to_cache_and_hash_to_root(
        &mut self,
        leaf: HashValue,
        index: u64,
    ) -> Result<(), TreeError> {
        let mut current = leaf;
        let mut index = index;
        self.cache.insert(self.node_key(self.height(), index), current);
        for level in (1..=self.height()).rev() {
            let sibling = self.latest_value_at(level, index ^ 1, true)?;
            current = if index & 1 == 1 {
                self.hasher.compress(&sibling, &current)
            } else {
                self.hasher.compress(&current, &sibling)
            };
            index >>= 1;
            self.cache.insert(self.node_key(level - 1, index), current);
        }
        Ok(())
    }

    /// Sets the leaf hash at `index`, growing the tree if needed.
    pub(crate) fn update_leaf_hash(
        &mut self,
        leaf: HashValue,
        index: u64,
    ) -> Result<(), TreeError> {
        self.check_index(index)?;
        self.add_leaf_to_cache_and_hash_to_root(leaf, index)?;
        if index >= self.num_leaves(true) {
            self.cached_size = Some(index.saturating_add(1));
        }
        Ok(())
    }

    /// Grows the tree by one empty leaf.
    pub(crate) fn append_empty_leaf(&mut self) -> Result<(), TreeError> {
        let index = self.num_leaves(true);
        self.check_index(index)?;
        self.cached_size = Some(index.saturating_add(1));
        Ok(())
    }

    fn stage_meta(&mut self) {
        let meta = vec![
            self.root,
            HashValue::from_u64(self.height() as u64),
            HashValue::from_u64(self.size),
        ];
        self.store.prepare_put_nodes(&self.name, meta);
        self.store.prepare_update_root(self.root);
    }
}

impl<S: Store, H: Hasher> MerkleTree for StandardTree<S, H> {
    fn height(&self) -> usize {
        self.defaults.len() - 1
    }

    fn root(&self, include_uncommitted: bool) -> HashValue {
        if include_uncommitted {
            if let Some(root) = self.cache.get(&self.node_key(0, 0)) {
                return *root;
            }
        }
        self.root
    }

    fn num_leaves(&self, include_uncommitted: bool) -> u64 {
        match (include_uncommitted, self.cached_size) {
            (true, Some(size)) => size,
            _ => self.size,
        }
    }

    fn leaf_value(
        &self,
        index: u64,
        include_uncommitted: bool,
    ) -> Result<Option<HashValue>, TreeError> {
        if include_uncommitted {
            if let Some(value) = self.cache.get(&self.node_key(self.height(), index)) {
                return Ok(Some(*value));
            }
        }
        self.stored_value_at(self.height(), index)
    }

    fn sibling_path(
        &self,
        index: u64,
        include_uncommitted: bool,
    ) -> Result<SiblingPath, TreeError> {
        self.check_index(index)?;
        let mut index = index;
        let mut nodes = Vec::with_capacity(self.height());
        for level in (1..=self.height()).rev() {
            nodes.push(self.latest_value_at(level, index ^ 1, include_uncommitted)?);
            index >>= 1;
        }
        SiblingPath::new(self.height(), nodes)
    }

    fn append_leaves(&mut self, leaves: &[HashValue]) -> Result<(), TreeError> {
        if leaves.is_empty() {
            return Ok(());
        }
        let num_leaves = self.num_leaves(true);
        let last = num_leaves as u128 + leaves.len() as u128 - 1;
        if last > self.max_index() as u128 {
            return Err(TreeError::IndexOutOfBounds {
                index: u64::try_from(last).unwrap_or(u64::MAX),
                max_index: self.max_index(),
            });
        }
        for (i, leaf) in leaves.iter().enumerate() {
            self.add_leaf_to_cache_and_hash_to_root(*leaf, num_leaves + i as u64)?;
        }
        self.cached_size = Some((last as u64).saturating_add(1));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TreeError> {
        let root = self.root(true);
        let size = self.num_leaves(true);
        for (key, value) in &self.cache {
            self.store.prepare_put_nodes(key, vec![*value]);
        }
        let (previous_root, previous_size) = (self.root, self.size);
        self.root = root;
        self.size = size;
        self.stage_meta();
        if let Err(err) = commit_or_discard(&mut self.store) {
            self.root = previous_root;
            self.size = previous_size;
            return Err(err);
        }
        debug!(
            name = %self.name,
            nodes = self.cache.len(),
            size,
            %root,
            "committed standard tree"
        );
        self.cache.clear();
        self.cached_size = None;
        Ok(())
    }

    fn rollback(&mut self) {
        self.cache.clear();
        self.cached_size = None;
        self.store.clear_prepare_operation_cache();
    }
}
