//! Sparse merkle tree implementation

use std::{collections::HashMap, marker::PhantomData, sync::Arc};

use sha2::Sha256;
use tracing::{debug, trace};

use super::{check_height, commit_or_discard, walk_up, DefaultNodeCache};
use crate::{
    bit_index, FieldCodec, HashValue, Hasher, MemoryStore, SiblingPath, SparseMerkleProof,
    CompactSparseMerkleProof, Store, StoreError, TreeError, TreeOptions, HASH_SIZE,
};

/// Height used when a sparse merkle tree has no reason to use another one.
pub const SMT_DEFAULT_HEIGHT: usize = 254;

/// Stored node: its children and the number of parents (or the root
/// record) referring to it. Equal subtrees under different paths share one
/// record, so a node is only deleted once nothing refers to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeRecord {
    children: [HashValue; 2],
    refs: u64,
}

impl NodeRecord {
    fn decode(node: &HashValue, fields: &[HashValue]) -> Result<Self, TreeError> {
        match fields {
            [left, right, refs] => Ok(Self {
                children: [*left, *right],
                refs: refs.to_u64().ok_or_else(|| {
                    TreeError::Storage(format!("node {node} has a malformed reference count"))
                })?,
            }),
            other => Err(TreeError::Storage(format!(
                "node {node} holds {} fields",
                other.len()
            ))),
        }
    }

    fn encode(&self) -> Vec<HashValue> {
        vec![
            self.children[0],
            self.children[1],
            HashValue::from_u64(self.refs),
        ]
    }
}

/// Node records changed during a batch of updates and not committed yet. A
/// record without references is staged for deletion.
type PendingNodes = HashMap<HashValue, NodeRecord>;

/// Sparse merkle tree of fixed height.
/// * `K` - key type, mapped to a leaf path through its field encoding.
/// * `V` - value type, mapped to a leaf hash through its field encoding.
/// * `S` - store for nodes and values.
/// * `H` - Hasher that will be used to hash nodes.
///
/// Every possible path is a leaf; empty leaves are `HashValue::ZERO` and
/// empty subtrees are the default nodes of the tree height. Nodes are stored
/// under the hex encoding of their hash as `[left, right, refs]`, values
/// under the hex encoding of their path.
pub struct SparseMerkleTree<K, V, S = MemoryStore, H = Sha256> {
    store: S,
    hasher: H,
    options: TreeOptions,
    defaults: Arc<[HashValue]>,
    root: HashValue,
    prune: bool,
    _phantom: PhantomData<(K, V)>,
}

impl<K: FieldCodec, V: FieldCodec, S: Store, H: Hasher> SparseMerkleTree<K, V, S, H> {
    /// Creates an empty tree and writes its root to the store.
    pub fn build(
        mut store: S,
        hasher: H,
        cache: &DefaultNodeCache,
        height: usize,
        options: TreeOptions,
    ) -> Result<Self, TreeError> {
        check_height(height, HASH_SIZE * 8)?;
        let defaults = cache.get(&hasher, height);
        let root = defaults[0];
        store.clear_prepare_operation_cache();
        store.prepare_update_root(root);
        commit_or_discard(&mut store)?;
        debug!(height, %root, "built sparse merkle tree");
        Ok(Self {
            store,
            hasher,
            options,
            defaults,
            root,
            prune: true,
            _phantom: PhantomData,
        })
    }

    /// Loads a tree from the root committed in the store.
    pub fn import(
        store: S,
        hasher: H,
        cache: &DefaultNodeCache,
        height: usize,
        options: TreeOptions,
    ) -> Result<Self, TreeError> {
        check_height(height, HASH_SIZE * 8)?;
        let defaults = cache.get(&hasher, height);
        let root = store.get_root()?;
        debug!(height, %root, "imported sparse merkle tree");
        Ok(Self {
            store,
            hasher,
            options,
            defaults,
            root,
            prune: true,
            _phantom: PhantomData,
        })
    }

    /// Keeps superseded nodes. A tree holding only some branches does not
    /// know every reference to a node and cannot tell when it is unused.
    pub(crate) fn without_pruning(mut self) -> Self {
        self.prune = false;
        self
    }

    /// Committed root of the tree.
    pub fn root(&self) -> HashValue {
        self.root
    }

    pub fn height(&self) -> usize {
        self.defaults.len() - 1
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Default nodes of the tree height, root first.
    pub fn default_nodes(&self) -> &[HashValue] {
        &self.defaults
    }

    /// Path of the leaf holding `key`.
    pub fn key_path(&self, key: &K) -> Result<HashValue, TreeError> {
        Ok(self
            .options
            .key_path(&self.hasher, key)?
            .truncate(self.height()))
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
        let root = match self.stage_updates(entries) {
            Ok(root) => root,
            Err(err) => {
                self.store.clear_prepare_operation_cache();
                return Err(err);
            }
        };
        self.store.prepare_update_root(root);
        commit_or_discard(&mut self.store)?;
        debug!(%root, "committed sparse merkle tree update");
        self.root = root;
        Ok(root)
    }

    pub fn delete(&mut self, key: &K) -> Result<HashValue, TreeError> {
        self.update(key, None)
    }

    /// Membership or non-membership proof of `key` against the committed
    /// root.
    pub fn prove(&self, key: &K) -> Result<SparseMerkleProof, TreeError> {
        let path = self.key_path(key)?;
        let (side_nodes, _) = self.side_nodes_for_root(&path, self.root, &PendingNodes::new())?;
        Ok(SparseMerkleProof::new(
            self.root,
            SiblingPath::new(self.height(), side_nodes)?,
        ))
    }

    pub fn prove_compact(&self, key: &K) -> Result<CompactSparseMerkleProof, TreeError> {
        self.prove(key)?.compact(&self.defaults)
    }

    /// Verify `proof` for `key` against the committed root. `value` is `None`
    /// for a non-membership proof.
    pub fn verify(
        &self,
        proof: &SparseMerkleProof,
        key: &K,
        value: Option<&V>,
    ) -> Result<bool, TreeError> {
        if proof.height() != self.height() {
            return Err(TreeError::InvalidProofShape(format!(
                "proof of height {} for a tree of height {}",
                proof.height(),
                self.height()
            )));
        }
        let path = self.key_path(key)?;
        let leaf = self.leaf_hash(value)?;
        Ok(crate::verify_proof(
            &self.hasher,
            proof,
            &self.root,
            &path,
            &leaf,
        ))
    }

    /// Erases the store and resets the tree to the empty root.
    pub fn clear(&mut self) -> Result<(), TreeError> {
        self.store.clear()?;
        let root = self.defaults[0];
        self.store.prepare_update_root(root);
        commit_or_discard(&mut self.store)?;
        self.root = root;
        Ok(())
    }

    fn leaf_hash(&self, value: Option<&V>) -> Result<HashValue, TreeError> {
        match value {
            Some(value) => self.options.value_hash(&self.hasher, value),
            None => Ok(HashValue::ZERO),
        }
    }

    /// Stores the nodes of the branch of `path` proven by `side_nodes`
    /// against the committed root. Nodes already stored are left alone.
    pub(crate) fn add_branch(
        &mut self,
        path: &HashValue,
        value: Option<&V>,
        side_nodes: &[HashValue],
    ) -> Result<(), TreeError> {
        let leaf = self.leaf_hash(value)?;
        let mut branch = Vec::with_capacity(side_nodes.len());
        let root = walk_up(
            &self.hasher,
            path,
            leaf,
            side_nodes,
            |depth, left, right, parent| branch.push((depth, *parent, [*left, *right])),
        );
        if root != self.root {
            return Err(TreeError::InvalidMerkleProof);
        }
        let mut pending = PendingNodes::new();
        // Root first: a new node is referred to by its parent.
        for (depth, node, children) in branch.into_iter().rev() {
            if !self.stores_node(&node, depth) || self.record(&node, &pending)?.is_some() {
                continue;
            }
            pending.insert(node, NodeRecord { children, refs: 1 });
        }
        self.stage_nodes(pending);
        if let Some(value) = value.filter(|_| !leaf.is_zero()) {
            self.store.prepare_put_value(&path.to_hex(), value.to_fields());
        }
        commit_or_discard(&mut self.store)
    }

    fn stage_updates<'a, I>(&mut self, entries: I) -> Result<HashValue, TreeError>
    where
        I: IntoIterator<Item = (&'a K, Option<&'a V>)>,
        K: 'a,
        V: 'a,
    {
        let mut pending = PendingNodes::new();
        let mut root = self.root;
        for (key, value) in entries {
            let path = self.key_path(key)?;
            root = self.update_for_root(root, &path, value, &mut pending)?;
        }
        self.stage_nodes(pending);
        Ok(root)
    }

    fn stage_nodes(&mut self, pending: PendingNodes) {
        for (node, record) in pending {
            if record.refs == 0 {
                self.store.prepare_del_nodes(&node.to_hex());
            } else {
                self.store.prepare_put_nodes(&node.to_hex(), record.encode());
            }
        }
    }

    /// Leaves and empty subtrees have no record.
    fn stores_node(&self, node: &HashValue, depth: usize) -> bool {
        depth < self.height() && *node != self.defaults[depth]
    }

    fn record(
        &self,
        node: &HashValue,
        pending: &PendingNodes,
    ) -> Result<Option<NodeRecord>, TreeError> {
        if let Some(record) = pending.get(node) {
            return Ok(Some(*record).filter(|record| record.refs > 0));
        }
        match self.store.get_nodes(&node.to_hex()) {
            Ok(fields) => Ok(Some(NodeRecord::decode(node, &fields)?)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn children(
        &self,
        node: &HashValue,
        pending: &PendingNodes,
    ) -> Result<(HashValue, HashValue), TreeError> {
        match self.record(node, pending)? {
            Some(NodeRecord {
                children: [left, right],
                ..
            }) => Ok((left, right)),
            None => Err(TreeError::NotFound(format!("node {node}"))),
        }
    }

    /// Adds a reference to `node`. A node without a record is created from
    /// `created` and refers to its children in turn; nodes missing from both
    /// are subtrees this tree only knows by hash.
    fn acquire(
        &self,
        node: &HashValue,
        depth: usize,
        created: &HashMap<HashValue, [HashValue; 2]>,
        pending: &mut PendingNodes,
    ) -> Result<(), TreeError> {
        if !self.stores_node(node, depth) {
            return Ok(());
        }
        if let Some(mut record) = self.record(node, pending)? {
            record.refs += 1;
            pending.insert(*node, record);
            return Ok(());
        }
        let Some(children) = created.get(node) else {
            return Ok(());
        };
        pending.insert(
            *node,
            NodeRecord {
                children: *children,
                refs: 1,
            },
        );
        for child in children {
            self.acquire(child, depth + 1, created, pending)?;
        }
        Ok(())
    }

    /// Drops a reference to `node`, deleting it and releasing its children
    /// once nothing refers to it.
    fn release(
        &self,
        node: &HashValue,
        depth: usize,
        pending: &mut PendingNodes,
    ) -> Result<(), TreeError> {
        if !self.prune || !self.stores_node(node, depth) {
            return Ok(());
        }
        let Some(mut record) = self.record(node, pending)? else {
            return Ok(());
        };
        record.refs = record.refs.saturating_sub(1);
        pending.insert(*node, record);
        if record.refs == 0 {
            for child in &record.children {
                self.release(child, depth + 1, pending)?;
            }
        }
        Ok(())
    }

    /// Walks down from `root` along `path`. Returns the side nodes and the
    /// nodes on the path, both leaf first: the first path node is the leaf.
    fn side_nodes_for_root(
        &self,
        path: &HashValue,
        root: HashValue,
        pending: &PendingNodes,
    ) -> Result<(Vec<HashValue>, Vec<HashValue>), TreeError> {
        let height = self.height();
        let mut side_nodes = Vec::with_capacity(height);
        let mut path_nodes = Vec::with_capacity(height + 1);
        let mut current = root;
        for depth in 0..height {
            path_nodes.push(current);
            // Empty subtrees are never stored.
            let (left, right) = if current == self.defaults[depth] {
                (self.defaults[depth + 1], self.defaults[depth + 1])
            } else {
                self.children(&current, pending)?
            };
            let (next, sibling) = if bit_index(path, height, depth) == 1 {
                (right, left)
            } else {
                (left, right)
            };
            side_nodes.push(sibling);
            current = next;
        }
        path_nodes.push(current);
        side_nodes.reverse();
        path_nodes.reverse();
        Ok((side_nodes, path_nodes))
    }

    fn update_for_root(
        &mut self,
        root: HashValue,
        path: &HashValue,
        value: Option<&V>,
        pending: &mut PendingNodes,
    ) -> Result<HashValue, TreeError> {
        let (side_nodes, path_nodes) = self.side_nodes_for_root(path, root, pending)?;
        let leaf = self.leaf_hash(value)?;
        if leaf == path_nodes[0] {
            trace!(%path, "leaf unchanged");
            return Ok(root);
        }
        let mut created = HashMap::new();
        let new_root = walk_up(
            &self.hasher,
            path,
            leaf,
            &side_nodes,
            |_, left, right, parent| {
                created.insert(*parent, [*left, *right]);
            },
        );
        // Shared nodes must gain their new reference before the old path
        // lets go of them.
        self.acquire(&new_root, 0, &created, pending)?;
        self.release(&root, 0, pending)?;
        match value {
            Some(value) if !leaf.is_zero() => {
                self.store.prepare_put_value(&path.to_hex(), value.to_fields())
            }
            _ => self.store.prepare_del_value(&path.to_hex()),
        }
        trace!(%path, %new_root, "staged leaf update");
        Ok(new_root)
    }
}
