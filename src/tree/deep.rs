//! Deep subtrees: in-memory trees that only know the branches proven to them.
//!
//! A deep subtree starts from a bare root. Each [`add_branch`] call checks a
//! proof against that root and stores the nodes it recomputes, after which
//! the proven keys can be read and updated like in a full tree. Updating a
//! key whose branch was never added fails with [`TreeError::NotFound`].
//!
//! [`add_branch`]: DeepSparseMerkleSubTree::add_branch

use sha2::Sha256;
use tracing::debug;

use super::{commit_or_discard, CompactSparseMerkleTree, DefaultNodeCache, SparseMerkleTree};
use crate::{
    CsmtProof, FieldCodec, HashValue, Hasher, MemoryStore, SparseMerkleProof, Store, TreeError,
    TreeOptions,
};

fn rooted_store(root: HashValue) -> Result<MemoryStore, TreeError> {
    let mut store = MemoryStore::new();
    store.prepare_update_root(root);
    commit_or_discard(&mut store)?;
    Ok(store)
}

/// Deep subtree of a [`SparseMerkleTree`].
pub struct DeepSparseMerkleSubTree<K, V, H = Sha256> {
    tree: SparseMerkleTree<K, V, MemoryStore, H>,
}

impl<K: FieldCodec, V: FieldCodec, H: Hasher> DeepSparseMerkleSubTree<K, V, H> {
    pub fn new(
        hasher: H,
        cache: &DefaultNodeCache,
        height: usize,
        options: TreeOptions,
        root: HashValue,
    ) -> Result<Self, TreeError> {
        let store = rooted_store(root)?;
        Ok(Self {
            tree: SparseMerkleTree::import(store, hasher, cache, height, options)?
                .without_pruning(),
        })
    }

    /// Adds the branch of `key` proven by `proof`. `value` is `None` for a
    /// non-membership proof.
    pub fn add_branch(
        &mut self,
        proof: &SparseMerkleProof,
        key: &K,
        value: Option<&V>,
    ) -> Result<(), TreeError> {
        if proof.height() != self.tree.height() {
            return Err(TreeError::InvalidProofShape(format!(
                "proof of height {} for a subtree of height {}",
                proof.height(),
                self.tree.height()
            )));
        }
        let path = self.tree.key_path(key)?;
        self.tree
            .add_branch(&path, value, proof.side_nodes.nodes())?;
        debug!(%path, "added sparse merkle branch");
        Ok(())
    }

    /// Sets the value of a proven key. Returns the new root.
    pub fn update(&mut self, key: &K, value: Option<&V>) -> Result<HashValue, TreeError> {
        self.tree.update(key, value)
    }

    pub fn get(&self, key: &K) -> Result<Option<V>, TreeError> {
        self.tree.get(key)
    }

    pub fn has(&self, key: &K) -> Result<bool, TreeError> {
        self.tree.has(key)
    }

    pub fn root(&self) -> HashValue {
        self.tree.root()
    }

    pub fn prove(&self, key: &K) -> Result<SparseMerkleProof, TreeError> {
        self.tree.prove(key)
    }
}

/// Deep subtree of a [`CompactSparseMerkleTree`].
///
/// Proofs carrying sibling data let the subtree delete the proven key.
pub struct CompactDeepSparseMerkleSubTree<K, V, H = Sha256> {
    tree: CompactSparseMerkleTree<K, V, MemoryStore, H>,
}

impl<K: FieldCodec, V: FieldCodec, H: Hasher> CompactDeepSparseMerkleSubTree<K, V, H> {
    pub fn new(
        hasher: H,
        height: usize,
        options: TreeOptions,
        root: HashValue,
    ) -> Result<Self, TreeError> {
        let store = rooted_store(root)?;
        Ok(Self {
            tree: CompactSparseMerkleTree::import(store, hasher, height, options)?,
        })
    }

    /// Adds the branch of `key` proven by `proof`. `value` is `None` for a
    /// non-membership proof.
    pub fn add_branch(
        &mut self,
        proof: &CsmtProof,
        key: &K,
        value: Option<&V>,
    ) -> Result<(), TreeError> {
        let path = self.tree.key_path(key)?;
        let value_hash = value.map(|value| self.tree.value_hash(value)).transpose()?;
        let (valid, updates) = proof.verify_with_updates(
            self.tree.tree_hasher(),
            self.tree.height(),
            &self.tree.root(),
            &path,
            value_hash.as_ref(),
        );
        if !valid {
            return Err(TreeError::InvalidMerkleProof);
        }
        let store = self.tree.store_mut();
        for (hash, data) in updates {
            store.prepare_put_nodes(&hash.to_hex(), data);
        }
        if let Some(value) = value {
            store.prepare_put_value(&path.to_hex(), value.to_fields());
        }
        if let (Some(sibling), Some(data)) = (proof.side_nodes.first(), &proof.sibling_data) {
            store.prepare_put_nodes(&sibling.to_hex(), data.clone());
        }
        commit_or_discard(store)?;
        debug!(%path, "added compact sparse merkle branch");
        Ok(())
    }

    /// Sets the value of a proven key. Returns the new root.
    pub fn update(&mut self, key: &K, value: Option<&V>) -> Result<HashValue, TreeError> {
        self.tree.update(key, value)
    }

    pub fn delete(&mut self, key: &K) -> Result<HashValue, TreeError> {
        self.tree.delete(key)
    }

    pub fn get(&self, key: &K) -> Result<Option<V>, TreeError> {
        self.tree.get(key)
    }

    pub fn has(&self, key: &K) -> Result<bool, TreeError> {
        self.tree.has(key)
    }

    pub fn root(&self) -> HashValue {
        self.tree.root()
    }

    pub fn prove(&self, key: &K) -> Result<CsmtProof, TreeError> {
        self.tree.prove(key)
    }
}
