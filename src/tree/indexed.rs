//! Indexed merkle tree: an append-only tree whose leaves form a linked list
//! sorted by value, so that absence of a value is proven by the leaf that
//! precedes it.

use std::collections::BTreeMap;

use sha2::Sha256;
use tracing::{debug, trace, warn};

use super::{DefaultNodeCache, IndexedTree, MerkleTree, StandardTree};
use crate::{
    FieldCodec, HashValue, Hasher, LinkedLeaf, LowLeafWitness, MemoryStore, SiblingPath, Store,
    StoreError, TreeError,
};

/// Outcome of [`IndexedTree::batch_insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInsertion {
    /// One witness per inserted value, in input order. Zeros, values already
    /// present and values whose low leaf belongs to the batch itself get an
    /// empty witness. `None` when a low leaf could not be found.
    pub low_leaf_witnesses: Option<Vec<LowLeafWitness>>,
    /// Path from the root of the subtree receiving the new leaves to the root.
    pub new_subtree_sibling_path: SiblingPath,
}

/// [`StandardTree`] holding [`LinkedLeaf`] hashes.
///
/// Leaf 0 always holds the sentinel `(0, 0, 0)`, the head of the list.
/// Leaf contents are persisted in the values namespace under
/// `"{name}:leaf:{index}"` and mirrored in memory.
pub struct StandardIndexedTree<S = MemoryStore, H = Sha256> {
    tree: StandardTree<S, H>,
    leaves: BTreeMap<u64, LinkedLeaf>,
    cached_leaves: BTreeMap<u64, LinkedLeaf>,
}

impl<S: Store, H: Hasher> StandardIndexedTree<S, H> {
    /// Creates a tree prefilled with `prefilled_size` linked leaves, leaf `i`
    /// holding value `i`. A size of 1 leaves only the sentinel.
    pub fn build(
        store: S,
        hasher: H,
        cache: &DefaultNodeCache,
        name: &str,
        height: usize,
        prefilled_size: u64,
    ) -> Result<Self, TreeError> {
        if prefilled_size == 0 {
            return Err(TreeError::InvalidArgument(
                "an indexed tree needs at least the sentinel leaf".to_string(),
            ));
        }
        let mut tree = Self {
            tree: StandardTree::build(store, hasher, cache, name, height)?,
            leaves: BTreeMap::new(),
            cached_leaves: BTreeMap::new(),
        };
        for index in 0..prefilled_size {
            let leaf = if index + 1 == prefilled_size {
                LinkedLeaf::new(HashValue::from_u64(index), 0, HashValue::ZERO)
            } else {
                LinkedLeaf::new(
                    HashValue::from_u64(index),
                    index + 1,
                    HashValue::from_u64(index + 1),
                )
            };
            tree.set_leaf(index, leaf)?;
        }
        tree.commit()?;
        Ok(tree)
    }

    /// Loads the tree named `name` and its leaf records.
    pub fn import(
        store: S,
        hasher: H,
        cache: &DefaultNodeCache,
        name: &str,
    ) -> Result<Self, TreeError> {
        let tree = StandardTree::import(store, hasher, cache, name)?;
        let mut leaves = BTreeMap::new();
        for index in 0..tree.num_leaves(false) {
            match tree.store().get_value(&tree.leaf_key(index)) {
                Ok(fields) => {
                    leaves.insert(index, LinkedLeaf::from_fields(&fields)?);
                }
                Err(StoreError::NotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        debug!(name, leaves = leaves.len(), "imported indexed tree");
        Ok(Self {
            tree,
            leaves,
            cached_leaves: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        self.tree.name()
    }

    pub fn hasher(&self) -> &H {
        self.tree.hasher()
    }

    pub fn store(&self) -> &S {
        self.tree.store()
    }

    /// Path from the subtree of `subtree_height` levels holding the next free
    /// leaf up to the root.
    pub fn subtree_sibling_path(
        &self,
        subtree_height: usize,
        include_uncommitted: bool,
    ) -> Result<SiblingPath, TreeError> {
        self.tree
            .subtree_sibling_path(subtree_height, include_uncommitted)
    }

    /// Inserts `value` at the next free index and links it after its low
    /// leaf. Zero only grows the tree by an empty leaf; values already in the
    /// tree are left alone.
    pub fn append_leaf(&mut self, value: HashValue) -> Result<(), TreeError> {
        if value.is_zero() {
            return self.tree.append_empty_leaf();
        }
        let (low_index, present) = self.find_index_of_previous_value(&value, true);
        if present {
            return Ok(());
        }
        let index = self.num_leaves(true);
        let low_leaf = self
            .latest_leaf_data_copy(low_index, true)
            .ok_or_else(|| TreeError::NotFound(format!("low leaf {low_index} of {value}")))?;
        let new_leaf = LinkedLeaf::new(value, low_leaf.next_index, low_leaf.next_value);
        // Bound check before touching the low leaf.
        self.set_leaf(index, new_leaf)?;
        self.set_leaf(low_index, LinkedLeaf::new(low_leaf.value, index, value))
    }

    /// Witness proving that `value` is absent from the committed tree.
    pub fn low_leaf_witness(&self, value: &HashValue) -> Result<LowLeafWitness, TreeError> {
        let (index, present) = self.find_index_of_previous_value(value, false);
        if present {
            return Err(TreeError::InvalidArgument(format!(
                "{value} is in the tree"
            )));
        }
        let leaf = self
            .latest_leaf_data_copy(index, false)
            .ok_or_else(|| TreeError::NotFound(format!("low leaf {index} of {value}")))?;
        Ok(LowLeafWitness {
            leaf,
            index,
            sibling_path: self.sibling_path(index, false)?,
        })
    }

    /// Erases the store and the in-memory leaves.
    pub fn clear(&mut self) -> Result<(), TreeError> {
        self.leaves.clear();
        self.cached_leaves.clear();
        self.tree.clear()
    }

    fn set_leaf(&mut self, index: u64, leaf: LinkedLeaf) -> Result<(), TreeError> {
        self.tree
            .update_leaf_hash(leaf.hash(self.tree.hasher()), index)?;
        self.cached_leaves.insert(index, leaf);
        Ok(())
    }
}

impl<S: Store, H: Hasher> MerkleTree for StandardIndexedTree<S, H> {
    fn height(&self) -> usize {
        self.tree.height()
    }

    fn root(&self, include_uncommitted: bool) -> HashValue {
        self.tree.root(include_uncommitted)
    }

    fn num_leaves(&self, include_uncommitted: bool) -> u64 {
        self.tree.num_leaves(include_uncommitted)
    }

    fn leaf_value(
        &self,
        index: u64,
        include_uncommitted: bool,
    ) -> Result<Option<HashValue>, TreeError> {
        self.tree.leaf_value(index, include_uncommitted)
    }

    fn sibling_path(
        &self,
        index: u64,
        include_uncommitted: bool,
    ) -> Result<SiblingPath, TreeError> {
        self.tree.sibling_path(index, include_uncommitted)
    }

    /// Inserts every value in turn with [`StandardIndexedTree::append_leaf`].
    fn append_leaves(&mut self, values: &[HashValue]) -> Result<(), TreeError> {
        for value in values {
            self.append_leaf(*value)?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TreeError> {
        for (index, leaf) in &self.cached_leaves {
            let key = self.tree.leaf_key(*index);
            self.tree.store_mut().prepare_put_value(&key, leaf.to_fields());
        }
        self.tree.commit()?;
        self.leaves.append(&mut self.cached_leaves);
        Ok(())
    }

    fn rollback(&mut self) {
        self.cached_leaves.clear();
        self.tree.rollback();
    }
}

impl<S: Store, H: Hasher> IndexedTree for StandardIndexedTree<S, H> {
    fn find_index_of_previous_value(
        &self,
        value: &HashValue,
        include_uncommitted: bool,
    ) -> (u64, bool) {
        let mut best = (0, HashValue::ZERO);
        for index in 0..self.num_leaves(include_uncommitted) {
            let stored = self
                .latest_leaf_data_copy(index, include_uncommitted)
                .map(|leaf| leaf.value)
                .unwrap_or(HashValue::ZERO);
            if stored == *value {
                return (index, true);
            }
            // Tightest lower bound wins, the lowest index on ties.
            if stored < *value && stored > best.1 {
                best = (index, stored);
            }
        }
        (best.0, false)
    }

    fn latest_leaf_data_copy(&self, index: u64, include_uncommitted: bool) -> Option<LinkedLeaf> {
        if include_uncommitted {
            if let Some(leaf) = self.cached_leaves.get(&index) {
                return Some(*leaf);
            }
        }
        self.leaves.get(&index).copied()
    }

    fn batch_insert(
        &mut self,
        values: &[HashValue],
        subtree_height: usize,
    ) -> Result<BatchInsertion, TreeError> {
        if subtree_height > self.height() {
            return Err(TreeError::InvalidArgument(format!(
                "subtree height {subtree_height} exceeds tree height {}",
                self.height()
            )));
        }
        let max = 1usize
            .checked_shl(subtree_height as u32)
            .unwrap_or(usize::MAX);
        if values.len() > max {
            return Err(TreeError::BatchTooLarge {
                len: values.len(),
                max,
            });
        }
        let start_index = self.num_leaves(true);
        if let Some(last) = values.len().checked_sub(1) {
            let last = start_index as u128 + last as u128;
            if last > self.tree.max_index() as u128 {
                return Err(TreeError::IndexOutOfBounds {
                    index: u64::try_from(last).unwrap_or(u64::MAX),
                    max_index: self.tree.max_index(),
                });
            }
        }

        let empty_witness = LowLeafWitness::empty(self.height());
        let mut witnesses = Vec::with_capacity(values.len());
        let mut touched: BTreeMap<u64, Vec<HashValue>> = BTreeMap::new();
        let mut pending: Vec<LinkedLeaf> = Vec::with_capacity(values.len());
        let mut predecessor_missing = false;

        for (position, value) in values.iter().enumerate() {
            let new_index = start_index + position as u64;
            if value.is_zero() {
                trace!(position, "zero value, empty leaf");
                pending.push(LinkedLeaf::default());
                witnesses.push(empty_witness.clone());
                continue;
            }

            let (low_index, present) = self.find_index_of_previous_value(value, true);
            if present || pending.iter().any(|leaf| leaf.value == *value) {
                trace!(%value, position, "value already present, empty leaf");
                pending.push(LinkedLeaf::default());
                witnesses.push(empty_witness.clone());
                continue;
            }
            let low_claimed = touched
                .get(&low_index)
                .is_some_and(|claimed| claimed.iter().any(|v| v < value));

            if low_claimed {
                // The low leaf is one of the pending leaves of this batch.
                let Some(pending_low) = pending
                    .iter()
                    .position(|leaf| *leaf != LinkedLeaf::default() && leaf.brackets(value))
                else {
                    warn!(%value, position, "no pending low leaf for batch value");
                    predecessor_missing = true;
                    break;
                };
                let low = pending[pending_low];
                trace!(
                    %value,
                    low_index = start_index + pending_low as u64,
                    "linking after pending leaf"
                );
                pending[pending_low] = LinkedLeaf::new(low.value, new_index, *value);
                pending.push(LinkedLeaf::new(*value, low.next_index, low.next_value));
                witnesses.push(empty_witness.clone());
                continue;
            }

            let Some(low_leaf) = self.latest_leaf_data_copy(low_index, true) else {
                warn!(%value, low_index, "low leaf not found for batch value");
                predecessor_missing = true;
                break;
            };
            touched.entry(low_index).or_default().push(*value);
            trace!(%value, low_index, "linking after tree leaf");
            witnesses.push(LowLeafWitness {
                leaf: low_leaf,
                index: low_index,
                sibling_path: self.sibling_path(low_index, true)?,
            });
            self.set_leaf(low_index, LinkedLeaf::new(low_leaf.value, new_index, *value))?;
            pending.push(LinkedLeaf::new(*value, low_leaf.next_index, low_leaf.next_value));
        }

        let new_subtree_sibling_path = self.subtree_sibling_path(subtree_height, true)?;
        if predecessor_missing {
            return Ok(BatchInsertion {
                low_leaf_witnesses: None,
                new_subtree_sibling_path,
            });
        }

        for (position, leaf) in pending.into_iter().enumerate() {
            if leaf == LinkedLeaf::default() {
                self.tree.append_empty_leaf()?;
            } else {
                self.set_leaf(start_index + position as u64, leaf)?;
            }
        }
        debug!(
            name = self.name(),
            values = values.len(),
            start_index,
            root = %self.root(true),
            "batch inserted"
        );
        Ok(BatchInsertion {
            low_leaf_witnesses: Some(witnesses),
            new_subtree_sibling_path,
        })
    }
}

#[cfg(test)]
mod test {
    use sha2::Sha256;

    use super::StandardIndexedTree;
    use crate::{
        DefaultNodeCache, HashValue, IndexedTree, LinkedLeaf, MemoryStore, MerkleTree,
        StandardTree, TreeError,
    };

    fn v(value: u64) -> HashValue {
        HashValue::from_u64(value)
    }

    fn leaf(value: u64, next_index: u64, next_value: u64) -> LinkedLeaf {
        LinkedLeaf::new(v(value), next_index, v(next_value))
    }

    /// Tree holding 0, 5, 10 and 15 at indices 0, 2, 3 and 4.
    fn tree() -> StandardIndexedTree {
        let mut tree = StandardIndexedTree::build(
            MemoryStore::new(),
            Sha256::default(),
            &DefaultNodeCache::new(),
            "indexed",
            8,
            1,
        )
        .unwrap();
        tree.append_leaves(&[v(0), v(5), v(10), v(15)]).unwrap();
        tree.commit().unwrap();
        tree
    }

    fn list(tree: &StandardIndexedTree) -> Vec<u64> {
        let mut values = Vec::new();
        let mut current = tree.latest_leaf_data_copy(0, true).unwrap();
        while !current.next_value.is_zero() {
            values.push(current.next_value.to_u64().unwrap());
            current = tree.latest_leaf_data_copy(current.next_index, true).unwrap();
        }
        values
    }

    #[test]
    fn test_build_prefilled() {
        let tree = StandardIndexedTree::build(
            MemoryStore::new(),
            Sha256::default(),
            &DefaultNodeCache::new(),
            "indexed",
            4,
            3,
        )
        .unwrap();
        assert_eq!(tree.num_leaves(false), 3);
        assert_eq!(tree.latest_leaf_data_copy(0, false), Some(leaf(0, 1, 1)));
        assert_eq!(tree.latest_leaf_data_copy(1, false), Some(leaf(1, 2, 2)));
        assert_eq!(tree.latest_leaf_data_copy(2, false), Some(leaf(2, 0, 0)));

        assert!(matches!(
            StandardIndexedTree::build(
                MemoryStore::new(),
                Sha256::default(),
                &DefaultNodeCache::new(),
                "indexed",
                4,
                0,
            ),
            Err(TreeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_append_leaf_links_values() {
        let tree = tree();
        assert_eq!(tree.num_leaves(false), 5);
        assert_eq!(tree.latest_leaf_data_copy(0, false), Some(leaf(0, 2, 5)));
        assert_eq!(tree.latest_leaf_data_copy(1, false), None);
        assert_eq!(tree.latest_leaf_data_copy(4, false), Some(leaf(15, 0, 0)));
        assert_eq!(list(&tree), vec![5, 10, 15]);
    }

    #[test]
    fn test_find_index_of_previous_value() {
        let tree = tree();
        assert_eq!(tree.find_index_of_previous_value(&v(10), false), (3, true));
        assert_eq!(tree.find_index_of_previous_value(&v(7), false), (2, false));
        assert_eq!(tree.find_index_of_previous_value(&v(3), false), (0, false));
        assert_eq!(tree.find_index_of_previous_value(&v(99), false), (4, false));
    }

    #[test]
    fn test_append_present_value_is_noop() {
        let mut tree = tree();
        let root = tree.root(true);
        tree.append_leaf(v(10)).unwrap();
        assert_eq!(tree.root(true), root);
        assert_eq!(tree.num_leaves(true), 5);
    }

    #[test]
    fn test_batch_insert_with_pending_low_leaves() {
        let mut tree = tree();
        let insertion = tree.batch_insert(&[v(2), v(3), v(20), v(19)], 2).unwrap();
        let witnesses = insertion.low_leaf_witnesses.unwrap();
        assert_eq!(witnesses.len(), 4);
        assert_eq!(witnesses[0].index, 0);
        assert_eq!(witnesses[0].leaf, leaf(0, 2, 5));
        assert!(witnesses[1].is_empty());
        assert_eq!(witnesses[2].index, 4);
        assert_eq!(witnesses[2].leaf, leaf(15, 0, 0));
        assert_eq!(witnesses[3].index, 4);
        assert_eq!(witnesses[3].leaf, leaf(15, 7, 20));
        assert_eq!(insertion.new_subtree_sibling_path.height(), 6);

        assert_eq!(tree.latest_leaf_data_copy(0, true), Some(leaf(0, 5, 2)));
        assert_eq!(tree.latest_leaf_data_copy(4, true), Some(leaf(15, 8, 19)));
        assert_eq!(tree.latest_leaf_data_copy(5, true), Some(leaf(2, 6, 3)));
        assert_eq!(tree.latest_leaf_data_copy(6, true), Some(leaf(3, 2, 5)));
        assert_eq!(tree.latest_leaf_data_copy(7, true), Some(leaf(20, 0, 0)));
        assert_eq!(tree.latest_leaf_data_copy(8, true), Some(leaf(19, 7, 20)));
        assert_eq!(list(&tree), vec![2, 3, 5, 10, 15, 19, 20]);
        assert_eq!(tree.num_leaves(true), 9);
    }

    #[test]
    fn test_batch_matches_sequential_inserts() {
        let mut batched = tree();
        let mut sequential = tree();
        let insertion = batched.batch_insert(&[v(2), v(20)], 1).unwrap();
        sequential.append_leaf(v(2)).unwrap();
        sequential.append_leaf(v(20)).unwrap();
        assert_eq!(batched.root(true), sequential.root(true));
        assert_eq!(list(&batched), list(&sequential));

        // Witnesses prove the low leaves against the intermediate roots.
        let witnesses = insertion.low_leaf_witnesses.unwrap();
        let committed = tree();
        assert!(witnesses[0].verify_membership(committed.hasher(), &committed.root(false)));
    }

    #[test]
    fn test_batch_insert_zero_and_commit() {
        let mut tree = tree();
        let insertion = tree.batch_insert(&[v(7), v(0)], 1).unwrap();
        let witnesses = insertion.low_leaf_witnesses.unwrap();
        assert!(witnesses[1].is_empty());
        assert_eq!(tree.num_leaves(true), 7);
        assert_eq!(tree.leaf_value(6, true).unwrap(), None);
        tree.commit().unwrap();

        let imported = StandardIndexedTree::import(
            tree.store().clone(),
            Sha256::default(),
            &DefaultNodeCache::new(),
            "indexed",
        )
        .unwrap();
        assert_eq!(imported.root(false), tree.root(false));
        assert_eq!(imported.num_leaves(false), 7);
        assert_eq!(list(&imported), vec![5, 7, 10, 15]);
    }

    #[test]
    fn test_batch_insert_zero_before_shared_low_leaf() {
        let mut batched = tree();
        let insertion = batched.batch_insert(&[v(0), v(2), v(3)], 2).unwrap();
        let witnesses = insertion.low_leaf_witnesses.unwrap();
        assert!(witnesses[0].is_empty());
        assert_eq!(witnesses[1].index, 0);
        assert!(witnesses[2].is_empty());

        assert_eq!(batched.leaf_value(5, true).unwrap(), None);
        assert_eq!(batched.latest_leaf_data_copy(5, true), None);
        assert_eq!(batched.latest_leaf_data_copy(0, true), Some(leaf(0, 6, 2)));
        assert_eq!(batched.latest_leaf_data_copy(6, true), Some(leaf(2, 7, 3)));
        assert_eq!(batched.latest_leaf_data_copy(7, true), Some(leaf(3, 2, 5)));
        assert_eq!(list(&batched), vec![2, 3, 5, 10, 15]);
        assert_eq!(batched.num_leaves(true), 8);

        let mut sequential = tree();
        sequential.append_leaves(&[v(0), v(2), v(3)]).unwrap();
        assert_eq!(batched.root(true), sequential.root(true));
    }

    #[test]
    fn test_batch_insert_present_value_is_noop() {
        let mut tree = tree();
        let root = tree.root(false);
        let insertion = tree.batch_insert(&[v(10)], 1).unwrap();
        assert!(insertion.low_leaf_witnesses.unwrap()[0].is_empty());
        assert_eq!(tree.root(true), root);
        assert_eq!(list(&tree), vec![5, 10, 15]);
        assert_eq!(tree.latest_leaf_data_copy(3, true), Some(leaf(10, 4, 15)));
    }

    #[test]
    fn test_batch_insert_repeated_value() {
        let mut batched = tree();
        let insertion = batched.batch_insert(&[v(7), v(7)], 1).unwrap();
        let witnesses = insertion.low_leaf_witnesses.unwrap();
        assert_eq!(witnesses[0].index, 2);
        assert!(witnesses[1].is_empty());
        assert_eq!(list(&batched), vec![5, 7, 10, 15]);
        assert_eq!(batched.latest_leaf_data_copy(5, true), Some(leaf(7, 3, 10)));
        assert_eq!(batched.leaf_value(6, true).unwrap(), None);

        let mut sequential = tree();
        sequential.append_leaf(v(7)).unwrap();
        assert_eq!(batched.root(true), sequential.root(true));
    }

    #[test]
    fn test_insert_at_max_index() {
        let mut tree = StandardIndexedTree::build(
            MemoryStore::new(),
            Sha256::default(),
            &DefaultNodeCache::new(),
            "full",
            3,
            1,
        )
        .unwrap();
        tree.append_leaves(&[v(1), v(2), v(3), v(4), v(5), v(6)])
            .unwrap();
        tree.commit().unwrap();
        assert_eq!(tree.num_leaves(false), 7);

        let insertion = tree.batch_insert(&[v(7)], 0).unwrap();
        assert_eq!(insertion.low_leaf_witnesses.unwrap()[0].index, 6);
        assert_eq!(tree.num_leaves(true), 8);
        assert_eq!(list(&tree), vec![1, 2, 3, 4, 5, 6, 7]);
        tree.commit().unwrap();

        let root = tree.root(false);
        let past_end = TreeError::IndexOutOfBounds {
            index: 8,
            max_index: 7,
        };
        assert_eq!(tree.append_leaf(v(8)).unwrap_err(), past_end);
        assert_eq!(tree.batch_insert(&[v(8)], 0).unwrap_err(), past_end);
        assert_eq!(tree.root(true), root);
        assert_eq!(tree.latest_leaf_data_copy(7, true), Some(leaf(7, 0, 0)));
    }

    #[test]
    fn test_batch_insert_limits() {
        let mut tree = tree();
        assert_eq!(
            tree.batch_insert(&[v(1), v(2), v(3)], 1).unwrap_err(),
            TreeError::BatchTooLarge { len: 3, max: 2 }
        );
        assert!(matches!(
            tree.batch_insert(&[v(1)], 9),
            Err(TreeError::InvalidArgument(_))
        ));

        let mut small = StandardIndexedTree::build(
            MemoryStore::new(),
            Sha256::default(),
            &DefaultNodeCache::new(),
            "small",
            2,
            3,
        )
        .unwrap();
        assert_eq!(
            small.batch_insert(&[v(7), v(8)], 1).unwrap_err(),
            TreeError::IndexOutOfBounds {
                index: 4,
                max_index: 3
            }
        );
        assert_eq!(small.root(true), small.root(false));
    }

    #[test]
    fn test_missing_low_leaf() {
        let cache = DefaultNodeCache::new();
        let mut plain =
            StandardTree::build(MemoryStore::new(), Sha256::default(), &cache, "indexed", 4)
                .unwrap();
        plain.append_leaves(&[v(1), v(2)]).unwrap();
        plain.commit().unwrap();
        // No leaf records: the low leaf of every value is unknown.
        let mut tree =
            StandardIndexedTree::import(plain.store().clone(), Sha256::default(), &cache, "indexed")
                .unwrap();
        let insertion = tree.batch_insert(&[v(9)], 1).unwrap();
        assert_eq!(insertion.low_leaf_witnesses, None);
        assert_eq!(tree.num_leaves(true), 2);
    }

    #[test]
    fn test_low_leaf_witness() {
        let tree = tree();
        let witness = tree.low_leaf_witness(&v(12)).unwrap();
        assert_eq!(witness.index, 3);
        assert!(witness.verify_non_membership(tree.hasher(), &tree.root(false), &v(12)));
        assert!(!witness.verify_non_membership(tree.hasher(), &tree.root(false), &v(16)));

        let tail = tree.low_leaf_witness(&v(100)).unwrap();
        assert!(tail.verify_non_membership(tree.hasher(), &tree.root(false), &v(100)));
        assert!(matches!(
            tree.low_leaf_witness(&v(5)),
            Err(TreeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rollback() {
        let mut tree = tree();
        let root = tree.root(false);
        tree.append_leaf(v(8)).unwrap();
        tree.rollback();
        assert_eq!(tree.root(true), root);
        assert_eq!(tree.latest_leaf_data_copy(2, true), Some(leaf(5, 3, 10)));
        assert_eq!(tree.num_leaves(true), 5);
    }
}
