mod compact;
mod deep;
mod empty;
mod indexed;
mod regular;
mod standard;

pub use compact::CompactSparseMerkleTree;
pub use deep::{CompactDeepSparseMerkleSubTree, DeepSparseMerkleSubTree};
pub use empty::DefaultNodeCache;
pub use indexed::{BatchInsertion, StandardIndexedTree};
pub use regular::{SparseMerkleTree, SMT_DEFAULT_HEIGHT};
pub use standard::{StandardTree, MAX_STANDARD_HEIGHT};

use crate::{HashValue, Hasher, LinkedLeaf, SiblingPath, Store, TreeError, HASH_SIZE};

/// Rejects heights the path domain cannot address.
pub(crate) fn check_height(height: usize, max: usize) -> Result<(), TreeError> {
    if height == 0 || height > max.min(HASH_SIZE * 8) {
        return Err(TreeError::InvalidHeight(height));
    }
    Ok(())
}

/// Commits the staged operations, discarding them if the commit fails.
pub(crate) fn commit_or_discard<S: Store>(store: &mut S) -> Result<(), TreeError> {
    store.commit().map_err(|err| {
        store.clear_prepare_operation_cache();
        TreeError::from(err)
    })
}

/// Walk up the tree from a leaf to the root.
/// * `path` - path of the leaf, bit `i` picks the side at `i` levels above the leaf.
/// * `leaf` - starting leaf hash.
/// * `side_nodes` - All the sibling nodes on the path, leaf first.
/// * `for_each` - Closure that is executed at each step of the traversal of the tree.
///     * `depth: usize` - depth of the parent, 0 being the root
///     * `left: &HashValue` - left child of the parent
///     * `right: &HashValue` - right child of the parent
///     * `parent: &HashValue` - parent of the current node
///
/// Returns the root.
pub fn walk_up<H: Hasher>(
    hasher: &H,
    path: &HashValue,
    leaf: HashValue,
    side_nodes: &[HashValue],
    mut for_each: impl FnMut(usize, &HashValue, &HashValue, &HashValue),
) -> HashValue {
    let height = side_nodes.len();
    let mut current = leaf;
    for (i, sibling) in side_nodes.iter().enumerate() {
        // order the children based on the path
        let (left, right) = if path.bit(i) {
            (*sibling, current)
        } else {
            (current, *sibling)
        };
        let parent = hasher.compress(&left, &right);
        for_each(height - 1 - i, &left, &right, &parent);
        current = parent;
    }
    current
}

/// Operations shared by the index addressed trees.
pub trait MerkleTree {
    /// Number of levels below the root.
    fn height(&self) -> usize;

    /// Root of the tree, optionally including uncommitted changes.
    fn root(&self, include_uncommitted: bool) -> HashValue;

    /// Number of leaves, optionally including uncommitted ones.
    fn num_leaves(&self, include_uncommitted: bool) -> u64;

    /// Leaf hash stored at `index`, `None` if the leaf was never written.
    fn leaf_value(&self, index: u64, include_uncommitted: bool)
        -> Result<Option<HashValue>, TreeError>;

    /// Sibling path of the leaf at `index`, leaf first.
    fn sibling_path(&self, index: u64, include_uncommitted: bool)
        -> Result<SiblingPath, TreeError>;

    /// Appends leaves at the next free indices.
    fn append_leaves(&mut self, leaves: &[HashValue]) -> Result<(), TreeError>;

    /// Persists uncommitted changes.
    fn commit(&mut self) -> Result<(), TreeError>;

    /// Discards uncommitted changes.
    fn rollback(&mut self);
}

/// Linked list operations of an indexed tree.
pub trait IndexedTree: MerkleTree {
    /// Index of the leaf holding the greatest value lower than or equal to
    /// `value`, and whether that leaf holds `value` itself.
    fn find_index_of_previous_value(
        &self,
        value: &HashValue,
        include_uncommitted: bool,
    ) -> (u64, bool);

    /// Copy of the leaf at `index`, `None` for empty leaves.
    fn latest_leaf_data_copy(&self, index: u64, include_uncommitted: bool) -> Option<LinkedLeaf>;

    /// Inserts `values` as a subtree of `2^subtree_height` leaves.
    fn batch_insert(
        &mut self,
        values: &[HashValue],
        subtree_height: usize,
    ) -> Result<BatchInsertion, TreeError>;
}
