//! Store trait and the staged operation cache shared by its implementations

use crate::{HashValue, StoreError};

/// Thread safety marker trait
#[cfg(feature = "multi-thread")]
pub trait ThreadSafe: Send + Sync {}
#[cfg(feature = "multi-thread")]
impl<T: Send + Sync + ?Sized> ThreadSafe for T {}

#[cfg(not(feature = "multi-thread"))]
pub trait ThreadSafe {}
#[cfg(not(feature = "multi-thread"))]
impl<T: ?Sized> ThreadSafe for T {}

/// A staged write against one of the two namespaces of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    PutNodes(String, Vec<HashValue>),
    DelNodes(String),
    PutValue(String, Vec<HashValue>),
    DelValue(String),
}

/// Ordered list of staged operations plus an optional root update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationCache {
    operations: Vec<Operation>,
    root: Option<HashValue>,
}

impl OperationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn update_root(&mut self, root: HashValue) {
        self.root = Some(root);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn root(&self) -> Option<HashValue> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.operations.len() + self.root.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the cache and returns what it held.
    pub fn take(&mut self) -> (Vec<Operation>, Option<HashValue>) {
        (std::mem::take(&mut self.operations), self.root.take())
    }

    pub fn clear(&mut self) {
        self.operations.clear();
        self.root = None;
    }
}

/// Persistence for the trees.
///
/// A store exposes two namespaces, "nodes" and "values", plus a root pointer.
/// Writes are staged with the `prepare_*` methods and only become visible
/// through `commit`, which must apply all of them or none. Reads only see
/// committed state.
///
/// Stores provide no locking: a single writer must own a store instance and
/// the keyspace behind it.
pub trait Store: ThreadSafe {
    /// Get the committed root of the tree.
    fn get_root(&self) -> Result<HashValue, StoreError>;

    /// Get the record stored in the node namespace under `key`.
    fn get_nodes(&self, key: &str) -> Result<Vec<HashValue>, StoreError>;

    /// Get the record stored in the value namespace under `key`.
    fn get_value(&self, key: &str) -> Result<Vec<HashValue>, StoreError>;

    fn prepare_put_nodes(&mut self, key: &str, nodes: Vec<HashValue>);

    fn prepare_del_nodes(&mut self, key: &str);

    fn prepare_put_value(&mut self, key: &str, value: Vec<HashValue>);

    fn prepare_del_value(&mut self, key: &str);

    fn prepare_update_root(&mut self, root: HashValue);

    /// Atomically applies every staged operation, then clears the cache.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discards staged operations without applying them.
    fn clear_prepare_operation_cache(&mut self);

    /// Erases the whole keyspace of this store, root included.
    fn clear(&mut self) -> Result<(), StoreError>;
}
