use std::collections::HashMap;

use tracing::debug;

use crate::{
    db::{Operation, OperationCache, Store},
    HashValue, StoreError,
};

/// A simple in-memory store, used by tests and by the deep subtrees.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    nodes: HashMap<String, Vec<HashValue>>,
    values: HashMap<String, Vec<HashValue>>,
    root: Option<HashValue>,
    cache: OperationCache,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_nodes_map(&self) -> &HashMap<String, Vec<HashValue>> {
        &self.nodes
    }

    pub fn get_values_map(&self) -> &HashMap<String, Vec<HashValue>> {
        &self.values
    }

    /// Operations staged but not committed yet.
    pub fn pending(&self) -> &OperationCache {
        &self.cache
    }
}

impl Store for MemoryStore {
    fn get_root(&self) -> Result<HashValue, StoreError> {
        self.root
            .ok_or_else(|| StoreError::NotFound("root".to_string()))
    }

    fn get_nodes(&self, key: &str) -> Result<Vec<HashValue>, StoreError> {
        self.nodes
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn get_value(&self, key: &str) -> Result<Vec<HashValue>, StoreError> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn prepare_put_nodes(&mut self, key: &str, nodes: Vec<HashValue>) {
        self.cache.push(Operation::PutNodes(key.to_string(), nodes));
    }

    fn prepare_del_nodes(&mut self, key: &str) {
        self.cache.push(Operation::DelNodes(key.to_string()));
    }

    fn prepare_put_value(&mut self, key: &str, value: Vec<HashValue>) {
        self.cache.push(Operation::PutValue(key.to_string(), value));
    }

    fn prepare_del_value(&mut self, key: &str) {
        self.cache.push(Operation::DelValue(key.to_string()));
    }

    fn prepare_update_root(&mut self, root: HashValue) {
        self.cache.update_root(root);
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let (operations, root) = self.cache.take();
        debug!(operations = operations.len(), "committing memory store");
        for operation in operations {
            match operation {
                Operation::PutNodes(key, nodes) => {
                    self.nodes.insert(key, nodes);
                }
                Operation::DelNodes(key) => {
                    self.nodes.remove(&key);
                }
                Operation::PutValue(key, value) => {
                    self.values.insert(key, value);
                }
                Operation::DelValue(key) => {
                    self.values.remove(&key);
                }
            }
        }
        if let Some(root) = root {
            self.root = Some(root);
        }
        Ok(())
    }

    fn clear_prepare_operation_cache(&mut self) {
        self.cache.clear();
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.nodes.clear();
        self.values.clear();
        self.root = None;
        self.cache.clear();
        Ok(())
    }
}
