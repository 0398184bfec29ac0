//! Default nodes of empty trees
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::debug;

use crate::{HashValue, Hasher};

/// Memoized hashes of empty subtrees.
///
/// For a tree of height `h` the cached array `d` has `h + 1` entries:
/// `d[h]` is the empty leaf and `d[i] = compress(d[i + 1], d[i + 1])`, so
/// `d[0]` is the root of the empty tree. Arrays are keyed by the hasher id and
/// the height and computed at most once for the lifetime of the cache.
///
/// Create one cache per application (or per test) and hand it to every tree
/// constructor.
#[derive(Debug, Default)]
pub struct DefaultNodeCache {
    nodes: RwLock<HashMap<(String, usize), Arc<[HashValue]>>>,
}

impl DefaultNodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the default nodes for `height`, computing them on first use.
    pub fn get<H: Hasher>(&self, hasher: &H, height: usize) -> Arc<[HashValue]> {
        let key = (hasher.id().to_string(), height);
        if let Some(nodes) = self
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return nodes.clone();
        }
        let mut cache = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry(key)
            .or_insert_with(|| {
                debug!(hasher = hasher.id(), height, "computing default nodes");
                default_nodes(hasher, height).into()
            })
            .clone()
    }

    /// Number of memoized arrays.
    pub fn len(&self) -> usize {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every memoized array.
    pub fn clear(&self) {
        self.nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// builds the default nodes, root first
fn default_nodes<H: Hasher>(hasher: &H, height: usize) -> Vec<HashValue> {
    let mut nodes = Vec::with_capacity(height + 1);
    nodes.push(HashValue::ZERO);
    for i in 1..=height {
        nodes.push(hasher.compress(&nodes[i - 1], &nodes[i - 1]));
    }
    nodes.reverse();
    nodes
}
