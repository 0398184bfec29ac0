//! Store implementation using RocksDB

use std::{path::Path, sync::Arc};

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, DB};
use tracing::debug;

use crate::{
    db::{Operation, OperationCache, Store},
    node::{decode_fields, encode_fields},
    HashValue, StoreError,
};

const NODES_CF_NAME: &str = "nodes";
const VALUES_CF_NAME: &str = "values";
const ROOTS_CF_NAME: &str = "roots";

/// RocksDB options
pub fn default_db_opts() -> Options {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);
    opts.set_atomic_flush(true);
    opts
}

/// RocksDB column families
pub fn column_families() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(NODES_CF_NAME, default_db_opts()),
        ColumnFamilyDescriptor::new(VALUES_CF_NAME, default_db_opts()),
        ColumnFamilyDescriptor::new(ROOTS_CF_NAME, default_db_opts()),
    ]
}

/// Opens (or creates) a database usable by [`RocksDbStore`].
pub fn open_rocksdb(path: impl AsRef<Path>) -> Result<Arc<DB>, StoreError> {
    Ok(Arc::new(DB::open_cf_descriptors(
        &default_db_opts(),
        path,
        column_families(),
    )?))
}

/// A store persisting one tree in a shared RocksDB database. Every key is
/// prefixed with the store name so several trees can live side by side.
pub struct RocksDbStore {
    db: Arc<DB>,
    prefix: Vec<u8>,
    cache: OperationCache,
}

impl std::fmt::Debug for RocksDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbStore")
            .field("prefix", &String::from_utf8_lossy(&self.prefix))
            .field("staged", &self.cache.len())
            .finish()
    }
}

impl RocksDbStore {
    pub fn new(db: Arc<DB>, name: &str) -> Self {
        Self {
            db,
            prefix: format!("{name}/").into_bytes(),
            cache: OperationCache::new(),
        }
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Corrupted(format!("missing column family {name}")))
    }

    fn prefixed_key(&self, key: &str) -> Vec<u8> {
        let mut prefixed_key = self.prefix.clone();
        prefixed_key.extend_from_slice(key.as_bytes());
        prefixed_key
    }

    fn read(&self, cf_name: &str, key: &[u8], label: &str) -> Result<Vec<HashValue>, StoreError> {
        let bytes = self
            .db
            .get_cf(self.cf(cf_name)?, key)?
            .ok_or_else(|| StoreError::NotFound(label.to_string()))?;
        decode_fields(&bytes)
            .ok_or_else(|| StoreError::Corrupted(format!("record {label} has an invalid length")))
    }

    fn keys_with_prefix(&self, cf: &ColumnFamily) -> Result<Vec<Box<[u8]>>, StoreError> {
        let mut keys = Vec::new();
        for item in self.db.prefix_iterator_cf(cf, &self.prefix) {
            let (key, _) = item?;
            if !key.starts_with(&self.prefix) {
                break;
            }
            keys.push(key);
        }
        Ok(keys)
    }
}

impl Store for RocksDbStore {
    fn get_root(&self) -> Result<HashValue, StoreError> {
        let fields = self.read(ROOTS_CF_NAME, &self.prefix, "root")?;
        match fields.as_slice() {
            [root] => Ok(*root),
            _ => Err(StoreError::Corrupted("root record must hold one value".to_string())),
        }
    }

    fn get_nodes(&self, key: &str) -> Result<Vec<HashValue>, StoreError> {
        self.read(NODES_CF_NAME, &self.prefixed_key(key), key)
    }

    fn get_value(&self, key: &str) -> Result<Vec<HashValue>, StoreError> {
        self.read(VALUES_CF_NAME, &self.prefixed_key(key), key)
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
        let nodes = self.cf(NODES_CF_NAME)?;
        let values = self.cf(VALUES_CF_NAME)?;
        let roots = self.cf(ROOTS_CF_NAME)?;
        let mut batch = WriteBatch::default();
        for operation in self.cache.operations() {
            match operation {
                Operation::PutNodes(key, fields) => {
                    batch.put_cf(nodes, self.prefixed_key(key), encode_fields(fields))
                }
                Operation::DelNodes(key) => batch.delete_cf(nodes, self.prefixed_key(key)),
                Operation::PutValue(key, fields) => {
                    batch.put_cf(values, self.prefixed_key(key), encode_fields(fields))
                }
                Operation::DelValue(key) => batch.delete_cf(values, self.prefixed_key(key)),
            }
        }
        if let Some(root) = self.cache.root() {
            batch.put_cf(roots, &self.prefix, root.as_bytes());
        }
        debug!(
            prefix = %String::from_utf8_lossy(&self.prefix),
            operations = batch.len(),
            "committing rocksdb store"
        );
        // The cache survives a failed write so the caller can retry or discard it.
        self.db.write(batch)?;
        self.cache.clear();
        Ok(())
    }

    fn clear_prepare_operation_cache(&mut self) {
        self.cache.clear();
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let nodes = self.cf(NODES_CF_NAME)?;
        let values = self.cf(VALUES_CF_NAME)?;
        let roots = self.cf(ROOTS_CF_NAME)?;
        let mut batch = WriteBatch::default();
        for key in self.keys_with_prefix(nodes)? {
            batch.delete_cf(nodes, key);
        }
        for key in self.keys_with_prefix(values)? {
            batch.delete_cf(values, key);
        }
        batch.delete_cf(roots, &self.prefix);
        self.db.write(batch)?;
        self.cache.clear();
        Ok(())
    }
}
