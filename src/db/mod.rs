#[allow(clippy::module_inception)]
mod db;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocksdb;

pub use db::{Operation, OperationCache, Store, ThreadSafe};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{column_families, default_db_opts, open_rocksdb, RocksDbStore};
