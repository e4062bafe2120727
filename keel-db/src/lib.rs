//! Abstract byte-addressable key-value storage.
//!
//! The ledger and the consensus state only touch storage through the
//! `Database` trait; writes are grouped into atomic `WriteBatch`es. `MemDb`
//! is the in-memory backend used by nodes and tests alike.

mod error;

pub use error::DbError;

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A batch of writes applied atomically
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

#[derive(Debug, Clone)]
enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

impl WriteBatch {
    /// Creates an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a put
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put(key, value));
    }

    /// Queues a delete
    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete(key));
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when no operation is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Byte-addressable key-value store with atomic batch writes
pub trait Database: Send + Sync {
    /// Reads the value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DbError>;

    /// Applies every operation in `batch` atomically
    fn write_batch(&self, batch: WriteBatch) -> Result<(), DbError>;

    /// Writes a single key (one-op batch)
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DbError> {
        let mut batch = WriteBatch::new();
        batch.put(key.to_vec(), value.to_vec());
        self.write_batch(batch)
    }

    /// True when `key` is present
    fn contains(&self, key: &[u8]) -> Result<bool, DbError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Shareable handle to a database
pub type SharedDb = Arc<dyn Database>;

/// In-memory database backend
#[derive(Debug, Default)]
pub struct MemDb {
    entries: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemDb {
    /// Creates an empty in-memory database
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty in-memory database behind a shareable handle
    pub fn shared() -> SharedDb {
        Arc::new(MemDb::new())
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Database for MemDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DbError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), DbError> {
        let mut entries = self.entries.lock();
        for op in batch.ops {
            match op {
                BatchOp::Put(key, value) => {
                    entries.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let db = MemDb::new();
        db.put(b"alpha", b"1").unwrap();
        assert_eq!(db.get(b"alpha").unwrap(), Some(b"1".to_vec()));
        assert_eq!(db.get(b"beta").unwrap(), None);
    }

    #[test]
    fn test_batch_atomicity_ordering() {
        let db = MemDb::new();
        let mut batch = WriteBatch::new();
        batch.put(b"k".to_vec(), b"v1".to_vec());
        batch.put(b"k".to_vec(), b"v2".to_vec());
        batch.delete(b"gone".to_vec());
        db.write_batch(batch).unwrap();
        // last write in the batch wins
        assert_eq!(db.get(b"k").unwrap(), Some(b"v2".to_vec()));
        assert!(!db.contains(b"gone").unwrap());
    }

    #[test]
    fn test_delete() {
        let db = MemDb::new();
        db.put(b"k", b"v").unwrap();
        let mut batch = WriteBatch::new();
        batch.delete(b"k".to_vec());
        db.write_batch(batch).unwrap();
        assert_eq!(db.get(b"k").unwrap(), None);
    }
}
