//! Persistent state.
//!
//! A bucketed byte-map with pluggable backends: an embedded redb database, an
//! in-memory map for tests, and a null implementation that silently succeeds
//! and returns nothing.

use crate::error::{Error, Result};
use redb::{Database, ReadableTable, TableDefinition};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// Bucket of executed once-scripts, keyed by the script's SHA-256.
pub const SCRIPT_STATE_BUCKET: &str = "script";

/// A persistent bucket/key byte store.
pub trait PersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()>;
    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()>;
}

/// A persistent state that stores nothing.
pub struct NullPersistentState;

impl PersistentState for NullPersistentState {
    fn get(&self, _bucket: &str, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&self, _bucket: &str, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _bucket: &str, _key: &[u8]) -> Result<()> {
        Ok(())
    }
}

type BucketData = HashMap<Vec<u8>, Vec<u8>>;

/// An in-memory persistent state for tests.
#[derive(Default)]
pub struct MockPersistentState {
    data: RefCell<HashMap<String, BucketData>>,
}

impl MockPersistentState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentState for MockPersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .data
            .borrow()
            .get(bucket)
            .and_then(|b| b.get(key).cloned()))
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.data
            .borrow_mut()
            .entry(bucket.to_owned())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        if let Some(bucket_data) = self.data.borrow_mut().get_mut(bucket) {
            bucket_data.remove(key);
        }
        Ok(())
    }
}

/// A persistent state backed by an embedded redb database, one table per
/// bucket.
pub struct RedbPersistentState {
    db: Database,
}

impl RedbPersistentState {
    /// Creates or opens a database at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path).map_err(|e| Error::State {
            message: format!("failed to create database: {e}"),
        })?;
        Ok(RedbPersistentState { db })
    }

    /// Table definitions require 'static names; known buckets avoid the
    /// allocation, unknown ones are leaked once per process.
    fn table_def(bucket: &str) -> TableDefinition<'static, &'static [u8], &'static [u8]> {
        match bucket {
            SCRIPT_STATE_BUCKET => TableDefinition::new(SCRIPT_STATE_BUCKET),
            _ => TableDefinition::new(Box::leak(bucket.to_owned().into_boxed_str())),
        }
    }
}

impl PersistentState for RedbPersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read().map_err(|e| Error::State {
            message: format!("failed to begin read transaction: {e}"),
        })?;
        let table = match read_txn.open_table(Self::table_def(bucket)) {
            Ok(table) => table,
            // The table does not exist until the first set.
            Err(_) => return Ok(None),
        };
        match table.get(key) {
            Ok(Some(value)) => Ok(Some(value.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(Error::State {
                message: format!("failed to get value: {e}"),
            }),
        }
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(|e| Error::State {
            message: format!("failed to begin write transaction: {e}"),
        })?;
        {
            let mut table = write_txn
                .open_table(Self::table_def(bucket))
                .map_err(|e| Error::State {
                    message: format!("failed to open table: {e}"),
                })?;
            table.insert(key, value).map_err(|e| Error::State {
                message: format!("failed to insert value: {e}"),
            })?;
        }
        write_txn.commit().map_err(|e| Error::State {
            message: format!("failed to commit transaction: {e}"),
        })
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(|e| Error::State {
            message: format!("failed to begin write transaction: {e}"),
        })?;
        {
            let mut table = write_txn
                .open_table(Self::table_def(bucket))
                .map_err(|e| Error::State {
                    message: format!("failed to open table: {e}"),
                })?;
            table.remove(key).map_err(|e| Error::State {
                message: format!("failed to remove value: {e}"),
            })?;
        }
        write_txn.commit().map_err(|e| Error::State {
            message: format!("failed to commit transaction: {e}"),
        })
    }
}
