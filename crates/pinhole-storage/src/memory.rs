use crate::index::RecordIndex;
use async_trait::async_trait;
use parking_lot::RwLock;
use pinhole_core::{Record, RecordStore, Result, ShortId, StorageError};
use tracing::trace;

/// Volatile record store.
///
/// A single read-write lock guards the whole map, so a write (including its
/// uniqueness check) is atomic with respect to every other call. Nothing
/// survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    index: RwLock<RecordIndex>,
}

impl InMemoryRecordStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, removed ones included.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_by_key(&self, key: &ShortId) -> Result<Record> {
        self.index
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn get_by_value(&self, value: &str) -> Result<Option<Record>> {
        Ok(self.index.read().find_live_by_value(value).cloned())
    }

    async fn get_all_by_owner(&self, owner_id: &str) -> Result<Vec<Record>> {
        Ok(self.index.read().by_owner(owner_id))
    }

    async fn save(&self, record: &Record) -> Result<()> {
        let mut index = self.index.write();
        index.check_insert(record)?;
        index.upsert(record.clone());
        trace!(key = %record.key, "saved record in memory");
        Ok(())
    }

    async fn save_batch(&self, records: &[Record]) -> Result<()> {
        let mut index = self.index.write();
        index.check_batch(records)?;
        for record in records {
            index.upsert(record.clone());
        }
        trace!(count = records.len(), "saved record batch in memory");
        Ok(())
    }

    async fn delete_by_owner(&self, owner_id: &str, keys: &[ShortId]) -> Result<()> {
        let mut index = self.index.write();
        for key in keys {
            if let Some(removed) = index.removal_of(owner_id, key) {
                index.upsert(removed);
                trace!(owner = %owner_id, key = %key, "removed record in memory");
            }
        }
        Ok(())
    }
}
