use crate::error::Result;
use crate::record::Record;
use crate::short_id::ShortId;
use async_trait::async_trait;

/// Persistence contract shared by every storage backend.
///
/// Implementations surface backend failures unchanged and never retry.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Retrieves the record stored under `key`, removed or not.
    /// Returns `Err(NotFound)` if the key does not exist.
    async fn get_by_key(&self, key: &ShortId) -> Result<Record>;

    /// Looks up the live record holding `value`.
    /// Returns `None` when no live record has it; removed records are ignored.
    async fn get_by_value(&self, value: &str) -> Result<Option<Record>>;

    /// Returns every record created by `owner_id`, including removed ones,
    /// in creation order.
    async fn get_all_by_owner(&self, owner_id: &str) -> Result<Vec<Record>>;

    /// Inserts a new record. Returns `Err(Conflict)` if the key is taken.
    async fn save(&self, record: &Record) -> Result<()>;

    /// Inserts several new records.
    async fn save_batch(&self, records: &[Record]) -> Result<()>;

    /// Soft-deletes the given keys when they exist and belong to `owner_id`.
    /// Unknown keys and keys owned by someone else are skipped silently.
    async fn delete_by_owner(&self, owner_id: &str, keys: &[ShortId]) -> Result<()>;

    /// Liveness probe of the backend.
    async fn status(&self) -> Result<()> {
        Ok(())
    }

    /// Releases the underlying file handle or connection pool.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
