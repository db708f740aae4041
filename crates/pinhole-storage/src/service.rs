use pinhole_core::{Record, RecordStore, Result, SaveOutcome, ShortId, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Storage facade that owns one [`RecordStore`].
///
/// This service enforces "one live record per URL" before writing and
/// gives batch creation its idempotent, order-preserving semantics. All
/// other calls pass straight through to the store.
#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn RecordStore>,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService").finish_non_exhaustive()
    }
}

/// Where a batch entry's result comes from.
enum Slot {
    /// A live record already held the value.
    Existing(Record),
    /// The entry is stored as `fresh[i]`.
    Fresh(usize),
    /// An earlier entry of the same batch carries the value as `fresh[i]`.
    Repeat(usize),
}

/// A batch split into records to insert and per-input result slots.
struct BatchPlan {
    slots: Vec<Slot>,
    fresh: Vec<Record>,
}

impl BatchPlan {
    fn into_outcomes(self) -> Vec<SaveOutcome> {
        let fresh = self.fresh;
        self.slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Existing(record) => SaveOutcome::Duplicate(record),
                Slot::Fresh(i) => SaveOutcome::Created(fresh[i].clone()),
                Slot::Repeat(i) => SaveOutcome::Duplicate(fresh[i].clone()),
            })
            .collect()
    }
}

impl StorageService {
    pub fn new(store: impl RecordStore) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Returns the wrapped store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub async fn get_by_key(&self, key: &ShortId) -> Result<Record> {
        self.store.get_by_key(key).await
    }

    pub async fn get_all_by_owner(&self, owner_id: &str) -> Result<Vec<Record>> {
        self.store.get_all_by_owner(owner_id).await
    }

    /// Saves `record` unless a live record already holds its value, in which
    /// case the existing record is returned as [`SaveOutcome::Duplicate`].
    pub async fn save(&self, record: Record) -> Result<SaveOutcome> {
        if let Some(existing) = self.store.get_by_value(&record.value).await? {
            debug!(key = %existing.key, "value already stored");
            return Ok(SaveOutcome::Duplicate(existing));
        }

        match self.store.save(&record).await {
            Ok(()) => {
                trace!(key = %record.key, "stored new record");
                Ok(SaveOutcome::Created(record))
            }
            // Lost a race against another writer of the same value.
            Err(StorageError::Conflict(reason)) => {
                match self.store.get_by_value(&record.value).await? {
                    Some(existing) => Ok(SaveOutcome::Duplicate(existing)),
                    None => Err(StorageError::Conflict(reason)),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Saves a batch, returning one outcome per input in input order.
    ///
    /// Inputs whose value is already live resolve to the stored record, and
    /// inputs repeating a value from earlier in the batch resolve to that
    /// earlier entry. Only the remaining records reach the store, in a
    /// single batch insert. If another writer stores one of those values
    /// first, the batch is resolved against the store once more.
    pub async fn save_batch_of_record(&self, records: Vec<Record>) -> Result<Vec<SaveOutcome>> {
        let plan = self.plan_batch(records.clone()).await?;

        let plan = match self.store_fresh(&plan).await {
            Ok(()) => plan,
            Err(StorageError::Conflict(reason)) => {
                debug!(%reason, "batch raced another writer, resolving again");
                let plan = self.plan_batch(records).await?;
                self.store_fresh(&plan).await?;
                plan
            }
            Err(err) => return Err(err),
        };

        debug!(
            requested = plan.slots.len(),
            created = plan.fresh.len(),
            "saved record batch"
        );
        Ok(plan.into_outcomes())
    }

    async fn plan_batch(&self, records: Vec<Record>) -> Result<BatchPlan> {
        let mut plan = BatchPlan {
            slots: Vec::with_capacity(records.len()),
            fresh: Vec::with_capacity(records.len()),
        };
        let mut fresh_by_value: HashMap<String, usize> = HashMap::new();

        for record in records {
            if let Some(existing) = self.store.get_by_value(&record.value).await? {
                plan.slots.push(Slot::Existing(existing));
            } else if let Some(&i) = fresh_by_value.get(&record.value) {
                plan.slots.push(Slot::Repeat(i));
            } else {
                fresh_by_value.insert(record.value.clone(), plan.fresh.len());
                plan.slots.push(Slot::Fresh(plan.fresh.len()));
                plan.fresh.push(record);
            }
        }

        Ok(plan)
    }

    async fn store_fresh(&self, plan: &BatchPlan) -> Result<()> {
        if plan.fresh.is_empty() {
            return Ok(());
        }
        self.store.save_batch(&plan.fresh).await
    }

    pub async fn delete_by_owner(&self, owner_id: &str, keys: &[ShortId]) -> Result<()> {
        self.store.delete_by_owner(owner_id, keys).await
    }

    pub async fn status(&self) -> Result<()> {
        self.store.status().await
    }

    /// Closes the underlying store.
    pub async fn shutdown(&self) -> Result<()> {
        self.store.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryRecordStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose first `stale_reads` value lookups miss, as if another
    /// writer stored the value right after the lookup.
    struct StaleReadStore {
        inner: InMemoryRecordStore,
        stale_reads: AtomicUsize,
    }

    impl StaleReadStore {
        fn new(inner: InMemoryRecordStore, stale_reads: usize) -> Self {
            Self {
                inner,
                stale_reads: AtomicUsize::new(stale_reads),
            }
        }
    }

    #[async_trait]
    impl RecordStore for StaleReadStore {
        async fn get_by_key(&self, key: &ShortId) -> Result<Record> {
            self.inner.get_by_key(key).await
        }

        async fn get_by_value(&self, value: &str) -> Result<Option<Record>> {
            let stale = self
                .stale_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stale {
                return Ok(None);
            }
            self.inner.get_by_value(value).await
        }

        async fn get_all_by_owner(&self, owner_id: &str) -> Result<Vec<Record>> {
            self.inner.get_all_by_owner(owner_id).await
        }

        async fn save(&self, record: &Record) -> Result<()> {
            self.inner.save(record).await
        }

        async fn save_batch(&self, records: &[Record]) -> Result<()> {
            self.inner.save_batch(records).await
        }

        async fn delete_by_owner(&self, owner_id: &str, keys: &[ShortId]) -> Result<()> {
            self.inner.delete_by_owner(owner_id, keys).await
        }

        async fn status(&self) -> Result<()> {
            self.inner.status().await
        }

        async fn close(&self) -> Result<()> {
            self.inner.close().await
        }
    }

    async fn stale_service(seed: &[Record], stale_reads: usize) -> StorageService {
        let inner = InMemoryRecordStore::new();
        for record in seed {
            inner.save(record).await.unwrap();
        }
        StorageService::new(StaleReadStore::new(inner, stale_reads))
    }

    fn service() -> (StorageService, Arc<InMemoryRecordStore>) {
        let store = Arc::new(InMemoryRecordStore::new());
        (StorageService::from_shared(store.clone()), store)
    }

    fn record(key: &str, value: &str, owner: &str) -> Record {
        Record::new(key, value, owner)
    }

    #[tokio::test]
    async fn save_new_record() {
        let (service, store) = service();

        let outcome = service
            .save(record("abc", "https://example.com", "u1"))
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Created(ref r) if r.key.as_str() == "abc"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn save_duplicate_returns_existing_record() {
        let (service, store) = service();
        service
            .save(record("abc", "https://example.com", "u1"))
            .await
            .unwrap();

        let outcome = service
            .save(record("def", "https://example.com", "u1"))
            .await
            .unwrap();

        assert!(outcome.is_duplicate());
        assert_eq!(outcome.record().key.as_str(), "abc");
        assert_eq!(store.len(), 1);
        assert!(service.get_by_key(&ShortId::new("def")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn removed_record_is_not_a_duplicate() {
        let (service, _) = service();
        service.save(record("abc", "https://v1", "u1")).await.unwrap();
        service
            .delete_by_owner("u1", &[ShortId::new("abc")])
            .await
            .unwrap();

        let outcome = service.save(record("def", "https://v1", "u1")).await.unwrap();

        assert!(!outcome.is_duplicate());
        assert_eq!(outcome.record().key.as_str(), "def");
    }

    #[tokio::test]
    async fn batch_repeats_resolve_to_one_record() {
        let (service, store) = service();

        let outcomes = service
            .save_batch_of_record(vec![
                record("k1", "x", "u1"),
                record("k2", "y", "u1"),
                record("k3", "x", "u1"),
            ])
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].record().key.as_str(), "k1");
        assert_eq!(outcomes[1].record().key.as_str(), "k2");
        assert_eq!(outcomes[2].record().key.as_str(), "k1");
        assert!(outcomes[2].is_duplicate());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn batch_resubmission_is_idempotent() {
        let (service, store) = service();
        let batch = |prefix: &str| {
            vec![
                record(&format!("{prefix}-1"), "https://a", "u1").with_correlation_id("1"),
                record(&format!("{prefix}-2"), "https://b", "u1").with_correlation_id("2"),
            ]
        };

        let first = service.save_batch_of_record(batch("first")).await.unwrap();
        let second = service.save_batch_of_record(batch("second")).await.unwrap();

        let keys = |outcomes: &[SaveOutcome]| {
            outcomes
                .iter()
                .map(|o| o.record().key.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(&first), keys(&second));
        assert!(second.iter().all(SaveOutcome::is_duplicate));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn batch_mixes_existing_and_new() {
        let (service, store) = service();
        service.save(record("old", "https://old", "u1")).await.unwrap();

        let outcomes = service
            .save_batch_of_record(vec![
                record("n1", "https://new", "u2"),
                record("n2", "https://old", "u2"),
            ])
            .await
            .unwrap();

        assert!(matches!(outcomes[0], SaveOutcome::Created(_)));
        assert!(matches!(outcomes[1], SaveOutcome::Duplicate(ref r) if r.key.as_str() == "old"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let (service, store) = service();

        let outcomes = service.save_batch_of_record(vec![]).await.unwrap();

        assert!(outcomes.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn ownership_is_enforced_on_delete() {
        let (service, _) = service();
        service.save(record("b-key", "https://b", "owner-b")).await.unwrap();

        service
            .delete_by_owner("owner-a", &[ShortId::new("b-key")])
            .await
            .unwrap();

        let record = service.get_by_key(&ShortId::new("b-key")).await.unwrap();
        assert!(!record.removed);
    }

    #[tokio::test]
    async fn status_and_shutdown_pass_through() {
        let (service, _) = service();
        service.status().await.unwrap();
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn save_racing_same_value_returns_winner() {
        let service = stale_service(&[record("abc", "https://example.com", "u1")], 1).await;

        let outcome = service
            .save(record("def", "https://example.com", "u2"))
            .await
            .unwrap();

        assert!(outcome.is_duplicate());
        assert_eq!(outcome.record().key.as_str(), "abc");
        assert!(service.get_by_key(&ShortId::new("def")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn save_with_taken_key_is_a_conflict() {
        let service = stale_service(&[record("abc", "https://a", "u1")], 0).await;

        let err = service
            .save(record("abc", "https://b", "u1"))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict(_)));
        assert!(service.store().get_by_value("https://b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn batch_racing_another_writer_is_resolved_again() {
        let service = stale_service(&[record("old", "https://old", "u1")], 2).await;

        let outcomes = service
            .save_batch_of_record(vec![
                record("n1", "https://new", "u2"),
                record("n2", "https://old", "u2"),
            ])
            .await
            .unwrap();

        assert!(matches!(outcomes[0], SaveOutcome::Created(ref r) if r.key.as_str() == "n1"));
        assert!(matches!(outcomes[1], SaveOutcome::Duplicate(ref r) if r.key.as_str() == "old"));
        assert!(service.get_by_key(&ShortId::new("n2")).await.unwrap_err().is_not_found());
        assert_eq!(service.get_all_by_owner("u2").await.unwrap().len(), 1);
    }
}
