use pinhole_core::{Record, Result, ShortId, StorageError};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    record: Record,
}

/// In-process index of records shared by the in-memory and log backends.
///
/// Not synchronized; owners wrap it in their own lock. Every entry remembers
/// when its key was first seen so listings keep creation order.
#[derive(Debug, Default)]
pub(crate) struct RecordIndex {
    entries: HashMap<ShortId, Entry>,
    next_seq: u64,
}

impl RecordIndex {
    pub(crate) fn get(&self, key: &ShortId) -> Option<&Record> {
        self.entries.get(key).map(|entry| &entry.record)
    }

    /// Linear scan for the live record holding `value`.
    pub(crate) fn find_live_by_value(&self, value: &str) -> Option<&Record> {
        self.entries
            .values()
            .map(|entry| &entry.record)
            .find(|record| record.is_live() && record.value == value)
    }

    pub(crate) fn by_owner(&self, owner_id: &str) -> Vec<Record> {
        let mut owned: Vec<&Entry> = self
            .entries
            .values()
            .filter(|entry| entry.record.is_owned_by(owner_id))
            .collect();
        owned.sort_by_key(|entry| entry.seq);
        owned.into_iter().map(|entry| entry.record.clone()).collect()
    }

    /// Rejects a record whose key is taken or whose value is held by a live record.
    pub(crate) fn check_insert(&self, record: &Record) -> Result<()> {
        if self.entries.contains_key(&record.key) {
            return Err(StorageError::Conflict(format!("key '{}'", record.key)));
        }
        if self.find_live_by_value(&record.value).is_some() {
            return Err(StorageError::Conflict(format!("value '{}'", record.value)));
        }
        Ok(())
    }

    /// Same as [`check_insert`](Self::check_insert) for every record, also
    /// rejecting keys or values repeated inside the batch.
    pub(crate) fn check_batch(&self, records: &[Record]) -> Result<()> {
        let mut keys = HashSet::with_capacity(records.len());
        let mut values = HashSet::with_capacity(records.len());
        for record in records {
            self.check_insert(record)?;
            if !keys.insert(&record.key) {
                return Err(StorageError::Conflict(format!("key '{}'", record.key)));
            }
            if !values.insert(record.value.as_str()) {
                return Err(StorageError::Conflict(format!("value '{}'", record.value)));
            }
        }
        Ok(())
    }

    /// Inserts or replaces the record stored under its key.
    ///
    /// A replaced key keeps its original position in creation order.
    pub(crate) fn upsert(&mut self, record: Record) {
        match self.entries.get_mut(&record.key) {
            Some(entry) => entry.record = record,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(record.key.clone(), Entry { seq, record });
            }
        }
    }

    /// Returns the soft-deleted form of `key` if it exists, belongs to
    /// `owner_id` and is still live. The index itself is left untouched.
    pub(crate) fn removal_of(&self, owner_id: &str, key: &ShortId) -> Option<Record> {
        let record = self.get(key)?;
        if !record.is_owned_by(owner_id) || record.removed {
            return None;
        }
        let mut removed = record.clone();
        removed.removed = true;
        Some(removed)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, value: &str, owner: &str) -> Record {
        Record::new(key, value, owner)
    }

    #[test]
    fn upsert_keeps_first_position() {
        let mut index = RecordIndex::default();
        index.upsert(record("a", "https://a", "u1"));
        index.upsert(record("b", "https://b", "u1"));

        let mut removed = record("a", "https://a", "u1");
        removed.removed = true;
        index.upsert(removed);

        let owned = index.by_owner("u1");
        assert_eq!(owned.len(), 2);
        assert_eq!(owned[0].key.as_str(), "a");
        assert!(owned[0].removed);
        assert_eq!(owned[1].key.as_str(), "b");
    }

    #[test]
    fn removed_records_free_their_value() {
        let mut index = RecordIndex::default();
        let mut removed = record("a", "https://a", "u1");
        removed.removed = true;
        index.upsert(removed);

        assert!(index.find_live_by_value("https://a").is_none());
        assert!(index.check_insert(&record("b", "https://a", "u2")).is_ok());
    }

    #[test]
    fn check_batch_rejects_repeats_inside_batch() {
        let index = RecordIndex::default();
        let same_value = [record("a", "https://x", "u1"), record("b", "https://x", "u1")];
        let same_key = [record("a", "https://x", "u1"), record("a", "https://y", "u1")];

        assert!(matches!(
            index.check_batch(&same_value),
            Err(StorageError::Conflict(_))
        ));
        assert!(matches!(
            index.check_batch(&same_key),
            Err(StorageError::Conflict(_))
        ));
    }

    #[test]
    fn removal_requires_owner_and_live_record() {
        let mut index = RecordIndex::default();
        index.upsert(record("a", "https://a", "u1"));

        assert!(index.removal_of("u2", &ShortId::new("a")).is_none());
        assert!(index.removal_of("u1", &ShortId::new("missing")).is_none());

        let removed = index.removal_of("u1", &ShortId::new("a")).unwrap();
        assert!(removed.removed);
        index.upsert(removed);
        assert!(index.removal_of("u1", &ShortId::new("a")).is_none());
    }
}
