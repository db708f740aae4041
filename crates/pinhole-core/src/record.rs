use crate::short_id::ShortId;
use serde::{Deserialize, Serialize};

/// A stored URL record.
///
/// Only `removed` ever changes after creation, and only from `false` to
/// `true`. Removed records stay in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The short id the record is addressed by.
    pub key: ShortId,
    /// The original URL that was shortened.
    pub value: String,
    /// The anonymous user that created the record.
    #[serde(rename = "user_id")]
    pub owner_id: String,
    /// Client supplied tag echoed back by batch creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Soft-delete flag.
    #[serde(default)]
    pub removed: bool,
}

impl Record {
    pub fn new(key: impl Into<ShortId>, value: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            owner_id: owner_id.into(),
            correlation_id: None,
            removed: false,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// A record counts as live until it has been soft-deleted.
    pub fn is_live(&self) -> bool {
        !self.removed
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}

/// Outcome of saving a record through the storage service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The record was new and has been stored.
    Created(Record),
    /// A live record with the same value already existed; nothing was
    /// written and the existing record is returned instead.
    Duplicate(Record),
}

impl SaveOutcome {
    pub fn record(&self) -> &Record {
        match self {
            SaveOutcome::Created(record) | SaveOutcome::Duplicate(record) => record,
        }
    }

    pub fn into_record(self) -> Record {
        match self {
            SaveOutcome::Created(record) | SaveOutcome::Duplicate(record) => record,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, SaveOutcome::Duplicate(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_live() {
        let record = Record::new("abc", "https://example.com", "u1");
        assert!(record.is_live());
        assert!(record.is_owned_by("u1"));
        assert!(!record.is_owned_by("u2"));
        assert_eq!(record.correlation_id, None);
    }

    #[test]
    fn log_line_shape() {
        let record = Record::new("abc", "https://example.com", "u1").with_correlation_id("c-1");
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(
            line,
            r#"{"key":"abc","value":"https://example.com","user_id":"u1","correlation_id":"c-1","removed":false}"#
        );
    }

    #[test]
    fn missing_optional_fields_default() {
        let record: Record =
            serde_json::from_str(r#"{"key":"abc","value":"https://example.com","user_id":"u1"}"#)
                .unwrap();
        assert_eq!(record.correlation_id, None);
        assert!(!record.removed);
    }

    #[test]
    fn outcome_accessors() {
        let record = Record::new("abc", "https://example.com", "u1");
        let created = SaveOutcome::Created(record.clone());
        let duplicate = SaveOutcome::Duplicate(record.clone());

        assert!(!created.is_duplicate());
        assert!(duplicate.is_duplicate());
        assert_eq!(duplicate.record(), &record);
        assert_eq!(created.into_record(), record);
    }
}
