use pinhole_core::{Record, ShortId};

/// The externally visible view of a stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub short_id: ShortId,
    pub original_url: String,
    pub owner_id: String,
    pub correlation_id: Option<String>,
    pub removed: bool,
}

impl Url {
    /// Renders the short link under `base_url`.
    pub fn short_url(&self, base_url: &str) -> String {
        self.short_id.to_url(base_url)
    }
}

impl From<Record> for Url {
    fn from(record: Record) -> Self {
        Self {
            short_id: record.key,
            original_url: record.value,
            owner_id: record.owner_id,
            correlation_id: record.correlation_id,
            removed: record.removed,
        }
    }
}

/// Result of shortening a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    pub short_url: String,
    /// `true` when the URL was already stored and the existing link is
    /// returned.
    pub duplicate: bool,
}

/// One entry of a batch shorten request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub original_url: String,
    pub correlation_id: String,
}

impl BatchItem {
    pub fn new(original_url: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            original_url: original_url.into(),
            correlation_id: correlation_id.into(),
        }
    }
}

/// One entry of a batch shorten response, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLink {
    pub short_url: String,
    pub correlation_id: String,
}

/// A link listed for its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUrl {
    pub original_url: String,
    pub short_url: String,
}
