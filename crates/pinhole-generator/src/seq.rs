use crate::Generator;
use pinhole_core::ShortId;
use std::sync::atomic::{AtomicU64, Ordering};

/// A sequential short id generator.
///
/// This generator produces codes like "ph000000", "ph000001", etc. It is
/// unique within a single instance only, which makes it a good fit for tests
/// and single-node demos.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl SeqGenerator {
    /// Creates a new sequential generator with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Creates a new sequential generator starting from a specific counter value.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Generator for SeqGenerator {
    fn generate(&self) -> ShortId {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        ShortId::new(format!("{}{:06}", self.prefix, count))
    }
}
