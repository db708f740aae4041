//! Core types and traits for the Pinhole URL shortener.
//!
//! This crate provides the record model and the [`RecordStore`] contract
//! shared by every storage backend, the storage service and the deletion
//! workers.

pub mod error;
pub mod record;
pub mod short_id;
pub mod store;

pub use error::{Result, StorageError};
pub use record::{Record, SaveOutcome};
pub use short_id::ShortId;
pub use store::RecordStore;
