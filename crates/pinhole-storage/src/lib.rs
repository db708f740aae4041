//! Record store backends and the storage service built on top of them.
//!
//! Three interchangeable [`RecordStore`] implementations live here:
//! a volatile in-memory map, an append-only JSON log replayed at startup and
//! a PostgreSQL table. [`open`] picks one from [`StorageSettings`];
//! [`StorageService`] adds the live-duplicate check and batch semantics.

pub mod backend;
pub mod file;
pub mod memory;
pub mod postgres;
pub mod service;

mod index;

pub use backend::{open, BackendKind, StorageSettings};
pub use file::FileRecordStore;
pub use memory::InMemoryRecordStore;
pub use pinhole_core::{Record, RecordStore, Result, SaveOutcome, ShortId, StorageError};
pub use postgres::PostgresRecordStore;
pub use service::StorageService;
