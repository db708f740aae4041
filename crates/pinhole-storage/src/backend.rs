use crate::{FileRecordStore, InMemoryRecordStore, PostgresRecordStore};
use pinhole_core::{RecordStore, Result};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use typed_builder::TypedBuilder;

/// Selects and configures the record store backend.
///
/// A database DSN wins over a file path; with neither set the store is kept
/// in memory.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StorageSettings {
    /// PostgreSQL connection string.
    #[builder(default, setter(strip_option, into))]
    pub database_dsn: Option<String>,
    /// Path of the append-only record log.
    #[builder(default, setter(strip_option, into))]
    pub file_storage_path: Option<PathBuf>,
    /// Upper bound for every PostgreSQL operation.
    #[builder(default = Duration::from_secs(5))]
    pub connection_timeout: Duration,
}

/// The backend a [`StorageSettings`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    InMemory,
    File,
    Postgres,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::InMemory => write!(f, "in-memory"),
            BackendKind::File => write!(f, "file"),
            BackendKind::Postgres => write!(f, "postgres"),
        }
    }
}

impl StorageSettings {
    pub fn kind(&self) -> BackendKind {
        if self.database_dsn.as_deref().is_some_and(|dsn| !dsn.is_empty()) {
            BackendKind::Postgres
        } else if self
            .file_storage_path
            .as_ref()
            .is_some_and(|path| !path.as_os_str().is_empty())
        {
            BackendKind::File
        } else {
            BackendKind::InMemory
        }
    }
}

/// Opens the record store described by `settings`.
pub async fn open(settings: &StorageSettings) -> Result<Arc<dyn RecordStore>> {
    let kind = settings.kind();
    info!(backend = %kind, "opening record store");

    let store: Arc<dyn RecordStore> = match (kind, &settings.database_dsn, &settings.file_storage_path) {
        (BackendKind::Postgres, Some(dsn), _) => {
            Arc::new(PostgresRecordStore::connect(dsn, settings.connection_timeout).await?)
        }
        (BackendKind::File, _, Some(path)) => Arc::new(FileRecordStore::open(path).await?),
        _ => Arc::new(InMemoryRecordStore::new()),
    };

    Ok(store)
}
