use async_trait::async_trait;
use pinhole_core::{Record, RecordStore, Result, ShortId, StorageError};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Schema applied by [`PostgresRecordStore::connect`].
pub const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

/// PostgreSQL implementation of the record store contract.
///
/// Every operation is bounded by the configured timeout. Batch inserts and
/// owner deletes run in one transaction that is rolled back on the first
/// failure. Uniqueness of live values is also declared in the schema through
/// a partial unique index, so removed rows do not block reuse of their value.
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresRecordStore {
    /// Creates a store from an existing pool. The schema is expected to exist.
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Opens a connection pool to `database_url` and applies [`SCHEMA`].
    pub async fn connect(database_url: &str, timeout: Duration) -> Result<Self> {
        let pool = bounded(
            timeout,
            "connect",
            PgPoolOptions::new()
                .acquire_timeout(timeout)
                .connect(database_url),
        )
        .await?;

        let store = Self::new(pool, timeout);
        store.migrate().await?;
        info!("connected to postgres record store");
        Ok(store)
    }

    /// Creates the `urls` table and its indexes when missing.
    pub async fn migrate(&self) -> Result<()> {
        self.bounded("migrate", sqlx::raw_sql(SCHEMA).execute(&self.pool))
            .await?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        bounded(self.timeout, operation, fut).await
    }
}

async fn bounded<T, F>(timeout: Duration, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(map_sqlx_error),
        Err(_) => Err(StorageError::Timeout(format!(
            "{operation} did not finish within {timeout:?}"
        ))),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    if is_unique_violation(&err) {
        return StorageError::Conflict(message);
    }

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn row_to_record(row: &PgRow) -> std::result::Result<Record, sqlx::Error> {
    Ok(Record {
        key: ShortId::new(row.try_get::<String, _>("key")?),
        value: row.try_get("value")?,
        owner_id: row.try_get("user_id")?,
        correlation_id: row.try_get("correlation_id")?,
        removed: row.try_get("removed")?,
    })
}

const INSERT: &str = r#"
    INSERT INTO urls (key, value, user_id, correlation_id)
    VALUES ($1, $2, $3, $4)
"#;

const REMOVE: &str = r#"
    UPDATE urls
    SET removed = TRUE
    WHERE user_id = $1
      AND key = $2
      AND NOT removed
"#;

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn get_by_key(&self, key: &ShortId) -> Result<Record> {
        let row = self
            .bounded(
                "get_by_key",
                sqlx::query(
                    r#"
                    SELECT key, value, user_id, correlation_id, removed
                    FROM urls
                    WHERE key = $1
                    "#,
                )
                .bind(key.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(key.to_string()));
        };
        row_to_record(&row).map_err(map_sqlx_error)
    }

    async fn get_by_value(&self, value: &str) -> Result<Option<Record>> {
        let row = self
            .bounded(
                "get_by_value",
                sqlx::query(
                    r#"
                    SELECT key, value, user_id, correlation_id, removed
                    FROM urls
                    WHERE value = $1
                      AND NOT removed
                    LIMIT 1
                    "#,
                )
                .bind(value)
                .fetch_optional(&self.pool),
            )
            .await?;

        row.as_ref()
            .map(row_to_record)
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn get_all_by_owner(&self, owner_id: &str) -> Result<Vec<Record>> {
        let rows = self
            .bounded(
                "get_all_by_owner",
                sqlx::query(
                    r#"
                    SELECT key, value, user_id, correlation_id, removed
                    FROM urls
                    WHERE user_id = $1
                    ORDER BY id
                    "#,
                )
                .bind(owner_id)
                .fetch_all(&self.pool),
            )
            .await?;

        rows.iter()
            .map(row_to_record)
            .collect::<std::result::Result<_, _>>()
            .map_err(map_sqlx_error)
    }

    async fn save(&self, record: &Record) -> Result<()> {
        self.bounded(
            "save",
            sqlx::query(INSERT)
                .bind(record.key.as_str())
                .bind(&record.value)
                .bind(&record.owner_id)
                .bind(record.correlation_id.as_deref())
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn save_batch(&self, records: &[Record]) -> Result<()> {
        let pool = &self.pool;
        // sqlx prepares INSERT once per connection and reuses it per row.
        self.bounded("save_batch", async move {
            let mut tx = pool.begin().await?;
            for record in records {
                sqlx::query(INSERT)
                    .bind(record.key.as_str())
                    .bind(&record.value)
                    .bind(&record.owner_id)
                    .bind(record.correlation_id.as_deref())
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await
        })
        .await?;

        debug!(count = records.len(), "inserted record batch");
        Ok(())
    }

    async fn delete_by_owner(&self, owner_id: &str, keys: &[ShortId]) -> Result<()> {
        let pool = &self.pool;
        let removed = self
            .bounded("delete_by_owner", async move {
                let mut tx = pool.begin().await?;
                let mut removed = 0u64;
                for key in keys {
                    removed += sqlx::query(REMOVE)
                        .bind(owner_id)
                        .bind(key.as_str())
                        .execute(&mut *tx)
                        .await?
                        .rows_affected();
                }
                tx.commit().await?;
                Ok(removed)
            })
            .await?;

        debug!(owner = %owner_id, requested = keys.len(), removed, "removed records");
        Ok(())
    }

    async fn status(&self) -> Result<()> {
        self.bounded("status", sqlx::query("SELECT 1").execute(&self.pool))
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!("closed postgres connection pool");
        Ok(())
    }
}
