use crate::index::RecordIndex;
use async_trait::async_trait;
use pinhole_core::{Record, RecordStore, Result, ShortId, StorageError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

/// Durable record store backed by an append-only log.
///
/// Every mutation appends the full record as one line of JSON. Opening the
/// store replays the log in order into an in-memory index where the last
/// line written for a key wins. The log is never compacted.
///
/// A single lock covers both the index update and the log append, so the
/// order of lines on disk always matches the order of changes in memory.
/// A record reaches the index only after its line is on disk. A failed
/// append cuts the log back to its last complete line and stops all
/// further writes.
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    state: RwLock<LogState>,
}

#[derive(Debug)]
struct LogState {
    index: RecordIndex,
    /// `None` once the store has been closed or an append failed.
    log: Option<LogFile>,
}

#[derive(Debug)]
struct LogFile {
    file: File,
    /// Length of the log up to its last complete line.
    len: u64,
}

impl LogFile {
    async fn append(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.file.write_all(line).await?;
        self.file.flush().await?;
        self.len += line.len() as u64;
        Ok(())
    }

    /// Drops whatever part of a failed append reached the file.
    async fn truncate_torn_tail(&mut self) {
        if let Err(err) = self.file.set_len(self.len).await {
            warn!(error = %err, len = self.len, "could not truncate record log");
        }
    }
}

impl LogState {
    fn log(&mut self) -> Result<&mut LogFile> {
        self.log
            .as_mut()
            .ok_or_else(|| StorageError::Unavailable("record log is not writable".to_string()))
    }

    /// Appends `record` to the log, then applies it to the index.
    async fn write(&mut self, record: Record) -> Result<()> {
        let line = encode(&record)?;

        let appended = self.log()?.append(&line).await;
        if let Err(err) = appended {
            if let Some(mut log) = self.log.take() {
                log.truncate_torn_tail().await;
            }
            error!(key = %record.key, error = %err, "record log append failed, log closed for writes");
            return Err(err.into());
        }

        self.index.upsert(record);
        Ok(())
    }
}

impl FileRecordStore {
    /// Opens the log at `path`, creating it (and its parent directory) when
    /// missing, and replays it into memory.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let index = replay(&path).await?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let len = file.metadata().await?.len();

        info!(path = %path.display(), records = index.len(), "replayed record log");

        Ok(Self {
            path,
            state: RwLock::new(LogState {
                index,
                log: Some(LogFile { file, len }),
            }),
        })
    }

    /// Returns the path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn replay(path: &Path) -> Result<RecordIndex> {
    let mut index = RecordIndex::default();

    let file = match File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(index),
        Err(err) => return Err(err.into()),
    };

    let mut lines = BufReader::new(file).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(&line).map_err(|e| {
            StorageError::InvalidData(format!("{}:{}: {e}", path.display(), line_no))
        })?;
        index.upsert(record);
    }

    debug!(path = %path.display(), lines = line_no, "read record log");
    Ok(index)
}

fn encode(record: &Record) -> Result<Vec<u8>> {
    let mut line =
        serde_json::to_vec(record).map_err(|e| StorageError::InvalidData(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get_by_key(&self, key: &ShortId) -> Result<Record> {
        self.state
            .read()
            .await
            .index
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn get_by_value(&self, value: &str) -> Result<Option<Record>> {
        Ok(self
            .state
            .read()
            .await
            .index
            .find_live_by_value(value)
            .cloned())
    }

    async fn get_all_by_owner(&self, owner_id: &str) -> Result<Vec<Record>> {
        Ok(self.state.read().await.index.by_owner(owner_id))
    }

    async fn save(&self, record: &Record) -> Result<()> {
        let mut state = self.state.write().await;
        state.index.check_insert(record)?;
        state.write(record.clone()).await?;
        trace!(key = %record.key, "appended record");
        Ok(())
    }

    /// Appends the records one by one. A failed append leaves the records
    /// before it in place.
    async fn save_batch(&self, records: &[Record]) -> Result<()> {
        let mut state = self.state.write().await;
        state.index.check_batch(records)?;
        for record in records {
            state.write(record.clone()).await?;
        }
        trace!(count = records.len(), "appended record batch");
        Ok(())
    }

    async fn delete_by_owner(&self, owner_id: &str, keys: &[ShortId]) -> Result<()> {
        let mut state = self.state.write().await;
        for key in keys {
            if let Some(removed) = state.index.removal_of(owner_id, key) {
                state.write(removed).await?;
                trace!(owner = %owner_id, key = %key, "appended removal");
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(mut log) = state.log.take() {
            log.file.flush().await?;
            log.file.sync_all().await?;
            info!(path = %self.path.display(), "closed record log");
        }
        Ok(())
    }
}
