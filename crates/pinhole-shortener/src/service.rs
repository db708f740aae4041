use crate::error::{Result, ShortenerError};
use crate::url::{BatchItem, BatchLink, Shortened, Url, UserUrl};
use crate::worker::TaskPool;
use pinhole_core::{Record, ShortId};
use pinhole_generator::Generator;
use pinhole_storage::StorageService;
use tracing::{debug, info};

/// Longest URL accepted for shortening, in bytes.
pub const MAX_URL_LEN: usize = 2048;

/// URL domain service.
///
/// Creates and resolves short links through a [`StorageService`] and hands
/// deletions to a [`TaskPool`]. Short ids come from the configured
/// [`Generator`]; no collision retry is performed.
#[derive(Debug)]
pub struct UrlService<G> {
    storage: StorageService,
    pool: TaskPool,
    generator: G,
}

impl<G: Generator> UrlService<G> {
    pub fn new(storage: StorageService, pool: TaskPool, generator: G) -> Self {
        Self {
            storage,
            pool,
            generator,
        }
    }

    /// Returns the deletion pool.
    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    /// Checks that `url` is a non-empty http(s) URL with a host.
    pub fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }
        if url.len() > MAX_URL_LEN {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL is longer than {MAX_URL_LEN} bytes"
            )));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {url}"
            )));
        };

        let scheme = scheme.to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {scheme}"
            )));
        }

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let host = authority.rsplit('@').next().unwrap_or_default();
        if host.is_empty() || host.starts_with(':') || url.chars().any(char::is_whitespace) {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {url}"
            )));
        }

        Ok(())
    }

    /// Resolves a short id. Removed records are returned with
    /// `removed = true`; it is up to the caller to treat them as gone.
    pub async fn fetch_url(&self, short_id: &ShortId) -> Result<Url> {
        Ok(self.storage.get_by_key(short_id).await?.into())
    }

    /// Lists the live links created by `owner_id`, oldest first.
    pub async fn fetch_user_urls(&self, base_url: &str, owner_id: &str) -> Result<Vec<UserUrl>> {
        let records = self.storage.get_all_by_owner(owner_id).await?;

        Ok(records
            .into_iter()
            .filter(Record::is_live)
            .map(|record| UserUrl {
                short_url: record.key.to_url(base_url),
                original_url: record.value,
            })
            .collect())
    }

    /// Shortens `full_url` for `owner_id`.
    ///
    /// When a live link for the same URL exists, that link is returned with
    /// `duplicate = true` and nothing is stored.
    pub async fn build_url(&self, base_url: &str, full_url: &str, owner_id: &str) -> Result<Shortened> {
        Self::validate_url(full_url)?;

        let record = Record::new(self.generator.generate(), full_url, owner_id);
        let outcome = self.storage.save(record).await?;
        let duplicate = outcome.is_duplicate();
        let short_url = outcome.record().key.to_url(base_url);

        debug!(owner = %owner_id, key = %outcome.record().key, duplicate, "built short url");
        Ok(Shortened {
            short_url,
            duplicate,
        })
    }

    /// Shortens every item, returning links in request order.
    ///
    /// The whole batch is rejected if any URL is invalid. Items whose URL is
    /// already stored resolve to the existing link.
    pub async fn build_batch_of_url(
        &self,
        base_url: &str,
        items: Vec<BatchItem>,
        owner_id: &str,
    ) -> Result<Vec<BatchLink>> {
        for item in &items {
            Self::validate_url(&item.original_url)?;
        }

        let records = items
            .iter()
            .map(|item| {
                Record::new(self.generator.generate(), item.original_url.as_str(), owner_id)
                    .with_correlation_id(item.correlation_id.as_str())
            })
            .collect();
        let outcomes = self.storage.save_batch_of_record(records).await?;

        debug!(owner = %owner_id, count = items.len(), "built batch of short urls");
        Ok(items
            .into_iter()
            .zip(outcomes)
            .map(|(item, outcome)| BatchLink {
                short_url: outcome.record().key.to_url(base_url),
                correlation_id: item.correlation_id,
            })
            .collect())
    }

    /// Queues the soft-delete of `short_ids` owned by `owner_id` and returns
    /// without waiting for it.
    pub fn delete_user_urls(&self, owner_id: &str, short_ids: Vec<ShortId>) -> Result<()> {
        debug!(owner = %owner_id, count = short_ids.len(), "queueing deletion");
        self.pool.push(owner_id, short_ids)
    }

    pub async fn status(&self) -> Result<()> {
        Ok(self.storage.status().await?)
    }

    /// Closes the deletion queue, waits for the workers to drain it and
    /// closes the record store.
    pub async fn shutdown(&self) -> Result<()> {
        self.pool.close();
        self.pool.join().await;
        info!(processed = self.pool.processed(), "deletion workers drained");

        self.storage.shutdown().await?;
        Ok(())
    }
}
