use pinhole_shortener::{BatchItem, BatchLink, UserUrl};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequestItem {
    pub original_url: String,
    #[serde(default)]
    pub correlation_id: String,
}

impl From<BatchRequestItem> for BatchItem {
    fn from(value: BatchRequestItem) -> Self {
        BatchItem::new(value.original_url, value.correlation_id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponseItem {
    pub short_url: String,
    pub correlation_id: String,
}

impl From<BatchLink> for BatchResponseItem {
    fn from(value: BatchLink) -> Self {
        Self {
            short_url: value.short_url,
            correlation_id: value.correlation_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserUrlResponse {
    pub original_url: String,
    pub short_url: String,
}

impl From<UserUrl> for UserUrlResponse {
    fn from(value: UserUrl) -> Self {
        Self {
            original_url: value.original_url,
            short_url: value.short_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
