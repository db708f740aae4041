use std::sync::Arc;

use axum::http::{header, HeaderMap};
use pinhole_generator::Generator;
use pinhole_shortener::UrlService;

use crate::identity::Identity;

/// The URL service as shared by every handler.
pub type DynUrlService = UrlService<Arc<dyn Generator>>;

#[derive(Clone)]
pub struct AppState {
    service: Arc<DynUrlService>,
    identity: Arc<Identity>,
    base_url: Option<String>,
}

impl AppState {
    pub fn new(service: Arc<DynUrlService>, identity: Identity) -> Self {
        Self {
            service,
            identity: Arc::new(identity),
            base_url: None,
        }
    }

    /// Renders short links under `base_url` instead of the request host.
    /// An empty value keeps the host fallback.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/');
        self.base_url = (!base_url.is_empty()).then(|| base_url.to_string());
        self
    }

    pub fn service(&self) -> &DynUrlService {
        &self.service
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Base URL for short links: the configured one, else `http://<Host>`.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(base_url) = &self.base_url {
            return base_url.clone();
        }

        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .filter(|host| !host.is_empty())
            .unwrap_or("localhost");
        format!("http://{host}")
    }
}
