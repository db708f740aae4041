//! URL domain service and the asynchronous deletion pipeline.
//!
//! [`UrlService`] turns storage records into short links for a base URL.
//! Deletions go through [`TaskPool`], a fixed set of workers draining a
//! shared [`TaskQueue`] outside the request path.

pub mod error;
pub mod service;
pub mod url;
pub mod worker;

pub use error::{Result, ShortenerError};
pub use service::UrlService;
pub use url::{BatchItem, BatchLink, Shortened, Url, UserUrl};
pub use worker::{PoolState, Task, TaskPool, TaskQueue};
