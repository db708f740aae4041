//! HTTP front end of the pinhole URL shortener.
//!
//! [`App::router`] builds the axum router: per-device identity cookies,
//! gzip in both directions, request tracing and the shortener routes.

pub mod app;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod model;
pub mod state;

pub use app::App;
pub use identity::{Identity, UserId};
pub use state::{AppState, DynUrlService};
