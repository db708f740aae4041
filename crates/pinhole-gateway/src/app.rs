use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_batch_handler, create_url_handler, create_url_text_handler, delete_user_urls_handler,
    health_handler, list_user_urls_handler, ping_handler, redirect_handler,
};
use crate::identity::identify;
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/", post(create_url_text_handler))
            .route("/{short_id}", get(redirect_handler))
            .route("/ping", get(ping_handler))
            .route("/health", get(health_handler))
            .nest(
                "/api",
                Router::new()
                    .route("/shorten", post(create_url_handler))
                    .route("/shorten/batch", post(create_batch_handler))
                    .route(
                        "/user/urls",
                        get(list_user_urls_handler).delete(delete_user_urls_handler),
                    ),
            )
            .layer(middleware::from_fn_with_state(state.clone(), identify))
            .layer(CompressionLayer::new())
            .layer(RequestDecompressionLayer::new())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
