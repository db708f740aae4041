use crate::error::Result;
use crate::identity::UserId;
use crate::model::UserUrlResponse;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use pinhole_core::ShortId;

/// Lists the caller's live links; `204 No Content` when there are none.
pub async fn list_user_urls_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    headers: HeaderMap,
) -> Result<Response> {
    let base_url = state.base_url(&headers);
    let urls = state
        .service()
        .fetch_user_urls(&base_url, user.as_str())
        .await?;

    if urls.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<UserUrlResponse> = urls.into_iter().map(Into::into).collect();
    Ok(Json(body).into_response())
}

/// Queues the deletion of the listed short ids and answers `202 Accepted`
/// right away.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    payload: std::result::Result<Json<Vec<String>>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(short_ids) = payload?;
    state
        .service()
        .delete_user_urls(user.as_str(), short_ids.into_iter().map(ShortId::from).collect())?;

    Ok(StatusCode::ACCEPTED)
}
