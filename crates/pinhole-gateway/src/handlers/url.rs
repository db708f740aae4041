use crate::error::{AppError, Result};
use crate::identity::UserId;
use crate::model::{BatchRequestItem, BatchResponseItem, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, StringRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use pinhole_core::ShortId;

fn created_or_conflict(duplicate: bool) -> StatusCode {
    if duplicate {
        StatusCode::CONFLICT
    } else {
        StatusCode::CREATED
    }
}

/// Shortens the URL sent as a plain text body.
pub async fn create_url_text_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    headers: HeaderMap,
    body: std::result::Result<String, StringRejection>,
) -> Result<Response> {
    let body = body?;
    let base_url = state.base_url(&headers);
    let shortened = state
        .service()
        .build_url(&base_url, body.trim(), user.as_str())
        .await?;

    Ok((created_or_conflict(shortened.duplicate), shortened.short_url).into_response())
}

pub async fn create_url_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    let base_url = state.base_url(&headers);
    let shortened = state
        .service()
        .build_url(&base_url, request.url.trim(), user.as_str())
        .await?;

    Ok((
        created_or_conflict(shortened.duplicate),
        Json(ShortenResponse {
            result: shortened.short_url,
        }),
    )
        .into_response())
}

pub async fn create_batch_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    headers: HeaderMap,
    payload: std::result::Result<Json<Vec<BatchRequestItem>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<BatchResponseItem>>)> {
    let Json(items) = payload?;
    if items.is_empty() {
        return Err(AppError::BadRequest("batch is empty".to_string()));
    }

    let base_url = state.base_url(&headers);
    let links = state
        .service()
        .build_batch_of_url(
            &base_url,
            items.into_iter().map(Into::into).collect(),
            user.as_str(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(links.into_iter().map(Into::into).collect()),
    ))
}

pub async fn redirect_handler(
    Path(short_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect> {
    let url = state.service().fetch_url(&ShortId::new(short_id)).await?;
    if url.removed {
        return Err(AppError::Gone(url.short_id.into_inner()));
    }

    Ok(Redirect::temporary(&url.original_url))
}
