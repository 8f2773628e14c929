//! Signed file downloads.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use photowall_common::{AppError, AppResult};
use serde::Deserialize;

use crate::middleware::AppState;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// Serve a stored object if the link's signature and expiry check out.
async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> AppResult<impl IntoResponse> {
    let now = Utc::now().timestamp();
    if !state
        .storage
        .verify(&key, query.expires, &query.signature, now)
    {
        return Err(AppError::Forbidden("Invalid or expired link".to_string()));
    }

    let data = state.storage.load(&key).await?;
    let content_type = state.gallery_service.content_type(&key).await?;
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "private, max-age=86400".to_string()),
        ],
        data,
    ))
}

/// Router for `/files`, mounted outside the API prefix.
pub fn router() -> Router<AppState> {
    Router::new().route("/{*key}", get(download))
}
