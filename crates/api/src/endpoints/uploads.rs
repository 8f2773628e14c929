//! Organizer upload moderation endpoints.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
};
use chrono::{DateTime, FixedOffset};
use photowall_common::AppResult;
use photowall_db::entities::upload;
use serde::Serialize;

use crate::{
    extractors::AuthOrganizer,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Upload as shown to the organizer.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub event_id: String,
    pub url: String,
    pub mime_type: String,
    pub uploader_name: Option<String>,
    pub caption: Option<String>,
    pub challenge_id: Option<String>,
    pub approved: bool,
    pub created_at: DateTime<FixedOffset>,
}

impl From<upload::Model> for UploadResponse {
    fn from(upload: upload::Model) -> Self {
        Self {
            id: upload.id,
            event_id: upload.event_id,
            url: upload.url,
            mime_type: upload.mime_type,
            uploader_name: upload.uploader_name,
            caption: upload.caption,
            challenge_id: upload.challenge_id,
            approved: upload.approved,
            created_at: upload.created_at,
        }
    }
}

async fn approve(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UploadResponse>> {
    let upload = state.moderation_service.approve(&organizer.id, &id).await?;
    Ok(ApiResponse::ok(upload.into()))
}

async fn reject(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UploadResponse>> {
    let upload = state.moderation_service.reject(&organizer.id, &id).await?;
    Ok(ApiResponse::ok(upload.into()))
}

async fn delete_upload(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .moderation_service
        .delete_upload(&organizer.id, &id)
        .await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", delete(delete_upload))
        .route("/{id}/approve", post(approve))
        .route("/{id}/reject", post(reject))
}
