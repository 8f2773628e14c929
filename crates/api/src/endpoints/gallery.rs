//! Organizer gallery and export endpoints.

use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use photowall_common::AppResult;

use super::uploads::UploadResponse;
use crate::{extractors::AuthOrganizer, middleware::AppState, response::ApiResponse};

/// Every upload of the event, pending ones included.
async fn list_uploads(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<UploadResponse>>> {
    let uploads = state
        .gallery_service
        .organizer_list(&organizer.id, &id)
        .await?;
    Ok(ApiResponse::ok(
        uploads.into_iter().map(UploadResponse::from).collect(),
    ))
}

/// Download all uploads as one ZIP archive.
async fn export_zip(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let export = state.gallery_service.export_zip(&organizer.id, &id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.file_name),
            ),
        ],
        export.data,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/uploads", get(list_uploads))
        .route("/events/{id}/export.zip", get(export_zip))
}
