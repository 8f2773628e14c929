//! Flyer export endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::post,
};
use photowall_common::AppResult;
use photowall_core::FlyerOptions;

use crate::{extractors::AuthOrganizer, middleware::AppState};

async fn preview(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(options): Json<FlyerOptions>,
) -> AppResult<impl IntoResponse> {
    let png = state
        .flyer_service
        .preview_png(&organizer.id, &id, options)
        .await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

async fn pdf(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(options): Json<FlyerOptions>,
) -> AppResult<impl IntoResponse> {
    let pdf = state.flyer_service.pdf(&organizer.id, &id, options).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"flyer.pdf\""),
        ],
        pdf,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/flyer.png", post(preview))
        .route("/events/{id}/flyer.pdf", post(pdf))
}
