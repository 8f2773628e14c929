//! Guest endpoints, addressed by join code.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, FixedOffset};
use photowall_common::AppResult;
use photowall_core::{PublicEvent, UploadInput, qr_svg};
use photowall_db::entities::{challenge, upload};
use serde::{Deserialize, Serialize};

use super::form::{Form, MULTIPART_BODY_LIMIT};
use crate::{
    extractors::EventPassword,
    middleware::AppState,
    response::{ApiResponse, Created},
};

async fn show_event(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<ApiResponse<PublicEvent>> {
    let event = state.event_service.public_view(&code).await?;
    Ok(ApiResponse::ok(event))
}

#[derive(Deserialize)]
pub struct VerifyPasswordRequest {
    pub password: String,
}

#[derive(Serialize)]
pub struct VerifyPasswordResponse {
    pub ok: bool,
}

/// Check a password entry. Clients remember success per device.
async fn verify_password(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<VerifyPasswordRequest>,
) -> AppResult<ApiResponse<VerifyPasswordResponse>> {
    state
        .event_service
        .verify_password(&code, &req.password)
        .await?;
    Ok(ApiResponse::ok(VerifyPasswordResponse { ok: true }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestUploadResponse {
    pub id: String,
    pub url: String,
    pub approved: bool,
    pub message: &'static str,
}

/// Upload a photo or video.
///
/// Form fields: `file`, `uploaderName`, `caption`, `challengeId`,
/// `password`. The password may also come in the event password header.
async fn upload(
    State(state): State<AppState>,
    Path(code): Path<String>,
    EventPassword(header_password): EventPassword,
    multipart: Multipart,
) -> AppResult<Created<GuestUploadResponse>> {
    let mut form = Form::read(multipart).await?;
    let file = form.take_file()?;

    let outcome = state
        .upload_service
        .upload(UploadInput {
            code,
            file_name: file.file_name,
            content_type: file.content_type,
            data: file.data,
            uploader_name: form.text("uploaderName"),
            caption: form.text("caption"),
            challenge_id: form.text("challengeId"),
            password: form.text("password").or(header_password),
        })
        .await?;

    let message = if outcome.approved {
        "Upload erfolgreich!"
    } else {
        "Upload erfolgreich! Dein Beitrag erscheint nach der Freigabe."
    };

    Ok(Created(GuestUploadResponse {
        id: outcome.upload.id,
        url: outcome.url,
        approved: outcome.approved,
        message,
    }))
}

/// Gallery entry visible to guests.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub id: String,
    pub url: String,
    pub mime_type: String,
    pub uploader_name: Option<String>,
    pub caption: Option<String>,
    pub challenge_id: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<upload::Model> for GalleryItem {
    fn from(upload: upload::Model) -> Self {
        Self {
            id: upload.id,
            url: upload.url,
            mime_type: upload.mime_type,
            uploader_name: upload.uploader_name,
            caption: upload.caption,
            challenge_id: upload.challenge_id,
            created_at: upload.created_at,
        }
    }
}

/// Approved uploads, newest first.
async fn gallery(
    State(state): State<AppState>,
    Path(code): Path<String>,
    EventPassword(password): EventPassword,
) -> AppResult<ApiResponse<Vec<GalleryItem>>> {
    let uploads = state
        .gallery_service
        .public_list(&code, password.as_deref())
        .await?;
    Ok(ApiResponse::ok(
        uploads.into_iter().map(GalleryItem::from).collect(),
    ))
}

async fn challenges(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<ApiResponse<Vec<challenge::Model>>> {
    let event = state.event_service.find_by_code(&code).await?;
    let challenges = state.challenge_service.list(&event.id).await?;
    Ok(ApiResponse::ok(challenges))
}

/// QR code of the upload link, for the wall overlay and printouts.
async fn qr_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<impl IntoResponse> {
    let event = state.event_service.find_by_code(&code).await?;
    let svg = qr_svg(&state.event_service.upload_url(&event.code))?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        svg,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{code}", get(show_event))
        .route("/{code}/verify-password", post(verify_password))
        .route(
            "/{code}/uploads",
            post(upload).layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT)),
        )
        .route("/{code}/gallery", get(gallery))
        .route("/{code}/challenges", get(challenges))
        .route("/{code}/qr.svg", get(qr_code))
}
