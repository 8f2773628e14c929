//! Organizer event endpoints.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
};
use chrono::{DateTime, FixedOffset};
use photowall_common::AppResult;
use photowall_core::{
    CreateEventInput, EventDeletionReport, EventStats, UpdateEventInput, WallMessage,
};
use photowall_db::entities::event::{self, OrderingMode};
use serde::{Deserialize, Serialize};

use super::form::{Form, MULTIPART_BODY_LIMIT};
use crate::{
    extractors::AuthOrganizer,
    middleware::AppState,
    response::{ApiResponse, Created},
};

/// Event as shown on the dashboard.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub name: String,
    pub code: String,
    pub upload_url: String,
    pub cover_image_url: Option<String>,
    pub auto_approval: bool,
    pub password_protected: bool,
    pub image_display_duration: i32,
    pub background_theme: String,
    pub header_theme: String,
    pub ordering_mode: OrderingMode,
    pub upload_limit: i32,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: Option<DateTime<FixedOffset>>,
}

impl EventResponse {
    fn new(state: &AppState, event: event::Model) -> Self {
        Self {
            upload_url: state.event_service.upload_url(&event.code),
            password_protected: event.password.is_some(),
            id: event.id,
            name: event.name,
            code: event.code,
            cover_image_url: event.cover_image_url,
            auto_approval: event.auto_approval,
            image_display_duration: event.image_display_duration,
            background_theme: event.background_theme,
            header_theme: event.header_theme,
            ordering_mode: event.ordering_mode,
            upload_limit: event.upload_limit,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

async fn list_events(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<EventResponse>>> {
    let events = state.event_service.list(&organizer.id).await?;
    Ok(ApiResponse::ok(
        events
            .into_iter()
            .map(|e| EventResponse::new(&state, e))
            .collect(),
    ))
}

async fn create_event(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Json(input): Json<CreateEventInput>,
) -> AppResult<Created<EventResponse>> {
    let event = state.event_service.create(&organizer.id, input).await?;
    Ok(Created(EventResponse::new(&state, event)))
}

async fn get_event(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<EventResponse>> {
    let event = state.event_service.get_owned(&organizer.id, &id).await?;
    Ok(ApiResponse::ok(EventResponse::new(&state, event)))
}

async fn update_event(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateEventInput>,
) -> AppResult<ApiResponse<EventResponse>> {
    let event = state
        .event_service
        .update(&organizer.id, &id, input)
        .await?;
    Ok(ApiResponse::ok(EventResponse::new(&state, event)))
}

/// Delete an event with all uploads, challenges and stored files.
async fn delete_event(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<EventDeletionReport>> {
    let report = state
        .moderation_service
        .delete_event(&organizer.id, &id)
        .await?;
    Ok(ApiResponse::ok(report))
}

async fn event_stats(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<EventStats>> {
    let stats = state.event_service.stats(&organizer.id, &id).await?;
    Ok(ApiResponse::ok(stats))
}

#[derive(Serialize)]
pub struct PasswordResponse {
    pub password: Option<String>,
}

/// Current event password in clear text, for the settings form.
async fn event_password(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PasswordResponse>> {
    let password = state.event_service.password(&organizer.id, &id).await?;
    Ok(ApiResponse::ok(PasswordResponse { password }))
}

/// Replace the cover image.
async fn upload_cover(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<ApiResponse<EventResponse>> {
    let file = Form::read(multipart).await?.take_file()?;
    let event = state
        .event_service
        .set_cover(
            &organizer.id,
            &id,
            &file.file_name,
            &file.content_type,
            &file.data,
        )
        .await?;
    Ok(ApiResponse::ok(EventResponse::new(&state, event)))
}

#[derive(Serialize)]
pub struct ApproveAllResponse {
    pub approved: u64,
}

/// Approve every pending upload.
async fn approve_all(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ApproveAllResponse>> {
    let approved = state
        .moderation_service
        .approve_all(&organizer.id, &id)
        .await?;
    Ok(ApiResponse::ok(ApproveAllResponse { approved }))
}

#[derive(Deserialize)]
pub struct BroadcastRequest {
    pub message: String,
}

/// Fly a message across every open live wall of the event.
async fn broadcast(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<BroadcastRequest>,
) -> AppResult<ApiResponse<WallMessage>> {
    let message = state
        .live_wall_service
        .broadcast(&organizer.id, &id, &req.message)
        .await?;
    Ok(ApiResponse::ok(message))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route(
            "/{id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/{id}/stats", get(event_stats))
        .route("/{id}/password", get(event_password))
        .route(
            "/{id}/cover",
            post(upload_cover).layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT)),
        )
        .route("/{id}/approve-all", post(approve_all))
        .route("/{id}/broadcast", post(broadcast))
}
