//! Challenge endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use photowall_common::AppResult;
use photowall_core::{CreateChallengeInput, UpdateChallengeInput};
use photowall_db::entities::challenge;

use crate::{
    extractors::AuthOrganizer,
    middleware::AppState,
    response::{ApiResponse, Created, no_content},
};

async fn list_challenges(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> AppResult<ApiResponse<Vec<challenge::Model>>> {
    let event = state
        .event_service
        .get_owned(&organizer.id, &event_id)
        .await?;
    let challenges = state.challenge_service.list(&event.id).await?;
    Ok(ApiResponse::ok(challenges))
}

async fn create_challenge(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(input): Json<CreateChallengeInput>,
) -> AppResult<Created<challenge::Model>> {
    let challenge = state
        .challenge_service
        .create(&organizer.id, &event_id, input)
        .await?;
    Ok(Created(challenge))
}

async fn update_challenge(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateChallengeInput>,
) -> AppResult<ApiResponse<challenge::Model>> {
    let challenge = state
        .challenge_service
        .update(&organizer.id, &id, input)
        .await?;
    Ok(ApiResponse::ok(challenge))
}

async fn delete_challenge(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.challenge_service.delete(&organizer.id, &id).await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/events/{id}/challenges",
            get(list_challenges).post(create_challenge),
        )
        .route(
            "/challenges/{id}",
            patch(update_challenge).delete(delete_challenge),
        )
}
