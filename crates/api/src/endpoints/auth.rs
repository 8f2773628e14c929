//! Organizer authentication endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use photowall_common::AppResult;
use photowall_core::{OrganizerSession, SignInInput, SignUpInput};
use photowall_db::entities::organizer;
use serde::Serialize;

use crate::{extractors::AuthOrganizer, middleware::AppState, response::ApiResponse};

/// Create a new organizer account.
async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignUpInput>,
) -> AppResult<ApiResponse<OrganizerSession>> {
    let session = state.organizer_service.sign_up(input).await?;
    Ok(ApiResponse::ok(session))
}

/// Sign in to an existing account.
async fn signin(
    State(state): State<AppState>,
    Json(input): Json<SignInInput>,
) -> AppResult<ApiResponse<OrganizerSession>> {
    let session = state.organizer_service.sign_in(input).await?;
    Ok(ApiResponse::ok(session))
}

#[derive(Serialize)]
pub struct SignoutResponse {
    pub ok: bool,
}

/// Sign out (invalidate current token by regenerating).
async fn signout(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<SignoutResponse>> {
    state.organizer_service.regenerate_token(&organizer.id).await?;
    Ok(ApiResponse::ok(SignoutResponse { ok: true }))
}

/// The signed in organizer.
async fn me(AuthOrganizer(organizer): AuthOrganizer) -> ApiResponse<organizer::Model> {
    ApiResponse::ok(organizer)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/me", get(me))
}
