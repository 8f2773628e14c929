//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use photowall_common::StorageService;
use photowall_core::{
    BillingService, ChallengeService, EventService, FlyerService, GalleryService,
    LiveWallService, ModerationService, OrganizerService, UploadService,
};

use crate::sse::ChangeFeedBroadcaster;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub organizer_service: OrganizerService,
    pub event_service: EventService,
    pub upload_service: UploadService,
    pub moderation_service: ModerationService,
    pub challenge_service: ChallengeService,
    pub gallery_service: GalleryService,
    pub billing_service: BillingService,
    pub flyer_service: FlyerService,
    pub live_wall_service: LiveWallService,
    pub storage: StorageService,
    pub change_feed: ChangeFeedBroadcaster,
}

/// Authentication middleware.
///
/// Resolves a bearer token to an organizer and stores it in the request
/// extensions. Invalid tokens are ignored here; handlers that need an
/// organizer reject the request through [`crate::extractors::AuthOrganizer`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && let Ok(organizer) = state
            .organizer_service
            .authenticate_by_token(token.trim())
            .await
    {
        req.extensions_mut().insert(organizer);
    }

    next.run(req).await
}
