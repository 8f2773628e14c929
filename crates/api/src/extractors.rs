//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use photowall_common::AppError;
use photowall_db::entities::organizer;

/// Header guests send the event password in.
pub const EVENT_PASSWORD_HEADER: &str = "x-event-password";

/// Authenticated organizer extractor.
#[derive(Debug, Clone)]
pub struct AuthOrganizer(pub organizer::Model);

impl<S> FromRequestParts<S> for AuthOrganizer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        parts
            .extensions
            .get::<organizer::Model>()
            .cloned()
            .map(AuthOrganizer)
            .ok_or(AppError::Unauthorized)
    }
}

/// Event password sent by a guest, if any.
#[derive(Debug, Clone, Default)]
pub struct EventPassword(pub Option<String>);

impl<S> FromRequestParts<S> for EventPassword
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let password = parts
            .headers
            .get(EVENT_PASSWORD_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(ToString::to_string);
        Ok(Self(password))
    }
}
