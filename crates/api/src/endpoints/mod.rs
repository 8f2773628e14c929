//! API endpoints.

#![allow(missing_docs)]

mod auth;
mod billing;
mod challenges;
mod events;
mod files;
mod flyer;
mod form;
mod gallery;
mod guest;
mod uploads;

use axum::Router;

use crate::middleware::AppState;
use crate::sse;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/events", events::router())
        .nest("/uploads", uploads::router())
        .nest("/billing", billing::router())
        .nest("/e", guest::router())
        .merge(challenges::router())
        .merge(gallery::router())
        .merge(flyer::router())
        .merge(sse::router())
}

/// Create the router serving signed file links.
pub fn files_router() -> Router<AppState> {
    files::router()
}
