//! HTTP API layer for photowall.
//!
//! This crate provides the REST API and real-time streaming:
//!
//! - **Endpoints**: organizer dashboard, guest pages, billing and files
//! - **Extractors**: Organizer authentication, event passwords
//! - **Middleware**: Bearer token authentication
//! - **Streaming**: Server-Sent Events for change feeds and live walls
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod sse;

pub use endpoints::{files_router, router};
pub use sse::ChangeFeedBroadcaster;
