//! Server-Sent Events (SSE) for real-time updates.
//!
//! Provides the in-process change feed and the SSE streams built on it:
//! raw per-event changes for the organizer dashboard, and live wall frames
//! for displays.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::stream::{self, Stream};
use photowall_common::AppResult;
use photowall_core::{ChangeEvent, ChangeFeed, WallUpdate};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::{extractors::AuthOrganizer, middleware::AppState};

/// Buffered changes per event before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 256;

/// In-process change feed with one broadcast channel per event.
#[derive(Clone, Default)]
pub struct ChangeFeedBroadcaster {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<ChangeEvent>>>>,
}

impl ChangeFeedBroadcaster {
    /// Create a new change feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<ChangeEvent>>> {
        // Entries stay consistent even if a holder panicked
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of events with an open channel.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels().len()
    }

    /// Drop channels nobody listens to anymore.
    pub fn cleanup(&self) {
        self.channels()
            .retain(|_, sender| sender.receiver_count() > 0);
    }
}

#[async_trait]
impl ChangeFeed for ChangeFeedBroadcaster {
    async fn publish(&self, change: ChangeEvent) -> AppResult<()> {
        let mut channels = self.channels();
        let event_id = change.event_id().to_string();
        let closes = matches!(change, ChangeEvent::EventDeleted { .. });

        if let Some(sender) = channels.get(&event_id)
            && sender.send(change).is_err()
        {
            channels.remove(&event_id);
        }
        if closes {
            // Subscribers drain what is buffered, then see the end of the stream
            channels.remove(&event_id);
        }
        Ok(())
    }

    fn subscribe(&self, event_id: &str) -> broadcast::Receiver<ChangeEvent> {
        self.channels()
            .entry(event_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

/// First message on every stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum StreamOpened {
    Connected,
}

fn json_event<T: Serialize>(name: &'static str, data: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|_| Event::default().event(name).data("error"))
}

fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(30))
        .text("ping")
}

/// Raw change stream of one owned event.
async fn event_changes(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let event = state.event_service.get_owned(&organizer.id, &id).await?;
    let rx = state.change_feed.subscribe(&event.id);

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(change) => Some(Ok(json_event("change", &change))),
        Err(e) => {
            debug!(error = %e, "Change stream lagged");
            None
        }
    });

    let initial = stream::once(async { Ok(json_event("connected", &StreamOpened::Connected)) });

    Ok(Sse::new(initial.chain(stream)).keep_alive(keep_alive()))
}

/// Live wall stream for a display. Closing the connection ends the session.
async fn live_wall(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let handle = state.live_wall_service.open(&code).await?;

    let updates = stream::unfold(handle, |mut handle| async move {
        let update = handle.next_update().await?;
        let event = match &update {
            WallUpdate::Frame(frame) => json_event("frame", frame),
            WallUpdate::Message(message) => json_event("message", message),
        };
        Some((Ok(event), handle))
    });

    Ok(Sse::new(updates).keep_alive(keep_alive()))
}

/// Create SSE router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events/{id}/changes", get(event_changes))
        .route("/e/{code}/wall", get(live_wall))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn deleted(id: &str) -> ChangeEvent {
        ChangeEvent::UploadDeleted {
            event_id: id.to_string(),
            upload_id: "u1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_changes_stay_within_their_event() {
        let feed = ChangeFeedBroadcaster::new();
        let mut rx1 = feed.subscribe("ev1");
        let mut rx2 = feed.subscribe("ev2");

        feed.publish(deleted("ev1")).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap(), deleted("ev1"));
        assert!(matches!(
            rx2.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let feed = ChangeFeedBroadcaster::new();
        feed.publish(deleted("ev1")).await.unwrap();
        assert_eq!(feed.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_event_deleted_closes_channel() {
        let feed = ChangeFeedBroadcaster::new();
        let mut rx = feed.subscribe("ev1");

        feed.publish(ChangeEvent::EventDeleted {
            event_id: "ev1".to_string(),
        })
        .await
        .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            ChangeEvent::EventDeleted { .. }
        ));
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert_eq!(feed.channel_count(), 0);
    }

    #[test]
    fn test_cleanup_drops_idle_channels() {
        let feed = ChangeFeedBroadcaster::new();
        let rx = feed.subscribe("ev1");
        let _kept = feed.subscribe("ev2");
        drop(rx);

        feed.cleanup();
        assert_eq!(feed.channel_count(), 1);
    }

    #[test]
    fn test_change_serialization() {
        let json = serde_json::to_string(&ChangeEvent::UploadsApproved {
            event_id: "ev1".to_string(),
            count: 3,
        })
        .unwrap();
        assert!(json.contains("\"type\":\"uploadsApproved\""));
        assert!(json.contains("\"eventId\":\"ev1\""));
    }
}
