//! Realtime change feed.
//!
//! Services publish every mutation of uploads and events here. Consumers
//! (live wall sessions, dashboard streams) subscribe per event id. The
//! in-process implementation lives in the API crate.

use async_trait::async_trait;
use photowall_common::AppResult;
use photowall_db::entities::event::OrderingMode;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A change to one event's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChangeEvent {
    /// A guest uploaded a new item.
    UploadInserted {
        event_id: String,
        upload_id: String,
        approved: bool,
    },
    /// The approval flag of an upload changed.
    UploadUpdated {
        event_id: String,
        upload_id: String,
        approved: bool,
    },
    /// Every pending upload of the event was approved at once.
    UploadsApproved { event_id: String, count: u64 },
    /// An upload was deleted.
    UploadDeleted { event_id: String, upload_id: String },
    /// Event settings changed.
    EventUpdated {
        event_id: String,
        ordering_mode: OrderingMode,
        image_display_duration: i32,
        /// Guests must drop a remembered password verification.
        password_changed: bool,
    },
    /// The event was deleted.
    EventDeleted { event_id: String },
    /// Organizer message to fly across the live wall.
    Broadcast {
        event_id: String,
        id: String,
        message: String,
    },
}

impl ChangeEvent {
    /// The event this change belongs to.
    #[must_use]
    pub fn event_id(&self) -> &str {
        match self {
            Self::UploadInserted { event_id, .. }
            | Self::UploadUpdated { event_id, .. }
            | Self::UploadsApproved { event_id, .. }
            | Self::UploadDeleted { event_id, .. }
            | Self::EventUpdated { event_id, .. }
            | Self::EventDeleted { event_id }
            | Self::Broadcast { event_id, .. } => event_id,
        }
    }

    /// Whether the approved upload set may have changed.
    #[must_use]
    pub const fn touches_uploads(&self) -> bool {
        matches!(
            self,
            Self::UploadInserted { .. }
                | Self::UploadUpdated { .. }
                | Self::UploadsApproved { .. }
                | Self::UploadDeleted { .. }
        )
    }
}

/// Trait for publishing and subscribing to per-event changes.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Publish a change to every subscriber of its event.
    async fn publish(&self, change: ChangeEvent) -> AppResult<()>;

    /// Subscribe to the changes of one event.
    fn subscribe(&self, event_id: &str) -> broadcast::Receiver<ChangeEvent>;
}

/// Wrapper for the shared change feed trait object.
pub type ChangeFeedService = Arc<dyn ChangeFeed>;

/// Publish a change, logging instead of failing the caller.
pub(crate) async fn publish_quietly(feed: &ChangeFeedService, change: ChangeEvent) {
    if let Err(e) = feed.publish(change).await {
        tracing::warn!(error = %e, "Failed to publish change");
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_type_tag() {
        let change = ChangeEvent::UploadInserted {
            event_id: "ev1".to_string(),
            upload_id: "u1".to_string(),
            approved: true,
        };
        let json = serde_json::to_value(&change).unwrap_or_default();
        assert_eq!(json["type"], "uploadInserted");
        assert_eq!(json["eventId"], "ev1");
        assert!(change.touches_uploads());
    }

    struct ClosedFeed;

    #[async_trait]
    impl ChangeFeed for ClosedFeed {
        async fn publish(&self, _change: ChangeEvent) -> AppResult<()> {
            Err(photowall_common::AppError::Internal("feed closed".to_string()))
        }

        fn subscribe(&self, _event_id: &str) -> broadcast::Receiver<ChangeEvent> {
            broadcast::channel(1).1
        }
    }

    #[tokio::test]
    async fn test_quiet_publish_swallows_errors() {
        let feed: ChangeFeedService = Arc::new(ClosedFeed);
        publish_quietly(
            &feed,
            ChangeEvent::EventDeleted {
                event_id: "ev1".to_string(),
            },
        )
        .await;
    }
}
