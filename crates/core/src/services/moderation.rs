//! Moderation service.
//!
//! Approval changes and deletions of uploads and whole events. Every
//! operation is scoped to the organizer that owns the event.

use futures::future::join_all;
use photowall_common::{AppResult, StorageService};
use photowall_db::{
    entities::{event, upload},
    repositories::{ChallengeRepository, EventRepository, UploadRepository},
};
use serde::Serialize;
use tracing::{info, warn};

use super::change_feed::{ChangeEvent, ChangeFeedService, publish_quietly};
use super::event::ensure_owner;

/// Summary of an event deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDeletionReport {
    pub uploads_deleted: u64,
    pub challenges_deleted: u64,
    /// Stored objects that could not be removed.
    pub storage_failures: usize,
}

/// Moderation service.
#[derive(Clone)]
pub struct ModerationService {
    event_repo: EventRepository,
    upload_repo: UploadRepository,
    challenge_repo: ChallengeRepository,
    storage: StorageService,
    feed: ChangeFeedService,
}

impl ModerationService {
    /// Create a new moderation service.
    #[must_use]
    pub const fn new(
        event_repo: EventRepository,
        upload_repo: UploadRepository,
        challenge_repo: ChallengeRepository,
        storage: StorageService,
        feed: ChangeFeedService,
    ) -> Self {
        Self {
            event_repo,
            upload_repo,
            challenge_repo,
            storage,
            feed,
        }
    }

    async fn owned_upload(&self, owner_id: &str, upload_id: &str) -> AppResult<upload::Model> {
        let upload = self.upload_repo.get_by_id(upload_id).await?;
        let event = self.event_repo.get_by_id(&upload.event_id).await?;
        ensure_owner(&event, owner_id)?;
        Ok(upload)
    }

    async fn owned_event(&self, owner_id: &str, event_id: &str) -> AppResult<event::Model> {
        let event = self.event_repo.get_by_id(event_id).await?;
        ensure_owner(&event, owner_id)?;
        Ok(event)
    }

    /// Show an upload on the live wall and public gallery.
    pub async fn approve(&self, owner_id: &str, upload_id: &str) -> AppResult<upload::Model> {
        self.set_approved(owner_id, upload_id, true).await
    }

    /// Hide an upload again.
    pub async fn reject(&self, owner_id: &str, upload_id: &str) -> AppResult<upload::Model> {
        self.set_approved(owner_id, upload_id, false).await
    }

    async fn set_approved(
        &self,
        owner_id: &str,
        upload_id: &str,
        approved: bool,
    ) -> AppResult<upload::Model> {
        let upload = self.owned_upload(owner_id, upload_id).await?;
        let updated = self.upload_repo.set_approved(&upload.id, approved).await?;

        publish_quietly(
            &self.feed,
            ChangeEvent::UploadUpdated {
                event_id: updated.event_id.clone(),
                upload_id: updated.id.clone(),
                approved,
            },
        )
        .await;

        Ok(updated)
    }

    /// Approve every pending upload of an event. Returns how many changed.
    pub async fn approve_all(&self, owner_id: &str, event_id: &str) -> AppResult<u64> {
        let event = self.owned_event(owner_id, event_id).await?;
        let count = self.upload_repo.approve_all_pending(&event.id).await?;

        if count > 0 {
            publish_quietly(
                &self.feed,
                ChangeEvent::UploadsApproved {
                    event_id: event.id.clone(),
                    count,
                },
            )
            .await;
        }

        info!(event_id = %event.id, count, "Approved pending uploads");
        Ok(count)
    }

    /// Delete one upload and, best effort, its stored object.
    pub async fn delete_upload(&self, owner_id: &str, upload_id: &str) -> AppResult<()> {
        let upload = self.owned_upload(owner_id, upload_id).await?;

        if let Err(e) = self.storage.delete(&upload.storage_key).await {
            warn!(key = %upload.storage_key, error = %e, "Failed to delete stored object");
        }

        self.upload_repo.delete(&upload.id).await?;

        publish_quietly(
            &self.feed,
            ChangeEvent::UploadDeleted {
                event_id: upload.event_id,
                upload_id: upload.id,
            },
        )
        .await;

        Ok(())
    }

    /// Delete an event with its uploads, challenges and stored objects.
    ///
    /// Object removal is attempted for every key; failures are counted and
    /// logged. Rows go in foreign key order: uploads, challenges, event.
    pub async fn delete_event(
        &self,
        owner_id: &str,
        event_id: &str,
    ) -> AppResult<EventDeletionReport> {
        let event = self.owned_event(owner_id, event_id).await?;
        let uploads = self.upload_repo.find_by_event(&event.id).await?;

        let keys: Vec<String> = uploads
            .into_iter()
            .map(|u| u.storage_key)
            .chain(event.cover_image_key.clone())
            .collect();

        let results = join_all(keys.iter().map(|key| self.storage.delete(key))).await;
        let mut storage_failures = 0;
        for (key, result) in keys.iter().zip(results) {
            if let Err(e) = result {
                storage_failures += 1;
                warn!(key = %key, error = %e, "Failed to delete stored object");
            }
        }

        let uploads_deleted = self.upload_repo.delete_by_event(&event.id).await?;
        let challenges_deleted = self.challenge_repo.delete_by_event(&event.id).await?;
        self.event_repo.delete(&event.id).await?;

        publish_quietly(
            &self.feed,
            ChangeEvent::EventDeleted {
                event_id: event.id.clone(),
            },
        )
        .await;

        info!(
            event_id = %event.id,
            uploads_deleted,
            challenges_deleted,
            storage_failures,
            "Event deleted"
        );

        Ok(EventDeletionReport {
            uploads_deleted,
            challenges_deleted,
            storage_failures,
        })
    }
}
