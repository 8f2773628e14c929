//! Guest upload ingestion.

use chrono::Utc;
use photowall_common::{AppError, AppResult, IdGenerator, StorageService, generate_storage_key};
use photowall_db::{
    entities::upload,
    repositories::{ChallengeRepository, EventRepository, UploadRepository},
};
use sea_orm::Set;
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;

use super::change_feed::{ChangeEvent, ChangeFeedService, publish_quietly};
use super::event::{check_event_password, normalize_code};

/// Largest accepted file, 10 MB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Error for files over [`MAX_UPLOAD_BYTES`].
pub fn media_too_large() -> AppError {
    AppError::PayloadTooLarge("Die Datei ist zu groß. Maximal 10 MB erlaubt.".to_string())
}

/// Check media type and size before anything touches storage.
pub fn validate_media_file(content_type: &str, size: usize) -> AppResult<()> {
    if !(content_type.starts_with("image/") || content_type.starts_with("video/")) {
        return Err(AppError::Validation(
            "Nur Bilder und Videos sind erlaubt.".to_string(),
        ));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(media_too_large());
    }
    Ok(())
}

/// A guest upload as received from the upload form.
#[derive(Debug, Clone, Validate)]
pub struct UploadInput {
    pub code: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    #[validate(length(max = 64))]
    pub uploader_name: Option<String>,
    #[validate(length(max = 500))]
    pub caption: Option<String>,
    pub challenge_id: Option<String>,
    pub password: Option<String>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub upload: upload::Model,
    pub url: String,
    /// Whether the upload went live without moderation.
    pub approved: bool,
}

/// Upload ingestion service.
#[derive(Clone)]
pub struct UploadService {
    event_repo: EventRepository,
    upload_repo: UploadRepository,
    challenge_repo: ChallengeRepository,
    storage: StorageService,
    feed: ChangeFeedService,
    id_gen: IdGenerator,
}

impl UploadService {
    /// Create a new upload service.
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
            id_gen: IdGenerator::new(),
        }
    }

    /// Ingest one guest upload.
    pub async fn upload(&self, input: UploadInput) -> AppResult<UploadOutcome> {
        validate_media_file(&input.content_type, input.data.len())?;
        input.validate()?;

        let event = self
            .event_repo
            .find_by_code(&normalize_code(&input.code))
            .await
            .map_err(|e| {
                warn!(error = %e, "Event lookup failed");
                AppError::NotFound("Event nicht gefunden.".to_string())
            })?
            .ok_or_else(|| AppError::NotFound("Event nicht gefunden.".to_string()))?;

        check_event_password(&event, input.password.as_deref())?;

        let used = self.upload_repo.count_by_event(&event.id).await?;
        if used >= u64::try_from(event.upload_limit.max(0)).unwrap_or(0) {
            return Err(AppError::Forbidden(
                "Das Upload-Limit für dieses Event ist erreicht.".to_string(),
            ));
        }

        let challenge_id = match non_empty(input.challenge_id) {
            Some(id) => {
                let challenge = self.challenge_repo.find_by_id(&id).await?;
                if challenge.is_none_or(|c| c.event_id != event.id) {
                    return Err(AppError::Validation(
                        "Die gewählte Challenge gehört nicht zu diesem Event.".to_string(),
                    ));
                }
                Some(id)
            }
            None => None,
        };

        let key = generate_storage_key(&event.code, &input.file_name);
        self.storage
            .save(&key, &input.data, &input.content_type)
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Storage write failed");
                AppError::Storage("Fehler beim Hochladen der Datei.".to_string())
            })?;

        let url = match self
            .storage
            .signed_url(&key, self.storage.default_ttl())
            .await
        {
            Ok(url) => url,
            Err(e) => {
                warn!(key = %key, error = %e, "Signing failed");
                self.discard(&key).await;
                return Err(AppError::Storage(
                    "Fehler beim Erstellen der Datei-URL.".to_string(),
                ));
            }
        };

        let model = upload::ActiveModel {
            id: Set(self.id_gen.generate()),
            event_id: Set(event.id.clone()),
            url: Set(url.clone()),
            storage_key: Set(key.clone()),
            mime_type: Set(input.content_type),
            uploader_name: Set(non_empty(input.uploader_name)),
            caption: Set(non_empty(input.caption)),
            challenge_id: Set(challenge_id),
            approved: Set(event.auto_approval),
            created_at: Set(Utc::now().into()),
        };

        let upload = match self.upload_repo.create(model).await {
            Ok(upload) => upload,
            Err(e) => {
                warn!(key = %key, error = %e, "Upload insert failed");
                self.discard(&key).await;
                return Err(AppError::Database(
                    "Fehler beim Speichern des Uploads.".to_string(),
                ));
            }
        };

        info!(
            event_id = %event.id,
            upload_id = %upload.id,
            approved = upload.approved,
            "Upload stored"
        );

        publish_quietly(
            &self.feed,
            ChangeEvent::UploadInserted {
                event_id: event.id,
                upload_id: upload.id.clone(),
                approved: upload.approved,
            },
        )
        .await;

        Ok(UploadOutcome {
            approved: upload.approved,
            url,
            upload,
        })
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            warn!(key = %key, error = %e, "Failed to remove orphaned object");
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::services::change_feed::testing::RecordingFeed;
    use crate::services::event::tests::{create_test_event, test_storage};
    use photowall_common::{MemoryStorage, obfuscate_event_password};
    use photowall_db::entities::{challenge, event};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    pub fn create_test_upload(id: &str, event_id: &str, approved: bool) -> upload::Model {
        upload::Model {
            id: id.to_string(),
            event_id: event_id.to_string(),
            url: format!("https://wall.example.com/files/PARTY1/{id}.jpg"),
            storage_key: format!("PARTY1/{id}.jpg"),
            mime_type: "image/jpeg".to_string(),
            uploader_name: None,
            caption: None,
            challenge_id: None,
            approved,
            created_at: Utc::now().into(),
        }
    }

    pub fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        maplit::btreemap! { "num_items" => Value::BigInt(Some(n)) }
    }

    fn jpeg_input() -> UploadInput {
        UploadInput {
            code: "party1".to_string(),
            file_name: "IMG_0001.JPG".to_string(),
            content_type: "image/jpeg".to_string(),
            data: vec![0xFF, 0xD8, 0xFF, 0xE0],
            uploader_name: None,
            caption: None,
            challenge_id: None,
            password: None,
        }
    }

    fn service(
        db: DatabaseConnection,
    ) -> (UploadService, Arc<MemoryStorage>, Arc<RecordingFeed>) {
        let db = Arc::new(db);
        let (backend, storage) = test_storage();
        let feed = RecordingFeed::new();
        let service = UploadService::new(
            EventRepository::new(db.clone()),
            UploadRepository::new(db.clone()),
            ChallengeRepository::new(db),
            storage,
            feed.clone(),
        );
        (service, backend, feed)
    }

    #[test]
    fn test_validate_media_file() {
        assert!(validate_media_file("image/jpeg", 1024).is_ok());
        assert!(validate_media_file("video/mp4", MAX_UPLOAD_BYTES).is_ok());

        let err = validate_media_file("application/pdf", 10).unwrap_err();
        assert_eq!(err.to_string(), "Nur Bilder und Videos sind erlaubt.");

        let err = validate_media_file("image/jpeg", 10_485_761).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
        assert!(err.to_string().contains("zu groß"));
    }

    #[tokio::test]
    async fn test_oversize_file_touches_nothing() {
        // No mock results queued: any query would fail the test.
        let (service, backend, feed) =
            service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let mut input = jpeg_input();
        input.data = vec![0; 10_485_761];

        let result = service.upload(input).await;

        assert!(matches!(result, Err(AppError::PayloadTooLarge(_))));
        assert!(backend.keys().is_empty());
        assert!(feed.published().is_empty());
    }

    #[tokio::test]
    async fn test_upload_follows_auto_approval() {
        let mut event = create_test_event("ev1", "org1", "PARTY1");
        event.auto_approval = false;
        let stored = create_test_upload("u1", "ev1", false);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[event]])
            .append_query_results([[count_row(0)]])
            .append_query_results([[stored]])
            .into_connection();
        let (service, backend, feed) = service(db);

        let outcome = service.upload(jpeg_input()).await.unwrap();

        assert!(!outcome.approved);
        assert!(outcome.url.starts_with("https://wall.example.com/files/PARTY1/"));
        let keys = backend.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("PARTY1/") && keys[0].ends_with(".jpg"));
        assert_eq!(
            feed.published(),
            vec![ChangeEvent::UploadInserted {
                event_id: "ev1".to_string(),
                upload_id: "u1".to_string(),
                approved: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_event() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<event::Model>::new()])
            .into_connection();
        let (service, backend, _) = service(db);

        let err = service.upload(jpeg_input()).await.unwrap_err();

        assert_eq!(err.to_string(), "Event nicht gefunden.");
        assert!(backend.keys().is_empty());
    }

    #[tokio::test]
    async fn test_password_required() {
        let mut event = create_test_event("ev1", "org1", "PARTY1");
        event.password = Some(obfuscate_event_password("geheim", "PARTY1"));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[event]])
            .into_connection();
        let (service, _, _) = service(db);

        let mut input = jpeg_input();
        input.password = Some("falsch".to_string());
        let result = service.upload(input).await;

        assert!(matches!(result, Err(AppError::PasswordRequired(_))));
    }

    #[tokio::test]
    async fn test_quota_reached() {
        let mut event = create_test_event("ev1", "org1", "PARTY1");
        event.upload_limit = 2;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[event]])
            .append_query_results([[count_row(2)]])
            .into_connection();
        let (service, backend, _) = service(db);

        let err = service.upload(jpeg_input()).await.unwrap_err();

        assert!(err.to_string().contains("Upload-Limit"));
        assert!(backend.keys().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_challenge_rejected() {
        let foreign = challenge::Model {
            id: "c1".to_string(),
            event_id: "other".to_string(),
            title: "Beste Tanzmove".to_string(),
            hashtag: "#tanz".to_string(),
            created_at: Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_event("ev1", "org1", "PARTY1")]])
            .append_query_results([[count_row(0)]])
            .append_query_results([[foreign]])
            .into_connection();
        let (service, _, _) = service(db);

        let mut input = jpeg_input();
        input.challenge_id = Some("c1".to_string());
        let result = service.upload(input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_storage_failure_message() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_event("ev1", "org1", "PARTY1")]])
            .append_query_results([[count_row(0)]])
            .into_connection();
        let (service, backend, feed) = service(db);
        backend.set_fail_writes(true);

        let err = service.upload(jpeg_input()).await.unwrap_err();

        assert_eq!(err.to_string(), "Fehler beim Hochladen der Datei.");
        assert!(feed.published().is_empty());
    }

    #[tokio::test]
    async fn test_insert_failure_removes_object() {
        // The insert finds no queued result and fails.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_event("ev1", "org1", "PARTY1")]])
            .append_query_results([[count_row(0)]])
            .into_connection();
        let (service, backend, _) = service(db);

        let err = service.upload(jpeg_input()).await.unwrap_err();

        assert!(err.to_string().contains("Fehler beim Speichern des Uploads."));
        assert!(backend.keys().is_empty());
    }
}
