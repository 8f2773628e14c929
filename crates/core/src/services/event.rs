//! Event management service.

use chrono::Utc;
use photowall_common::{
    AppError, AppResult, IdGenerator, StorageService, generate_storage_key,
    obfuscate_event_password, reveal_event_password,
};
use photowall_db::{
    entities::event::{self, OrderingMode},
    repositories::{EventRepository, UploadRepository},
};
use regex::Regex;
use sea_orm::Set;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;
use tracing::{info, warn};
use validator::Validate;

use super::change_feed::{ChangeEvent, ChangeFeedService, publish_quietly};
use super::upload::{MAX_UPLOAD_BYTES, media_too_large};

#[allow(clippy::unwrap_used)]
static CUSTOM_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z0-9-]{3,32}$").unwrap());

pub const DEFAULT_DISPLAY_DURATION: i32 = 5;
pub const DEFAULT_UPLOAD_LIMIT: i32 = 50;
pub const DEFAULT_BACKGROUND_THEME: &str = "dark";
pub const DEFAULT_HEADER_THEME: &str = "default";

/// Normalise a join code as typed by a guest or organizer.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Check a guest-supplied password against the event's stored password.
pub fn check_event_password(event: &event::Model, supplied: Option<&str>) -> AppResult<()> {
    let Some(stored) = event.password.as_deref() else {
        return Ok(());
    };
    let expected = reveal_event_password(stored, &event.code)?;
    match supplied {
        Some(given) if given == expected => Ok(()),
        Some(_) => Err(AppError::PasswordRequired(
            "Falsches Passwort.".to_string(),
        )),
        None => Err(AppError::PasswordRequired(
            "Dieses Event ist passwortgeschützt.".to_string(),
        )),
    }
}

/// Input for creating an event.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventInput {
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    /// Custom join code, otherwise one is generated.
    pub code: Option<String>,
    pub auto_approval: Option<bool>,
    #[validate(length(min = 1, max = 128))]
    pub password: Option<String>,
    #[validate(range(min = 1, max = 60))]
    pub image_display_duration: Option<i32>,
    pub ordering_mode: Option<OrderingMode>,
}

/// Input for updating event settings. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventInput {
    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,
    pub auto_approval: Option<bool>,
    /// `Some(None)` (JSON `null`) removes the password.
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 128))]
    pub password: Option<Option<String>>,
    #[validate(range(min = 1, max = 60))]
    pub image_display_duration: Option<i32>,
    #[validate(length(min = 1, max = 32))]
    pub background_theme: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub header_theme: Option<String>,
    pub ordering_mode: Option<OrderingMode>,
}

/// Distinguish a field set to `null` from an absent one.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Upload counters of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub total: u64,
    pub approved: u64,
    pub pending: u64,
    pub upload_limit: i32,
    pub remaining: u64,
}

/// What guests may see of an event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicEvent {
    pub id: String,
    pub name: String,
    pub code: String,
    pub cover_image_url: Option<String>,
    pub password_protected: bool,
    pub image_display_duration: i32,
    pub background_theme: String,
    pub header_theme: String,
    pub ordering_mode: OrderingMode,
    pub upload_url: String,
}

/// Event service.
#[derive(Clone)]
pub struct EventService {
    event_repo: EventRepository,
    upload_repo: UploadRepository,
    storage: StorageService,
    feed: ChangeFeedService,
    id_gen: IdGenerator,
    public_url: String,
}

impl EventService {
    /// Create a new event service. `public_url` is the instance's public base URL.
    #[must_use]
    pub fn new(
        event_repo: EventRepository,
        upload_repo: UploadRepository,
        storage: StorageService,
        feed: ChangeFeedService,
        public_url: &str,
    ) -> Self {
        Self {
            event_repo,
            upload_repo,
            storage,
            feed,
            id_gen: IdGenerator::new(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL guests open to upload.
    #[must_use]
    pub fn upload_url(&self, code: &str) -> String {
        format!("{}/e/{}", self.public_url, code)
    }

    /// Create an event owned by `owner_id`.
    pub async fn create(&self, owner_id: &str, mut input: CreateEventInput) -> AppResult<event::Model> {
        input.name = input.name.trim().to_string();
        input.validate()?;

        let code = match input.code.as_deref() {
            Some(custom) => {
                let code = normalize_code(custom);
                if !CUSTOM_CODE.is_match(&code) {
                    return Err(AppError::Validation(
                        "Event codes are 3-32 characters of letters, digits and '-'".to_string(),
                    ));
                }
                if self.event_repo.find_by_code(&code).await?.is_some() {
                    return Err(AppError::Conflict(format!("Event code {code} is taken")));
                }
                code
            }
            None => self.unused_code().await?,
        };

        let password = input
            .password
            .as_deref()
            .map(|p| obfuscate_event_password(p, &code));

        let model = event::ActiveModel {
            id: Set(self.id_gen.generate()),
            owner_id: Set(owner_id.to_string()),
            name: Set(input.name),
            code: Set(code),
            cover_image_key: Set(None),
            cover_image_url: Set(None),
            auto_approval: Set(input.auto_approval.unwrap_or(true)),
            password: Set(password),
            image_display_duration: Set(input
                .image_display_duration
                .unwrap_or(DEFAULT_DISPLAY_DURATION)),
            background_theme: Set(DEFAULT_BACKGROUND_THEME.to_string()),
            header_theme: Set(DEFAULT_HEADER_THEME.to_string()),
            ordering_mode: Set(input.ordering_mode.unwrap_or_default()),
            upload_limit: Set(DEFAULT_UPLOAD_LIMIT),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let event = self.event_repo.create(model).await?;
        info!(event_id = %event.id, code = %event.code, "Event created");
        Ok(event)
    }

    async fn unused_code(&self) -> AppResult<String> {
        for _ in 0..10 {
            let code = self.id_gen.generate_join_code();
            if self.event_repo.find_by_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(AppError::Internal("Could not find a free event code".to_string()))
    }

    /// List the organizer's events.
    pub async fn list(&self, owner_id: &str) -> AppResult<Vec<event::Model>> {
        self.event_repo.find_by_owner(owner_id).await
    }

    /// Load an event and check that `owner_id` owns it.
    pub async fn get_owned(&self, owner_id: &str, event_id: &str) -> AppResult<event::Model> {
        let event = self.event_repo.get_by_id(event_id).await?;
        ensure_owner(&event, owner_id)?;
        Ok(event)
    }

    /// Reveal the event password for its organizer (flyer, settings form).
    pub async fn password(&self, owner_id: &str, event_id: &str) -> AppResult<Option<String>> {
        let event = self.get_owned(owner_id, event_id).await?;
        event
            .password
            .as_deref()
            .map(|stored| reveal_event_password(stored, &event.code))
            .transpose()
    }

    /// Update event settings.
    pub async fn update(
        &self,
        owner_id: &str,
        event_id: &str,
        mut input: UpdateEventInput,
    ) -> AppResult<event::Model> {
        input.name = input.name.map(|name| name.trim().to_string());
        input.validate()?;
        let event = self.get_owned(owner_id, event_id).await?;
        let code = event.code.clone();
        let old_password = event.password.clone();

        let mut active: event::ActiveModel = event.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(auto_approval) = input.auto_approval {
            active.auto_approval = Set(auto_approval);
        }
        if let Some(password) = input.password {
            let stored = password
                .filter(|p| !p.is_empty())
                .map(|p| obfuscate_event_password(&p, &code));
            active.password = Set(stored);
        }
        if let Some(duration) = input.image_display_duration {
            active.image_display_duration = Set(duration);
        }
        if let Some(theme) = input.background_theme {
            active.background_theme = Set(theme);
        }
        if let Some(theme) = input.header_theme {
            active.header_theme = Set(theme);
        }
        if let Some(mode) = input.ordering_mode {
            active.ordering_mode = Set(mode);
        }
        active.updated_at = Set(Some(Utc::now().into()));

        let updated = self.event_repo.update(active).await?;

        publish_quietly(
            &self.feed,
            ChangeEvent::EventUpdated {
                event_id: updated.id.clone(),
                ordering_mode: updated.ordering_mode,
                image_display_duration: updated.image_display_duration,
                password_changed: updated.password != old_password,
            },
        )
        .await;

        Ok(updated)
    }

    /// Replace the cover image.
    pub async fn set_cover(
        &self,
        owner_id: &str,
        event_id: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> AppResult<event::Model> {
        if !content_type.starts_with("image/") {
            return Err(AppError::Validation(
                "Als Titelbild sind nur Bilder erlaubt.".to_string(),
            ));
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(media_too_large());
        }

        let event = self.get_owned(owner_id, event_id).await?;
        let key = generate_storage_key(&event.code, file_name);
        self.storage.save(&key, data, content_type).await?;
        let url = match self.storage.signed_url(&key, self.storage.default_ttl()).await {
            Ok(url) => url,
            Err(e) => {
                self.remove_object(&key).await;
                return Err(e);
            }
        };

        let previous = event.cover_image_key.clone();
        let mut active: event::ActiveModel = event.into();
        active.cover_image_key = Set(Some(key.clone()));
        active.cover_image_url = Set(Some(url));
        active.updated_at = Set(Some(Utc::now().into()));

        let updated = match self.event_repo.update(active).await {
            Ok(updated) => updated,
            Err(e) => {
                self.remove_object(&key).await;
                return Err(e);
            }
        };

        if let Some(previous) = previous {
            self.remove_object(&previous).await;
        }
        Ok(updated)
    }

    async fn remove_object(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            warn!(key = %key, error = %e, "Failed to delete cover image");
        }
    }

    /// Upload counters for the dashboard overview.
    pub async fn stats(&self, owner_id: &str, event_id: &str) -> AppResult<EventStats> {
        let event = self.get_owned(owner_id, event_id).await?;
        let total = self.upload_repo.count_by_event(&event.id).await?;
        let approved = self.upload_repo.count_approved_by_event(&event.id).await?;
        let limit = u64::try_from(event.upload_limit.max(0)).unwrap_or(0);

        Ok(EventStats {
            total,
            approved,
            pending: total.saturating_sub(approved),
            upload_limit: event.upload_limit,
            remaining: limit.saturating_sub(total),
        })
    }

    /// Find an event by join code.
    pub async fn find_by_code(&self, code: &str) -> AppResult<event::Model> {
        self.event_repo
            .find_by_code(&normalize_code(code))
            .await?
            .ok_or_else(|| AppError::NotFound("Event nicht gefunden.".to_string()))
    }

    /// Guest view of an event.
    pub async fn public_view(&self, code: &str) -> AppResult<PublicEvent> {
        let event = self.find_by_code(code).await?;
        Ok(PublicEvent {
            upload_url: self.upload_url(&event.code),
            password_protected: event.password.is_some(),
            id: event.id,
            name: event.name,
            code: event.code,
            cover_image_url: event.cover_image_url,
            image_display_duration: event.image_display_duration,
            background_theme: event.background_theme,
            header_theme: event.header_theme,
            ordering_mode: event.ordering_mode,
        })
    }

    /// Check a guest's password entry.
    pub async fn verify_password(&self, code: &str, password: &str) -> AppResult<()> {
        let event = self.find_by_code(code).await?;
        check_event_password(&event, Some(password))
    }
}

/// Fail with `Forbidden` unless `owner_id` owns the event.
pub fn ensure_owner(event: &event::Model, owner_id: &str) -> AppResult<()> {
    if event.owner_id == owner_id {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not the owner of this event".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::services::change_feed::testing::RecordingFeed;
    use photowall_common::MemoryStorage;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Value};
    use std::sync::Arc;
    use std::time::Duration;

    pub fn create_test_event(id: &str, owner_id: &str, code: &str) -> event::Model {
        event::Model {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            name: "Hochzeit Anna & Ben".to_string(),
            code: code.to_string(),
            cover_image_key: None,
            cover_image_url: None,
            auto_approval: true,
            password: None,
            image_display_duration: 5,
            background_theme: "dark".to_string(),
            header_theme: "default".to_string(),
            ordering_mode: OrderingMode::Insertion,
            upload_limit: 50,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    pub fn test_storage() -> (Arc<MemoryStorage>, StorageService) {
        let backend = Arc::new(MemoryStorage::new());
        let storage = StorageService::new(
            backend.clone(),
            "secret",
            "https://wall.example.com/files",
            Duration::from_secs(3600),
        );
        (backend, storage)
    }

    fn service(db: DatabaseConnection) -> (EventService, Arc<RecordingFeed>) {
        let db = Arc::new(db);
        let feed = RecordingFeed::new();
        let (_, storage) = test_storage();
        let service = EventService::new(
            EventRepository::new(db.clone()),
            UploadRepository::new(db),
            storage,
            feed.clone(),
            "https://wall.example.com/",
        );
        (service, feed)
    }

    #[tokio::test]
    async fn test_create_with_custom_code_uppercases() {
        let created = create_test_event("ev1", "org1", "SOMMER-FEST");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<event::Model>::new()])
            .append_query_results([[created]])
            .into_connection();
        let (service, _) = service(db);

        let event = service
            .create(
                "org1",
                CreateEventInput {
                    name: "Sommerfest".to_string(),
                    code: Some(" sommer-fest ".to_string()),
                    auto_approval: None,
                    password: None,
                    image_display_duration: None,
                    ordering_mode: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(event.code, "SOMMER-FEST");
    }

    #[tokio::test]
    async fn test_create_rejects_taken_code() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_event("ev1", "org2", "PARTY")]])
            .into_connection();
        let (service, _) = service(db);

        let result = service
            .create(
                "org1",
                CreateEventInput {
                    name: "Party".to_string(),
                    code: Some("party".to_string()),
                    auto_approval: None,
                    password: None,
                    image_display_duration: None,
                    ordering_mode: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_malformed_code() {
        let (service, _) = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let result = service
            .create(
                "org1",
                CreateEventInput {
                    name: "Party".to_string(),
                    code: Some("a b".to_string()),
                    auto_approval: None,
                    password: None,
                    image_display_duration: None,
                    ordering_mode: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_publishes_settings() {
        let existing = create_test_event("ev1", "org1", "PARTY1");
        let mut updated = existing.clone();
        updated.ordering_mode = OrderingMode::NewestFirst;
        updated.image_display_duration = 8;
        updated.password = Some(obfuscate_event_password("geheim", "PARTY1"));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[existing]])
            .append_query_results([[updated]])
            .into_connection();
        let (service, feed) = service(db);

        service
            .update(
                "org1",
                "ev1",
                UpdateEventInput {
                    ordering_mode: Some(OrderingMode::NewestFirst),
                    image_display_duration: Some(8),
                    password: Some(Some("geheim".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(
            feed.published(),
            vec![ChangeEvent::EventUpdated {
                event_id: "ev1".to_string(),
                ordering_mode: OrderingMode::NewestFirst,
                image_display_duration: 8,
                password_changed: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_update_rejects_other_owner() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_event("ev1", "org1", "PARTY1")]])
            .into_connection();
        let (service, feed) = service(db);

        let result = service
            .update("intruder", "ev1", UpdateEventInput::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert!(feed.published().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_blank_name_and_long_password() {
        let (service, _) = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let blank = service
            .update(
                "org1",
                "ev1",
                UpdateEventInput {
                    name: Some("   ".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(blank, Err(AppError::Validation(_))));

        let long = service
            .update(
                "org1",
                "ev1",
                UpdateEventInput {
                    password: Some(Some("x".repeat(129))),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(long, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_rejects_duration_out_of_range() {
        let (service, _) = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let result = service
            .update(
                "org1",
                "ev1",
                UpdateEventInput {
                    image_display_duration: Some(0),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_stats() {
        let mut event = create_test_event("ev1", "org1", "PARTY1");
        event.upload_limit = 10;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[event]])
            .append_query_results([[maplit::btreemap! {
                "num_items" => Value::BigInt(Some(4)),
            }]])
            .append_query_results([[maplit::btreemap! {
                "num_items" => Value::BigInt(Some(3)),
            }]])
            .into_connection();
        let (service, _) = service(db);

        let stats = service.stats("org1", "ev1").await.unwrap();

        assert_eq!(
            stats,
            EventStats {
                total: 4,
                approved: 3,
                pending: 1,
                upload_limit: 10,
                remaining: 6,
            }
        );
    }

    #[tokio::test]
    async fn test_public_view_hides_password() {
        let mut event = create_test_event("ev1", "org1", "PARTY1");
        event.password = Some(obfuscate_event_password("geheim", "PARTY1"));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[event]])
            .into_connection();
        let (service, _) = service(db);

        let view = service.public_view("party1").await.unwrap();

        assert!(view.password_protected);
        assert_eq!(view.upload_url, "https://wall.example.com/e/PARTY1");
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password").is_none());
    }

    #[test]
    fn test_update_input_distinguishes_null_password() {
        let cleared: UpdateEventInput = serde_json::from_str(r#"{"password":null}"#).unwrap();
        assert_eq!(cleared.password, Some(None));

        let untouched: UpdateEventInput = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.password, None);
    }

    #[test]
    fn test_check_event_password() {
        let mut event = create_test_event("ev1", "org1", "PARTY1");
        assert!(check_event_password(&event, None).is_ok());

        event.password = Some(obfuscate_event_password("geheim", "PARTY1"));
        assert!(check_event_password(&event, Some("geheim")).is_ok());
        assert!(matches!(
            check_event_password(&event, Some("falsch")),
            Err(AppError::PasswordRequired(_))
        ));
        assert!(matches!(
            check_event_password(&event, None),
            Err(AppError::PasswordRequired(_))
        ));
    }
}
