//! Photo challenge service.

use chrono::Utc;
use photowall_common::{AppError, AppResult, IdGenerator};
use photowall_db::{
    entities::challenge,
    repositories::{ChallengeRepository, EventRepository, UploadRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use super::event::ensure_owner;

/// Normalise a hashtag to a single leading `#` without whitespace.
#[must_use]
pub fn normalize_hashtag(raw: &str) -> String {
    let tag: String = raw
        .trim_start_matches(|c: char| c == '#' || c.is_whitespace())
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '#')
        .collect();
    format!("#{tag}")
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateChallengeInput {
    #[validate(length(min = 1, max = 128))]
    pub title: String,
    #[validate(length(min = 1, max = 64))]
    pub hashtag: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateChallengeInput {
    #[validate(length(min = 1, max = 128))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub hashtag: Option<String>,
}

/// Challenge service.
#[derive(Clone)]
pub struct ChallengeService {
    event_repo: EventRepository,
    challenge_repo: ChallengeRepository,
    upload_repo: UploadRepository,
    id_gen: IdGenerator,
}

impl ChallengeService {
    #[must_use]
    pub const fn new(
        event_repo: EventRepository,
        challenge_repo: ChallengeRepository,
        upload_repo: UploadRepository,
    ) -> Self {
        Self {
            event_repo,
            challenge_repo,
            upload_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Challenges of an event, oldest first. Public, guests pick from them.
    pub async fn list(&self, event_id: &str) -> AppResult<Vec<challenge::Model>> {
        self.challenge_repo.find_by_event(event_id).await
    }

    pub async fn create(
        &self,
        owner_id: &str,
        event_id: &str,
        input: CreateChallengeInput,
    ) -> AppResult<challenge::Model> {
        input.validate()?;
        let event = self.event_repo.get_by_id(event_id).await?;
        ensure_owner(&event, owner_id)?;

        let hashtag = checked_hashtag(&input.hashtag)?;
        let model = challenge::ActiveModel {
            id: Set(self.id_gen.generate()),
            event_id: Set(event.id),
            title: Set(input.title.trim().to_string()),
            hashtag: Set(hashtag),
            created_at: Set(Utc::now().into()),
        };
        self.challenge_repo.create(model).await
    }

    pub async fn update(
        &self,
        owner_id: &str,
        challenge_id: &str,
        input: UpdateChallengeInput,
    ) -> AppResult<challenge::Model> {
        input.validate()?;
        let challenge = self.owned(owner_id, challenge_id).await?;

        let mut active: challenge::ActiveModel = challenge.into();
        if let Some(title) = input.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(hashtag) = input.hashtag {
            active.hashtag = Set(checked_hashtag(&hashtag)?);
        }
        self.challenge_repo.update(active).await
    }

    /// Delete a challenge. Uploads tagged with it keep existing untagged.
    pub async fn delete(&self, owner_id: &str, challenge_id: &str) -> AppResult<()> {
        let challenge = self.owned(owner_id, challenge_id).await?;
        self.upload_repo.clear_challenge(&challenge.id).await?;
        self.challenge_repo.delete(&challenge.id).await
    }

    async fn owned(&self, owner_id: &str, challenge_id: &str) -> AppResult<challenge::Model> {
        let challenge = self.challenge_repo.get_by_id(challenge_id).await?;
        let event = self.event_repo.get_by_id(&challenge.event_id).await?;
        ensure_owner(&event, owner_id)?;
        Ok(challenge)
    }
}

fn checked_hashtag(raw: &str) -> AppResult<String> {
    let hashtag = normalize_hashtag(raw);
    if hashtag.len() < 2 {
        return Err(AppError::Validation("Hashtag must not be empty".to_string()));
    }
    Ok(hashtag)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::event::tests::create_test_event;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn create_test_challenge(id: &str, event_id: &str) -> challenge::Model {
        challenge::Model {
            id: id.to_string(),
            event_id: event_id.to_string(),
            title: "Bestes Gruppenfoto".to_string(),
            hashtag: "#gruppe".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn service(db: sea_orm::DatabaseConnection) -> ChallengeService {
        let db = Arc::new(db);
        ChallengeService::new(
            EventRepository::new(db.clone()),
            ChallengeRepository::new(db.clone()),
            UploadRepository::new(db),
        )
    }

    #[test]
    fn test_normalize_hashtag() {
        assert_eq!(normalize_hashtag("gruppe"), "#gruppe");
        assert_eq!(normalize_hashtag("##gruppe"), "#gruppe");
        assert_eq!(normalize_hashtag("  # Beste Tanz Moves "), "#BesteTanzMoves");
        assert_eq!(normalize_hashtag("#"), "#");
    }

    #[tokio::test]
    async fn test_create_normalizes_hashtag() {
        let mut stored = create_test_challenge("c1", "ev1");
        stored.hashtag = "#tanz".to_string();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_event("ev1", "org1", "PARTY1")]])
            .append_query_results([[stored]])
            .into_connection();

        let challenge = service(db)
            .create(
                "org1",
                "ev1",
                CreateChallengeInput {
                    title: "Tanzfläche".to_string(),
                    hashtag: "tanz".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(challenge.hashtag, "#tanz");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_hashtag() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_event("ev1", "org1", "PARTY1")]])
            .into_connection();

        let result = service(db)
            .create(
                "org1",
                "ev1",
                CreateChallengeInput {
                    title: "Leer".to_string(),
                    hashtag: "# ".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_clears_upload_references() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_challenge("c1", "ev1")]])
            .append_query_results([[create_test_event("ev1", "org1", "PARTY1")]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();

        assert!(service(db).delete("org1", "c1").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_requires_ownership() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_challenge("c1", "ev1")]])
            .append_query_results([[create_test_event("ev1", "org1", "PARTY1")]])
            .into_connection();

        let result = service(db)
            .update("org2", "c1", UpdateChallengeInput::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
