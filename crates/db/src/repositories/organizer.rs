//! Organizer repository.

use std::sync::Arc;

use crate::entities::{Organizer, organizer};
use photowall_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Organizer repository for database operations.
#[derive(Clone)]
pub struct OrganizerRepository {
    db: Arc<DatabaseConnection>,
}

impl OrganizerRepository {
    /// Create a new organizer repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an organizer by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<organizer::Model>> {
        Organizer::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an organizer by (lower-cased) email.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<organizer::Model>> {
        Organizer::find()
            .filter(organizer::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an organizer by bearer token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<organizer::Model>> {
        Organizer::find()
            .filter(organizer::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new organizer.
    pub async fn create(&self, model: organizer::ActiveModel) -> AppResult<organizer::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an organizer.
    pub async fn update(&self, model: organizer::ActiveModel) -> AppResult<organizer::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_organizer(id: &str, email: &str) -> organizer::Model {
        organizer::Model {
            id: id.to_string(),
            email: email.to_string(),
            name: "Anna".to_string(),
            password_hash: "hash".to_string(),
            token: format!("token-{id}"),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_token() {
        let organizer = create_test_organizer("org1", "anna@example.com");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[organizer]])
                .into_connection(),
        );

        let repo = OrganizerRepository::new(db);
        let result = repo.find_by_token("token-org1").await.unwrap();

        assert_eq!(result.unwrap().id, "org1");
    }

    #[tokio::test]
    async fn test_find_by_email_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<organizer::Model>::new()])
                .into_connection(),
        );

        let repo = OrganizerRepository::new(db);
        let result = repo.find_by_email("nobody@example.com").await.unwrap();

        assert!(result.is_none());
    }
}
