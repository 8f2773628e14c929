//! Challenge repository.

use std::sync::Arc;

use crate::entities::{Challenge, challenge};
use photowall_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Challenge repository for database operations.
#[derive(Clone)]
pub struct ChallengeRepository {
    db: Arc<DatabaseConnection>,
}

impl ChallengeRepository {
    /// Create a new challenge repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a challenge by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<challenge::Model>> {
        Challenge::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a challenge by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<challenge::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Challenge not found: {id}")))
    }

    /// List the challenges of an event in creation order.
    pub async fn find_by_event(&self, event_id: &str) -> AppResult<Vec<challenge::Model>> {
        Challenge::find()
            .filter(challenge::Column::EventId.eq(event_id))
            .order_by_asc(challenge::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new challenge.
    pub async fn create(&self, model: challenge::ActiveModel) -> AppResult<challenge::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a challenge.
    pub async fn update(&self, model: challenge::ActiveModel) -> AppResult<challenge::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a challenge row.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Challenge::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete every challenge of an event.
    pub async fn delete_by_event(&self, event_id: &str) -> AppResult<u64> {
        let result = Challenge::delete_many()
            .filter(challenge::Column::EventId.eq(event_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_by_event() {
        let challenge = challenge::Model {
            id: "ch1".to_string(),
            event_id: "ev1".to_string(),
            title: "Bestes Tanzfoto".to_string(),
            hashtag: "#tanz".to_string(),
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[challenge]])
                .into_connection(),
        );

        let repo = ChallengeRepository::new(db);
        let result = repo.find_by_event("ev1").await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].hashtag, "#tanz");
    }
}
