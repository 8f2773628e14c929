//! Upload repository.

use std::sync::Arc;

use crate::entities::{Upload, upload};
use photowall_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, sea_query::Expr,
};

/// Upload repository for database operations.
#[derive(Clone)]
pub struct UploadRepository {
    db: Arc<DatabaseConnection>,
}

impl UploadRepository {
    /// Create a new upload repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an upload by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<upload::Model>> {
        Upload::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get an upload by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<upload::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload not found: {id}")))
    }

    /// Find the upload stored under a storage key.
    pub async fn find_by_storage_key(&self, key: &str) -> AppResult<Option<upload::Model>> {
        Upload::find()
            .filter(upload::Column::StorageKey.eq(key))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All uploads of an event regardless of approval, newest first.
    pub async fn find_by_event(&self, event_id: &str) -> AppResult<Vec<upload::Model>> {
        Upload::find()
            .filter(upload::Column::EventId.eq(event_id))
            .order_by_desc(upload::Column::CreatedAt)
            .order_by_desc(upload::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Approved uploads of an event, newest first.
    pub async fn find_approved_by_event(&self, event_id: &str) -> AppResult<Vec<upload::Model>> {
        Upload::find()
            .filter(upload::Column::EventId.eq(event_id))
            .filter(upload::Column::Approved.eq(true))
            .order_by_desc(upload::Column::CreatedAt)
            .order_by_desc(upload::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count all uploads of an event.
    pub async fn count_by_event(&self, event_id: &str) -> AppResult<u64> {
        Upload::find()
            .filter(upload::Column::EventId.eq(event_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count approved uploads of an event.
    pub async fn count_approved_by_event(&self, event_id: &str) -> AppResult<u64> {
        Upload::find()
            .filter(upload::Column::EventId.eq(event_id))
            .filter(upload::Column::Approved.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new upload.
    pub async fn create(&self, model: upload::ActiveModel) -> AppResult<upload::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Set the approval flag of one upload.
    pub async fn set_approved(&self, id: &str, approved: bool) -> AppResult<upload::Model> {
        let existing = self.get_by_id(id).await?;
        let mut active: upload::ActiveModel = existing.into();
        active.approved = Set(approved);
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Approve every pending upload of an event. Returns the number approved.
    pub async fn approve_all_pending(&self, event_id: &str) -> AppResult<u64> {
        let result = Upload::update_many()
            .col_expr(upload::Column::Approved, Expr::value(true))
            .filter(upload::Column::EventId.eq(event_id))
            .filter(upload::Column::Approved.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Remove a challenge reference from every upload carrying it.
    pub async fn clear_challenge(&self, challenge_id: &str) -> AppResult<u64> {
        let result = Upload::update_many()
            .col_expr(
                upload::Column::ChallengeId,
                Expr::value(Option::<String>::None),
            )
            .filter(upload::Column::ChallengeId.eq(challenge_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Delete an upload row.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Upload::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete every upload row of an event.
    pub async fn delete_by_event(&self, event_id: &str) -> AppResult<u64> {
        let result = Upload::delete_many()
            .filter(upload::Column::EventId.eq(event_id))
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
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};

    fn create_test_upload(id: &str, event_id: &str, approved: bool) -> upload::Model {
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

    #[tokio::test]
    async fn test_find_approved_by_event() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_upload("u2", "ev1", true),
                    create_test_upload("u1", "ev1", true),
                ]])
                .into_connection(),
        );

        let repo = UploadRepository::new(db);
        let result = repo.find_approved_by_event("ev1").await.unwrap();

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|u| u.approved));
    }

    #[tokio::test]
    async fn test_find_by_storage_key() {
        let mut video = create_test_upload("u1", "ev1", true);
        video.storage_key = "PARTY1/clip.bin".to_string();
        video.mime_type = "video/mp4".to_string();

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[video]])
                .append_query_results([Vec::<upload::Model>::new()])
                .into_connection(),
        );

        let repo = UploadRepository::new(db);
        let found = repo.find_by_storage_key("PARTY1/clip.bin").await.unwrap();
        assert_eq!(found.map(|u| u.mime_type), Some("video/mp4".to_string()));
        assert!(repo.find_by_storage_key("PARTY1/cover.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_count_by_event() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => Value::BigInt(Some(7)),
                }]])
                .into_connection(),
        );

        let repo = UploadRepository::new(db);
        assert_eq!(repo.count_by_event("ev1").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_set_approved() {
        let pending = create_test_upload("u1", "ev1", false);
        let mut approved = pending.clone();
        approved.approved = true;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending]])
                .append_query_results([[approved]])
                .into_connection(),
        );

        let repo = UploadRepository::new(db);
        let result = repo.set_approved("u1", true).await.unwrap();

        assert!(result.approved);
    }

    #[tokio::test]
    async fn test_approve_all_pending() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                }])
                .into_connection(),
        );

        let repo = UploadRepository::new(db);
        assert_eq!(repo.approve_all_pending("ev1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_by_event() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 4,
                }])
                .into_connection(),
        );

        let repo = UploadRepository::new(db);
        assert_eq!(repo.delete_by_event("ev1").await.unwrap(), 4);
    }
}
