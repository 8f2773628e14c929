//! Gallery listings and ZIP export.

use std::io::{Cursor, Write};

use photowall_common::{AppError, AppResult, StorageService, content_type_for_key};
use photowall_db::{
    entities::upload,
    repositories::{EventRepository, UploadRepository},
};
use tracing::{info, warn};

use super::event::{check_event_password, ensure_owner, normalize_code};

/// A finished ZIP archive.
#[derive(Debug, Clone)]
pub struct ZipExport {
    pub file_name: String,
    pub data: Vec<u8>,
    pub included: usize,
    /// Objects that could not be loaded and were left out.
    pub skipped: usize,
}

/// Gallery service.
#[derive(Clone)]
pub struct GalleryService {
    event_repo: EventRepository,
    upload_repo: UploadRepository,
    storage: StorageService,
}

impl GalleryService {
    /// Create a new gallery service.
    #[must_use]
    pub const fn new(
        event_repo: EventRepository,
        upload_repo: UploadRepository,
        storage: StorageService,
    ) -> Self {
        Self {
            event_repo,
            upload_repo,
            storage,
        }
    }

    /// Every upload of an owned event, newest first.
    pub async fn organizer_list(
        &self,
        owner_id: &str,
        event_id: &str,
    ) -> AppResult<Vec<upload::Model>> {
        let event = self.event_repo.get_by_id(event_id).await?;
        ensure_owner(&event, owner_id)?;
        self.upload_repo.find_by_event(&event.id).await
    }

    /// Approved uploads of an event, newest first.
    pub async fn public_list(
        &self,
        code: &str,
        password: Option<&str>,
    ) -> AppResult<Vec<upload::Model>> {
        let event = self
            .event_repo
            .find_by_code(&normalize_code(code))
            .await?
            .ok_or_else(|| AppError::NotFound("Event nicht gefunden.".to_string()))?;
        check_event_password(&event, password)?;
        self.upload_repo.find_approved_by_event(&event.id).await
    }

    /// Content type to serve a stored object with.
    ///
    /// Uploads keep the type they were accepted with; other objects such as
    /// covers are guessed from the key.
    pub async fn content_type(&self, key: &str) -> AppResult<String> {
        Ok(match self.upload_repo.find_by_storage_key(key).await? {
            Some(upload) => upload.mime_type,
            None => content_type_for_key(key).to_string(),
        })
    }

    /// Pack every upload of an owned event into a ZIP archive.
    ///
    /// Objects that fail to load are skipped.
    pub async fn export_zip(&self, owner_id: &str, event_id: &str) -> AppResult<ZipExport> {
        let event = self.event_repo.get_by_id(event_id).await?;
        ensure_owner(&event, owner_id)?;
        let uploads = self.upload_repo.find_by_event(&event.id).await?;

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options: zip::write::FileOptions<'_, ()> =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut included = 0;
        let mut skipped = 0;
        for (index, upload) in uploads.iter().enumerate() {
            let data = match self.storage.load(&upload.storage_key).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(key = %upload.storage_key, error = %e, "Skipping upload in export");
                    skipped += 1;
                    continue;
                }
            };

            zip.start_file(archive_name(index, upload), options)
                .map_err(|e| AppError::Internal(format!("Failed to add file to ZIP: {e}")))?;
            zip.write_all(&data)
                .map_err(|e| AppError::Internal(format!("Failed to write file to ZIP: {e}")))?;
            included += 1;
        }

        let data = zip
            .finish()
            .map_err(|e| AppError::Internal(format!("Failed to finish ZIP: {e}")))?
            .into_inner();

        info!(event_id = %event.id, included, skipped, "Exported gallery");

        Ok(ZipExport {
            file_name: format!("{}.zip", event.code),
            data,
            included,
            skipped,
        })
    }
}

/// `001_anna.jpg`; uploads without a name are attributed to `gast`.
fn archive_name(index: usize, upload: &upload::Model) -> String {
    let ext = upload
        .storage_key
        .rsplit_once('.')
        .map_or("bin", |(_, ext)| ext);
    let who: String = upload
        .uploader_name
        .as_deref()
        .unwrap_or("gast")
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("{:03}_{who}.{ext}", index + 1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::event::tests::{create_test_event, test_storage};
    use crate::services::upload::tests::create_test_upload;
    use photowall_common::obfuscate_event_password;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::io::Read;
    use std::sync::Arc;

    #[test]
    fn test_archive_name() {
        let mut upload = create_test_upload("u1", "ev1", true);
        assert_eq!(archive_name(0, &upload), "001_gast.jpg");

        upload.uploader_name = Some("Tante Erna".to_string());
        assert_eq!(archive_name(41, &upload), "042_Tante_Erna.jpg");
    }

    #[tokio::test]
    async fn test_export_skips_unreadable_objects() {
        let uploads = vec![
            create_test_upload("u1", "ev1", true),
            create_test_upload("u2", "ev1", false),
            create_test_upload("u3", "ev1", true),
        ];
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_event("ev1", "org1", "PARTY1")]])
                .append_query_results([uploads])
                .into_connection(),
        );
        let (backend, storage) = test_storage();
        storage.save("PARTY1/u1.jpg", b"one", "image/jpeg").await.unwrap();
        storage.save("PARTY1/u3.jpg", b"three", "image/jpeg").await.unwrap();
        backend.fail_key("PARTY1/u3.jpg");

        let service = GalleryService::new(
            EventRepository::new(db.clone()),
            UploadRepository::new(db),
            storage,
        );
        let export = service.export_zip("org1", "ev1").await.unwrap();

        assert_eq!(export.file_name, "PARTY1.zip");
        assert_eq!(export.included, 1);
        assert_eq!(export.skipped, 2);

        let mut archive = zip::ZipArchive::new(Cursor::new(export.data)).unwrap();
        assert_eq!(archive.len(), 1);
        let mut content = String::new();
        archive
            .by_index(0)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "one");
    }

    #[tokio::test]
    async fn test_content_type_prefers_stored_mime_type() {
        let mut video = create_test_upload("u1", "ev1", true);
        video.storage_key = "PARTY1/clip.bin".to_string();
        video.mime_type = "video/mp4".to_string();
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[video]])
                .append_query_results([Vec::<upload::Model>::new()])
                .into_connection(),
        );
        let (_, storage) = test_storage();
        let service = GalleryService::new(
            EventRepository::new(db.clone()),
            UploadRepository::new(db),
            storage,
        );

        assert_eq!(service.content_type("PARTY1/clip.bin").await.unwrap(), "video/mp4");
        assert_eq!(service.content_type("PARTY1/cover.png").await.unwrap(), "image/png");
    }

    #[tokio::test]
    async fn test_public_list_checks_password() {
        let mut event = create_test_event("ev1", "org1", "PARTY1");
        event.password = Some(obfuscate_event_password("geheim", "PARTY1"));
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[event]])
                .into_connection(),
        );
        let (_, storage) = test_storage();
        let service = GalleryService::new(
            EventRepository::new(db.clone()),
            UploadRepository::new(db),
            storage,
        );

        let result = service.public_list("party1", None).await;
        assert!(matches!(result, Err(AppError::PasswordRequired(_))));
    }
}
