//! Multipart form reading.

use std::collections::HashMap;

use axum::extract::{Multipart, multipart::MultipartError};
use axum::http::StatusCode;
use photowall_common::{AppError, AppResult, content_type_for_key};
use photowall_core::{MAX_UPLOAD_BYTES, media_too_large};

/// Request body limit for multipart routes. Above the file limit so oversize
/// files reach validation and get a proper message.
pub const MULTIPART_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 2 * 1024 * 1024;

/// The file part of a form.
#[derive(Debug)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A parsed multipart form: one file and any number of text fields.
#[derive(Debug, Default)]
pub struct Form {
    pub file: Option<FilePart>,
    fields: HashMap<String, String>,
}

impl Form {
    /// Read every part of the form. Only the part named `file` is binary.
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .map(ToString::to_string)
                    .filter(|ct| ct != "application/octet-stream")
                    .unwrap_or_else(|| content_type_for_key(&file_name).to_string());
                let data = field.bytes().await.map_err(multipart_error)?.to_vec();
                form.file = Some(FilePart {
                    file_name,
                    content_type,
                    data,
                });
            } else {
                let text = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// A text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    }

    /// The file part, required.
    pub fn take_file(&mut self) -> AppResult<FilePart> {
        self.file
            .take()
            .ok_or_else(|| AppError::Validation("Bitte wähle eine Datei aus.".to_string()))
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        media_too_large()
    } else {
        AppError::BadRequest(err.body_text())
    }
}
