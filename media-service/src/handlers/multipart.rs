use crate::models::UploadedFile;
use axum::extract::multipart::{Multipart, MultipartRejection};
use service_core::error::AppError;
use std::collections::HashMap;

/// A fully buffered multipart form.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl FormData {
    pub fn text(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    pub fn files(&mut self, name: &str) -> Vec<UploadedFile> {
        self.files.remove(name).unwrap_or_default()
    }

    pub fn file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files(name).into_iter().next()
    }
}

fn unreadable(e: impl std::fmt::Display) -> AppError {
    AppError::InvalidInput(format!("Failed to read multipart form: {}", e))
}

/// Buffers every part. Parts with a filename are files, the rest are text
/// fields. Empty file parts, which browsers send for untouched file inputs,
/// are dropped.
pub async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<FormData, AppError> {
    let mut multipart = multipart.map_err(|e| unreadable(e.body_text()))?;
    let mut form = FormData::default();

    while let Some(field) = multipart.next_field().await.map_err(unreadable)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let filename = field.file_name().map(str::to_string);
        if let Some(filename) = filename {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(unreadable)?;
            if data.is_empty() {
                continue;
            }
            form.files.entry(name).or_default().push(UploadedFile {
                data: data.to_vec(),
                content_type,
                filename: Some(filename),
            });
        } else {
            let value = field.text().await.map_err(unreadable)?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
