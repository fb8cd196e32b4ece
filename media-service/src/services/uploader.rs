//! Republishes generated media under a stable, per-user object key.
//!
//! Provider-hosted URLs expire, so every artifact is copied into our own
//! storage before a URL is handed back. The primary store is tried first; the
//! local fallback keeps the request successful when it is missing or failing.

use crate::models::{GeneratedMedia, MediaKind, MediaRecord, Shape, StorageLocation, Style};
use crate::services::storage::{LocalStorage, Storage};
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

const SAFE_PROMPT_CHARS: usize = 30;

/// Inputs of the generated file name.
#[derive(Debug, Clone, Copy)]
pub struct Naming<'a> {
    pub kind: MediaKind,
    pub user_id: &'a str,
    pub prefix: &'a str,
    pub style: Option<Style>,
    pub shape: Option<Shape>,
    pub prompt: &'a str,
}

fn safe_prompt(prompt: &str) -> String {
    prompt
        .chars()
        .take(SAFE_PROMPT_CHARS)
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim_end()
        .replace(' ', "_")
}

fn extension_for(content_type: &str, kind: MediaKind) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        _ => kind.default_extension(),
    }
}

/// `{folder}/{user}/{prefix}_{timestamp}_{style}_{shape}_{prompt}_{id}.{ext}`,
/// skipping absent parts.
pub fn object_key(naming: &Naming<'_>, content_type: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let id = Uuid::new_v4().simple().to_string();
    let prompt = safe_prompt(naming.prompt);

    let parts: Vec<&str> = [
        Some(naming.prefix),
        Some(timestamp.as_str()),
        naming.style.map(|s| s.as_str()),
        naming.shape.map(|s| s.as_str()),
        Some(prompt.as_str()),
        Some(&id[..8]),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect();

    format!(
        "{}/{}/{}.{}",
        naming.kind.folder(),
        naming.user_id,
        parts.join("_"),
        extension_for(content_type, naming.kind)
    )
}

fn media_type(header: Option<&str>, kind: MediaKind) -> String {
    header
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| kind.accepts(value))
        .unwrap_or_else(|| kind.default_content_type().to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderDeletion {
    pub folder: String,
    pub files_deleted: usize,
}

pub struct MediaUploader {
    primary: Option<Arc<dyn Storage>>,
    fallback: LocalStorage,
    http: Client,
}

impl MediaUploader {
    pub fn new(primary: Option<Arc<dyn Storage>>, fallback: LocalStorage, http: Client) -> Self {
        Self {
            primary,
            fallback,
            http,
        }
    }

    async fn download(&self, url: &str, kind: MediaKind) -> Result<(Vec<u8>, String), AppError> {
        let response = self.http.get(url).send().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to download generated media");
            AppError::Upstream("generated media could not be downloaded".to_string())
        })?;

        if !response.status().is_success() {
            tracing::error!(status = response.status().as_u16(), "Generated media download rejected");
            return Err(AppError::Upstream(format!(
                "generated media download returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let content_type = media_type(
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            kind,
        );
        let data = response.bytes().await.map_err(|e| {
            tracing::error!(error = %e, "Generated media download interrupted");
            AppError::Upstream("generated media could not be downloaded".to_string())
        })?;

        Ok((data.to_vec(), content_type))
    }

    /// Downloads remote media if needed and stores it under a fresh key.
    pub async fn store(
        &self,
        media: GeneratedMedia,
        naming: &Naming<'_>,
    ) -> Result<MediaRecord, AppError> {
        let (data, content_type) = match media {
            GeneratedMedia::Remote { url } => self.download(&url, naming.kind).await?,
            GeneratedMedia::Inline { data, content_type } => {
                let content_type = media_type(Some(content_type.as_str()), naming.kind);
                (data, content_type)
            }
        };

        let key = object_key(naming, &content_type);
        let size = data.len();
        let (url, location) = self.put(&key, data, &content_type).await?;

        let location_label = match location {
            StorageLocation::Primary => "primary",
            StorageLocation::Fallback => "fallback",
        };
        metrics::counter!(
            "media_uploads_total",
            "kind" => naming.kind.folder(),
            "location" => location_label
        )
        .increment(1);

        Ok(MediaRecord {
            url,
            key,
            content_type,
            size,
            location,
        })
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(String, StorageLocation), AppError> {
        if let Some(primary) = &self.primary {
            match primary.upload(key, data.clone(), content_type).await {
                Ok(url) => {
                    tracing::info!(key, store = primary.name(), "Media uploaded");
                    return Ok((url, StorageLocation::Primary));
                }
                Err(e) => {
                    tracing::warn!(key, store = primary.name(), error = %e, "Primary upload failed, using local fallback");
                }
            }
        }

        match self.fallback.upload(key, data, content_type).await {
            Ok(url) => {
                tracing::info!(key, store = self.fallback.name(), "Media saved locally");
                Ok((url, StorageLocation::Fallback))
            }
            Err(e) => {
                tracing::error!(key, error = %e, "Local fallback upload failed");
                Err(AppError::StorageError(anyhow::anyhow!(
                    "media could not be stored: {}",
                    e
                )))
            }
        }
    }

    fn stores(&self) -> Vec<&dyn Storage> {
        let mut stores: Vec<&dyn Storage> = Vec::with_capacity(2);
        if let Some(primary) = &self.primary {
            stores.push(primary.as_ref());
        }
        stores.push(&self.fallback);
        stores
    }

    /// Removes everything stored for `user_id`. A failing folder is logged
    /// and skipped so the others are still cleaned up.
    pub async fn delete_user_data(&self, user_id: &str) -> Vec<FolderDeletion> {
        let mut deleted = Vec::new();

        for kind in MediaKind::ALL {
            let folder = format!("{}/{}/", kind.folder(), user_id);
            let mut files_deleted = 0;

            for store in self.stores() {
                match store.delete_prefix(&folder).await {
                    Ok(count) => files_deleted += count,
                    Err(e) => {
                        tracing::error!(folder = %folder, store = store.name(), error = %e, "Failed to delete folder");
                    }
                }
            }

            if files_deleted > 0 {
                tracing::info!(folder = %folder, files_deleted, "Deleted user folder");
                deleted.push(FolderDeletion {
                    folder,
                    files_deleted,
                });
            }
        }

        deleted
    }

    /// Deletes the object a previously returned URL points to.
    pub async fn delete_url(&self, url: &str) -> Result<(), AppError> {
        let (store, key) = self
            .stores()
            .into_iter()
            .find_map(|store| store.key_from_url(url).map(|key| (store, key)))
            .ok_or_else(|| {
                AppError::InvalidInput(format!("'{}' is not a URL of stored media", url))
            })?;

        if store.delete(&key).await? {
            tracing::info!(key = %key, store = store.name(), "Deleted file");
            Ok(())
        } else {
            Err(AppError::NotFound(anyhow::anyhow!("File not found")))
        }
    }
}
