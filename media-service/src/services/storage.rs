use crate::services::gcs_auth::ServiceAccountAuth;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use service_core::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Write-once object store addressed by slash-separated keys.
#[async_trait]
pub trait Storage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stores `data` under `key` and returns its public URL. Fails if the
    /// key already exists.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, AppError>;

    /// Returns `false` when nothing was stored under `key`.
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Deletes every object whose key starts with `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, AppError>;

    /// Inverse of the URL returned by [`Storage::upload`].
    fn key_from_url(&self, url: &str) -> Option<String>;
}

/// Keys come from validated user ids and generated file names, but URLs
/// handed to the delete endpoint do not.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>, base_url: &str) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        if !is_safe_key(key) {
            return Err(AppError::InvalidInput(format!("invalid object key '{}'", key)));
        }
        Ok(self.base_path.join(key))
    }
}

async fn remove_tree(dir: &Path) -> Result<usize, std::io::Error> {
    let mut removed = 0;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                pending.push(entry.path());
            } else {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
    }

    match fs::remove_dir_all(dir).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(removed),
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upload(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<String, AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                AppError::StorageError(anyhow::anyhow!("Failed to create {}: {}", path.display(), e))
            })?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        Ok(format!("{}/media/{}", self.base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        match fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::StorageError(anyhow::anyhow!("Failed to delete {}: {}", key, e))),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, AppError> {
        let dir = self.path_for(prefix.trim_end_matches('/'))?;
        remove_tree(&dir)
            .await
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("Failed to delete {}: {}", prefix, e)))
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let path = url.strip_prefix(&self.base_url).unwrap_or(url);
        let key = path.strip_prefix("/media/")?;
        let key = urlencoding::decode(key).ok()?.into_owned();
        is_safe_key(&key).then_some(key)
    }
}

pub struct GcsStorage {
    http: Client,
    auth: ServiceAccountAuth,
    base_url: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

impl GcsStorage {
    /// `base_url` serves both the JSON API and public object URLs.
    pub fn new(http: Client, auth: ServiceAccountAuth, base_url: &str, bucket: &str) -> Self {
        Self {
            http,
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(key)
        )
    }

    fn storage_error(action: &str, key: &str, e: impl std::fmt::Display) -> AppError {
        AppError::StorageError(anyhow::anyhow!("GCS {} of {} failed: {}", action, key, e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let url = format!("{}/storage/v1/b/{}/o", self.base_url, self.bucket);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("prefix", prefix.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(self.auth.access_token().await?)
                .query(&query)
                .send()
                .await
                .map_err(|e| Self::storage_error("list", prefix, e))?;
            if !response.status().is_success() {
                return Err(Self::storage_error("list", prefix, response.status()));
            }

            let page: ObjectList = response
                .json()
                .await
                .map_err(|e| Self::storage_error("list", prefix, e))?;
            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(names),
            }
        }
    }
}

#[async_trait]
impl Storage for GcsStorage {
    fn name(&self) -> &'static str {
        "gcs"
    }

    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, AppError> {
        let url = format!("{}/upload/storage/v1/b/{}/o", self.base_url, self.bucket);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.auth.access_token().await?)
            .query(&[
                ("uploadType", "media"),
                ("name", key),
                ("ifGenerationMatch", "0"),
            ])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| Self::storage_error("upload", key, e))?;

        match response.status() {
            status if status.is_success() => {
                Ok(format!("{}/{}/{}", self.base_url, self.bucket, key))
            }
            StatusCode::PRECONDITION_FAILED => Err(AppError::StorageError(anyhow::anyhow!(
                "Object {} already exists",
                key
            ))),
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(key, status = status.as_u16(), body = %body, "GCS upload rejected");
                Err(Self::storage_error("upload", key, status))
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let response = self
            .http
            .delete(self.object_url(key))
            .bearer_auth(self.auth.access_token().await?)
            .send()
            .await
            .map_err(|e| Self::storage_error("delete", key, e))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(Self::storage_error("delete", key, status)),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, AppError> {
        let mut deleted = 0;
        for name in self.list(prefix).await? {
            if self.delete(&name).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let rest = if let Some(rest) = url.strip_prefix("gs://") {
            rest
        } else {
            let path = url
                .strip_prefix(&self.base_url)
                .or_else(|| url.strip_prefix("https://storage.googleapis.com"))
                .or_else(|| url.strip_prefix("https://storage.cloud.google.com"))?;
            path.strip_prefix('/')?
        };

        let (bucket, key) = rest.split_once('/')?;
        if bucket != self.bucket {
            return None;
        }
        let key = urlencoding::decode(key).ok()?.into_owned();
        is_safe_key(&key).then_some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn local() -> (TempDir, LocalStorage) {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/")
            .await
            .unwrap();
        (dir, storage)
    }

    #[test]
    fn unsafe_keys_are_rejected() {
        assert!(is_safe_key("image/u1/a.png"));
        assert!(!is_safe_key("image/../etc/passwd"));
        assert!(!is_safe_key("/image/u1/a.png"));
        assert!(!is_safe_key("image//a.png"));
        assert!(!is_safe_key(""));
    }

    #[tokio::test]
    async fn local_upload_returns_media_url_and_never_overwrites() {
        let (_dir, storage) = local().await;

        let url = storage
            .upload("image/u1/a.png", b"first".to_vec(), "image/png")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:8080/media/image/u1/a.png");

        let second = storage
            .upload("image/u1/a.png", b"second".to_vec(), "image/png")
            .await;
        assert!(matches!(second, Err(AppError::StorageError(_))));

        let stored = fs::read(storage.base_path().join("image/u1/a.png")).await.unwrap();
        assert_eq!(stored, b"first");
    }

    #[tokio::test]
    async fn local_delete_reports_missing_objects() {
        let (_dir, storage) = local().await;
        storage
            .upload("video/u1/a.mp4", vec![1], "video/mp4")
            .await
            .unwrap();

        assert!(storage.delete("video/u1/a.mp4").await.unwrap());
        assert!(!storage.delete("video/u1/a.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn local_delete_prefix_counts_files() {
        let (_dir, storage) = local().await;
        for name in ["a.png", "b.png"] {
            storage
                .upload(&format!("image/u1/{}", name), vec![1], "image/png")
                .await
                .unwrap();
        }
        storage
            .upload("image/u2/c.png", vec![1], "image/png")
            .await
            .unwrap();

        assert_eq!(storage.delete_prefix("image/u1/").await.unwrap(), 2);
        assert_eq!(storage.delete_prefix("image/u1/").await.unwrap(), 0);
        assert!(storage.base_path().join("image/u2/c.png").exists());
    }

    #[tokio::test]
    async fn local_url_round_trips_to_key() {
        let (_dir, storage) = local().await;
        assert_eq!(
            storage.key_from_url("http://localhost:8080/media/audio/u1/song.mp3"),
            Some("audio/u1/song.mp3".to_string())
        );
        assert_eq!(
            storage.key_from_url("/media/audio/u1/song.mp3"),
            Some("audio/u1/song.mp3".to_string())
        );
        assert_eq!(storage.key_from_url("http://localhost:8080/media/../secret"), None);
        assert_eq!(storage.key_from_url("https://example.com/a.png"), None);
    }

    #[test]
    fn gcs_urls_resolve_to_keys_in_own_bucket_only() {
        let auth = ServiceAccountAuth::from_json(
            &serde_json::json!({
                "client_email": "media@test.iam.gserviceaccount.com",
                "private_key": include_str!("../../tests/fixtures/test_private_key.pem"),
                "token_uri": "http://localhost/token",
            })
            .to_string(),
            Client::new(),
        )
        .unwrap();
        let storage = GcsStorage::new(Client::new(), auth, "https://storage.googleapis.com", "media-bucket");

        assert_eq!(
            storage.key_from_url("gs://media-bucket/image/u1/a.png"),
            Some("image/u1/a.png".to_string())
        );
        assert_eq!(
            storage.key_from_url("https://storage.googleapis.com/media-bucket/video/u1/b%20c.mp4"),
            Some("video/u1/b c.mp4".to_string())
        );
        assert_eq!(storage.key_from_url("gs://other-bucket/image/u1/a.png"), None);
        assert_eq!(storage.key_from_url("gs://media-bucket"), None);
        assert_eq!(storage.key_from_url("ftp://media-bucket/a"), None);
    }
}
