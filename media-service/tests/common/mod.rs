//! Test harness for media-service integration tests.
//!
//! Every upstream (OpenAI, Gemini, FAL, downloads and Cloud Storage) is a
//! wiremock server; the application itself listens on a random port.

#![allow(dead_code)]

use media_service::config::{
    LimitsConfig, MediaConfig, ProviderConfig, StorageBackend, StorageConfig, TimeoutConfig,
};
use media_service::Application;
use secrecy::Secret;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PUBLIC_BASE_URL: &str = "http://media.test";
pub const TEST_BUCKET: &str = "test-bucket";
const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_private_key.pem");

pub struct TestApp {
    pub address: String,
    pub port: u16,
    /// Serves `/openai`, `/gemini`, `/fal` and `/files/**`.
    pub upstream: MockServer,
    /// Cloud Storage JSON API and token endpoint, when GCS is enabled.
    pub gcs: Option<MockServer>,
    pub media_dir: TempDir,
    client: reqwest::Client,
    _credentials: Option<NamedTempFile>,
}

#[derive(Default)]
pub struct TestOptions {
    pub gcs: bool,
    pub content_policy: bool,
    /// Overrides the queued-job deadline.
    pub poll_timeout: Option<Duration>,
}

fn write_credentials(token_uri: &str) -> NamedTempFile {
    let key = serde_json::json!({
        "type": "service_account",
        "client_email": "media@test-project.iam.gserviceaccount.com",
        "private_key_id": "test-key",
        "private_key": TEST_PRIVATE_KEY,
        "token_uri": token_uri,
    });
    let mut file = NamedTempFile::new().expect("Failed to create credentials file");
    file.write_all(key.to_string().as_bytes())
        .expect("Failed to write credentials file");
    file
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Self {
        let upstream = MockServer::start().await;
        let media_dir = TempDir::new().expect("Failed to create media dir");

        let (gcs, credentials) = if options.gcs {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "access_token": "ya29.test-token",
                    "expires_in": 3600,
                    "token_type": "Bearer"
                })))
                .mount(&server)
                .await;
            let credentials = write_credentials(&format!("{}/token", server.uri()));
            (Some(server), Some(credentials))
        } else {
            (None, None)
        };

        let config = MediaConfig {
            common: service_core::config::Config {
                port: 0,
                log_level: "debug".to_string(),
            },
            providers: ProviderConfig {
                openai_api_key: Some(Secret::new("sk-test".to_string())),
                gemini_api_key: Some(Secret::new("gemini-test".to_string())),
                fal_api_key: Some(Secret::new("fal-test".to_string())),
                openai_api_base: format!("{}/openai", upstream.uri()),
                gemini_api_base: format!("{}/gemini", upstream.uri()),
                fal_queue_base: format!("{}/fal", upstream.uri()),
            },
            storage: StorageConfig {
                backend: if options.gcs {
                    StorageBackend::Gcs
                } else {
                    StorageBackend::Local
                },
                gcs_bucket: options.gcs.then(|| TEST_BUCKET.to_string()),
                gcs_credentials_path: credentials
                    .as_ref()
                    .map(|f| f.path().to_string_lossy().into_owned()),
                gcs_base_url: gcs
                    .as_ref()
                    .map(|s| s.uri())
                    .unwrap_or_else(|| "https://storage.googleapis.com".to_string()),
                local_path: media_dir.path().to_string_lossy().into_owned(),
                base_url: PUBLIC_BASE_URL.to_string(),
            },
            limits: LimitsConfig {
                max_file_size_mb: 1,
            },
            timeouts: TimeoutConfig {
                request: Duration::from_secs(5),
                poll_interval: Duration::from_millis(10),
                poll_timeout: options.poll_timeout.unwrap_or(Duration::from_secs(5)),
                retry_max_elapsed: Duration::from_millis(500),
            },
            content_policy_enabled: options.content_policy,
            otlp_endpoint: None,
        };

        let application = Application::build(config)
            .await
            .expect("Failed to build application");
        let port = application.port();
        tokio::spawn(application.run_until_stopped(std::future::pending()));

        TestApp {
            address: format!("http://127.0.0.1:{}", port),
            port,
            upstream,
            gcs,
            media_dir,
            client: reqwest::Client::new(),
            _credentials: credentials,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn media_path(&self, key: &str) -> PathBuf {
        self.media_dir.path().join(key)
    }

    /// Places a file in the local store as if it had been generated earlier.
    pub fn seed_media(&self, key: &str, data: &[u8]) {
        let path = self.media_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create media folder");
        }
        std::fs::write(path, data).expect("Failed to seed media file");
    }

    /// Serves `data` at `{upstream}/files/{name}` for providers that return
    /// hosted URLs.
    pub async fn host_file(&self, name: &str, data: Vec<u8>, content_type: &str) -> String {
        Mock::given(method("GET"))
            .and(path(format!("/files/{}", name)))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", content_type)
                    .set_body_bytes(data),
            )
            .mount(&self.upstream)
            .await;
        format!("{}/files/{}", self.upstream.uri(), name)
    }

    /// Stubs a FAL queue job on `endpoint` that completes immediately with
    /// `result`.
    pub async fn mock_fal_job(&self, endpoint: &str, result: serde_json::Value) {
        let base = format!("{}/fal/requests/job-1", self.upstream.uri());

        Mock::given(method("POST"))
            .and(path(format!("/fal/{}", endpoint)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "request_id": "job-1",
                "status_url": format!("{}/status", base),
                "response_url": base,
            })))
            .expect(1)
            .mount(&self.upstream)
            .await;

        Mock::given(method("GET"))
            .and(path("/fal/requests/job-1/status"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "COMPLETED" })),
            )
            .mount(&self.upstream)
            .await;

        Mock::given(method("GET"))
            .and(path("/fal/requests/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(result))
            .mount(&self.upstream)
            .await;
    }

    pub async fn mock_chat_reply(&self, content: &str) {
        Mock::given(method("POST"))
            .and(path("/openai/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            })))
            .mount(&self.upstream)
            .await;
    }

    pub async fn post_form(&self, path: &str, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

pub fn text_form(fields: &[(&str, &str)]) -> reqwest::multipart::Form {
    fields
        .iter()
        .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
            form.text(name.to_string(), value.to_string())
        })
}

pub fn file_part(data: Vec<u8>, filename: &str, content_type: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(data)
        .file_name(filename.to_string())
        .mime_str(content_type)
        .expect("Invalid mime type")
}

/// A tiny but decodable PNG.
pub fn png_bytes() -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image::RgbImage::new(8, 8))
        .write_to(&mut cursor, image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    cursor.into_inner()
}
