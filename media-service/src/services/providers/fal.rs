//! FAL.ai queue client.
//!
//! Jobs are submitted to `{queue}/{endpoint}`, the returned `status_url` is
//! polled until `COMPLETED`, then the result is read from `response_url`.

use super::{error_for_status, with_retry, ProviderError};
use crate::config::TimeoutConfig;
use crate::models::{GeneratedMedia, MediaKind, Provider};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub struct FalClient {
    client: Client,
    queue_base: String,
    api_key: Option<Secret<String>>,
    timeouts: TimeoutConfig,
}

impl FalClient {
    pub fn new(
        client: Client,
        queue_base: &str,
        api_key: Option<Secret<String>>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            client,
            queue_base: queue_base.trim_end_matches('/').to_string(),
            api_key,
            timeouts,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ProviderError> {
        let key = self
            .api_key
            .as_ref()
            .ok_or(ProviderError::NotConfigured(Provider::Fal))?;
        Ok(request.header(
            reqwest::header::AUTHORIZATION,
            format!("Key {}", key.expose_secret()),
        ))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        let response = self
            .authorize(self.client.get(url))?
            .send()
            .await
            .map_err(|e| ProviderError::network(Provider::Fal, e, self.timeouts.request))?;
        error_for_status(Provider::Fal, response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid(Provider::Fal, format!("unreadable queue response: {}", e)))
    }

    /// Submits a job and waits for its media.
    pub async fn run(
        &self,
        endpoint: &str,
        arguments: FalArguments,
        output: MediaKind,
    ) -> Result<GeneratedMedia, ProviderError> {
        let ticket = self.submit(endpoint, &arguments).await?;
        tracing::info!(endpoint, request_id = %ticket.request_id, "FAL job queued");

        let poll_timeout = self.timeouts.poll_timeout;
        tokio::time::timeout(poll_timeout, self.wait_for_completion(&ticket))
            .await
            .map_err(|_| {
                tracing::warn!(endpoint, request_id = %ticket.request_id, "FAL job timed out");
                ProviderError::Timeout {
                    provider: Provider::Fal,
                    seconds: poll_timeout.as_secs(),
                }
            })??;

        let result: Value = self.get_json(&ticket.response_url).await?;
        let url = media_url(&result, output).ok_or_else(|| {
            ProviderError::invalid(
                Provider::Fal,
                format!("result from {} carried no {} URL", endpoint, output.folder()),
            )
        })?;

        Ok(GeneratedMedia::Remote { url })
    }

    async fn submit(&self, endpoint: &str, arguments: &FalArguments) -> Result<QueueTicket, ProviderError> {
        let url = format!("{}/{}", self.queue_base, endpoint);
        let deadline = self.timeouts.request;

        let response = with_retry(self.timeouts.retry_max_elapsed, || {
            let request = self.authorize(self.client.post(&url).json(arguments));
            async move {
                let response = request?
                    .send()
                    .await
                    .map_err(|e| ProviderError::network(Provider::Fal, e, deadline))?;
                error_for_status(Provider::Fal, response).await
            }
        })
        .await?;

        response
            .json()
            .await
            .map_err(|e| ProviderError::invalid(Provider::Fal, format!("unreadable queue ticket: {}", e)))
    }

    async fn wait_for_completion(&self, ticket: &QueueTicket) -> Result<(), ProviderError> {
        loop {
            let status: QueueStatus = self.get_json(&ticket.status_url).await?;
            match status.status.as_str() {
                "COMPLETED" => {
                    return match status.error {
                        Some(error) => {
                            tracing::error!(request_id = %ticket.request_id, error = %error, "FAL job failed");
                            Err(ProviderError::invalid(Provider::Fal, "job finished with an error"))
                        }
                        None => Ok(()),
                    };
                }
                "IN_QUEUE" | "IN_PROGRESS" => {
                    tracing::debug!(
                        request_id = %ticket.request_id,
                        status = %status.status,
                        queue_position = ?status.queue_position,
                        "FAL job pending"
                    );
                }
                other => {
                    return Err(ProviderError::invalid(
                        Provider::Fal,
                        format!("unknown queue status {}", other),
                    ));
                }
            }
            tokio::time::sleep(self.timeouts.poll_interval).await;
        }
    }
}

fn media_url(result: &Value, output: MediaKind) -> Option<String> {
    let pointers: &[&str] = match output {
        MediaKind::Image => &["/images/0/url", "/image/url"],
        MediaKind::Video => &["/video/url"],
        MediaKind::Audio => &["/audio/url", "/audio_file/url"],
    };
    pointers
        .iter()
        .find_map(|p| result.pointer(p).and_then(Value::as_str))
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct QueueTicket {
    request_id: String,
    status_url: String,
    response_url: String,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    status: String,
    #[serde(default)]
    queue_position: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

/// Request bodies for the FAL endpoints in use.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FalArguments {
    Image(ImageArguments),
    Video(VideoArguments),
    Music(MusicArguments),
    Avatar(AvatarArguments),
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageArguments {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    pub num_images: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_safety_checker: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoArguments {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MusicArguments {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvatarArguments {
    pub image_url: String,
    pub audio_url: String,
}
