//! Google Gemini API client.
//!
//! Three protocols share one key:
//! - Imagen `:predict`, synchronous, base64 image in the response.
//! - `:streamGenerateContent?alt=sse` for the image-capable flash model; the
//!   first inline image part ends the stream.
//! - Veo `:predictLongRunning`, an operation polled until `done`, whose video
//!   URI is downloaded with the same key.

use super::{error_for_status, with_retry, ProviderError};
use crate::config::TimeoutConfig;
use crate::models::{GeneratedMedia, Provider};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use futures::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Finish reasons meaning the model declined the prompt.
const BLOCKED_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "IMAGE_SAFETY",
    "BLOCKLIST",
];

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
    timeouts: TimeoutConfig,
}

impl GeminiClient {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: Option<Secret<String>>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeouts,
        }
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .ok_or(ProviderError::NotConfigured(Provider::Gemini))
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn submit<B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProviderError> {
        let api_key = self.api_key()?;
        let deadline = self.timeouts.request;

        with_retry(self.timeouts.retry_max_elapsed, || {
            let request = self
                .client
                .post(url)
                .header(API_KEY_HEADER, api_key)
                .json(body);
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| ProviderError::network(Provider::Gemini, e, deadline))?;
                error_for_status(Provider::Gemini, response).await
            }
        })
        .await
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, self.api_key()?)
            .send()
            .await
            .map_err(|e| ProviderError::network(Provider::Gemini, e, self.timeouts.request))?;
        error_for_status(Provider::Gemini, response).await
    }

    pub async fn predict_image(
        &self,
        model: &str,
        request: PredictRequest,
    ) -> Result<GeneratedMedia, ProviderError> {
        tracing::debug!(model, "Sending predict request to Gemini API");

        let url = self.model_url(model, "predict");
        let response = self.submit(&url, &request).await?;
        let body: PredictResponse = response.json().await.map_err(|e| {
            ProviderError::invalid(Provider::Gemini, format!("unreadable predict response: {}", e))
        })?;

        let prediction = body
            .predictions
            .into_iter()
            .find(|p| p.bytes_base64_encoded.is_some())
            .ok_or_else(|| {
                // Imagen returns an empty prediction list when every sample was filtered.
                ProviderError::ContentFiltered(Provider::Gemini)
            })?;

        let data = decode_base64(prediction.bytes_base64_encoded.as_deref().unwrap_or_default())?;
        Ok(GeneratedMedia::Inline {
            data,
            content_type: prediction
                .mime_type
                .unwrap_or_else(|| "image/png".to_string()),
        })
    }

    /// Consumes the SSE stream until the first inline image. Dropping the
    /// returned future closes the connection.
    pub async fn stream_image(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GeneratedMedia, ProviderError> {
        tracing::debug!(model, "Starting streaming request to Gemini API");

        let url = format!("{}?alt=sse", self.model_url(model, "streamGenerateContent"));
        let response = self.submit(&url, &request).await?;
        let poll_timeout = self.timeouts.poll_timeout;

        let consume = async {
            let mut stream = response.bytes_stream();
            let mut events = SseBuffer::default();
            let mut blocked = false;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk
                    .map_err(|e| ProviderError::network(Provider::Gemini, e, self.timeouts.request))?;

                for data in events.push(&chunk) {
                    let event: GenerateContentResponse = match serde_json::from_str(&data) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping unparseable Gemini stream event");
                            continue;
                        }
                    };

                    match event.first_image() {
                        Some(inline) => {
                            return Ok(GeneratedMedia::Inline {
                                data: decode_base64(&inline.data)?,
                                content_type: inline.mime_type.clone(),
                            });
                        }
                        None => blocked |= event.is_blocked(),
                    }
                }
            }

            if blocked {
                Err(ProviderError::ContentFiltered(Provider::Gemini))
            } else {
                Err(ProviderError::invalid(
                    Provider::Gemini,
                    "stream ended without an image",
                ))
            }
        };

        tokio::time::timeout(poll_timeout, consume)
            .await
            .map_err(|_| ProviderError::Timeout {
                provider: Provider::Gemini,
                seconds: poll_timeout.as_secs(),
            })?
    }

    pub async fn generate_video(
        &self,
        model: &str,
        request: PredictRequest,
    ) -> Result<GeneratedMedia, ProviderError> {
        tracing::debug!(model, "Submitting long-running video request to Gemini API");

        let url = self.model_url(model, "predictLongRunning");
        let response = self.submit(&url, &request).await?;
        let operation: Operation = response.json().await.map_err(|e| {
            ProviderError::invalid(Provider::Gemini, format!("unreadable operation: {}", e))
        })?;

        tracing::info!(model, operation = %operation.name, "Video operation started");

        let poll_timeout = self.timeouts.poll_timeout;
        let finished = tokio::time::timeout(poll_timeout, self.wait_for_operation(operation))
            .await
            .map_err(|_| ProviderError::Timeout {
                provider: Provider::Gemini,
                seconds: poll_timeout.as_secs(),
            })??;

        if let Some(error) = finished.error {
            tracing::error!(
                code = error.code,
                error_message = %error.message,
                "Video operation failed"
            );
            return Err(ProviderError::invalid(
                Provider::Gemini,
                format!("video operation failed with code {}", error.code),
            ));
        }

        let response = finished.response.unwrap_or_default();
        if response.generate_video_response.rai_media_filtered_count > 0 {
            return Err(ProviderError::ContentFiltered(Provider::Gemini));
        }

        let uri = response
            .generate_video_response
            .generated_samples
            .into_iter()
            .find_map(|s| s.video.and_then(|v| v.uri))
            .ok_or_else(|| ProviderError::invalid(Provider::Gemini, "operation returned no video"))?;

        let video = self.get(&uri).await?;
        let content_type = video
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("video/"))
            .unwrap_or("video/mp4")
            .to_string();
        let data = video
            .bytes()
            .await
            .map_err(|e| ProviderError::network(Provider::Gemini, e, self.timeouts.request))?;

        Ok(GeneratedMedia::Inline {
            data: data.to_vec(),
            content_type,
        })
    }

    async fn wait_for_operation(&self, mut operation: Operation) -> Result<Operation, ProviderError> {
        let url = format!("{}/{}", self.base_url, operation.name);
        while !operation.done {
            tokio::time::sleep(self.timeouts.poll_interval).await;
            operation = self.get(&url).await?.json().await.map_err(|e| {
                ProviderError::invalid(Provider::Gemini, format!("unreadable operation: {}", e))
            })?;
        }
        Ok(operation)
    }
}

fn decode_base64(data: &str) -> Result<Vec<u8>, ProviderError> {
    BASE64
        .decode(data)
        .map_err(|e| ProviderError::invalid(Provider::Gemini, format!("invalid base64 media: {}", e)))
}

/// Splits a byte stream into SSE `data:` payloads. Events are framed on the
/// raw bytes so separators and multibyte characters may straddle chunks.
#[derive(Default)]
struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some((event_end, separator_len)) = next_event_boundary(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..event_end + separator_len).collect();
            let event = match String::from_utf8(event) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping non UTF-8 Gemini stream event");
                    continue;
                }
            };
            let data = event
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim_start)
                .collect::<Vec<_>>()
                .join("\n");
            if !data.is_empty() {
                payloads.push(data);
            }
        }
        payloads
    }
}

/// Earliest blank-line separator as `(start, length)`.
fn next_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let find = |needle: &[u8]| {
        buffer
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|start| (start, needle.len()))
    };
    match (find(b"\n\n"), find(b"\r\n\r\n")) {
        (Some(lf), Some(crlf)) => Some(if crlf.0 < lf.0 { crlf } else { lf }),
        (lf, crlf) => lf.or(crlf),
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub instances: Vec<PredictInstance>,
    pub parameters: PredictParameters,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictInstance {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EncodedImage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    pub bytes_base64_encoded: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictParameters {
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_options: Option<OutputOptions>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOptions {
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(alias = "mime_type")]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    fn first_image(&self) -> Option<&InlineData> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| match p {
                ContentPart::InlineData { inline_data } if inline_data.mime_type.starts_with("image/") => {
                    Some(inline_data)
                }
                _ => None,
            })
    }

    fn is_blocked(&self) -> bool {
        let prompt_blocked = self
            .prompt_feedback
            .as_ref()
            .is_some_and(|f| f.block_reason.is_some());
        let candidate_blocked = self.candidates.iter().any(|c| {
            c.finish_reason
                .as_deref()
                .is_some_and(|r| BLOCKED_FINISH_REASONS.contains(&r))
        });
        prompt_blocked || candidate_blocked
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<OperationResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    #[serde(default)]
    generate_video_response: GenerateVideoResponse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
    #[serde(default)]
    rai_media_filtered_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    #[serde(default)]
    uri: Option<String>,
}
