//! Upstream generator clients.
//!
//! Handlers never talk to a vendor directly: they hand a [`ProviderPayload`]
//! to a [`MediaGenerator`] and get back [`GeneratedMedia`]. Chat completions
//! used for prompt enhancement and moderation go through [`ChatProvider`].

pub mod fal;
pub mod gemini;
pub mod mock;
pub mod openai;

use crate::config::{ProviderConfig, TimeoutConfig};
use crate::models::{GeneratedMedia, MediaKind, Provider};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use service_core::error::AppError;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error type for provider operations. `Display` output is safe to return to
/// callers; raw upstream bodies are only logged.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0} provider is not configured")]
    NotConfigured(Provider),

    #[error("{provider} API returned HTTP {status}")]
    ApiError { provider: Provider, status: u16 },

    #[error("{0} rate limited the request")]
    RateLimited(Provider),

    #[error("{provider} request failed")]
    NetworkError {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} did not respond within {seconds}s")]
    Timeout { provider: Provider, seconds: u64 },

    #[error("{provider} returned an unexpected response: {message}")]
    InvalidResponse { provider: Provider, message: String },

    #[error("{0} refused to generate content for this prompt")]
    ContentFiltered(Provider),
}

impl ProviderError {
    pub(crate) fn network(provider: Provider, source: reqwest::Error, deadline: Duration) -> Self {
        if source.is_timeout() {
            ProviderError::Timeout {
                provider,
                seconds: deadline.as_secs(),
            }
        } else {
            tracing::warn!(provider = %provider, error = %source, "Provider request failed");
            ProviderError::NetworkError { provider, source }
        }
    }

    pub(crate) fn invalid(provider: Provider, message: impl Into<String>) -> Self {
        ProviderError::InvalidResponse {
            provider,
            message: message.into(),
        }
    }

    /// Failures worth retrying on submission: the request never reached a
    /// model or was shed under load.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited(_) => true,
            ProviderError::NetworkError { source, .. } => source.is_connect() || source.is_request(),
            ProviderError::ApiError { status, .. } => matches!(status, 502 | 503 | 504),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError { .. } => "api_error",
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::NetworkError { .. } => "network",
            ProviderError::Timeout { .. } => "timeout",
            ProviderError::InvalidResponse { .. } => "invalid_response",
            ProviderError::ContentFiltered(_) => "content_filtered",
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout { .. } => AppError::Timeout(err.to_string()),
            ProviderError::ContentFiltered(_) => AppError::ContentPolicy(err.to_string()),
            _ => AppError::Upstream(err.to_string()),
        }
    }
}

/// Maps a non-2xx response onto [`ProviderError`], logging the body.
pub(crate) async fn error_for_status(
    provider: Provider,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(
        provider = %provider,
        status = status.as_u16(),
        body = %body,
        "Provider returned an error response"
    );

    if status.as_u16() == 429 {
        return Err(ProviderError::RateLimited(provider));
    }

    Err(ProviderError::ApiError {
        provider,
        status: status.as_u16(),
    })
}

/// Runs `op` again while it fails with a transient error, up to
/// `max_elapsed`.
pub(crate) async fn with_retry<T, F, Fut>(max_elapsed: Duration, op: F) -> Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(250),
        max_elapsed_time: Some(max_elapsed),
        ..Default::default()
    };

    retry(policy, || async {
        op().await.map_err(|e| {
            if e.is_transient() {
                tracing::warn!(error = %e, "Transient provider failure, retrying");
                backoff::Error::transient(e)
            } else {
                backoff::Error::permanent(e)
            }
        })
    })
    .await
}

/// Upstream request shapes, one variant per vendor protocol.
#[derive(Debug, Clone)]
pub enum ProviderPayload {
    /// Synchronous DALL-E call returning a hosted URL.
    OpenAiImage(openai::ImageGenerationRequest),
    /// Imagen `:predict`, returns base64 bytes.
    Imagen {
        model: &'static str,
        request: gemini::PredictRequest,
    },
    /// `:streamGenerateContent`, first inline image wins.
    GeminiImageStream {
        model: &'static str,
        request: gemini::GenerateContentRequest,
    },
    /// Veo `:predictLongRunning`, polled until done.
    Veo {
        model: &'static str,
        request: gemini::PredictRequest,
    },
    /// FAL queue job; `output` selects which result field holds the media.
    FalQueue {
        endpoint: &'static str,
        arguments: fal::FalArguments,
        output: MediaKind,
    },
}

impl ProviderPayload {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderPayload::OpenAiImage(_) => Provider::OpenAi,
            ProviderPayload::Imagen { .. }
            | ProviderPayload::GeminiImageStream { .. }
            | ProviderPayload::Veo { .. } => Provider::Gemini,
            ProviderPayload::FalQueue { .. } => Provider::Fal,
        }
    }

    /// Upstream model or endpoint name, for logs and metrics.
    pub fn target(&self) -> &str {
        match self {
            ProviderPayload::OpenAiImage(request) => &request.model,
            ProviderPayload::Imagen { model, .. }
            | ProviderPayload::GeminiImageStream { model, .. }
            | ProviderPayload::Veo { model, .. } => model,
            ProviderPayload::FalQueue { endpoint, .. } => endpoint,
        }
    }
}

/// Turns a payload into media.
#[async_trait]
pub trait MediaGenerator: Send + Sync {
    async fn generate(&self, payload: ProviderPayload) -> Result<GeneratedMedia, ProviderError>;
}

/// A single-turn chat completion.
#[derive(Debug, Clone)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, prompt: ChatPrompt) -> Result<String, ProviderError>;
}

/// Production [`MediaGenerator`] routing each payload to its vendor client.
pub struct ProviderClients {
    pub openai: openai::OpenAiClient,
    pub gemini: gemini::GeminiClient,
    pub fal: fal::FalClient,
}

impl ProviderClients {
    pub fn new(config: &ProviderConfig, timeouts: &TimeoutConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request)
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            openai: openai::OpenAiClient::new(
                http.clone(),
                &config.openai_api_base,
                config.openai_api_key.clone(),
                timeouts.clone(),
            ),
            gemini: gemini::GeminiClient::new(
                http.clone(),
                &config.gemini_api_base,
                config.gemini_api_key.clone(),
                timeouts.clone(),
            ),
            fal: fal::FalClient::new(
                http,
                &config.fal_queue_base,
                config.fal_api_key.clone(),
                timeouts.clone(),
            ),
        })
    }
}

#[async_trait]
impl MediaGenerator for ProviderClients {
    async fn generate(&self, payload: ProviderPayload) -> Result<GeneratedMedia, ProviderError> {
        let provider = payload.provider();
        let target = payload.target().to_string();
        let start = Instant::now();

        let result = match payload {
            ProviderPayload::OpenAiImage(request) => self.openai.generate_image(request).await,
            ProviderPayload::Imagen { model, request } => {
                self.gemini.predict_image(model, request).await
            }
            ProviderPayload::GeminiImageStream { model, request } => {
                self.gemini.stream_image(model, request).await
            }
            ProviderPayload::Veo { model, request } => {
                self.gemini.generate_video(model, request).await
            }
            ProviderPayload::FalQueue {
                endpoint,
                arguments,
                output,
            } => self.fal.run(endpoint, arguments, output).await,
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::histogram!(
            "provider_call_duration_seconds",
            "provider" => provider.as_str(),
            "target" => target.clone(),
            "outcome" => outcome
        )
        .record(start.elapsed().as_secs_f64());

        tracing::info!(
            provider = %provider,
            target = %target,
            outcome,
            duration_ms = start.elapsed().as_millis() as u64,
            "Provider call finished"
        );

        result
    }
}

#[async_trait]
impl ChatProvider for openai::OpenAiClient {
    async fn complete(&self, prompt: ChatPrompt) -> Result<String, ProviderError> {
        self.chat_completion(prompt).await
    }
}

#[async_trait]
impl ChatProvider for ProviderClients {
    async fn complete(&self, prompt: ChatPrompt) -> Result<String, ProviderError> {
        self.openai.chat_completion(prompt).await
    }
}
