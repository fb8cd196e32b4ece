//! In-process providers for exercising the pipeline without network access.

use super::{ChatPrompt, ChatProvider, MediaGenerator, ProviderError, ProviderPayload};
use crate::models::{GeneratedMedia, Provider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

enum Outcome {
    Media(GeneratedMedia),
    Status(u16),
}

/// Records every payload it receives and answers with a fixed outcome.
pub struct MockGenerator {
    outcome: Outcome,
    payloads: Mutex<Vec<ProviderPayload>>,
}

impl MockGenerator {
    pub fn returning(media: GeneratedMedia) -> Self {
        Self {
            outcome: Outcome::Media(media),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call as if the provider answered with `status`.
    pub fn failing_with(status: u16) -> Self {
        Self {
            outcome: Outcome::Status(status),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.payloads.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub fn last_payload(&self) -> Option<ProviderPayload> {
        self.payloads.lock().ok().and_then(|p| p.last().cloned())
    }
}

#[async_trait]
impl MediaGenerator for MockGenerator {
    async fn generate(&self, payload: ProviderPayload) -> Result<GeneratedMedia, ProviderError> {
        let provider = payload.provider();
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.push(payload);
        }

        match &self.outcome {
            Outcome::Media(media) => Ok(media.clone()),
            Outcome::Status(status) => Err(ProviderError::ApiError {
                provider,
                status: *status,
            }),
        }
    }
}

/// Chat provider with a canned reply; `None` simulates an outage.
pub struct MockChat {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl MockChat {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for MockChat {
    async fn complete(&self, _prompt: ChatPrompt) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or(ProviderError::ApiError {
            provider: Provider::OpenAi,
            status: 503,
        })
    }
}
