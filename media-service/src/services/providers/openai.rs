//! OpenAI client: DALL-E 3 image generation and chat completions.

use super::{error_for_status, with_retry, ChatPrompt, ProviderError};
use crate::config::TimeoutConfig;
use crate::models::{GeneratedMedia, Provider};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

pub const CHAT_MODEL: &str = "gpt-4o";

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
    timeouts: TimeoutConfig,
}

impl OpenAiClient {
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
            .ok_or(ProviderError::NotConfigured(Provider::OpenAi))
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProviderError> {
        let api_key = self.api_key()?;
        let url = format!("{}{}", self.base_url, path);
        let deadline = self.timeouts.request;

        with_retry(self.timeouts.retry_max_elapsed, || {
            let request = self.client.post(&url).bearer_auth(api_key).json(body);
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| ProviderError::network(Provider::OpenAi, e, deadline))?;
                error_for_status(Provider::OpenAi, response).await
            }
        })
        .await
    }

    pub async fn generate_image(
        &self,
        request: ImageGenerationRequest,
    ) -> Result<GeneratedMedia, ProviderError> {
        tracing::debug!(
            model = %request.model,
            size = %request.size,
            "Sending request to OpenAI images API"
        );

        let response = self.post("/images/generations", &request).await?;
        let body: ImageGenerationResponse = response
            .json()
            .await
            .map_err(|e| {
                ProviderError::invalid(Provider::OpenAi, format!("unreadable image response: {}", e))
            })?;

        let url = body
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| {
                ProviderError::invalid(Provider::OpenAi, "response contained no image URL")
            })?;

        Ok(GeneratedMedia::Remote { url })
    }

    pub async fn chat_completion(&self, prompt: ChatPrompt) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: CHAT_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user,
                },
            ],
            max_tokens: prompt.max_tokens,
            temperature: prompt.temperature,
        };

        let response = self.post("/chat/completions", &request).await?;
        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| {
                ProviderError::invalid(Provider::OpenAi, format!("unreadable chat response: {}", e))
            })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProviderError::invalid(Provider::OpenAi, "chat response was empty"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub size: String,
    pub quality: String,
    pub n: u8,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: &'static str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn timeouts() -> TimeoutConfig {
        TimeoutConfig {
            request: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            poll_timeout: Duration::from_secs(5),
            retry_max_elapsed: Duration::from_millis(200),
        }
    }

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(
            Client::new(),
            &server.uri(),
            Some(Secret::new("sk-test".to_string())),
            timeouts(),
        )
    }

    #[tokio::test]
    async fn chat_completion_returns_trimmed_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o",
                "max_tokens": 300
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "  a vivid harbour  " } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server)
            .chat_completion(ChatPrompt {
                system: "sys".into(),
                user: "harbour".into(),
                max_tokens: 300,
                temperature: 0.7,
            })
            .await
            .unwrap();

        assert_eq!(text, "a vivid harbour");
    }

    #[tokio::test]
    async fn missing_key_fails_without_calling_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(Client::new(), &server.uri(), None, timeouts());
        let err = client
            .generate_image(ImageGenerationRequest {
                model: "dall-e-3".into(),
                prompt: "x".into(),
                size: "1024x1024".into(),
                quality: "standard".into(),
                n: 1,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::NotConfigured(Provider::OpenAi)));
    }

    #[tokio::test]
    async fn image_response_without_url_is_a_contract_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
            .mount(&server)
            .await;

        let err = client(&server)
            .generate_image(ImageGenerationRequest {
                model: "dall-e-3".into(),
                prompt: "x".into(),
                size: "1024x1024".into(),
                quality: "standard".into(),
                n: 1,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }
}
