use serde::{Deserialize, Serialize};
use validator::Validate;

/// `style` and `shape` may be sent as query parameters instead of form
/// fields; a form field wins when both are present.
#[derive(Debug, Default, Deserialize)]
pub struct ShapeStyleQuery {
    pub style: Option<String>,
    pub shape: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AudioGenerateRequest {
    #[validate(length(min = 1, message = "verse_prompt is required"))]
    pub verse_prompt: String,
    pub lyrics_prompt: Option<String>,
}

fn default_prompt_kind() -> String {
    "image".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct EnhancePromptRequest {
    #[validate(length(min = 1, message = "prompt is required"))]
    pub prompt: String,
    #[serde(rename = "type", default = "default_prompt_kind")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct ImageGenerateResponse {
    pub status: u16,
    pub success_message: String,
    pub image_url: String,
    pub model_used: String,
    pub shape: String,
}

/// Returned by both video generation and avatar creation.
#[derive(Debug, Serialize)]
pub struct VideoGenerateResponse {
    pub status: u16,
    pub success_message: String,
    pub video_url: String,
}

#[derive(Debug, Serialize)]
pub struct AudioGenerateResponse {
    pub status: u16,
    pub success_message: String,
    pub audio_url: String,
}

#[derive(Debug, Serialize)]
pub struct EnhancePromptResponse {
    pub status: u16,
    pub success_message: String,
    pub enhanced_prompt: String,
}
