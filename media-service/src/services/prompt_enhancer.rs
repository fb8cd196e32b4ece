use crate::models::PromptKind;
use crate::services::providers::{ChatPrompt, ChatProvider};

const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.7;

const IMAGE_SYSTEM_PROMPT: &str = "You are an expert at enhancing prompts for AI image generation. \
Improve the user's prompt with artistic detail, quality terms and technical specifics while keeping \
the original concept. Focus on visual style, lighting, composition, colors, mood, artistic medium \
and quality descriptors.";

const VIDEO_SYSTEM_PROMPT: &str = "You are an expert at enhancing prompts for AI video generation. \
Improve the user's prompt with detail about motion, cinematography, pacing and visual flow while \
keeping the original concept. Focus on camera movement, scene transitions, motion dynamics, \
temporal flow, lighting changes and cinematographic style.";

const AUDIO_SYSTEM_PROMPT: &str = "You are an expert at enhancing prompts for AI music and audio \
generation. Improve the user's prompt with artistic detail and production specifics while keeping \
the original concept. Focus on musical style, instruments, tempo, mood, harmony, rhythm and \
production quality.";

fn chat_prompt(prompt: &str, kind: PromptKind) -> ChatPrompt {
    let (system, target) = match kind {
        PromptKind::Image => (IMAGE_SYSTEM_PROMPT, "AI image generation"),
        PromptKind::Video => (VIDEO_SYSTEM_PROMPT, "AI video generation"),
        PromptKind::Audio => (AUDIO_SYSTEM_PROMPT, "AI audio/music generation"),
    };

    ChatPrompt {
        system: system.to_string(),
        user: format!(
            "Enhance this prompt for {}: \"{}\"\n\nReturn only the enhanced prompt, no explanations.",
            target, prompt
        ),
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// Rewrites `prompt` for the given media kind. Enhancement is best effort:
/// when the chat provider fails the original prompt comes back unchanged.
pub async fn enhance(chat: &dyn ChatProvider, prompt: &str, kind: PromptKind) -> String {
    match chat.complete(chat_prompt(prompt, kind)).await {
        Ok(enhanced) => {
            tracing::info!(kind = %kind, "Prompt enhanced");
            enhanced
        }
        Err(e) => {
            tracing::warn!(kind = %kind, error = %e, "Prompt enhancement failed, returning original prompt");
            prompt.to_string()
        }
    }
}
