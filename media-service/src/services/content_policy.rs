//! Optional prompt screening ahead of dispatch.

use crate::services::providers::{ChatPrompt, ChatProvider};
use service_core::error::AppError;

const POLICY_SYSTEM_PROMPT: &str = "Classify the user prompt. Answer \"true\" if it asks for any of: \
sexually explicit or NSFW material; instructions for crimes, hacking, weapons or drug manufacturing; \
hate speech, harassment or targeted attacks on people or groups; extreme violence or gore; \
deliberate misinformation; promotion of self-harm, suicide or eating disorders; infringement of \
intellectual property. Otherwise answer \"false\". Reply with the single word true or false.";

/// Rejects prompts the classifier flags. Classifier outages are logged and
/// let the request through.
pub async fn check(chat: &dyn ChatProvider, prompt: &str) -> Result<(), AppError> {
    let verdict = chat
        .complete(ChatPrompt {
            system: POLICY_SYSTEM_PROMPT.to_string(),
            user: prompt.to_string(),
            max_tokens: 5,
            temperature: 0.0,
        })
        .await;

    match verdict {
        Ok(answer) if is_violation(&answer) => {
            tracing::warn!("Prompt rejected by content policy");
            metrics::counter!("content_policy_rejections_total").increment(1);
            Err(AppError::ContentPolicy(
                "The prompt violates the content policy".to_string(),
            ))
        }
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, "Content policy check unavailable, allowing request");
            Ok(())
        }
    }
}

fn is_violation(answer: &str) -> bool {
    answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
        .eq_ignore_ascii_case("true")
}
