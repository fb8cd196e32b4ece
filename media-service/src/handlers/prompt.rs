use crate::dtos::{EnhancePromptRequest, EnhancePromptResponse};
use crate::models::PromptKind;
use crate::services::prompt_enhancer;
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;

pub async fn enhance_prompt(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<EnhancePromptRequest>,
) -> Result<Json<EnhancePromptResponse>, AppError> {
    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::InvalidInput("prompt is required".to_string()));
    }
    let kind: PromptKind = body
        .kind
        .parse::<PromptKind>()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let enhanced_prompt = prompt_enhancer::enhance(state.chat.as_ref(), prompt, kind).await;

    Ok(Json(EnhancePromptResponse {
        status: StatusCode::OK.as_u16(),
        success_message: "Prompt enhanced successfully".to_string(),
        enhanced_prompt,
    }))
}
