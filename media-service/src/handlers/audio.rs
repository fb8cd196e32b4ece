use crate::dtos::{AudioGenerateRequest, AudioGenerateResponse};
use crate::middleware::UserIdHeader;
use crate::services::validation;
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;

pub async fn generate_audio(
    State(state): State<AppState>,
    UserIdHeader(user_id): UserIdHeader,
    ValidatedJson(body): ValidatedJson<AudioGenerateRequest>,
) -> Result<Json<AudioGenerateResponse>, AppError> {
    let request = validation::validate_audio(
        &body.verse_prompt,
        body.lyrics_prompt.as_deref(),
        user_id.as_deref(),
    )?;

    let record = state.generation.audio(request).await?;

    Ok(Json(AudioGenerateResponse {
        status: StatusCode::OK.as_u16(),
        success_message: "Audio generated successfully using MiniMax".to_string(),
        audio_url: record.url,
    }))
}
