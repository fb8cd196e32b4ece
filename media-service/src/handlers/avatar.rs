use crate::dtos::VideoGenerateResponse;
use crate::handlers::multipart::read_form;
use crate::middleware::UserIdHeader;
use crate::services::validation::{self, AvatarForm};
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        State,
    },
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

/// Lip-synced talking-head video from a face image and a voice track.
pub async fn create_avatar(
    State(state): State<AppState>,
    user_id: UserIdHeader,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VideoGenerateResponse>, AppError> {
    let mut form = read_form(multipart).await?;

    let form = AvatarForm {
        image: form.file("image_file"),
        audio: form.file("audio_file"),
        user_id: user_id.or_form(form.text("user_id")),
    };
    let request = validation::validate_avatar(form, &state.config.limits)?;

    let record = state.generation.avatar(request).await?;

    Ok(Json(VideoGenerateResponse {
        status: StatusCode::OK.as_u16(),
        success_message: "AI Avatar video generated successfully with ByteDance OmniHuman"
            .to_string(),
        video_url: record.url,
    }))
}
