use crate::dtos::{ModelCatalog, ModeSupport, ModelInfo, ShapeStyleQuery, VideoGenerateResponse};
use crate::handlers::multipart::read_form;
use crate::middleware::UserIdHeader;
use crate::models::{Mode, Shape, VideoModel};
use crate::services::validation::{self, VideoForm};
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

pub async fn generate_video(
    State(state): State<AppState>,
    Query(query): Query<ShapeStyleQuery>,
    user_id: UserIdHeader,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VideoGenerateResponse>, AppError> {
    let mut form = read_form(multipart).await?;

    let form = VideoForm {
        prompt: form.text("prompt"),
        model: form.text("model"),
        mode: form.text("mode"),
        shape: form.text("shape").or(query.shape),
        user_id: user_id.or_form(form.text("user_id")),
        image: form.file("image_file"),
    };
    let request = validation::validate_video(form, &state.config.limits)?;

    let (model, mode) = (request.model, request.mode);
    let record = state.generation.video(request).await?;

    let success_message = match mode {
        Mode::Generate => format!("Video generated successfully using {}", model),
        Mode::Edit => format!("Video created from image successfully using {}", model),
    };

    Ok(Json(VideoGenerateResponse {
        status: StatusCode::OK.as_u16(),
        success_message,
        video_url: record.url,
    }))
}

pub async fn video_models() -> Json<ModelCatalog> {
    let models = VideoModel::ALL
        .iter()
        .map(|model| ModelInfo {
            name: model.as_str(),
            provider: model.provider(),
            modes: [Mode::Generate, Mode::Edit]
                .into_iter()
                .filter_map(|mode| {
                    model
                        .reference_images(mode)
                        .map(|bounds| ModeSupport::new(mode, bounds))
                })
                .collect(),
        })
        .collect();

    Json(ModelCatalog {
        models,
        styles: Vec::new(),
        shapes: Shape::ALL.iter().map(Shape::as_str).collect(),
        default_shape: Shape::Landscape.as_str(),
    })
}
