use crate::dtos::{ImageGenerateResponse, ModelCatalog, ModeSupport, ModelInfo, ShapeStyleQuery};
use crate::handlers::multipart::read_form;
use crate::middleware::UserIdHeader;
use crate::models::{ImageModel, Mode, Shape, Style};
use crate::services::validation::{self, ImageForm};
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

pub async fn generate_image(
    State(state): State<AppState>,
    Query(query): Query<ShapeStyleQuery>,
    user_id: UserIdHeader,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageGenerateResponse>, AppError> {
    let mut form = read_form(multipart).await?;

    let form = ImageForm {
        prompt: form.text("prompt"),
        model: form.text("model"),
        mode: form.text("mode"),
        style: form.text("style").or(query.style),
        shape: form.text("shape").or(query.shape),
        user_id: user_id.or_form(form.text("user_id")),
        images: form.files("image_files"),
    };
    let request = validation::validate_image(form, &state.config.limits)?;

    let (model, mode, shape) = (request.model, request.mode, request.shape);
    let record = state.generation.image(request).await?;

    let verb = match mode {
        Mode::Generate => "generated",
        Mode::Edit => "edited",
    };

    Ok(Json(ImageGenerateResponse {
        status: StatusCode::OK.as_u16(),
        success_message: format!("Image {} successfully using {}", verb, model),
        image_url: record.url,
        model_used: model.to_string(),
        shape: shape.to_string(),
    }))
}

pub async fn image_models() -> Json<ModelCatalog> {
    let models = ImageModel::ALL
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
        styles: Style::ALL.iter().map(Style::as_str).collect(),
        shapes: Shape::ALL.iter().map(Shape::as_str).collect(),
        default_shape: Shape::Square.as_str(),
    })
}
