//! Turns raw request fields into typed generation requests.
//!
//! Checks run in a fixed order (prompt, user id, mode, model, style, shape,
//! files, then the model/mode/image-count combination) so the first problem
//! reported is stable. Nothing here touches the network.

use crate::config::LimitsConfig;
use crate::models::{
    AudioGeneration, AvatarGeneration, ImageBounds, ImageGeneration, ImageModel, Mode, Shape,
    Style, UnknownVariant, UploadedFile, VideoGeneration, VideoModel,
};
use service_core::error::AppError;
use std::str::FromStr;

pub const IMAGE_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];
pub const AUDIO_CONTENT_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/ogg",
    "audio/m4a",
];

const MAX_USER_ID_LEN: usize = 128;

/// Image form fields as received.
#[derive(Debug, Default)]
pub struct ImageForm {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub mode: Option<String>,
    pub style: Option<String>,
    pub shape: Option<String>,
    pub user_id: Option<String>,
    pub images: Vec<UploadedFile>,
}

#[derive(Debug, Default)]
pub struct VideoForm {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub mode: Option<String>,
    pub shape: Option<String>,
    pub user_id: Option<String>,
    pub image: Option<UploadedFile>,
}

#[derive(Debug, Default)]
pub struct AvatarForm {
    pub image: Option<UploadedFile>,
    pub audio: Option<UploadedFile>,
    pub user_id: Option<String>,
}

fn invalid(err: UnknownVariant) -> AppError {
    AppError::InvalidInput(err.to_string())
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("{} is required", field)))
}

fn parse_or<T>(value: &Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr<Err = UnknownVariant>,
{
    match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.parse().map_err(invalid),
        None => Ok(default),
    }
}

pub fn validate_prompt(prompt: &Option<String>) -> Result<String, AppError> {
    required(prompt, "prompt").map(str::to_string)
}

/// User ids become a path segment of every object key, so only a safe
/// character set is accepted.
pub fn validate_user_id(user_id: Option<&str>) -> Result<String, AppError> {
    let user_id = user_id
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidInput("user_id is required".to_string()))?;

    let well_formed = user_id.len() <= MAX_USER_ID_LEN
        && user_id != "."
        && user_id != ".."
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-'));

    if !well_formed {
        return Err(AppError::InvalidInput(format!(
            "user_id must be 1-{} characters of letters, digits, '.', '_', '@' or '-'",
            MAX_USER_ID_LEN
        )));
    }
    Ok(user_id.to_string())
}

fn check_file(
    file: &UploadedFile,
    field: &str,
    allowed: &[&str],
    limits: &LimitsConfig,
) -> Result<(), AppError> {
    let content_type = file.content_type.to_ascii_lowercase();
    if !allowed.contains(&content_type.as_str()) {
        return Err(AppError::InvalidInput(format!(
            "{} has unsupported content type '{}', expected one of: {}",
            field,
            file.content_type,
            allowed.join(", ")
        )));
    }
    if file.data.len() > limits.max_file_bytes() {
        return Err(AppError::InvalidInput(format!(
            "{} exceeds the {} MB limit",
            field, limits.max_file_size_mb
        )));
    }
    Ok(())
}

fn check_bounds(
    model: &str,
    mode: Mode,
    bounds: Option<ImageBounds>,
    count: usize,
) -> Result<(), AppError> {
    let bounds = bounds.ok_or_else(|| {
        AppError::UnsupportedCombination(format!("model '{}' does not support {} mode", model, mode))
    })?;
    if !bounds.contains(count) {
        return Err(AppError::UnsupportedCombination(format!(
            "model '{}' in {} mode requires {}, got {}",
            model, mode, bounds, count
        )));
    }
    Ok(())
}

pub fn validate_image(form: ImageForm, limits: &LimitsConfig) -> Result<ImageGeneration, AppError> {
    let prompt = validate_prompt(&form.prompt)?;
    let user_id = validate_user_id(form.user_id.as_deref())?;
    let mode: Mode = required(&form.mode, "mode")?.parse().map_err(invalid)?;
    let model: ImageModel = required(&form.model, "model")?.parse().map_err(invalid)?;
    let style = parse_or(&form.style, Style::default())?;
    let shape = parse_or(&form.shape, Shape::Square)?;

    for file in &form.images {
        check_file(file, "image_files", IMAGE_CONTENT_TYPES, limits)?;
    }
    check_bounds(
        model.as_str(),
        mode,
        model.reference_images(mode),
        form.images.len(),
    )?;

    Ok(ImageGeneration {
        prompt,
        model,
        mode,
        style,
        shape,
        images: form.images,
        user_id,
    })
}

pub fn validate_video(form: VideoForm, limits: &LimitsConfig) -> Result<VideoGeneration, AppError> {
    let prompt = validate_prompt(&form.prompt)?;
    let user_id = validate_user_id(form.user_id.as_deref())?;
    let mode: Mode = required(&form.mode, "mode")?.parse().map_err(invalid)?;
    let model: VideoModel = required(&form.model, "model")?.parse().map_err(invalid)?;
    let shape = parse_or(&form.shape, Shape::Landscape)?;

    if let Some(file) = &form.image {
        check_file(file, "image_file", IMAGE_CONTENT_TYPES, limits)?;
    }
    check_bounds(
        model.as_str(),
        mode,
        model.reference_images(mode),
        usize::from(form.image.is_some()),
    )?;

    Ok(VideoGeneration {
        prompt,
        model,
        mode,
        shape,
        image: form.image,
        user_id,
    })
}

pub fn validate_audio(
    verse_prompt: &str,
    lyrics_prompt: Option<&str>,
    user_id: Option<&str>,
) -> Result<AudioGeneration, AppError> {
    let verse_prompt = verse_prompt.trim();
    if verse_prompt.is_empty() {
        return Err(AppError::InvalidInput("verse_prompt is required".to_string()));
    }
    let user_id = validate_user_id(user_id)?;

    Ok(AudioGeneration {
        verse_prompt: verse_prompt.to_string(),
        lyrics_prompt: lyrics_prompt
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string),
        user_id,
    })
}

pub fn validate_avatar(form: AvatarForm, limits: &LimitsConfig) -> Result<AvatarGeneration, AppError> {
    let user_id = validate_user_id(form.user_id.as_deref())?;
    let image = form
        .image
        .ok_or_else(|| AppError::InvalidInput("image_file is required".to_string()))?;
    let audio = form
        .audio
        .ok_or_else(|| AppError::InvalidInput("audio_file is required".to_string()))?;

    check_file(&image, "image_file", IMAGE_CONTENT_TYPES, limits)?;
    check_file(&audio, "audio_file", AUDIO_CONTENT_TYPES, limits)?;

    Ok(AvatarGeneration {
        image,
        audio,
        user_id,
    })
}
