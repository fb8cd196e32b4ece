//! Reference image preprocessing.
//!
//! Providers reject images above 4000px on either side, and the avatar model
//! also rejects faces below 512px. Failures here are never fatal: the
//! original bytes are forwarded and the provider gets the final say.

use crate::models::UploadedFile;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

pub const MAX_DIMENSION: u32 = 4000;
pub const AVATAR_MIN_DIMENSION: u32 = 512;
const JPEG_QUALITY: u8 = 95;

/// Scales `(width, height)` down so neither side exceeds `max`.
fn fit(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let (w, h, m) = (u64::from(width), u64::from(height), u64::from(max));
    if width > height {
        (max, ((h * m) / w).max(1) as u32)
    } else {
        (((w * m) / h).max(1) as u32, max)
    }
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    encoder.encode_image(&DynamicImage::ImageRgb8(image.to_rgb8()))?;
    Ok(bytes)
}

fn encode_like(
    image: &DynamicImage,
    format: ImageFormat,
) -> Result<(Vec<u8>, &'static str), image::ImageError> {
    if format == ImageFormat::Png {
        let mut cursor = Cursor::new(Vec::new());
        image.write_to(&mut cursor, ImageFormat::Png)?;
        return Ok((cursor.into_inner(), "image/png"));
    }
    Ok((encode_jpeg(image)?, "image/jpeg"))
}

fn downscale(data: &[u8], max: u32) -> Result<Option<(Vec<u8>, &'static str)>, image::ImageError> {
    let format = image::guess_format(data)?;
    let decoded = image::load_from_memory_with_format(data, format)?;
    let (width, height) = fit(decoded.width(), decoded.height(), max);
    if (width, height) == (decoded.width(), decoded.height()) {
        return Ok(None);
    }

    tracing::info!(
        from_width = decoded.width(),
        from_height = decoded.height(),
        width,
        height,
        "Downscaling reference image"
    );
    let image = decoded.resize_exact(width, height, FilterType::Lanczos3);
    encode_like(&image, format).map(Some)
}

/// Downscales `file` to fit within `max` pixels, keeping its aspect ratio.
/// PNG input stays PNG, anything else is re-encoded as JPEG.
pub fn fit_within(file: UploadedFile, max: u32) -> UploadedFile {
    match downscale(&file.data, max) {
        Ok(Some((data, content_type))) => UploadedFile {
            data,
            content_type: content_type.to_string(),
            filename: file.filename,
        },
        Ok(None) => file,
        Err(e) => {
            tracing::warn!(error = %e, "Could not resize reference image, sending original");
            file
        }
    }
}

fn clamp(data: &[u8], min: u32, max: u32) -> Result<Option<Vec<u8>>, image::ImageError> {
    let decoded = image::load_from_memory(data)?;
    let (fitted_w, fitted_h) = fit(decoded.width(), decoded.height(), max);
    let (width, height) = (fitted_w.max(min), fitted_h.max(min));
    if (width, height) == (decoded.width(), decoded.height()) {
        return Ok(None);
    }

    tracing::info!(width, height, "Resizing avatar image");
    let image = decoded.resize_exact(width, height, FilterType::Lanczos3);
    encode_jpeg(&image).map(Some)
}

/// Clamps an avatar face into `[min, max]` on both sides and re-encodes it as
/// JPEG. Images already in range are returned untouched.
pub fn clamp_avatar(file: UploadedFile, min: u32, max: u32) -> UploadedFile {
    match clamp(&file.data, min, max) {
        Ok(Some(data)) => UploadedFile {
            data,
            content_type: "image/jpeg".to_string(),
            filename: file.filename,
        },
        Ok(None) => file,
        Err(e) => {
            tracing::warn!(error = %e, "Could not resize avatar image, sending original");
            file
        }
    }
}
