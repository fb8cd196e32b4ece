//! The closed vocabulary accepted by the generation endpoints.
//!
//! Every model is an enum variant carrying its descriptor (wire name,
//! provider, per-mode reference-image bounds), so adding a model without
//! describing it fails to compile.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {field} '{value}', expected one of: {expected}")]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
    pub expected: String,
}

macro_rules! vocabulary {
    ($name:ident, $field:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownVariant {
                        field: $field,
                        value: s.to_string(),
                        expected: $name::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Generate,
    Edit,
}

vocabulary!(Mode, "mode", { Generate => "generate", Edit => "edit" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Style {
    #[default]
    Photo,
    Illustration,
    Comic,
    Anime,
    Abstract,
    Fantasy,
    PopArt,
}

vocabulary!(Style, "style", {
    Photo => "Photo",
    Illustration => "Illustration",
    Comic => "Comic",
    Anime => "Anime",
    Abstract => "Abstract",
    Fantasy => "Fantasy",
    PopArt => "PopArt",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Square,
    Portrait,
    Landscape,
}

vocabulary!(Shape, "shape", {
    Square => "square",
    Portrait => "portrait",
    Landscape => "landscape",
});

/// Upstream vendor that serves a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Gemini,
    Fal,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Fal => "fal",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range of reference images a model accepts in one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageBounds {
    pub min: usize,
    pub max: usize,
}

impl ImageBounds {
    pub const NONE: ImageBounds = ImageBounds { min: 0, max: 0 };
    pub const EXACTLY_ONE: ImageBounds = ImageBounds { min: 1, max: 1 };
    pub const UP_TO_FOUR: ImageBounds = ImageBounds { min: 1, max: 4 };

    pub fn contains(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

impl fmt::Display for ImageBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (0, 0) => f.write_str("no reference images"),
            (min, max) if min == max => write!(f, "exactly {} reference image(s)", min),
            (min, max) => write!(f, "between {} and {} reference images", min, max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageModel {
    Dalle,
    Flux1Spro,
    Gemini,
    FluxKontextDev,
    Qwen,
    GeminiNanobanana,
    Seedream,
    FluxKontextEdit,
}

vocabulary!(ImageModel, "model", {
    Dalle => "dalle",
    Flux1Spro => "flux_1_spro",
    Gemini => "gemini",
    FluxKontextDev => "flux_kontext_dev",
    Qwen => "qwen",
    GeminiNanobanana => "gemini_nanobanana",
    Seedream => "seedream",
    FluxKontextEdit => "flux_kontext_edit",
});

impl ImageModel {
    pub fn provider(&self) -> Provider {
        match self {
            ImageModel::Dalle => Provider::OpenAi,
            ImageModel::Gemini | ImageModel::GeminiNanobanana => Provider::Gemini,
            ImageModel::Flux1Spro
            | ImageModel::FluxKontextDev
            | ImageModel::Qwen
            | ImageModel::Seedream
            | ImageModel::FluxKontextEdit => Provider::Fal,
        }
    }

    /// Reference-image bounds in `mode`, or `None` when the model is not
    /// offered in that mode.
    pub fn reference_images(&self, mode: Mode) -> Option<ImageBounds> {
        match (self, mode) {
            (ImageModel::FluxKontextEdit, Mode::Generate) => None,
            (ImageModel::FluxKontextEdit, Mode::Edit) => Some(ImageBounds::EXACTLY_ONE),
            (ImageModel::GeminiNanobanana | ImageModel::Seedream, Mode::Edit) => {
                Some(ImageBounds::UP_TO_FOUR)
            }
            (
                ImageModel::Dalle
                | ImageModel::Flux1Spro
                | ImageModel::Gemini
                | ImageModel::FluxKontextDev
                | ImageModel::Qwen,
                Mode::Edit,
            ) => None,
            (_, Mode::Generate) => Some(ImageBounds::NONE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoModel {
    Veo2,
    Veo3Fast,
    Pixverse,
    Kling,
    PixverseImageToVideo,
    KlingImageToVideo,
    Wan22,
}

vocabulary!(VideoModel, "model", {
    Veo2 => "veo-2",
    Veo3Fast => "veo-3-fast",
    Pixverse => "pixverse",
    Kling => "kling",
    PixverseImageToVideo => "pixverse-image-to-video",
    KlingImageToVideo => "kling-image-to-video",
    Wan22 => "wan-2.2",
});

impl VideoModel {
    pub fn provider(&self) -> Provider {
        match self {
            VideoModel::Veo2 | VideoModel::Veo3Fast => Provider::Gemini,
            VideoModel::Pixverse
            | VideoModel::Kling
            | VideoModel::PixverseImageToVideo
            | VideoModel::KlingImageToVideo
            | VideoModel::Wan22 => Provider::Fal,
        }
    }

    pub fn reference_images(&self, mode: Mode) -> Option<ImageBounds> {
        let image_to_video = matches!(
            self,
            VideoModel::PixverseImageToVideo | VideoModel::KlingImageToVideo | VideoModel::Wan22
        );
        match (image_to_video, mode) {
            (false, Mode::Generate) => Some(ImageBounds::NONE),
            (true, Mode::Edit) => Some(ImageBounds::EXACTLY_ONE),
            _ => None,
        }
    }
}

/// Prompt-enhancement flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Image,
    Video,
    Audio,
}

vocabulary!(PromptKind, "type", { Image => "image", Video => "video", Audio => "audio" });
