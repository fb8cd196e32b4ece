pub mod catalog;
pub mod media;
pub mod request;

pub use catalog::{
    ImageBounds, ImageModel, Mode, PromptKind, Provider, Shape, Style, UnknownVariant, VideoModel,
};
pub use media::{GeneratedMedia, MediaKind, MediaRecord, StorageLocation};
pub use request::{
    AudioGeneration, AvatarGeneration, ImageGeneration, UploadedFile, VideoGeneration,
};
