use super::catalog::{ImageModel, Mode, Shape, Style, VideoModel};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// A file received in a multipart request, already size and type checked.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub data: Vec<u8>,
    pub content_type: String,
    pub filename: Option<String>,
}

impl UploadedFile {
    pub fn base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// Inline `data:` URL, accepted wherever FAL expects a file URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, self.base64())
    }
}

#[derive(Debug, Clone)]
pub struct ImageGeneration {
    pub prompt: String,
    pub model: ImageModel,
    pub mode: Mode,
    pub style: Style,
    pub shape: Shape,
    pub images: Vec<UploadedFile>,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct VideoGeneration {
    pub prompt: String,
    pub model: VideoModel,
    pub mode: Mode,
    pub shape: Shape,
    pub image: Option<UploadedFile>,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct AudioGeneration {
    pub verse_prompt: String,
    pub lyrics_prompt: Option<String>,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct AvatarGeneration {
    pub image: UploadedFile,
    pub audio: UploadedFile,
    pub user_id: String,
}
