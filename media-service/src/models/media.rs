use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Image, MediaKind::Video, MediaKind::Audio];

    /// Top-level folder of the object key.
    pub fn folder(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }

    pub fn default_content_type(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/png",
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/mpeg",
        }
    }

    pub fn accepts(&self, content_type: &str) -> bool {
        content_type
            .split_once('/')
            .is_some_and(|(top, _)| top == self.folder())
    }
}

/// Output of a provider before it is republished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedMedia {
    /// Hosted by the provider; must be downloaded.
    Remote { url: String },
    Inline { data: Vec<u8>, content_type: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    Primary,
    Fallback,
}

/// Where a generated artifact ended up.
#[derive(Debug, Clone, Serialize)]
pub struct MediaRecord {
    pub url: String,
    pub key: String,
    pub content_type: String,
    pub size: usize,
    pub location: StorageLocation,
}
