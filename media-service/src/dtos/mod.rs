pub mod catalog;
pub mod generation;
pub mod user_data;

pub use catalog::{ModeSupport, ModelCatalog, ModelInfo};
pub use generation::{
    AudioGenerateRequest, AudioGenerateResponse, EnhancePromptRequest, EnhancePromptResponse,
    ImageGenerateResponse, ShapeStyleQuery, VideoGenerateResponse,
};
pub use user_data::{DeleteFileQuery, DeleteUserDataResponse, MessageResponse};
