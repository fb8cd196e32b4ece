pub mod content_policy;
pub mod dispatcher;
pub mod gcs_auth;
pub mod generation;
pub mod imaging;
pub mod metrics;
pub mod prompt_enhancer;
pub mod providers;
pub mod storage;
pub mod uploader;
pub mod validation;

pub use generation::GenerationService;
pub use self::metrics::{get_metrics, init_metrics};
pub use storage::{GcsStorage, LocalStorage, Storage};
pub use uploader::MediaUploader;
