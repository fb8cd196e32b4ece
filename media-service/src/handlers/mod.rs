pub mod audio;
pub mod avatar;
pub mod health;
pub mod image;
pub mod multipart;
pub mod prompt;
pub mod user_data;
pub mod video;

pub use audio::generate_audio;
pub use avatar::create_avatar;
pub use health::{health_check, metrics_endpoint, readiness_check, root};
pub use image::{generate_image, image_models};
pub use prompt::enhance_prompt;
pub use user_data::{delete_file, delete_user_data};
pub use video::{generate_video, video_models};
