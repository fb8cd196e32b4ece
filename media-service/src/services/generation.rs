//! The generation pipeline shared by every media endpoint:
//! screen the prompt, preprocess reference images, dispatch, generate,
//! republish.

use crate::models::{
    AudioGeneration, AvatarGeneration, ImageGeneration, MediaKind, MediaRecord, Shape,
    UploadedFile, VideoGeneration,
};
use crate::services::dispatcher::{self, Dispatch};
use crate::services::imaging::{self, AVATAR_MIN_DIMENSION, MAX_DIMENSION};
use crate::services::providers::{ChatProvider, MediaGenerator};
use crate::services::uploader::{MediaUploader, Naming};
use crate::services::content_policy;
use service_core::error::AppError;
use std::sync::Arc;

pub struct GenerationService {
    generator: Arc<dyn MediaGenerator>,
    chat: Arc<dyn ChatProvider>,
    uploader: Arc<MediaUploader>,
    content_policy_enabled: bool,
}

async fn preprocess<F>(files: Vec<UploadedFile>, op: F) -> Result<Vec<UploadedFile>, AppError>
where
    F: Fn(UploadedFile) -> UploadedFile + Send + 'static,
{
    if files.is_empty() {
        return Ok(files);
    }
    tokio::task::spawn_blocking(move || files.into_iter().map(op).collect::<Vec<_>>())
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Image preprocessing failed: {}", e)))
}

impl GenerationService {
    pub fn new(
        generator: Arc<dyn MediaGenerator>,
        chat: Arc<dyn ChatProvider>,
        uploader: Arc<MediaUploader>,
        content_policy_enabled: bool,
    ) -> Self {
        Self {
            generator,
            chat,
            uploader,
            content_policy_enabled,
        }
    }

    async fn screen(&self, prompt: &str) -> Result<(), AppError> {
        if self.content_policy_enabled {
            content_policy::check(self.chat.as_ref(), prompt).await?;
        }
        Ok(())
    }

    async fn generate_and_store(
        &self,
        dispatch: Dispatch,
        naming: &Naming<'_>,
    ) -> Result<MediaRecord, AppError> {
        let media = self.generator.generate(dispatch.payload).await?;
        self.uploader.store(media, naming).await
    }

    async fn run(
        &self,
        dispatch: Dispatch,
        model: &str,
        naming: Naming<'_>,
    ) -> Result<MediaRecord, AppError> {
        let kind = naming.kind.folder();
        let result = self.generate_and_store(dispatch, &naming).await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!(
            "media_generation_total",
            "kind" => kind,
            "model" => model.to_string(),
            "outcome" => outcome
        )
        .increment(1);

        match &result {
            Ok(record) => tracing::info!(
                kind,
                model,
                key = %record.key,
                location = ?record.location,
                "Media generated"
            ),
            Err(e) => tracing::error!(kind, model, error = %e, "Media generation failed"),
        }
        result
    }

    pub async fn image(&self, mut request: ImageGeneration) -> Result<MediaRecord, AppError> {
        self.screen(&request.prompt).await?;
        request.images = preprocess(std::mem::take(&mut request.images), |file| {
            imaging::fit_within(file, MAX_DIMENSION)
        })
        .await?;

        let dispatch = dispatcher::dispatch_image(&request);
        let naming = Naming {
            kind: MediaKind::Image,
            user_id: &request.user_id,
            prefix: dispatch.file_prefix,
            style: Some(request.style),
            shape: Some(request.shape),
            prompt: &request.prompt,
        };
        self.run(dispatch, request.model.as_str(), naming).await
    }

    pub async fn video(&self, mut request: VideoGeneration) -> Result<MediaRecord, AppError> {
        self.screen(&request.prompt).await?;
        if let Some(image) = request.image.take() {
            let mut resized =
                preprocess(vec![image], |file| imaging::fit_within(file, MAX_DIMENSION)).await?;
            request.image = resized.pop();
        }

        let dispatch = dispatcher::dispatch_video(&request);
        let naming = Naming {
            kind: MediaKind::Video,
            user_id: &request.user_id,
            prefix: dispatch.file_prefix,
            style: None,
            shape: Some(request.shape),
            prompt: &request.prompt,
        };
        self.run(dispatch, request.model.as_str(), naming).await
    }

    pub async fn audio(&self, request: AudioGeneration) -> Result<MediaRecord, AppError> {
        self.screen(&request.verse_prompt).await?;
        if let Some(lyrics) = &request.lyrics_prompt {
            self.screen(lyrics).await?;
        }

        let dispatch = dispatcher::dispatch_audio(&request);
        let naming = Naming {
            kind: MediaKind::Audio,
            user_id: &request.user_id,
            prefix: dispatch.file_prefix,
            style: None,
            shape: None,
            prompt: &request.verse_prompt,
        };
        self.run(dispatch, dispatcher::MUSIC_ENDPOINT, naming).await
    }

    pub async fn avatar(&self, request: AvatarGeneration) -> Result<MediaRecord, AppError> {
        let AvatarGeneration {
            image,
            audio,
            user_id,
        } = request;
        let image = preprocess(vec![image], |file| {
            imaging::clamp_avatar(file, AVATAR_MIN_DIMENSION, MAX_DIMENSION)
        })
        .await?
        .pop()
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Avatar image lost in preprocessing")))?;
        let request = AvatarGeneration {
            image,
            audio,
            user_id,
        };

        let dispatch = dispatcher::dispatch_avatar(&request);
        let naming = Naming {
            kind: MediaKind::Video,
            user_id: &request.user_id,
            prefix: dispatch.file_prefix,
            style: None,
            shape: Some(Shape::Landscape),
            prompt: "",
        };
        self.run(dispatch, dispatcher::AVATAR_ENDPOINT, naming).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeneratedMedia, ImageModel, Mode, Style, StorageLocation};
    use crate::services::providers::mock::{MockChat, MockGenerator};
    use crate::services::providers::ProviderPayload;
    use crate::services::storage::LocalStorage;
    use tempfile::TempDir;

    async fn service(
        generator: Arc<MockGenerator>,
        chat: Arc<MockChat>,
        policy: bool,
    ) -> (TempDir, GenerationService) {
        let dir = TempDir::new().unwrap();
        let fallback = LocalStorage::new(dir.path(), "http://localhost:8080").await.unwrap();
        let uploader = Arc::new(MediaUploader::new(None, fallback, reqwest::Client::new()));
        (dir, GenerationService::new(generator, chat, uploader, policy))
    }

    fn request() -> ImageGeneration {
        ImageGeneration {
            prompt: "a red fox".to_string(),
            model: ImageModel::Gemini,
            mode: Mode::Generate,
            style: Style::Anime,
            shape: Shape::Portrait,
            images: Vec::new(),
            user_id: "user-1".to_string(),
        }
    }

    fn inline_jpeg() -> GeneratedMedia {
        GeneratedMedia::Inline {
            data: vec![0xff, 0xd8, 0xff],
            content_type: "image/jpeg".to_string(),
        }
    }

    #[tokio::test]
    async fn image_is_generated_and_stored_locally() {
        let generator = Arc::new(MockGenerator::returning(inline_jpeg()));
        let (_dir, service) =
            service(generator.clone(), Arc::new(MockChat::replying("false")), false).await;

        let record = service.image(request()).await.unwrap();

        assert_eq!(record.location, StorageLocation::Fallback);
        assert!(record.key.starts_with("image/user-1/gemini_"));
        assert!(record.key.contains("_Anime_portrait_a_red_fox_"));
        assert!(record.key.ends_with(".jpg"));
        assert!(matches!(
            generator.last_payload(),
            Some(ProviderPayload::Imagen { .. })
        ));
    }

    #[tokio::test]
    async fn policy_rejection_stops_before_dispatch() {
        let generator = Arc::new(MockGenerator::returning(inline_jpeg()));
        let chat = Arc::new(MockChat::replying("true"));
        let (_dir, service) = service(generator.clone(), chat.clone(), true).await;

        let err = service.image(request()).await.unwrap_err();

        assert!(matches!(err, AppError::ContentPolicy(_)));
        assert_eq!(generator.calls(), 0);
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn policy_is_skipped_when_disabled() {
        let generator = Arc::new(MockGenerator::returning(inline_jpeg()));
        let chat = Arc::new(MockChat::replying("true"));
        let (_dir, service) = service(generator, chat.clone(), false).await;

        service.image(request()).await.unwrap();
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_sanitized_upstream_error() {
        let generator = Arc::new(MockGenerator::failing_with(500));
        let (_dir, service) =
            service(generator, Arc::new(MockChat::unavailable()), false).await;

        let err = service.image(request()).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
        assert_eq!(err.status_code().as_u16(), 500);
    }

    #[tokio::test]
    async fn audio_is_stored_under_audio_folder() {
        let generator = Arc::new(MockGenerator::returning(GeneratedMedia::Inline {
            data: vec![1, 2],
            content_type: "audio/mpeg".to_string(),
        }));
        let (_dir, service) =
            service(generator, Arc::new(MockChat::unavailable()), false).await;

        let record = service
            .audio(AudioGeneration {
                verse_prompt: "[verse] sea shanty".to_string(),
                lyrics_prompt: None,
                user_id: "sailor".to_string(),
            })
            .await
            .unwrap();

        assert!(record.key.starts_with("audio/sailor/minimax_"));
        assert!(record.key.ends_with(".mp3"));
    }
}
