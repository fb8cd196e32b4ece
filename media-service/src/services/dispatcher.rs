//! Pure mapping from a validated request to the upstream request shape.
//!
//! Nothing here performs I/O. Each arm of the `match` owns one model's
//! prompt styling, shape vocabulary and generation parameters.

use crate::models::{
    AudioGeneration, AvatarGeneration, ImageGeneration, ImageModel, MediaKind, Shape, Style,
    UploadedFile, VideoGeneration, VideoModel,
};
use crate::services::providers::fal::{
    AvatarArguments, FalArguments, ImageArguments, MusicArguments, VideoArguments,
};
use crate::services::providers::gemini::{
    Content, ContentPart, EncodedImage, GenerateContentRequest, GenerationConfig, InlineData,
    OutputOptions, PredictInstance, PredictParameters, PredictRequest,
};
use crate::services::providers::openai::ImageGenerationRequest;
use crate::services::providers::ProviderPayload;

pub const DALLE_MODEL: &str = "dall-e-3";
pub const IMAGEN_MODEL: &str = "imagen-4.0-generate-001";
pub const FLASH_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const VEO_2_MODEL: &str = "veo-2.0-generate-001";
pub const VEO_3_FAST_MODEL: &str = "veo-3.0-fast-generate-001";
pub const MUSIC_ENDPOINT: &str = "fal-ai/minimax-music/v1.5";
pub const AVATAR_ENDPOINT: &str = "fal-ai/bytedance/omnihuman";

/// A payload plus the prefix its stored file is named with.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub payload: ProviderPayload,
    pub file_prefix: &'static str,
}

impl Dispatch {
    fn new(payload: ProviderPayload, file_prefix: &'static str) -> Self {
        Self {
            payload,
            file_prefix,
        }
    }
}

/// `"{prompt}, in {style} style"`, used by OpenAI and Gemini.
fn descriptive_prompt(prompt: &str, style: Style) -> String {
    format!("{}, in {} style", prompt, style.as_str().to_lowercase())
}

/// `"{Style} style: {prompt}"`, used by FAL image models.
fn tagged_prompt(prompt: &str, style: Style) -> String {
    format!("{} style: {}", style.as_str(), prompt)
}

fn dalle_size(shape: Shape) -> &'static str {
    match shape {
        Shape::Square => "1024x1024",
        Shape::Portrait => "1024x1792",
        Shape::Landscape => "1792x1024",
    }
}

fn fal_image_size(shape: Shape) -> &'static str {
    match shape {
        Shape::Square => "square_hd",
        Shape::Portrait => "portrait_4_3",
        Shape::Landscape => "landscape_4_3",
    }
}

fn aspect_ratio(shape: Shape) -> &'static str {
    match shape {
        Shape::Square => "1:1",
        Shape::Portrait => "9:16",
        Shape::Landscape => "16:9",
    }
}

/// Veo renders only 16:9 and 9:16.
fn veo_aspect_ratio(shape: Shape) -> &'static str {
    match shape {
        Shape::Portrait => "9:16",
        Shape::Square | Shape::Landscape => "16:9",
    }
}

fn flux_arguments(
    req: &ImageGeneration,
    steps: u32,
    guidance: f32,
    image_url: Option<String>,
) -> FalArguments {
    FalArguments::Image(ImageArguments {
        prompt: tagged_prompt(&req.prompt, req.style),
        image_size: Some(fal_image_size(req.shape).to_string()),
        aspect_ratio: None,
        num_inference_steps: steps,
        guidance_scale: guidance,
        num_images: 1,
        enable_safety_checker: Some(true),
        image_url,
        image_urls: None,
    })
}

fn fal_image(endpoint: &'static str, arguments: FalArguments) -> ProviderPayload {
    ProviderPayload::FalQueue {
        endpoint,
        arguments,
        output: MediaKind::Image,
    }
}

fn inline_part(file: &UploadedFile) -> ContentPart {
    ContentPart::InlineData {
        inline_data: InlineData {
            mime_type: file.content_type.clone(),
            data: file.base64(),
        },
    }
}

pub fn dispatch_image(req: &ImageGeneration) -> Dispatch {
    match req.model {
        ImageModel::Dalle => Dispatch::new(
            ProviderPayload::OpenAiImage(ImageGenerationRequest {
                model: DALLE_MODEL.to_string(),
                prompt: descriptive_prompt(&req.prompt, req.style),
                size: dalle_size(req.shape).to_string(),
                quality: "standard".to_string(),
                n: 1,
            }),
            "dalle",
        ),
        ImageModel::Flux1Spro => Dispatch::new(
            fal_image("fal-ai/flux-1/srpo", flux_arguments(req, 28, 3.5, None)),
            "flux1_srpo",
        ),
        ImageModel::FluxKontextDev => Dispatch::new(
            fal_image(
                "fal-ai/flux-pro/kontext/max/text-to-image",
                flux_arguments(req, 28, 3.5, None),
            ),
            "flux_kontext",
        ),
        ImageModel::Qwen => Dispatch::new(
            fal_image("fal-ai/qwen-image", flux_arguments(req, 30, 4.0, None)),
            "qwen",
        ),
        ImageModel::FluxKontextEdit => Dispatch::new(
            fal_image(
                "fal-ai/flux-pro/kontext/max",
                flux_arguments(req, 28, 3.5, req.images.first().map(UploadedFile::data_url)),
            ),
            "flux_edit",
        ),
        ImageModel::Gemini => Dispatch::new(
            ProviderPayload::Imagen {
                model: IMAGEN_MODEL,
                request: PredictRequest {
                    instances: vec![PredictInstance {
                        prompt: descriptive_prompt(&req.prompt, req.style),
                        image: None,
                    }],
                    parameters: PredictParameters {
                        aspect_ratio: aspect_ratio(req.shape).to_string(),
                        sample_count: Some(1),
                        image_size: Some("1K".to_string()),
                        output_options: Some(OutputOptions {
                            mime_type: "image/jpeg".to_string(),
                        }),
                    },
                },
            },
            "gemini",
        ),
        ImageModel::GeminiNanobanana => {
            let mut prompt = descriptive_prompt(&req.prompt, req.style);
            match req.images.len() {
                0 => {}
                1 => prompt.push_str(". Use the provided 1 reference image as visual reference."),
                n => prompt.push_str(&format!(
                    ". Use the provided {} reference images as visual reference.",
                    n
                )),
            }

            let mut parts = vec![ContentPart::Text { text: prompt }];
            parts.extend(req.images.iter().map(inline_part));

            Dispatch::new(
                ProviderPayload::GeminiImageStream {
                    model: FLASH_IMAGE_MODEL,
                    request: GenerateContentRequest {
                        contents: vec![Content {
                            role: Some("user".to_string()),
                            parts,
                        }],
                        generation_config: Some(GenerationConfig {
                            response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
                        }),
                    },
                },
                "nanobanana",
            )
        }
        ImageModel::Seedream => {
            let image_urls: Vec<String> = req.images.iter().map(UploadedFile::data_url).collect();
            let editing = !image_urls.is_empty();

            let arguments = FalArguments::Image(ImageArguments {
                prompt: tagged_prompt(&req.prompt, req.style),
                image_size: None,
                aspect_ratio: Some(req.shape.as_str().to_string()),
                num_inference_steps: 50,
                guidance_scale: 7.5,
                num_images: 1,
                enable_safety_checker: None,
                image_url: None,
                image_urls: editing.then_some(image_urls),
            });

            if editing {
                Dispatch::new(
                    fal_image("fal-ai/bytedance/seedream/v4/edit", arguments),
                    "seedream_edit",
                )
            } else {
                Dispatch::new(
                    fal_image("fal-ai/bytedance/seedream/v4/text-to-image", arguments),
                    "seedream_gen",
                )
            }
        }
    }
}

fn fal_video(endpoint: &'static str, arguments: VideoArguments) -> ProviderPayload {
    ProviderPayload::FalQueue {
        endpoint,
        arguments: FalArguments::Video(arguments),
        output: MediaKind::Video,
    }
}

fn veo(model: &'static str, req: &VideoGeneration) -> ProviderPayload {
    ProviderPayload::Veo {
        model,
        request: PredictRequest {
            instances: vec![PredictInstance {
                prompt: req.prompt.clone(),
                image: req.image.as_ref().map(|file| EncodedImage {
                    bytes_base64_encoded: file.base64(),
                    mime_type: file.content_type.clone(),
                }),
            }],
            parameters: PredictParameters {
                aspect_ratio: veo_aspect_ratio(req.shape).to_string(),
                sample_count: None,
                image_size: None,
                output_options: None,
            },
        },
    }
}

pub fn dispatch_video(req: &VideoGeneration) -> Dispatch {
    let image_url = req.image.as_ref().map(UploadedFile::data_url);

    match req.model {
        VideoModel::Veo2 => Dispatch::new(veo(VEO_2_MODEL, req), "veo2"),
        VideoModel::Veo3Fast => Dispatch::new(veo(VEO_3_FAST_MODEL, req), "veo3_fast"),
        VideoModel::Pixverse => Dispatch::new(
            fal_video(
                "fal-ai/pixverse/v4.5/text-to-video",
                VideoArguments {
                    prompt: req.prompt.clone(),
                    aspect_ratio: Some(aspect_ratio(req.shape).to_string()),
                    resolution: Some("720p".to_string()),
                    duration: Some("5".to_string()),
                    image_url: None,
                },
            ),
            "pixverse",
        ),
        VideoModel::Kling => Dispatch::new(
            fal_video(
                "fal-ai/kling-video/v2.1/master/text-to-video",
                VideoArguments {
                    prompt: req.prompt.clone(),
                    aspect_ratio: Some(aspect_ratio(req.shape).to_string()),
                    resolution: None,
                    duration: Some("5".to_string()),
                    image_url: None,
                },
            ),
            "kling",
        ),
        VideoModel::PixverseImageToVideo => Dispatch::new(
            fal_video(
                "fal-ai/pixverse/v4.5/image-to-video",
                VideoArguments {
                    prompt: req.prompt.clone(),
                    aspect_ratio: None,
                    resolution: Some("720p".to_string()),
                    duration: Some("5".to_string()),
                    image_url,
                },
            ),
            "pixverse_i2v",
        ),
        VideoModel::KlingImageToVideo => Dispatch::new(
            fal_video(
                "fal-ai/kling-video/v2.1/master/image-to-video",
                VideoArguments {
                    prompt: req.prompt.clone(),
                    aspect_ratio: None,
                    resolution: None,
                    duration: Some("5".to_string()),
                    image_url,
                },
            ),
            "kling_i2v",
        ),
        VideoModel::Wan22 => Dispatch::new(
            fal_video(
                "fal-ai/wan/v2.2-a14b/image-to-video",
                VideoArguments {
                    prompt: req.prompt.clone(),
                    aspect_ratio: None,
                    resolution: Some("720p".to_string()),
                    duration: None,
                    image_url,
                },
            ),
            "wan22",
        ),
    }
}

pub fn dispatch_audio(req: &AudioGeneration) -> Dispatch {
    Dispatch::new(
        ProviderPayload::FalQueue {
            endpoint: MUSIC_ENDPOINT,
            arguments: FalArguments::Music(MusicArguments {
                prompt: req.verse_prompt.clone(),
                lyrics_prompt: req.lyrics_prompt.clone(),
            }),
            output: MediaKind::Audio,
        },
        "minimax",
    )
}

pub fn dispatch_avatar(req: &AvatarGeneration) -> Dispatch {
    Dispatch::new(
        ProviderPayload::FalQueue {
            endpoint: AVATAR_ENDPOINT,
            arguments: FalArguments::Avatar(AvatarArguments {
                image_url: req.image.data_url(),
                audio_url: req.audio.data_url(),
            }),
            output: MediaKind::Video,
        },
        "ai_avatar",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mode;
    use serde_json::{json, Value};

    fn image_request(model: ImageModel, shape: Shape, images: usize) -> ImageGeneration {
        ImageGeneration {
            prompt: "city at sunset".to_string(),
            model,
            mode: if images == 0 { Mode::Generate } else { Mode::Edit },
            style: Style::Photo,
            shape,
            images: (0..images)
                .map(|i| UploadedFile {
                    data: vec![i as u8; 3],
                    content_type: "image/png".to_string(),
                    filename: Some(format!("ref{}.png", i)),
                })
                .collect(),
            user_id: "user-1".to_string(),
        }
    }

    fn fal_body(payload: &ProviderPayload) -> (&'static str, Value) {
        match payload {
            ProviderPayload::FalQueue {
                endpoint, arguments, ..
            } => (*endpoint, serde_json::to_value(arguments).unwrap()),
            other => panic!("expected FAL payload, got {:?}", other),
        }
    }

    #[test]
    fn dalle_landscape_has_exact_fields_and_no_reference_image() {
        let dispatch = dispatch_image(&image_request(ImageModel::Dalle, Shape::Landscape, 0));
        let ProviderPayload::OpenAiImage(request) = &dispatch.payload else {
            panic!("expected OpenAI payload");
        };

        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({
                "model": "dall-e-3",
                "prompt": "city at sunset, in photo style",
                "size": "1792x1024",
                "quality": "standard",
                "n": 1
            })
        );
        assert_eq!(dispatch.file_prefix, "dalle");
    }

    #[test]
    fn flux_srpo_uses_fal_size_vocabulary() {
        let dispatch = dispatch_image(&image_request(ImageModel::Flux1Spro, Shape::Portrait, 0));
        let (endpoint, body) = fal_body(&dispatch.payload);

        assert_eq!(endpoint, "fal-ai/flux-1/srpo");
        assert_eq!(
            body,
            json!({
                "prompt": "Photo style: city at sunset",
                "image_size": "portrait_4_3",
                "num_inference_steps": 28,
                "guidance_scale": 3.5,
                "num_images": 1,
                "enable_safety_checker": true
            })
        );
    }

    #[test]
    fn qwen_uses_its_own_parameters() {
        let dispatch = dispatch_image(&image_request(ImageModel::Qwen, Shape::Square, 0));
        let (endpoint, body) = fal_body(&dispatch.payload);

        assert_eq!(endpoint, "fal-ai/qwen-image");
        assert_eq!(body["num_inference_steps"], 30);
        assert_eq!(body["guidance_scale"], 4.0);
        assert_eq!(body["image_size"], "square_hd");
    }

    #[test]
    fn kontext_edit_sends_single_data_url() {
        let dispatch = dispatch_image(&image_request(ImageModel::FluxKontextEdit, Shape::Square, 1));
        let (endpoint, body) = fal_body(&dispatch.payload);

        assert_eq!(endpoint, "fal-ai/flux-pro/kontext/max");
        assert_eq!(body["image_url"], "data:image/png;base64,AAAA");
        assert!(body.get("image_urls").is_none());
        assert_eq!(dispatch.file_prefix, "flux_edit");
    }

    #[test]
    fn seedream_switches_endpoint_on_reference_images() {
        let generate = dispatch_image(&image_request(ImageModel::Seedream, Shape::Landscape, 0));
        let (endpoint, body) = fal_body(&generate.payload);
        assert_eq!(endpoint, "fal-ai/bytedance/seedream/v4/text-to-image");
        assert_eq!(
            body,
            json!({
                "prompt": "Photo style: city at sunset",
                "aspect_ratio": "landscape",
                "num_inference_steps": 50,
                "guidance_scale": 7.5,
                "num_images": 1
            })
        );
        assert_eq!(generate.file_prefix, "seedream_gen");

        let edit = dispatch_image(&image_request(ImageModel::Seedream, Shape::Landscape, 3));
        let (endpoint, body) = fal_body(&edit.payload);
        assert_eq!(endpoint, "fal-ai/bytedance/seedream/v4/edit");
        assert_eq!(body["image_urls"].as_array().unwrap().len(), 3);
        assert_eq!(edit.file_prefix, "seedream_edit");
    }

    #[test]
    fn imagen_maps_shape_to_aspect_ratio() {
        let dispatch = dispatch_image(&image_request(ImageModel::Gemini, Shape::Portrait, 0));
        let ProviderPayload::Imagen { model, request } = &dispatch.payload else {
            panic!("expected Imagen payload");
        };

        assert_eq!(*model, IMAGEN_MODEL);
        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({
                "instances": [{ "prompt": "city at sunset, in photo style" }],
                "parameters": {
                    "aspectRatio": "9:16",
                    "sampleCount": 1,
                    "imageSize": "1K",
                    "outputOptions": { "mimeType": "image/jpeg" }
                }
            })
        );
    }

    #[test]
    fn nanobanana_inlines_reference_images_after_prompt() {
        let dispatch =
            dispatch_image(&image_request(ImageModel::GeminiNanobanana, Shape::Square, 2));
        let ProviderPayload::GeminiImageStream { request, .. } = &dispatch.payload else {
            panic!("expected streaming payload");
        };
        let body = serde_json::to_value(request).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0]["text"],
            "city at sunset, in photo style. Use the provided 2 reference images as visual reference."
        );
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn no_internal_fields_leak_into_any_image_payload() {
        for model in ImageModel::ALL {
            let dispatch = dispatch_image(&image_request(*model, Shape::Square, 0));
            let body = match &dispatch.payload {
                ProviderPayload::OpenAiImage(r) => serde_json::to_string(r),
                ProviderPayload::Imagen { request, .. } | ProviderPayload::Veo { request, .. } => {
                    serde_json::to_string(request)
                }
                ProviderPayload::GeminiImageStream { request, .. } => serde_json::to_string(request),
                ProviderPayload::FalQueue { arguments, .. } => serde_json::to_string(arguments),
            }
            .unwrap();

            for leaked in ["user_id", "user-1", "ref0.png", "\"mode\"", "\"style\""] {
                assert!(!body.contains(leaked), "{} leaked {}", model, leaked);
            }
        }
    }

    fn video_request(model: VideoModel, shape: Shape, with_image: bool) -> VideoGeneration {
        VideoGeneration {
            prompt: "waves".to_string(),
            model,
            mode: if with_image { Mode::Edit } else { Mode::Generate },
            shape,
            image: with_image.then(|| UploadedFile {
                data: vec![1, 2, 3],
                content_type: "image/jpeg".to_string(),
                filename: None,
            }),
            user_id: "user-1".to_string(),
        }
    }

    #[test]
    fn veo_square_falls_back_to_widescreen() {
        let dispatch = dispatch_video(&video_request(VideoModel::Veo3Fast, Shape::Square, false));
        let ProviderPayload::Veo { model, request } = &dispatch.payload else {
            panic!("expected Veo payload");
        };

        assert_eq!(*model, VEO_3_FAST_MODEL);
        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({
                "instances": [{ "prompt": "waves" }],
                "parameters": { "aspectRatio": "16:9" }
            })
        );
    }

    #[test]
    fn image_to_video_models_carry_the_image() {
        for model in [
            VideoModel::PixverseImageToVideo,
            VideoModel::KlingImageToVideo,
            VideoModel::Wan22,
        ] {
            let dispatch = dispatch_video(&video_request(model, Shape::Landscape, true));
            let (_, body) = fal_body(&dispatch.payload);
            assert_eq!(body["image_url"], "data:image/jpeg;base64,AQID", "{}", model);
            assert_eq!(body["prompt"], "waves");
        }
    }

    #[test]
    fn text_to_video_models_have_no_image_field() {
        let dispatch = dispatch_video(&video_request(VideoModel::Pixverse, Shape::Portrait, false));
        let (endpoint, body) = fal_body(&dispatch.payload);

        assert_eq!(endpoint, "fal-ai/pixverse/v4.5/text-to-video");
        assert_eq!(
            body,
            json!({
                "prompt": "waves",
                "aspect_ratio": "9:16",
                "resolution": "720p",
                "duration": "5"
            })
        );
    }

    #[test]
    fn audio_omits_missing_lyrics() {
        let dispatch = dispatch_audio(&AudioGeneration {
            verse_prompt: "[verse] by the sea".to_string(),
            lyrics_prompt: None,
            user_id: "user-1".to_string(),
        });
        let (endpoint, body) = fal_body(&dispatch.payload);

        assert_eq!(endpoint, MUSIC_ENDPOINT);
        assert_eq!(body, json!({ "prompt": "[verse] by the sea" }));
    }

    #[test]
    fn avatar_sends_both_files_as_data_urls() {
        let dispatch = dispatch_avatar(&AvatarGeneration {
            image: UploadedFile {
                data: vec![1, 2, 3],
                content_type: "image/jpeg".to_string(),
                filename: Some("face.jpg".to_string()),
            },
            audio: UploadedFile {
                data: vec![4, 5, 6],
                content_type: "audio/mpeg".to_string(),
                filename: Some("voice.mp3".to_string()),
            },
            user_id: "user-1".to_string(),
        });
        let (endpoint, body) = fal_body(&dispatch.payload);

        assert_eq!(endpoint, AVATAR_ENDPOINT);
        assert_eq!(
            body,
            json!({
                "image_url": "data:image/jpeg;base64,AQID",
                "audio_url": "data:audio/mpeg;base64,BAUG"
            })
        );
    }
}
