use crate::config::{MediaConfig, StorageBackend};
use crate::handlers;
use crate::services::gcs_auth::ServiceAccountAuth;
use crate::services::providers::{ChatProvider, ProviderClients};
use crate::services::{GcsStorage, GenerationService, LocalStorage, MediaUploader, Storage};
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    middleware::from_fn,
    routing::{delete, get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Reference images per request on the busiest endpoint.
const MAX_FILES_PER_REQUEST: usize = 4;
/// Room for the text fields and multipart framing on top of the files.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MediaConfig>,
    pub generation: Arc<GenerationService>,
    pub chat: Arc<dyn ChatProvider>,
    pub uploader: Arc<MediaUploader>,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

async fn primary_storage(
    config: &MediaConfig,
    http: &reqwest::Client,
) -> Result<Option<Arc<dyn Storage>>, AppError> {
    if config.storage.backend != StorageBackend::Gcs {
        tracing::info!("Local storage backend selected");
        return Ok(None);
    }

    let (Some(bucket), Some(credentials)) = (
        config.storage.gcs_bucket.as_deref(),
        config.storage.gcs_credentials_path.as_deref(),
    ) else {
        tracing::warn!("GCS bucket or credentials not configured, storing media locally only");
        return Ok(None);
    };

    let auth = ServiceAccountAuth::from_file(credentials, http.clone())
        .await
        .map_err(|e| {
            tracing::error!("Failed to load GCS credentials from {}: {}", credentials, e);
            e
        })?;

    tracing::info!(bucket, "GCS storage enabled");
    Ok(Some(Arc::new(GcsStorage::new(
        http.clone(),
        auth,
        &config.storage.gcs_base_url,
        bucket,
    ))))
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .limits
        .max_file_bytes()
        .saturating_mul(MAX_FILES_PER_REQUEST)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let api = Router::new()
        .route("/image/generate", post(handlers::generate_image))
        .route("/image/models", get(handlers::image_models))
        .route("/video/generate", post(handlers::generate_video))
        .route("/video/models", get(handlers::video_models))
        .route("/audio/generate", post(handlers::generate_audio))
        .route("/avatar/ai-avatar", post(handlers::create_avatar))
        .route("/prompt/enhance", post(handlers::enhance_prompt))
        .route("/delete-user-data/:user_id", delete(handlers::delete_user_data))
        .route("/delete-file", delete(handlers::delete_file));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .nest("/api/v1", api)
        .nest_service("/media", ServeDir::new(&state.config.storage.local_path))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any),
        )
}

impl Application {
    pub async fn build(config: MediaConfig) -> Result<Self, AppError> {
        let providers = Arc::new(ProviderClients::new(&config.providers, &config.timeouts)?);

        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request)
            .build()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to create HTTP client: {}", e))
            })?;

        let fallback = LocalStorage::new(&config.storage.local_path, &config.storage.base_url)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to initialize local storage at {}: {}",
                    config.storage.local_path,
                    e
                );
                e
            })?;
        let primary = primary_storage(&config, &http).await?;
        let uploader = Arc::new(MediaUploader::new(primary, fallback, http));

        let generation = Arc::new(GenerationService::new(
            providers.clone(),
            providers.clone(),
            uploader.clone(),
            config.content_policy_enabled,
        ));

        let state = AppState {
            config: Arc::new(config),
            generation,
            chat: providers,
            uploader,
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
