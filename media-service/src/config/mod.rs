use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const FAL_QUEUE_BASE: &str = "https://queue.fal.run";
const GCS_BASE_URL: &str = "https://storage.googleapis.com";

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub common: core_config::Config,
    pub providers: ProviderConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub timeouts: TimeoutConfig,
    pub content_policy_enabled: bool,
    pub otlp_endpoint: Option<String>,
}

/// Credentials and endpoints of the upstream generators. A missing key only
/// disables the models that need it.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub openai_api_key: Option<Secret<String>>,
    pub gemini_api_key: Option<Secret<String>>,
    pub fal_api_key: Option<Secret<String>>,
    pub openai_api_base: String,
    pub gemini_api_base: String,
    pub fal_queue_base: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Gcs,
    Local,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gcs" => Ok(StorageBackend::Gcs),
            "local" => Ok(StorageBackend::Local),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown STORAGE_BACKEND '{}', expected gcs or local",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub gcs_bucket: Option<String>,
    /// Path to a service-account JSON key.
    pub gcs_credentials_path: Option<String>,
    /// Host of both the JSON API and public object URLs.
    pub gcs_base_url: String,
    /// Root directory of the local fallback store.
    pub local_path: String,
    /// Public base URL of this service, used for locally stored media.
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_file_size_mb: u64,
}

impl LimitsConfig {
    pub fn max_file_bytes(&self) -> usize {
        usize::try_from(self.max_file_size_mb)
            .unwrap_or(usize::MAX)
            .saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Deadline for a single upstream HTTP call.
    pub request: Duration,
    pub poll_interval: Duration,
    /// Deadline for a queued or long-running job to finish.
    pub poll_timeout: Duration,
    /// Total time spent retrying a transient submit failure.
    pub retry_max_elapsed: Duration,
}

impl MediaConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let backend: StorageBackend = get_env("STORAGE_BACKEND", Some("gcs"), false)?.parse()?;

        let storage = StorageConfig {
            backend,
            gcs_bucket: required_for(backend == StorageBackend::Gcs && is_prod, "GCS_BUCKET_NAME")?,
            gcs_credentials_path: required_for(
                backend == StorageBackend::Gcs && is_prod,
                "GOOGLE_APPLICATION_CREDENTIALS",
            )?,
            gcs_base_url: get_env("GCS_API_BASE", Some(GCS_BASE_URL), false)?,
            local_path: get_env("LOCAL_MEDIA_DIR", Some("generated_media"), false)?,
            base_url: get_env("BASE_URL", Some("http://localhost:8080"), is_prod)?,
        };

        Ok(MediaConfig {
            common: common_config,
            providers: ProviderConfig {
                openai_api_key: required_for(is_prod, "OPEN_AI_API_KEY")?.map(Secret::new),
                gemini_api_key: required_for(is_prod, "GEMINI_API_KEY")?.map(Secret::new),
                fal_api_key: required_for(is_prod, "FAL_API_KEY")?.map(Secret::new),
                openai_api_base: get_env("OPENAI_API_BASE", Some(OPENAI_API_BASE), false)?,
                gemini_api_base: get_env("GEMINI_API_BASE", Some(GEMINI_API_BASE), false)?,
                fal_queue_base: get_env("FAL_QUEUE_BASE", Some(FAL_QUEUE_BASE), false)?,
            },
            storage,
            limits: LimitsConfig {
                max_file_size_mb: parse_env("MAX_FILE_SIZE_MB", DEFAULT_MAX_FILE_SIZE_MB)?,
            },
            timeouts: TimeoutConfig {
                request: Duration::from_secs(parse_env("PROVIDER_TIMEOUT_SECS", 120)?),
                poll_interval: Duration::from_millis(parse_env("PROVIDER_POLL_INTERVAL_MS", 2000)?),
                poll_timeout: Duration::from_secs(parse_env("PROVIDER_POLL_TIMEOUT_SECS", 600)?),
                retry_max_elapsed: Duration::from_secs(parse_env(
                    "PROVIDER_RETRY_MAX_ELAPSED_SECS",
                    30,
                )?),
            },
            content_policy_enabled: parse_env("CONTENT_POLICY_ENABLED", false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Optional outside production, mandatory when `required` holds.
fn required_for(required: bool, key: &str) -> Result<Option<String>, AppError> {
    match env::var(key).ok().filter(|v| !v.is_empty()) {
        Some(val) => Ok(Some(val)),
        None if required => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required in production but not set",
            key
        ))),
        None => Ok(None),
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!("GCS".parse::<StorageBackend>().unwrap(), StorageBackend::Gcs);
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert!("s3".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn max_file_bytes_is_megabytes() {
        let limits = LimitsConfig {
            max_file_size_mb: 10,
        };
        assert_eq!(limits.max_file_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn huge_file_limit_saturates() {
        let limits = LimitsConfig {
            max_file_size_mb: u64::MAX,
        };
        assert_eq!(limits.max_file_bytes(), usize::MAX);
    }

    #[test]
    fn parse_env_falls_back_to_default_when_unset() {
        let value: u64 = parse_env("MEDIA_SERVICE_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }
}
