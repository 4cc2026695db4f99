use std::{fmt, path::PathBuf};

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_SCRATCH_DIR: &str = "temp_downloads";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_YT_DLP_PROGRAM: &str = "yt-dlp";
pub const DEFAULT_STALE_SCRATCH_SECONDS: u64 = 2 * 60 * 60;
pub const DEFAULT_LOG_FILTER: &str = "video_fetch_api=info,tower_http=info";

const STORAGE_VARS: [&str; 4] = [
    "S3_BUCKET",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_REGION",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API_KEY is not set; refusing to start without a shared secret")]
    MissingApiKey,

    #[error("could not resolve scratch directory {path:?}: {source}")]
    ScratchDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid origin in ALLOWED_ORIGINS: {0}; use values such as https://example.com")]
    InvalidOrigin(String),
}

/// Process-wide settings, read once at startup and shared read-only.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    /// `None` when any of the four storage variables is missing.
    pub storage: Option<StorageSettings>,
    /// Always absolute so that reported local paths are stable.
    pub scratch_dir: PathBuf,
    pub bind_addr: String,
    pub yt_dlp_program: PathBuf,
    pub allowed_origins: Vec<String>,
    pub stale_scratch_secs: u64,
}

#[derive(Clone)]
pub struct StorageSettings {
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    /// S3-compatible providers (MinIO, R2, Spaces); AWS when unset.
    pub endpoint_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name).and_then(|value| non_empty(&value).map(str::to_string))
        };

        // Compared byte for byte, so only blank values are rejected.
        let api_key = lookup("API_KEY")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let storage = match STORAGE_VARS.map(read) {
            [Some(bucket), Some(access_key_id), Some(secret_access_key), Some(region)] => {
                Some(StorageSettings {
                    bucket,
                    access_key_id,
                    secret_access_key,
                    region,
                    endpoint_url: read("S3_ENDPOINT_URL"),
                })
            }
            values => {
                let missing = STORAGE_VARS
                    .iter()
                    .zip(values.iter())
                    .filter(|(_, value)| value.is_none())
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>();
                warn!(
                    "Storage variables missing: {}. Upload to object storage is disabled.",
                    missing.join(", ")
                );
                None
            }
        };

        let scratch_dir = PathBuf::from(
            read("SCRATCH_DIR").unwrap_or_else(|| DEFAULT_SCRATCH_DIR.to_string()),
        );
        let scratch_dir = std::path::absolute(&scratch_dir).map_err(|source| {
            ConfigError::ScratchDir {
                path: scratch_dir.clone(),
                source,
            }
        })?;

        let bind_addr = resolve_bind_addr(read("APP_ADDR"), read("PORT"));

        let yt_dlp_program = PathBuf::from(
            read("YT_DLP_PATH").unwrap_or_else(|| DEFAULT_YT_DLP_PROGRAM.to_string()),
        );

        let allowed_origins = read("ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let stale_scratch_secs = match read("STALE_SCRATCH_SECONDS") {
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                warn!(
                    "STALE_SCRATCH_SECONDS={raw:?} is not a number; using {DEFAULT_STALE_SCRATCH_SECONDS}."
                );
                DEFAULT_STALE_SCRATCH_SECONDS
            }),
            None => DEFAULT_STALE_SCRATCH_SECONDS,
        };

        Ok(Self {
            api_key,
            storage,
            scratch_dir,
            bind_addr,
            yt_dlp_program,
            allowed_origins,
            stale_scratch_secs,
        })
    }

    pub fn upload_enabled(&self) -> bool {
        self.storage.is_some()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("storage", &self.storage)
            .field("scratch_dir", &self.scratch_dir)
            .field("bind_addr", &self.bind_addr)
            .field("yt_dlp_program", &self.yt_dlp_program)
            .field("allowed_origins", &self.allowed_origins)
            .field("stale_scratch_secs", &self.stale_scratch_secs)
            .finish()
    }
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

/// `RUST_LOG` when set, otherwise the service default. Call after `.env`
/// has been loaded so a filter kept there takes effect.
pub fn log_filter<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("RUST_LOG")
        .and_then(|value| non_empty(&value).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

fn resolve_bind_addr(app_addr: Option<String>, port: Option<String>) -> String {
    if let Some(configured) = app_addr {
        return configured;
    }

    match port.map(|value| value.parse::<u16>()) {
        Some(Ok(port)) => format!("0.0.0.0:{port}"),
        Some(Err(_)) => {
            warn!("PORT is not a valid port number; binding {DEFAULT_BIND_ADDR}.");
            DEFAULT_BIND_ADDR.to_string()
        }
        None => DEFAULT_BIND_ADDR.to_string(),
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn missing_api_key_fails_fast() {
        let error = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(error, ConfigError::MissingApiKey));

        let error = Config::from_lookup(lookup(&[("API_KEY", "   ")])).unwrap_err();
        assert!(matches!(error, ConfigError::MissingApiKey));
    }

    #[test]
    fn api_key_is_kept_verbatim() {
        let config = Config::from_lookup(lookup(&[("API_KEY", " k ")])).unwrap();
        assert_eq!(config.api_key, " k ");
    }

    #[test]
    fn log_filter_prefers_rust_log() {
        assert_eq!(
            log_filter(lookup(&[("RUST_LOG", "video_fetch_api=debug")])),
            "video_fetch_api=debug"
        );
        assert_eq!(log_filter(lookup(&[("RUST_LOG", " ")])), DEFAULT_LOG_FILTER);
        assert_eq!(log_filter(lookup(&[])), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn defaults_apply_when_only_api_key_is_set() {
        let config = Config::from_lookup(lookup(&[("API_KEY", "secret")])).unwrap();

        assert_eq!(config.api_key, "secret");
        assert!(config.storage.is_none());
        assert!(!config.upload_enabled());
        assert!(config.scratch_dir.is_absolute());
        assert!(config.scratch_dir.ends_with(DEFAULT_SCRATCH_DIR));
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.yt_dlp_program, PathBuf::from("yt-dlp"));
        assert!(config.allowed_origins.is_empty());
        assert_eq!(config.stale_scratch_secs, DEFAULT_STALE_SCRATCH_SECONDS);
    }

    #[test]
    fn partial_storage_settings_disable_upload() {
        let config = Config::from_lookup(lookup(&[
            ("API_KEY", "secret"),
            ("S3_BUCKET", "videos"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_REGION", "eu-west-1"),
        ]))
        .unwrap();

        assert!(config.storage.is_none());
    }

    #[test]
    fn complete_storage_settings_enable_upload() {
        let config = Config::from_lookup(lookup(&[
            ("API_KEY", "secret"),
            ("S3_BUCKET", "videos"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_SECRET_ACCESS_KEY", "shh"),
            ("AWS_REGION", "eu-west-1"),
            ("S3_ENDPOINT_URL", "http://localhost:9000"),
        ]))
        .unwrap();

        let storage = config.storage.as_ref().unwrap();
        assert_eq!(storage.bucket, "videos");
        assert_eq!(storage.region, "eu-west-1");
        assert_eq!(storage.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert!(config.upload_enabled());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = Config::from_lookup(lookup(&[
            ("API_KEY", "top-secret-key"),
            ("S3_BUCKET", "videos"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_SECRET_ACCESS_KEY", "very-secret"),
            ("AWS_REGION", "eu-west-1"),
        ]))
        .unwrap();

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top-secret-key"));
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("videos"));
    }

    #[test]
    fn bind_address_prefers_app_addr_then_port() {
        assert_eq!(
            resolve_bind_addr(Some("127.0.0.1:9000".into()), Some("1234".into())),
            "127.0.0.1:9000"
        );
        assert_eq!(resolve_bind_addr(None, Some("1234".into())), "0.0.0.0:1234");
        assert_eq!(resolve_bind_addr(None, Some("nope".into())), DEFAULT_BIND_ADDR);
        assert_eq!(resolve_bind_addr(None, None), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn allowed_origins_are_split_and_trimmed() {
        let config = Config::from_lookup(lookup(&[
            ("API_KEY", "secret"),
            ("ALLOWED_ORIGINS", " https://a.example , ,https://b.example"),
        ]))
        .unwrap();

        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
