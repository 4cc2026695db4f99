use serde::Deserialize;
use url::Url;

use crate::error::ApiError;

pub const DEFAULT_FORMAT: &str = "mp4";
const MAX_FORMAT_LEN: usize = 16;

/// Wire shape of `POST /download`.
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_to_s3")]
    pub to_s3: bool,
}

#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub url: Url,
    pub format: String,
    pub to_storage: bool,
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

fn default_to_s3() -> bool {
    true
}

impl DownloadRequest {
    pub fn validate(self) -> Result<ValidatedRequest, ApiError> {
        let url = parse_video_url(&self.url)?;
        let format = normalize_format(&self.format)?;

        Ok(ValidatedRequest {
            url,
            format,
            to_storage: self.to_s3,
        })
    }
}

fn parse_video_url(input: &str) -> Result<Url, ApiError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ApiError::validation("Provide a video URL."));
    }

    let parsed = Url::parse(input)
        .map_err(|error| ApiError::validation(format!("Invalid URL {input:?}: {error}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::validation(format!(
            "Unsupported URL scheme {:?}; use http or https.",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ApiError::validation("The URL has no host."));
    }

    Ok(parsed)
}

// The container name becomes part of a scratch path, so only plain
// extensions get through. Whether the tool can produce it is decided later.
fn normalize_format(input: &str) -> Result<String, ApiError> {
    let format = input.trim().to_ascii_lowercase();
    let valid = !format.is_empty()
        && format.len() <= MAX_FORMAT_LEN
        && format.chars().all(|character| character.is_ascii_alphanumeric());

    if !valid {
        return Err(ApiError::validation(format!(
            "Invalid output format {input:?}; expected a container name such as \"mp4\"."
        )));
    }

    Ok(format)
}
