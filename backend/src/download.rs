use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use crate::{error::ApiError, scratch::JobFile};

/// Declarative downloader options for a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub format_selector: String,
    pub output_path: PathBuf,
    pub merge_output_format: String,
    pub recode_video: String,
    pub no_playlist: bool,
}

impl FetchOptions {
    pub fn for_job(format: &str, output_path: &Path) -> Self {
        Self {
            format_selector: format_selector(format),
            output_path: output_path.to_path_buf(),
            merge_output_format: format.to_string(),
            recode_video: format.to_string(),
            no_playlist: true,
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--newline".to_string(),
            "-f".to_string(),
            self.format_selector.clone(),
            "-o".to_string(),
            self.output_path.to_string_lossy().into_owned(),
            "--merge-output-format".to_string(),
            self.merge_output_format.clone(),
            "--recode-video".to_string(),
            self.recode_video.clone(),
        ];
        if self.no_playlist {
            args.push("--no-playlist".to_string());
        }
        args
    }
}

/// Best video in the container plus best audio, then the best pre-merged
/// stream in the container, then whatever is best overall.
pub fn format_selector(format: &str) -> String {
    format!("bestvideo[ext={format}]+bestaudio/best[ext={format}]/best")
}

#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Fetches `url` into `options.output_path`. Failures attributable to
    /// the requested content are [`ApiError::ContentRetrieval`].
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<(), ApiError>;
}

/// Runs the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl VideoFetcher for YtDlp {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<(), ApiError> {
        let args = options.to_args();
        debug!("Running {:?} {:?} {}", self.program, args, url);

        let output = Command::new(&self.program)
            .args(args)
            .arg(url.as_str())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| {
                if error.kind() == ErrorKind::NotFound {
                    ApiError::internal(format!(
                        "{} is not installed. Install it and restart the service.",
                        self.program.display()
                    ))
                } else {
                    ApiError::internal(format!(
                        "Could not run {}: {error}",
                        self.program.display()
                    ))
                }
            })?;

        if !output.status.success() {
            return Err(ApiError::ContentRetrieval(run_error_message(&output.stderr)));
        }

        Ok(())
    }
}

fn run_error_message(stderr: &[u8]) -> String {
    let message = String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("the downloader exited without producing the video")
        .to_string();

    if message.to_ascii_lowercase().contains("unsupported url") {
        "Unsupported or invalid URL for download.".to_string()
    } else {
        message
    }
}

/// Runs the fetcher for `job` and checks that the promised file is there.
pub async fn download_to(
    fetcher: &dyn VideoFetcher,
    url: &Url,
    format: &str,
    job: &JobFile,
) -> Result<(), ApiError> {
    let options = FetchOptions::for_job(format, job.path());

    info!(job_id = %job.id(), "Starting download of {url}");
    fetcher.fetch(url, &options).await?;

    let produced = match tokio::fs::metadata(job.path()).await {
        Ok(metadata) => metadata.is_file(),
        Err(error) if error.kind() == ErrorKind::NotFound => false,
        Err(error) => {
            return Err(ApiError::internal(format!(
                "Could not inspect downloaded file: {error}"
            )));
        }
    };
    if !produced {
        return Err(ApiError::MissingOutput(job.path().to_path_buf()));
    }

    info!(job_id = %job.id(), "Download finished: {:?}", job.path());
    Ok(())
}
