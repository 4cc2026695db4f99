//! HTTP service that fetches a video with `yt-dlp`, optionally publishes it
//! to an S3 bucket, and answers with a pre-signed link or the local path.

pub mod auth;
pub mod config;
pub mod cors;
pub mod download;
pub mod error;
pub mod request;
pub mod routes;
pub mod scratch;
pub mod storage;

pub use config::Config;
pub use error::ApiError;
pub use routes::{AppState, DownloadOutcome, router};
