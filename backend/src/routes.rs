use std::{any::Any, sync::Arc};

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    auth,
    config::Config,
    download::{self, VideoFetcher, YtDlp},
    error::ApiError,
    request::DownloadRequest,
    scratch::JobFile,
    storage::{self, ObjectUploader, S3Uploader},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: Arc<dyn VideoFetcher>,
    /// `None` when storage settings are incomplete.
    pub uploader: Option<Arc<dyn ObjectUploader>>,
}

impl AppState {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn VideoFetcher>,
        uploader: Option<Arc<dyn ObjectUploader>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            uploader,
        }
    }

    /// Wires the real downloader and, when configured, the S3 uploader.
    pub fn from_config(config: Config) -> Self {
        let fetcher: Arc<dyn VideoFetcher> = Arc::new(YtDlp::new(config.yt_dlp_program.clone()));
        let uploader = config.storage.clone().map(|settings| {
            let uploader: Arc<dyn ObjectUploader> = Arc::new(S3Uploader::new(settings));
            uploader
        });
        Self::new(config, fetcher, uploader)
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DownloadOutcome {
    Uploaded {
        file_url: String,
        expires_at: DateTime<Utc>,
    },
    StoredLocally {
        message: String,
        filename: String,
        local_path: String,
    },
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/download", post(download_video))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn download_video(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<DownloadOutcome>, ApiError> {
    let Json(payload) = payload?;
    let request = payload.validate()?;

    let uploader = if request.to_storage {
        Some(state.uploader.clone().ok_or(ApiError::UploadNotConfigured)?)
    } else {
        None
    };

    let job = JobFile::new(&state.config.scratch_dir, &request.format);
    download::download_to(state.fetcher.as_ref(), &request.url, &request.format, &job).await?;

    let outcome = match uploader {
        Some(uploader) => {
            let upload = storage::publish(uploader.as_ref(), &job).await?;
            info!(job_id = %job.id(), "Uploaded {}", job.filename());
            DownloadOutcome::Uploaded {
                file_url: upload.presigned_url,
                expires_at: upload.expires_at,
            }
        }
        None => DownloadOutcome::StoredLocally {
            message: "File downloaded locally.".to_string(),
            filename: job.filename().to_string(),
            local_path: job.path().to_string_lossy().into_owned(),
        },
    };

    // `job` drops here and removes the scratch file on every path above.
    Ok(Json(outcome))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "handler panicked".to_string()
    };

    ApiError::Unexpected(detail).into_response()
}
