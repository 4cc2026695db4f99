use std::path::PathBuf;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Every failure a request can end with. Converted to a JSON body at the
/// HTTP boundary; nothing below the router builds responses by hand.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("could not retrieve video: {0}")]
    ContentRetrieval(String),

    #[error("uploading to object storage is not configured on this server")]
    UploadNotConfigured,

    #[error("object storage credentials are misconfigured: {0}")]
    StorageCredentials(String),

    #[error("object storage request failed: {0}")]
    StorageClient(String),

    #[error("download reported success but {} was not created", .0.display())]
    MissingOutput(PathBuf),

    #[error("internal server error: {0}")]
    Internal(String),

    #[error("unexpected server error: {0}")]
    Unexpected(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    status: u16,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) | Self::ContentRetrieval(_) => StatusCode::BAD_REQUEST,
            Self::UploadNotConfigured => StatusCode::NOT_IMPLEMENTED,
            Self::StorageCredentials(_)
            | Self::StorageClient(_)
            | Self::MissingOutput(_)
            | Self::Internal(_)
            | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Validation(_) => "INVALID_REQUEST",
            Self::ContentRetrieval(_) => "DOWNLOAD_FAILED",
            Self::UploadNotConfigured => "UPLOAD_NOT_CONFIGURED",
            Self::StorageCredentials(_) => "STORAGE_CREDENTIALS",
            Self::StorageClient(_) => "STORAGE_CLIENT",
            Self::MissingOutput(_) => "MISSING_OUTPUT",
            Self::Internal(_) => "INTERNAL",
            Self::Unexpected(_) => "UNEXPECTED",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("Malformed request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.to_string();

        if status.is_server_error() {
            error!(code, "request failed: {message}");
        } else {
            warn!(code, "request rejected: {message}");
        }

        let body = Json(ErrorBody {
            error: message,
            code,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}
