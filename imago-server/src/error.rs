//! Error types for the server and CLI.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Errors raised by the web UI and the command line.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Library error (agent, tools, config, upload).
    #[error(transparent)]
    Imago(#[from] imago::Error),

    /// Malformed multipart form.
    #[error("invalid form data: {0}")]
    Multipart(#[from] MultipartError),

    /// Socket or stdio failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    /// HTTP status a failed request is answered with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Imago(imago::Error::Upload(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Imago(imago::Error::Config(_) | imago::Error::Io(_)) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Imago(_) => StatusCode::BAD_GATEWAY,
            Self::Multipart(e) => e.status(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "Request failed");
        } else {
            tracing::warn!(error = %self, %status, "Request rejected");
        }
        let body = crate::web::render_page("", &crate::web::error_block(&self.to_string()));
        (status, Html(body)).into_response()
    }
}

impl From<imago::config::ConfigError> for ServerError {
    fn from(err: imago::config::ConfigError) -> Self {
        Self::Imago(err.into())
    }
}
