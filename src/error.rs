//! Error types for qrshare operations

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Result type alias using qrshare's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for qrshare operations
#[derive(Error, Debug)]
pub enum Error {
    /// Submitted content failed validation (bad type, too large, malformed body)
    #[error("{0}")]
    Validation(String),

    /// Upload request carried no `image` file field
    #[error("Please upload an image file.")]
    MissingFile,

    /// Text submission was missing or empty
    #[error("Please enter text or URL.")]
    EmptyText,

    /// Persisting an accepted upload failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// QR code encoding failed
    #[error("Failed to encode QR code: {0}")]
    QrEncode(String),

    /// QR code decoding failed
    #[error("Failed to decode QR code: {0}")]
    QrDecode(String),

    /// No QR code found in image
    #[error("No QR code found in image")]
    NoQrCodeFound,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    Image(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// HTTP status the error maps to when surfaced from a handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::MissingFile | Error::EmptyText => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients; internal failures are not described.
    pub fn user_message(&self) -> String {
        if self.status_code().is_server_error() {
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

impl From<qrcode::types::QrError> for Error {
    fn from(e: qrcode::types::QrError) -> Self {
        Error::QrEncode(e.to_string())
    }
}
