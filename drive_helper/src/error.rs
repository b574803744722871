//! Error types for the drive_helper crate.

use thiserror::Error;

/// Errors that can occur when interacting with Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    /// A local check failed before any request was sent.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Timed out: {0}")]
    TimeoutError(String),

    #[error("Found {count} folders titled '{title}'")]
    AmbiguousFolder { title: String, count: usize },

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl DriveError {
    /// Whether retrying the same request later could succeed.
    ///
    /// The crate itself never retries; this is for callers that do.
    pub fn is_transient(&self) -> bool {
        match self {
            DriveError::NetworkError(_) | DriveError::TimeoutError(_) => true,
            DriveError::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Build an error from a non-success HTTP status and its body.
    ///
    /// Google error bodies (`{"error": {"code", "message"}}`) are unwrapped
    /// when present; anything else is kept verbatim.
    pub(crate) fn from_response(status: u16, body: String) -> Self {
        let (status, message) =
            match serde_json::from_str::<crate::models::ApiErrorResponse>(&body) {
                Ok(api_error) => (api_error.error.code, api_error.error.message),
                Err(_) => (status, body),
            };

        if status == 404 {
            DriveError::FileNotFound(message)
        } else {
            DriveError::ApiError { status, message }
        }
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
