//! Unified error handling for Warden Core

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Message returned to the webhook caller for any engine failure. Remote
/// response bodies are logged at debug verbosity only.
pub const USER_RETRY_MESSAGE: &str =
    "an error occurred during the authorization check, please retry";

/// Engine error kinds
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failure: {0}")]
    Authentication(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote policy service returned status {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Canceled: {0}")]
    Canceled(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// The generic message surfaced to the webhook layer regardless of kind.
    pub fn user_message(&self) -> &'static str {
        USER_RETRY_MESSAGE
    }

    /// Upstream HTTP status for `Remote` rejections, so callers can tell
    /// throttling (429) apart from other authorization infrastructure
    /// failures.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            AppError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}
