//! Error types for myao-ai

use thiserror::Error;

/// Result type alias using myao-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Error code the completion API uses when the prompt does not fit the model.
pub const CONTEXT_LENGTH_EXCEEDED: &str = "context_length_exceeded";

/// Errors that can occur when talking to a completion backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type}, code: {})", code.as_deref().unwrap_or("none"))]
    Api {
        status: u16,
        error_type: String,
        code: Option<String>,
        message: String,
    },

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error without a machine-readable code
    pub fn api(status: u16, error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            error_type: error_type.into(),
            code: None,
            message: message.into(),
        }
    }

    /// Attach a machine-readable code to an API error
    pub fn with_code(self, new_code: impl Into<String>) -> Self {
        match self {
            Self::Api {
                status,
                error_type,
                message,
                ..
            } => Self::Api {
                status,
                error_type,
                code: Some(new_code.into()),
                message,
            },
            other => other,
        }
    }

    /// The API error code, if the backend reported one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Check if this error means the prompt no longer fits the context window
    pub fn is_context_overflow(&self) -> bool {
        match self {
            Error::Api { code, message, .. } => {
                if code.as_deref() == Some(CONTEXT_LENGTH_EXCEEDED) {
                    return true;
                }
                let msg = message.to_lowercase();
                msg.contains(CONTEXT_LENGTH_EXCEEDED)
                    || msg.contains("maximum context length")
                    || msg.contains("too many tokens")
                    || msg.contains("reduce the length")
            }
            _ => false,
        }
    }
}
