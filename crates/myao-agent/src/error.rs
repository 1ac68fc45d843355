//! Error types for myao-agent

use thiserror::Error;

/// Result type alias using myao-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a persona
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the completion client layer
    #[error(transparent)]
    Ai(#[from] myao_ai::Error),

    /// The pending reply was superseded by a newer message
    #[error("reply cancelled")]
    Cancelled,

    /// Reading or writing the summary snapshot failed
    #[error("summary persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// A reset was requested while another one is running
    #[error("a memory reset is already in progress")]
    ResetInProgress,

    /// Posting to the transport or fetching an attachment failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Persona configuration is unusable
    #[error("invalid persona configuration: {0}")]
    Config(String),
}

impl Error {
    /// Check if this error indicates a context overflow
    pub fn is_context_overflow(&self) -> bool {
        match self {
            Error::Ai(e) => e.is_context_overflow(),
            _ => false,
        }
    }
}
