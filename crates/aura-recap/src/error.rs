//! Error types for recap generation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecapError>;

#[derive(Debug, Error)]
pub enum RecapError {
    /// Generator not configured (missing API key, bad settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failed or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response, rate limit, empty completion
    #[error("API error: {0}")]
    Api(String),

    /// Unexpected response shape
    #[error("Parse error: {0}")]
    Parse(String),
}
