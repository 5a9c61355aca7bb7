//! Error types for Audi Connect client operations

use thiserror::Error;

/// Result type alias for Audi Connect client operations
pub type Result<T> = std::result::Result<T, AudiClientError>;

/// Errors that can occur during Audi Connect client operations
#[derive(Error, Debug)]
pub enum AudiClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Endpoint answered with 404
    #[error("Unknown endpoint - 404: {0}")]
    NotFound(String),

    /// Server returned a non-success status without an API error body
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Response body carried an `error` object
    #[error("API error: {code}\n{description}")]
    ApiError { code: String, description: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The login sequence hit an unexpected redirect, page or payload
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// No token is installed for the requested scope
    #[error("No token available for scope '{0}'")]
    MissingToken(String),

    /// The vehicle reported a failed request
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Polling did not finish in time
    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AudiClientError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }

    /// Create a login failure
    pub fn login(message: impl Into<String>) -> Self {
        Self::LoginFailed(message.into())
    }
}
