// src/error.rs

//! Unified error handling for the feed client.

use std::fmt;

use thiserror::Error;

/// Result type alias for feed operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing, blank or rejected API credential
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Non-retryable HTTP status from the feed API
    #[error("API request to {endpoint} failed with status {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Transient failures outlived the retry budget
    #[error("Request to {endpoint} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    /// HTTP transport failure that is not worth retrying
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed object-store path
    #[error("Invalid content path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Argument validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or conflicting query filter arguments
    #[error("Invalid filter: {0}")]
    Filter(String),
}

impl AppError {
    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a filter error.
    pub fn filter(message: impl Into<String>) -> Self {
        Self::Filter(message.into())
    }

    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
