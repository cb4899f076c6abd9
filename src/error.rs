//! Error types for the graph-tutorial application.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Device code authentication errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Device code request failed: {0}")]
    DeviceCodeRequestFailed(String),

    #[error("User declined the sign-in request")]
    AuthorizationDeclined,

    #[error("Device code expired before sign-in completed")]
    CodeExpired,

    #[error("Timed out waiting for sign-in to complete")]
    PollingTimedOut,

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),
}

/// Errors returned by Microsoft Graph.
///
/// This is the one category the interactive menu recovers from.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Graph(GraphError),

    #[error("Failed to parse API response: {0}")]
    ParseFailed(String),
}

/// A non-success response from Graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphError {
    pub status: u16,
    /// The `error` object from the response body, if it could be decoded.
    pub error: Option<GraphErrorDetail>,
}

/// The `error` object of a Graph error response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphErrorDetail {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct GraphErrorBody {
    error: Option<GraphErrorDetail>,
}

impl GraphError {
    /// Build from an HTTP status and the raw response body.
    pub fn from_body(status: u16, body: &str) -> Self {
        let error = serde_json::from_str::<GraphErrorBody>(body)
            .ok()
            .and_then(|b| b.error);
        Self { status, error }
    }
}

impl GraphErrorDetail {
    /// Code and message joined by a space, skipping whichever is missing.
    pub fn summary(&self) -> String {
        [self.code.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Graph request failed: HTTP {}", self.status)?;
        match &self.error {
            Some(detail) if detail.code.is_some() || detail.message.is_some() => {
                write!(f, " - {}", detail.summary())
            }
            _ => Ok(()),
        }
    }
}

impl std::error::Error for GraphError {}

impl From<GraphError> for AppError {
    fn from(err: GraphError) -> Self {
        Self::Api(ApiError::Graph(err))
    }
}

impl AppError {
    /// Returns a user-friendly message for errors that end the program.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Auth(AuthError::AuthorizationDeclined) => "Sign-in was declined.",
            Self::Auth(AuthError::CodeExpired) | Self::Auth(AuthError::PollingTimedOut) => {
                "Sign-in was not completed in time. Please run the program again."
            }
            Self::Auth(_) => "Sign-in failed. Check the clientId and tenantId settings.",
            Self::Network(_) => "Network error. Check your connection.",
            Self::Config(_) => "Configuration error. Please check settings.",
            _ => "An error occurred.",
        }
    }
}
