// Error types and the JSON error envelope returned to clients

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Message used when a failure carries no message of its own.
pub const DEFAULT_ERROR_MESSAGE: &str = "Internal server error";

/// A failure surfaced by the generative-AI provider or the connection to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    /// Upstream HTTP status, when the provider answered at all.
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn details(&self) -> String {
        match self.status {
            Some(status) => format!("Error: [{}] {}", status, self.message),
            None => format!("Error: {}", self.message),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unsupported config keys: {}", .0.join(", "))]
    UnsupportedConfig(Vec<String>),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Provider did not respond within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("No route for {0}")]
    NotFound(String),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) | ProxyError::UnsupportedConfig(_) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidRequest(_) => "InvalidRequestError",
            ProxyError::UnsupportedConfig(_) => "UnsupportedConfigError",
            ProxyError::PayloadTooLarge(_) => "PayloadTooLargeError",
            ProxyError::Provider(_) => "Error",
            ProxyError::Timeout(_) => "TimeoutError",
            ProxyError::NotFound(_) => "NotFoundError",
            ProxyError::MethodNotAllowed(_) => "MethodNotAllowedError",
        }
    }

    /// Stringified form of the underlying failure.
    pub fn details(&self) -> String {
        match self {
            ProxyError::Provider(e) => e.details(),
            other => format!("{}: {}", other.kind(), other),
        }
    }

    pub fn to_envelope(&self, fallback: &str) -> ErrorEnvelope {
        let message = self.to_string();
        let error = if message.trim().is_empty() {
            fallback.to_string()
        } else {
            message
        };

        ErrorEnvelope {
            error,
            details: self.details(),
        }
    }

    /// Log the failure and turn it into an envelope response.
    pub fn into_response_with(self, fallback: &str) -> Response {
        let status = self.status();
        let envelope = self.to_envelope(fallback);

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), details = %envelope.details, "Request failed: {}", envelope.error);
        } else {
            tracing::warn!(status = status.as_u16(), details = %envelope.details, "Request rejected: {}", envelope.error);
        }

        (status, Json(envelope)).into_response()
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.into_response_with(DEFAULT_ERROR_MESSAGE)
    }
}

impl From<JsonRejection> for ProxyError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ProxyError::PayloadTooLarge(rejection.body_text())
        } else {
            ProxyError::InvalidRequest(rejection.body_text())
        }
    }
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub details: String,
}
