//! Error types for mergescore-llm

use std::time::Duration;

use thiserror::Error;

/// Ways a scoring request can fail
#[derive(Debug, Error)]
pub enum ScoringError {
    /// The service rejected the credentials
    #[error("Authentication failed: {message}")]
    Auth {
        /// Detail from the service or client
        message: String,
    },

    /// The service asked us to slow down
    #[error("Rate limited by scoring service")]
    RateLimited {
        /// Delay requested by the service, if any
        retry_after: Option<Duration>,
    },

    /// The reply could not be turned into a valid score record
    #[error("Malformed response: {message}")]
    Malformed {
        /// Detail from the service or client
        message: String,
    },

    /// Network failure, timeout or server-side error
    #[error("Transient network error: {message}")]
    Transient {
        /// Detail from the service or client
        message: String,
    },
}

impl ScoringError {
    /// Build a `Malformed` error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Build a `Transient` error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Whether a bounded retry may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient { .. })
    }

    /// Stable short name, used as the failure reason in run summaries
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::Malformed { .. } => "malformed_response",
            Self::Transient { .. } => "transient_network_error",
        }
    }
}
