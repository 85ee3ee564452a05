//! Error types for CrateDB Cloud API operations.
//!
//! HTTP statuses are never errors at this layer: every answer from the API
//! is a [`Response`](crate::Response), whatever its status. Errors here mean
//! no answer was obtained, or the client could not be configured.

use std::fmt;

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of client errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable).
    Network,
    /// Provider configuration is incomplete or invalid.
    Config,
    /// Request body could not be serialized.
    Encoding,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Config => "Invalid provider configuration",
            Self::Encoding => "Invalid request body",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the API URL and your internet connection, then try again",
            Self::Config => {
                "Set the value in the [provider] table or through the CRATEDB_* environment variables"
            }
            Self::Encoding => "This is a bug; please report it",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// One missing or invalid provider setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigProblem {
    /// Setting name as written in configuration (`api_key`, `url`, ...).
    pub field: &'static str,
    /// Short summary, e.g. "Missing CrateDB API Key".
    pub summary: String,
    /// How to fix it.
    pub detail: String,
}

impl fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.summary, self.field, self.detail)
    }
}

/// Errors that can occur while talking to the CrateDB Cloud API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request produced no HTTP response.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Request URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// One or more provider settings are missing or invalid.
    #[error("invalid provider configuration: {}", .problems.iter().map(|p| p.summary.as_str()).collect::<Vec<_>>().join(", "))]
    Config {
        /// Every problem found, not only the first.
        problems: Vec<ConfigProblem>,
    },

    /// Request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } => ErrorCategory::Network,
            Self::Config { .. } => ErrorCategory::Config,
            Self::Encoding(_) => ErrorCategory::Encoding,
        }
    }

    /// Whether this error is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Build a transport error from a ureq error.
    pub fn transport(url: &str, err: &ureq::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
