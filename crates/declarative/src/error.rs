//! Error taxonomy for reconciliation.
//!
//! Every failure the engine can produce is an [`EngineError`]. Each error
//! belongs to an [`ErrorCategory`] that the host uses to decide whether the
//! run can continue, and renders to a [`Diagnostic`] for the user.

use std::fmt;

use crate::schema::Violation;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Categories of engine errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Desired configuration is invalid; nothing was sent.
    Validation,
    /// Request never produced an HTTP response.
    Transport,
    /// Remote system answered with a non-2xx status.
    Remote,
    /// Response body could not be mapped onto the descriptor.
    Mapping,
    /// Instance no longer exists remotely.
    Gone,
    /// Desired change cannot be applied in place.
    Replacement,
    /// Descriptor or registry misconfiguration.
    Schema,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether the run should stop rather than continue with other instances.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Schema)
    }

    /// Whether the host can resolve this error by dropping the instance from
    /// state.
    #[must_use]
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::Gone)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid configuration",
            Self::Transport => "Could not reach the API",
            Self::Remote => "API request rejected",
            Self::Mapping => "Unexpected API response",
            Self::Gone => "Resource no longer exists",
            Self::Replacement => "Resource must be replaced",
            Self::Schema => "Invalid resource schema",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the listed attributes and run again",
            Self::Transport => "Check the API URL and your network connection",
            Self::Remote => "Check credentials and the response body for details",
            Self::Mapping => "The API may have changed; report the response body",
            Self::Gone => "Run refresh to drop the instance from state",
            Self::Replacement => "Destroy and recreate the resource to apply this change",
            Self::Schema => "This is a bug in the resource definition",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling resources.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Desired configuration violates the descriptor's rules.
    #[error("invalid {kind} configuration: {}", join_violations(.violations))]
    Validation {
        /// Resource kind.
        kind: String,
        /// Every violation found, not only the first.
        violations: Vec<Violation>,
    },

    /// Network failure before any HTTP status was received.
    #[error("request failed: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// Remote system answered with a non-success status.
    #[error("HTTP Status Code: {status}\nStatus: {status_text}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Reason phrase.
        status_text: String,
        /// Raw response body.
        body: String,
    },

    /// Response body did not match the descriptor.
    #[error("cannot map {kind} response at '{path}': {message}")]
    Mapping {
        /// Resource kind.
        kind: String,
        /// Dotted path of the offending field.
        path: String,
        /// What was wrong.
        message: String,
    },

    /// Read found the instance absent remotely.
    #[error("{kind} '{id}' no longer exists")]
    ResourceGone {
        /// Resource kind.
        kind: String,
        /// Identity that was looked up.
        id: String,
    },

    /// A replacement attribute changed.
    #[error("{kind} must be replaced, changed: {}", .attributes.join(", "))]
    ReplacementRequired {
        /// Resource kind.
        kind: String,
        /// Every attribute forcing replacement.
        attributes: Vec<String>,
    },

    /// A prior record had no identity value.
    #[error("{kind} state has no '{attribute}' value")]
    MissingIdentity {
        /// Resource kind.
        kind: String,
        /// Name of the identity attribute.
        attribute: String,
    },

    /// No kind with that name is registered.
    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),

    /// Descriptor or registry defect.
    #[error("schema error in {kind}: {message}")]
    Schema {
        /// Resource kind.
        kind: String,
        /// Error message.
        message: String,
    },

    /// A lifecycle operation was attempted from the wrong phase.
    #[error("cannot {operation} a resource that is {phase}")]
    IllegalTransition {
        /// Operation attempted.
        operation: String,
        /// Phase the instance was in.
        phase: String,
    },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl EngineError {
    /// Create a mapping error.
    pub fn mapping(
        kind: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Mapping {
            kind: kind.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Remote { .. } => ErrorCategory::Remote,
            Self::Mapping { .. } => ErrorCategory::Mapping,
            Self::ResourceGone { .. } => ErrorCategory::Gone,
            Self::ReplacementRequired { .. } => ErrorCategory::Replacement,
            Self::UnknownKind(_) | Self::Schema { .. } => ErrorCategory::Schema,
            Self::MissingIdentity { .. } | Self::IllegalTransition { .. } => ErrorCategory::Other,
        }
    }

    /// Render the error for display, titled by the operation that failed.
    pub fn diagnostic(&self, operation: &str, kind: &str) -> Diagnostic {
        let title = match self {
            Self::Remote { .. } => format!("Failed to {} {}", operation, kind),
            Self::Validation { .. } => format!("Invalid {} configuration", kind),
            Self::Mapping { .. } => format!("Failed to read {} response", kind),
            _ => format!("Error during {} of {}", operation, kind),
        };

        let detail = match self {
            Self::Remote {
                status,
                status_text,
                body,
            } => {
                let mut detail = format!("HTTP Status Code: {}\nStatus: {}", status, status_text);
                if !body.trim().is_empty() {
                    detail.push_str("\n\n");
                    detail.push_str(body.trim());
                }
                detail
            }
            other => other.to_string(),
        };

        Diagnostic { title, detail }
    }
}

/// User-facing rendering of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Short summary line.
    pub title: String,
    /// Full detail.
    pub detail: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.title, self.detail)
    }
}
