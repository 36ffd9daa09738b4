// ── Core error types ──
//
// Errors raised by the engine. Only `Precondition` failures abort a run;
// every other kind is recorded against the action or check that hit it
// and the pipeline moves on. The `From<medialink_api::Error>` impl folds
// transport-layer failures into engine variants.

use thiserror::Error;

use crate::credentials::CredentialKind;
use crate::registry::ServiceName;

/// Failure category, used to pick an exit path and a log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or missing local prerequisite. Aborts before any mutation.
    Precondition,
    /// A service never answered within its wait budget.
    ReadinessTimeout,
    /// A configuration action could not be checked or applied.
    Action,
    /// A verification probe could not run.
    Verification,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Precondition errors ──────────────────────────────────────────
    #[error("Unknown service '{name}' (expected one of: {expected})")]
    UnknownService { name: String, expected: String },

    #[error("Invalid URL for {service}: {source}")]
    InvalidServiceUrl {
        service: ServiceName,
        #[source]
        source: url::ParseError,
    },

    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    // ── Readiness ────────────────────────────────────────────────────
    #[error("{service} did not become reachable after {attempts} attempts")]
    ReadinessTimeout { service: ServiceName, attempts: u32 },

    // ── Action errors ────────────────────────────────────────────────
    #[error("No {kind} available for {service}")]
    MissingCredential {
        service: ServiceName,
        kind: CredentialKind,
    },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot connect: {reason}")]
    ConnectionFailed { reason: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("{message}")]
    ActionFailed { message: String },

    #[error("Cannot write {path}: {source}")]
    Render {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ── Verification ─────────────────────────────────────────────────
    #[error("Verification failed: {message}")]
    Verification { message: String },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownService { .. }
            | Self::InvalidServiceUrl { .. }
            | Self::Precondition { .. } => ErrorKind::Precondition,
            Self::ReadinessTimeout { .. } => ErrorKind::ReadinessTimeout,
            Self::Verification { .. } => ErrorKind::Verification,
            Self::MissingCredential { .. }
            | Self::AuthenticationFailed { .. }
            | Self::ConnectionFailed { .. }
            | Self::Api { .. }
            | Self::ActionFailed { .. }
            | Self::Render { .. } => ErrorKind::Action,
        }
    }

    pub(crate) fn action(message: impl Into<String>) -> Self {
        Self::ActionFailed {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<medialink_api::Error> for CoreError {
    fn from(err: medialink_api::Error) -> Self {
        use medialink_api::Error as ApiError;

        match err {
            ApiError::Authentication { message } => CoreError::AuthenticationFailed { message },
            ApiError::Transport(ref e) if e.is_connect() || e.is_timeout() => {
                CoreError::ConnectionFailed {
                    reason: e.to_string(),
                }
            }
            ApiError::Transport(e) => CoreError::Api {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            ApiError::InvalidUrl(e) => CoreError::Precondition {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::ClientBuild(msg) => CoreError::Precondition {
                message: format!("Cannot build HTTP client: {msg}"),
            },
            ApiError::InvalidHeader(msg) => CoreError::Precondition {
                message: format!("Invalid header: {msg}"),
            },
            ApiError::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            ApiError::Rejected { message } => CoreError::Api {
                message,
                status: None,
            },
            ApiError::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("Unexpected response: {message}"),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_are_action_kind() {
        let err = CoreError::from(medialink_api::Error::Http {
            status: 500,
            message: "boom".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Action);
        assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    }

    #[test]
    fn auth_errors_keep_message() {
        let err = CoreError::from(medialink_api::Error::Authentication {
            message: "Fails.".into(),
        });
        assert_eq!(err.to_string(), "Authentication failed: Fails.");
    }

    #[test]
    fn unknown_service_is_precondition() {
        let err = CoreError::UnknownService {
            name: "plex".into(),
            expected: "sonarr".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }
}
