use thiserror::Error;

/// Top-level error type for the `medialink-api` crate.
///
/// Covers every failure mode across the service clients: authentication,
/// transport, HTTP status failures, and payload decoding.
/// `medialink-core` maps these into its own error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed or the API key was rejected (HTTP 401/403, qBittorrent "Fails.").
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be built (TLS backend initialisation).
    #[error("Cannot build HTTP client: {0}")]
    ClientBuild(String),

    /// A header value could not be constructed.
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    // ── HTTP ────────────────────────────────────────────────────────
    /// Non-success HTTP status with a body preview.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The service answered successfully but refused the operation
    /// (e.g. SABnzbd `{"status": false}`).
    #[error("Request rejected: {message}")]
    Rejected { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if credentials were rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }
}
