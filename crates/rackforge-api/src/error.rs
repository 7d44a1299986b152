use thiserror::Error;

/// Top-level error type for the `rackforge-api` crate.
///
/// Covers transport failures, authentication rejection, and structured
/// errors returned by the NetBox REST API. `rackforge-core` decides which
/// of these abort a unit of work and which are logged and skipped.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// API token rejected by the backend.
    #[error("Invalid API token")]
    InvalidToken,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Structured error from the REST API (4xx/5xx with a parsed body).
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this error is a uniqueness conflict from a
    /// concurrent writer (the only error class worth a single re-fetch).
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Api {
                status: 400 | 409,
                message,
            } => message.contains("already exists") || message.contains("must be unique"),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 502 || *status == 503 || *status == 504,
            _ => false,
        }
    }
}
