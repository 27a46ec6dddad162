//! Error types for the guise crate.

use std::io;
use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The request phase an error was observed in.
///
/// Carried by transport-level errors so callers can decide whether a retry
/// is safe without parsing error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// DNS resolution or TCP connect.
    Connect,
    /// TLS handshake.
    Handshake,
    /// Sending the request head or body.
    Send,
    /// Receiving the response head or body.
    Receive,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Handshake => write!(f, "handshake"),
            Self::Send => write!(f, "send"),
            Self::Receive => write!(f, "receive"),
        }
    }
}

/// Errors that can occur while configuring or driving a request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration, detected before any I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The (browser, version, OS) selector does not name a catalog profile.
    #[error("Unknown impersonation profile: {0}")]
    UnknownProfile(String),

    /// DNS resolution or TCP connect failure.
    #[error("Connect error ({host}): {message}")]
    Connect { host: String, message: String },

    /// TLS handshake failure.
    #[error("TLS handshake error ({host}): {message}")]
    Tls { host: String, message: String },

    /// The negotiated transport does not match the requested impersonation
    /// profile. Never downgraded to a warning.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// HTTP protocol error (malformed response, framing violation).
    #[error("HTTP protocol error ({phase}): {message}")]
    Http { phase: Phase, message: String },

    /// The response body was already consumed by a buffered accessor or a
    /// stream handle.
    #[error("Response body already consumed")]
    BodyAlreadyConsumed,

    /// Operation on a stream or socket that is already closed.
    #[error("Stream closed: {0}")]
    StreamClosed(String),

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Redirect limit exceeded.
    #[error("Redirect limit exceeded ({count} redirects)")]
    RedirectLimit { count: u32 },

    /// Invalid redirect target.
    #[error("Invalid redirect URL: {0}")]
    InvalidRedirectUrl(String),

    /// Cookie parsing error.
    #[error("Cookie parse error: {0}")]
    CookieParse(String),

    /// Content decoding error.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Total request deadline exceeded.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connect timeout (TCP + TLS handshake).
    #[error("Connect timeout after {0:?}")]
    ConnectTimeout(Duration),

    /// Read timeout (no data received within duration).
    #[error("Read timeout after {0:?}")]
    ReadTimeout(Duration),

    /// Pool acquire timeout (per-host connection cap reached and nothing
    /// was released in time).
    #[error("Pool acquire timeout after {0:?}")]
    PoolAcquireTimeout(Duration),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a connect error for a host.
    pub fn connect(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a TLS error for a host.
    pub fn tls(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tls {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP protocol error in a given phase.
    pub fn http(phase: Phase, message: impl Into<String>) -> Self {
        Self::Http {
            phase,
            message: message.into(),
        }
    }

    /// Create a protocol violation error.
    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::ProtocolViolation(message.into())
    }

    /// Create a WebSocket error.
    pub fn websocket(message: impl Into<String>) -> Self {
        Self::WebSocket(message.into())
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether this error occurred before any request bytes reached the
    /// wire, making a retry safe for idempotent methods.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::Tls { .. }
                | Self::ConnectTimeout(_)
                | Self::Http {
                    phase: Phase::Connect | Phase::Handshake,
                    ..
                }
        )
    }

    /// Whether this error is a timeout of any phase.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::ConnectTimeout(_)
                | Self::ReadTimeout(_)
                | Self::PoolAcquireTimeout(_)
        )
    }
}
