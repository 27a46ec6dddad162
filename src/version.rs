//! HTTP version selection.

/// HTTP version preference for a client or a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    /// Negotiate via ALPN: HTTP/2 when offered, HTTP/1.1 otherwise.
    #[default]
    Auto,
    /// Pin to HTTP/1.1 (ALPN offers http/1.1 only).
    Http1,
    /// Pin to HTTP/2 (ALPN offers h2 only; plaintext targets are rejected).
    Http2,
}

impl Version {
    /// Get human-readable version string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Http1 => "HTTP/1.1",
            Self::Http2 => "HTTP/2",
        }
    }

    /// ALPN protocol list to offer for this preference.
    pub(crate) fn alpn(&self) -> &'static [&'static str] {
        match self {
            Self::Auto => &["h2", "http/1.1"],
            Self::Http1 => &["http/1.1"],
            Self::Http2 => &["h2"],
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
