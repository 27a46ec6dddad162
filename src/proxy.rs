//! Proxy descriptors and target resolution.
//!
//! Proxy URLs are validated when the descriptor is built, so a malformed
//! configuration fails before any request is issued.

use url::Url;

use crate::error::{Error, Result};

/// Which target schemes a descriptor applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intercept {
    /// Only plain-HTTP targets.
    Http,
    /// Only HTTPS targets.
    Https,
    /// Every target.
    All,
}

/// A proxy server descriptor.
#[derive(Debug, Clone)]
pub struct Proxy {
    intercept: Intercept,
    url: Url,
    basic_auth: Option<(String, String)>,
    custom_headers: Vec<(String, String)>,
    no_proxy: Vec<String>,
}

impl Proxy {
    fn new(intercept: Intercept, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::config(format!("invalid proxy URL {url:?}: {e}")))?;
        match url.scheme() {
            "http" | "https" | "socks5" | "socks5h" => {}
            other => {
                return Err(Error::config(format!(
                    "unsupported proxy scheme {other:?}"
                )))
            }
        }
        if url.host_str().is_none() {
            return Err(Error::config("proxy URL has no host"));
        }
        Ok(Self {
            intercept,
            url,
            basic_auth: None,
            custom_headers: Vec::new(),
            no_proxy: Vec::new(),
        })
    }

    /// Proxy for plain-HTTP targets only.
    pub fn http(url: &str) -> Result<Self> {
        Self::new(Intercept::Http, url)
    }

    /// Proxy for HTTPS targets only.
    pub fn https(url: &str) -> Result<Self> {
        Self::new(Intercept::Https, url)
    }

    /// Proxy for every target.
    pub fn all(url: &str) -> Result<Self> {
        Self::new(Intercept::All, url)
    }

    /// Attach Basic credentials, sent as `Proxy-Authorization`.
    pub fn basic_auth(mut self, username: &str, password: &str) -> Self {
        self.basic_auth = Some((username.to_string(), password.to_string()));
        self
    }

    /// Attach custom headers sent on the proxy hop (CONNECT request or
    /// absolute-form request).
    pub fn custom_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.custom_headers = headers;
        self
    }

    /// Hosts this proxy must not be used for (exact or dot-suffix match).
    pub fn no_proxy(mut self, hosts: Vec<String>) -> Self {
        self.no_proxy = hosts
            .into_iter()
            .map(|h| h.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// The proxy server URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The scheme applicability of this descriptor.
    pub fn intercept(&self) -> Intercept {
        self.intercept
    }

    /// Basic credentials, if configured.
    pub(crate) fn credentials(&self) -> Option<&(String, String)> {
        self.basic_auth.as_ref()
    }

    /// Custom hop headers, if configured.
    pub(crate) fn headers(&self) -> &[(String, String)] {
        &self.custom_headers
    }

    /// Whether this proxy uses the SOCKS5 protocol.
    pub(crate) fn is_socks(&self) -> bool {
        matches!(self.url.scheme(), "socks5" | "socks5h")
    }

    fn excludes(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.no_proxy
            .iter()
            .any(|ex| host == *ex || host.ends_with(&format!(".{ex}")))
    }

    fn applies_to(&self, scheme: &str) -> bool {
        match self.intercept {
            Intercept::All => true,
            Intercept::Http => scheme == "http",
            Intercept::Https => scheme == "https",
        }
    }
}

/// Pick the proxy to use for a target URL.
///
/// Descriptors are considered in declaration order; excluded entries are
/// skipped, a scheme-exact match wins over an `All` wildcard, and the first
/// match is returned.
pub fn resolve<'a>(proxies: &'a [Proxy], target: &Url) -> Option<&'a Proxy> {
    let host = target.host_str()?;
    let scheme = match target.scheme() {
        "ws" => "http",
        "wss" => "https",
        s => s,
    };

    let candidates: Vec<&Proxy> = proxies.iter().filter(|p| !p.excludes(host)).collect();

    candidates
        .iter()
        .find(|p| p.intercept() != Intercept::All && p.applies_to(scheme))
        .or_else(|| candidates.iter().find(|p| p.intercept() == Intercept::All))
        .copied()
}
