//! Blocking client and request builder.

use std::time::Duration;

use bytes::Bytes;
use http::Method;

use super::response::Response;
use super::runtime;
use super::ws::WebSocket;
use crate::client;
use crate::client::multipart::Form;
use crate::cookie::Cookie;
use crate::error::Result;
use crate::profile::{Impersonate, ImpersonateOs};
use crate::proxy::Proxy;
use crate::version::Version;

/// Blocking HTTP client sharing the async engine's pool and jar.
#[derive(Clone)]
pub struct Client {
    inner: client::Client,
}

impl Client {
    /// Build a client with default settings.
    pub fn new() -> Self {
        Self {
            inner: client::Client::new(),
        }
    }

    /// Start building a blocking client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder {
            inner: client::Client::builder(),
        }
    }

    /// Wrap an existing async client; both handles share state.
    pub fn from_async(inner: client::Client) -> Self {
        Self { inner }
    }

    /// The async client backing this handle.
    pub fn as_async(&self) -> &client::Client {
        &self.inner
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    pub fn head(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    pub fn options(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::OPTIONS, url)
    }

    pub fn trace(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::TRACE, url)
    }

    /// Build a request with an arbitrary method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            inner: self.inner.request(method, url),
        }
    }

    /// Open a WebSocket session, blocking until the upgrade completes.
    pub fn websocket(&self, url: impl Into<String>) -> Result<WebSocket> {
        let builder = self.inner.websocket(url);
        runtime().block_on(builder.send()).map(WebSocket::new)
    }

    /// Swap session defaults for future requests and connections.
    pub fn update(&self, update: client::Update) -> Result<()> {
        self.inner.update(update)
    }

    /// Cookies applicable to a URL.
    pub fn get_cookies(&self, url: &str) -> Result<Vec<Cookie>> {
        self.inner.get_cookies(url)
    }

    /// Store a cookie scoped to a URL.
    pub fn set_cookie(&self, url: &str, cookie: &str) -> Result<()> {
        self.inner.set_cookie(url, cookie)
    }

    /// Drop all cookies.
    pub fn clear_cookies(&self) {
        self.inner.clear_cookies()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the blocking [`Client`]; delegates to the async builder.
pub struct ClientBuilder {
    inner: client::ClientBuilder,
}

macro_rules! delegate_builder {
    ($($(#[$doc:meta])* $name:ident($($arg:ident: $ty:ty),*)),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(mut self, $($arg: $ty),*) -> Self {
                self.inner = self.inner.$name($($arg),*);
                self
            }
        )*
    };
}

impl ClientBuilder {
    delegate_builder! {
        /// Select the impersonation profile.
        impersonate(imp: Impersonate),
        /// Select the impersonated OS.
        impersonate_os(os: ImpersonateOs),
        /// Enable the persistent cookie store.
        cookie_store(enabled: bool),
        /// Add one proxy descriptor.
        proxy(proxy: Proxy),
        /// Replace the proxy list.
        proxies(proxies: Vec<Proxy>),
        /// Ignore all configured proxies.
        no_proxy(),
        /// Refuse plain-HTTP URLs.
        https_only(enabled: bool),
        /// Pin the HTTP version for all requests.
        version(version: Version),
        /// Pin to HTTP/1.1.
        http1_only(),
        /// Pin to HTTP/2.
        http2_only(),
        /// Total per-request deadline.
        timeout(timeout: Duration),
        /// TCP connect + TLS handshake deadline.
        connect_timeout(timeout: Duration),
        /// Per-read deadline.
        read_timeout(timeout: Duration),
        /// Follow redirects.
        allow_redirects(allow: bool),
        /// Redirect hop bound.
        max_redirects(max: u32),
        /// Transport-level retry attempts for idempotent methods.
        retry_count(count: usize),
        /// Emit a Referer header on redirects.
        referer(enabled: bool),
        /// Disable TLS certificate verification. Explicit opt-in.
        danger_accept_invalid_certs(accept: bool),
        /// Add a custom trust anchor (PEM or DER).
        add_root_certificate(cert: Vec<u8>),
        /// Expose the peer certificate on responses.
        tls_info(enabled: bool),
        /// Idle timeout for pooled connections.
        pool_idle_timeout(timeout: Duration),
        /// Idle connections kept per pool key.
        pool_max_idle_per_key(max: usize),
        /// Concurrent connections per pool key.
        pool_max_per_host(max: usize),
    }

    /// Base URL joined with relative request URLs.
    pub fn base_url(mut self, base: impl Into<String>) -> Self {
        self.inner = self.inner.base_url(base);
        self
    }

    /// Override the profile's User-Agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.inner = self.inner.user_agent(ua);
        self
    }

    /// Session default headers.
    pub fn default_headers<I, N, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        self.inner = self.inner.default_headers(headers);
        self
    }

    /// Force a total header order on outgoing requests.
    pub fn headers_order<I: IntoIterator<Item = S>, S: Into<String>>(mut self, order: I) -> Self {
        self.inner = self.inner.headers_order(order);
        self
    }

    /// Validate configuration and build the client.
    pub fn build(self) -> Result<Client> {
        Ok(Client {
            inner: self.inner.build()?,
        })
    }
}

/// Blocking request builder.
pub struct RequestBuilder {
    inner: client::RequestBuilder,
}

impl RequestBuilder {
    /// Add one header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    /// Append query parameters.
    pub fn query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.inner = self.inner.query(pairs);
        self
    }

    /// Raw bytes body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.inner = self.inner.body(body);
        self
    }

    /// Text body.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.inner = self.inner.text(body);
        self
    }

    /// JSON body.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Self {
        self.inner = self.inner.json(value);
        self
    }

    /// URL-encoded form body.
    pub fn form<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.inner = self.inner.form(pairs);
        self
    }

    /// Multipart form body.
    pub fn multipart(mut self, form: Form) -> Self {
        self.inner = self.inner.multipart(form);
        self
    }

    /// Basic authentication.
    pub fn basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.inner = self.inner.basic_auth(username, password);
        self
    }

    /// Bearer token authentication.
    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.inner = self.inner.bearer_auth(token);
        self
    }

    /// Opaque `Authorization` header value.
    pub fn auth(mut self, value: impl Into<String>) -> Self {
        self.inner = self.inner.auth(value);
        self
    }

    /// Pin the HTTP version.
    pub fn version(mut self, version: Version) -> Self {
        self.inner = self.inner.version(version);
        self
    }

    /// Total deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.timeout(timeout);
        self
    }

    /// Per-read deadline.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.read_timeout(timeout);
        self
    }

    /// Route through a specific proxy.
    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.inner = self.inner.proxy(proxy);
        self
    }

    /// Override the redirect policy.
    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.inner = self.inner.allow_redirects(allow);
        self
    }

    /// Send the request, blocking until the response head arrives.
    pub fn send(self) -> Result<Response> {
        runtime().block_on(self.inner.send()).map(Response::new)
    }
}
