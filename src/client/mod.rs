//! Asynchronous client front-end.
//!
//! A `Client` owns the connection pool, the cookie jar, and a snapshot of
//! session defaults. `update` swaps the snapshot copy-on-write: requests
//! capture the snapshot when they are built, so in-flight exchanges never
//! observe a torn configuration, and connections pooled under a previous
//! profile are retired by key mismatch rather than mutated.

pub mod multipart;
pub mod request;
pub mod response;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use http::Method;
use url::Url;

use crate::cookie::{Cookie, Jar};
use crate::error::{Error, Result};
use crate::headers::OrderedHeaders;
use crate::pool::{Pool, PoolConfig, PoolKey, PooledTransport};
use crate::profile::{Impersonate, ImpersonateOs, Profile};
use crate::proxy::{self, Proxy};
use crate::transport::connector::{Alpn, Connector, MaybeTlsStream, TlsOptions};
use crate::transport::h1::{H1Connection, OutBody, RequestTarget, ResponseHead};
use crate::transport::h2::H2Connection;
use crate::transport::proxy::{establish, ProxyMode};
use crate::transport::tcp::TcpOptions;
use crate::version::Version;
use crate::ws::WebSocketBuilder;

pub use multipart::{Form, Part};
pub use request::{Auth, Body, RequestBuilder};
pub use response::{BodyStream, Response};

/// Session defaults captured per request build.
#[derive(Clone)]
pub(crate) struct Defaults {
    pub profile: Profile,
    pub default_headers: OrderedHeaders,
    pub headers_order: Option<Vec<String>>,
    pub proxies: Vec<Proxy>,
    pub no_proxy: bool,
}

/// Settings fixed for the lifetime of a client.
pub(crate) struct Fixed {
    pub base_url: Option<Url>,
    pub https_only: bool,
    pub version: Version,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub allow_redirects: bool,
    pub max_redirects: u32,
    pub retry_count: usize,
    pub referer: bool,
    pub danger_accept_invalid_certs: bool,
    pub root_certs: Vec<Vec<u8>>,
    pub tls_info: bool,
    pub tcp: TcpOptions,
}

pub(crate) struct ClientInner {
    pub defaults: RwLock<Arc<Defaults>>,
    pub fixed: Fixed,
    pub pool: Arc<Pool>,
    pub jar: Arc<Jar>,
}

/// Reconfiguration applied by [`Client::update`].
///
/// Only the listed fields change; everything else keeps its value.
#[derive(Default)]
pub struct Update {
    pub impersonate: Option<Impersonate>,
    pub impersonate_os: Option<ImpersonateOs>,
    pub headers: Option<OrderedHeaders>,
    pub headers_order: Option<Vec<String>>,
    pub proxies: Option<Vec<Proxy>>,
}

/// Asynchronous HTTP client with browser impersonation.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl Client {
    /// Start building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Build a client with default settings (Chrome profile, cookies off).
    pub fn new() -> Self {
        Self::builder().build().expect("default client configuration is valid")
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
        RequestBuilder::new(self.clone(), method, url)
    }

    /// Start a WebSocket upgrade.
    pub fn websocket(&self, url: impl Into<String>) -> WebSocketBuilder {
        WebSocketBuilder::new(self.clone(), url.into())
    }

    /// Swap session defaults for future requests and connections.
    pub fn update(&self, update: Update) -> Result<()> {
        let mut guard = self.inner.defaults.write().unwrap();
        let current = guard.as_ref().clone();

        let profile = match (update.impersonate, update.impersonate_os) {
            (None, None) => current.profile,
            (imp, os) => Profile::lookup(
                imp.unwrap_or(current.profile.impersonate),
                Some(os.unwrap_or(current.profile.os)),
            )?,
        };

        *guard = Arc::new(Defaults {
            profile,
            default_headers: update.headers.unwrap_or(current.default_headers),
            headers_order: update.headers_order.or(current.headers_order),
            proxies: update.proxies.unwrap_or(current.proxies),
            no_proxy: current.no_proxy,
        });
        Ok(())
    }

    /// The cookie jar (inert unless the client was built with
    /// `cookie_store(true)`).
    pub fn jar(&self) -> &Jar {
        &self.inner.jar
    }

    /// Cookies applicable to a URL.
    pub fn get_cookies(&self, url: &str) -> Result<Vec<Cookie>> {
        let url = Url::parse(url)?;
        Ok(self.inner.jar.cookies_for_url(&url))
    }

    /// Store a cookie scoped to a URL.
    pub fn set_cookie(&self, url: &str, cookie: &str) -> Result<()> {
        let url = Url::parse(url)?;
        self.inner.jar.add_cookie_str(cookie, &url)
    }

    /// Drop all cookies.
    pub fn clear_cookies(&self) {
        self.inner.jar.clear();
    }

    /// The impersonation profile currently selected.
    pub fn profile(&self) -> Profile {
        self.inner.defaults.read().unwrap().profile
    }

    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        request.validate()?;
        let snapshot = self.inner.defaults.read().unwrap().clone();
        let total_timeout = request.timeout.or(self.inner.fixed.timeout);

        let fut = self.execute_with_snapshot(request, snapshot);
        match total_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| Error::Timeout(timeout))?,
            None => fut.await,
        }
    }

    async fn execute_with_snapshot(
        &self,
        request: RequestBuilder,
        snapshot: Arc<Defaults>,
    ) -> Result<Response> {
        let fixed = &self.inner.fixed;
        let mut url = self.resolve_url(&request.url)?;
        if fixed.https_only && url.scheme() != "https" {
            return Err(Error::config(format!(
                "https_only client refused {} URL",
                url.scheme()
            )));
        }

        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        // Merge precedence: profile defaults, session defaults, per-call.
        let mut headers: OrderedHeaders = snapshot.profile.default_headers().into_iter().collect();
        headers.merge(&snapshot.default_headers);
        headers.merge(&request.headers);

        match &request.auth {
            Auth::None => {}
            Auth::Basic { username, password } => {
                let plain = format!("{username}:{}", password.as_deref().unwrap_or(""));
                headers.insert("Authorization", format!("Basic {}", BASE64.encode(plain)));
            }
            Auth::Bearer(token) => {
                headers.insert("Authorization", format!("Bearer {token}"));
            }
            Auth::Raw(value) => {
                headers.insert("Authorization", value.clone());
            }
        }

        let (mut send_body, content_type) = encode_body(request.body)?;
        if let Some(ct) = content_type {
            headers.insert_if_absent("Content-Type", ct);
        }
        if let Some(order) = &snapshot.headers_order {
            headers.apply_order(order);
        }

        let allow_redirects = request
            .allow_redirects
            .unwrap_or(fixed.allow_redirects);
        let read_timeout = request.read_timeout.or(fixed.read_timeout);
        let version = request.version.unwrap_or(fixed.version);

        let mut method = request.method.clone();
        let mut redirects = 0u32;

        loop {
            let mut hop_headers = headers.clone();
            if let Some(cookie) = self.inner.jar.cookie_header(&url) {
                hop_headers.insert_if_absent("Cookie", cookie);
            }

            let (head, source, peer_cert) = self
                .send_with_retries(
                    &method,
                    &url,
                    &hop_headers,
                    &mut send_body,
                    &snapshot,
                    request.proxy.as_ref(),
                    version,
                )
                .await?;

            self.inner.jar.store_response_cookies(
                head.header_values("set-cookie"),
                &url,
            );

            let is_redirect = matches!(head.status, 301 | 302 | 303 | 307 | 308);
            if is_redirect && allow_redirects {
                if let Some(location) = head.header("location").map(str::to_string) {
                    redirects += 1;
                    if redirects > fixed.max_redirects {
                        return Err(Error::RedirectLimit { count: redirects });
                    }

                    // Drain so the connection can be reused, then hop.
                    drain_for_reuse(source).await;

                    let next = url
                        .join(&location)
                        .map_err(|_| Error::InvalidRedirectUrl(location.clone()))?;
                    if !matches!(next.scheme(), "http" | "https") {
                        return Err(Error::InvalidRedirectUrl(location));
                    }

                    // 303 always becomes GET; browsers also rewrite POST on
                    // 301/302.
                    if head.status == 303
                        || (matches!(head.status, 301 | 302) && method == Method::POST)
                    {
                        method = Method::GET;
                        send_body = SendBody::None;
                        headers.remove("content-type");
                        headers.remove("content-length");
                    }

                    if next.host_str() != url.host_str() {
                        headers.remove("authorization");
                    }
                    if fixed.referer && !(url.scheme() == "https" && next.scheme() == "http") {
                        let mut referer = url.clone();
                        referer.set_fragment(None);
                        let _ = referer.set_username("");
                        let _ = referer.set_password(None);
                        headers.insert("Referer", referer.to_string());
                    }

                    tracing::debug!(status = head.status, from = %url, to = %next, "following redirect");
                    url = next;
                    continue;
                }
            }

            return Ok(Response::new(
                head.status,
                head.version,
                url,
                head.headers,
                source,
                read_timeout,
                peer_cert,
            ));
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_with_retries(
        &self,
        method: &Method,
        url: &Url,
        headers: &OrderedHeaders,
        body: &mut SendBody,
        snapshot: &Defaults,
        proxy_override: Option<&Proxy>,
        version: Version,
    ) -> Result<(ResponseHead, response::BodySource, Option<Vec<u8>>)> {
        let resolved_proxy = match proxy_override {
            Some(p) => Some(p.clone()),
            None if snapshot.no_proxy => None,
            None => proxy::resolve(&snapshot.proxies, url).cloned(),
        };

        let host = url
            .host_str()
            .ok_or_else(|| Error::config("URL has no host"))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::config("URL has no port"))?;
        let key = PoolKey {
            scheme: url.scheme().to_string(),
            host: host.clone(),
            port,
            proxy: resolved_proxy.as_ref().map(|p| p.url().to_string()),
            profile: (snapshot.profile.impersonate, snapshot.profile.os),
        };

        // Streaming bodies are single-shot; everything else may retry.
        let max_attempts = if matches!(body, SendBody::Stream(_)) {
            1
        } else if is_idempotent(method) {
            1 + self.inner.fixed.retry_count
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let out_body = body.materialize()?;
            match self
                .try_send(
                    method,
                    url,
                    headers,
                    out_body,
                    &key,
                    resolved_proxy.as_ref(),
                    version,
                    snapshot,
                )
                .await
            {
                Ok(result) => return Ok(result),
                Err((e, reused)) => {
                    let transport_failure = e.is_retryable()
                        || matches!(
                            e,
                            Error::Http {
                                phase: crate::error::Phase::Send,
                                ..
                            }
                        )
                        || (reused && is_idempotent(method));
                    let retryable = attempt < max_attempts
                        && !matches!(body, SendBody::Stream(_))
                        && transport_failure;
                    if !retryable {
                        return Err(e);
                    }
                    tracing::debug!(host = %key.host, attempt, "retrying after transport failure: {e}");
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_send(
        &self,
        method: &Method,
        url: &Url,
        headers: &OrderedHeaders,
        body: OutBody,
        key: &PoolKey,
        proxy: Option<&Proxy>,
        version: Version,
        snapshot: &Defaults,
    ) -> std::result::Result<
        (ResponseHead, response::BodySource, Option<Vec<u8>>),
        (Error, bool),
    > {
        let mut acquired = self
            .inner
            .pool
            .acquire(key)
            .await
            .map_err(|e| (e, false))?;

        let (transport, mode, reused) = match acquired.take_idle() {
            Some((transport, mode)) => (transport, mode, true),
            None => {
                let (transport, mode) = self
                    .dial(key, proxy, version, snapshot)
                    .await
                    .map_err(|e| (e, false))?;
                (transport, mode, false)
            }
        };

        let mut checkout = acquired.into_checkout(transport, mode.clone());

        let mut wire_headers = headers.to_vec();
        if let ProxyMode::Forward { headers: hop } = &mode {
            wire_headers.extend(hop.iter().cloned());
        }

        let tls_info = self.inner.fixed.tls_info;
        let is_h1 = matches!(checkout.transport_mut(), PooledTransport::H1(_));
        if is_h1 {
            let target = match &mode {
                ProxyMode::Forward { .. } => {
                    let mut absolute = url.clone();
                    absolute.set_fragment(None);
                    RequestTarget::Absolute(absolute.to_string())
                }
                _ => {
                    let mut target = url.path().to_string();
                    if let Some(query) = url.query() {
                        target.push('?');
                        target.push_str(query);
                    }
                    RequestTarget::Origin(target)
                }
            };
            let host_header = host_header(url);
            let (head, peer_cert) = {
                let PooledTransport::H1(conn) = checkout.transport_mut() else {
                    unreachable!("checked above");
                };
                let head = conn
                    .send_request(method, &target, &host_header, &wire_headers, body)
                    .await
                    .map_err(|e| (e, reused))?;
                let peer_cert = tls_info.then(|| conn.peer_certificate()).flatten();
                (head, peer_cert)
            };
            Ok((head, response::BodySource::H1(checkout), peer_cert))
        } else {
            let (head, h2_body) = {
                let PooledTransport::H2(conn) = checkout.transport_mut() else {
                    unreachable!("checked above");
                };
                conn.send_request(method, url, &wire_headers, body)
                    .await
                    .map_err(|e| (e, reused))?
            };
            Ok((
                head,
                response::BodySource::H2 {
                    checkout,
                    body: h2_body,
                },
                None,
            ))
        }
    }

    /// Establish a new transport for a pool key.
    async fn dial(
        &self,
        key: &PoolKey,
        proxy: Option<&Proxy>,
        version: Version,
        snapshot: &Defaults,
    ) -> Result<(PooledTransport, ProxyMode)> {
        let fixed = &self.inner.fixed;
        let is_tls = key.scheme == "https" || key.scheme == "wss";

        let dial_fut = async {
            let (tcp, mode) = establish(proxy, &key.host, key.port, is_tls, &fixed.tcp).await?;

            let stream = if is_tls {
                let options = TlsOptions {
                    danger_accept_invalid_certs: fixed.danger_accept_invalid_certs,
                    root_certs: fixed.root_certs.clone(),
                    alpn_override: match version {
                        Version::Auto => None,
                        pinned => Some(pinned.alpn().to_vec()),
                    },
                };
                Connector::new(snapshot.profile.tls, options)
                    .handshake(tcp, &key.host)
                    .await?
            } else {
                MaybeTlsStream::Plain(tcp)
            };

            let use_h2 = match (version, stream.alpn()) {
                (Version::Http1, _) => false,
                (Version::Http2, Alpn::H2) => true,
                // Cleartext h2 pin means prior-knowledge HTTP/2.
                (Version::Http2, Alpn::None) if !is_tls => true,
                (Version::Http2, negotiated) => {
                    return Err(Error::protocol_violation(format!(
                        "HTTP/2 pinned but server negotiated {negotiated:?}"
                    )))
                }
                (Version::Auto, Alpn::H2) => true,
                (Version::Auto, _) => false,
            };

            let transport = if use_h2 {
                tracing::debug!(host = %key.host, "HTTP/2 connection established");
                PooledTransport::H2(H2Connection::connect(stream, snapshot.profile.http2).await?)
            } else {
                tracing::debug!(host = %key.host, "HTTP/1.1 connection established");
                PooledTransport::H1(H1Connection::new(stream))
            };
            Ok((transport, mode))
        };

        match fixed.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, dial_fut)
                .await
                .map_err(|_| Error::ConnectTimeout(timeout))?,
            None => dial_fut.await,
        }
    }

    fn resolve_url(&self, raw: &str) -> Result<Url> {
        match &self.inner.fixed.base_url {
            Some(base) => base.join(raw).map_err(Error::from),
            None => Url::parse(raw).map_err(Error::from),
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // Last handle gone: close idle pooled connections.
        self.pool.clear_idle();
    }
}

/// Host header value: host, plus port when non-default.
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or("");
    match (url.port(), url.scheme()) {
        (Some(port), _) => format!("{host}:{port}"),
        (None, _) => host.to_string(),
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET
            | Method::HEAD
            | Method::PUT
            | Method::DELETE
            | Method::OPTIONS
            | Method::TRACE
    )
}

/// Drain a response body so its connection can return to the pool; give up
/// past a bounded size and discard the transport instead.
async fn drain_for_reuse(mut source: response::BodySource) {
    const MAX_DRAIN: usize = 256 * 1024;
    let mut drained = 0;
    loop {
        match source.next_raw().await {
            Ok(Some(chunk)) => {
                drained += chunk.len();
                if drained > MAX_DRAIN {
                    return; // dropped: too expensive to drain
                }
            }
            Ok(None) => {
                source.release();
                return;
            }
            Err(_) => return,
        }
    }
}

/// Encoded request body, re-materializable per retry attempt.
pub(crate) enum SendBody {
    None,
    Full(Bytes),
    Stream(Option<futures_util::stream::BoxStream<'static, Result<Bytes>>>),
}

impl SendBody {
    fn materialize(&mut self) -> Result<OutBody> {
        match self {
            Self::None => Ok(OutBody::Empty),
            Self::Full(bytes) => Ok(OutBody::Full(bytes.clone())),
            Self::Stream(producer) => producer
                .take()
                .map(OutBody::Chunked)
                .ok_or_else(|| Error::StreamClosed("streaming body already consumed".into())),
        }
    }
}

/// Encode a request body variant into wire form and implied content type.
fn encode_body(body: Body) -> Result<(SendBody, Option<String>)> {
    match body {
        Body::Empty => Ok((SendBody::None, None)),
        Body::Bytes(bytes) => Ok((SendBody::Full(bytes), None)),
        Body::Text(text) => Ok((SendBody::Full(Bytes::from(text.into_bytes())), None)),
        Body::Json(value) => {
            let bytes = serde_json::to_vec(&value)?;
            Ok((
                SendBody::Full(Bytes::from(bytes)),
                Some("application/json".to_string()),
            ))
        }
        Body::Form(pairs) => {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            Ok((
                SendBody::Full(Bytes::from(encoded.into_bytes())),
                Some("application/x-www-form-urlencoded".to_string()),
            ))
        }
        Body::Multipart(form) => {
            let (content_type, bytes) = form.encode();
            Ok((SendBody::Full(bytes), Some(content_type)))
        }
        Body::Stream(producer) => Ok((SendBody::Stream(Some(producer)), None)),
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    impersonate: Impersonate,
    impersonate_os: Option<ImpersonateOs>,
    base_url: Option<String>,
    user_agent: Option<String>,
    default_headers: OrderedHeaders,
    headers_order: Option<Vec<String>>,
    cookie_store: bool,
    proxies: Vec<Proxy>,
    no_proxy: bool,
    https_only: bool,
    version: Version,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    allow_redirects: bool,
    max_redirects: u32,
    retry_count: usize,
    referer: bool,
    danger_accept_invalid_certs: bool,
    root_certs: Vec<Vec<u8>>,
    tls_info: bool,
    tcp_nodelay: bool,
    tcp_keepalive: Option<Duration>,
    local_address: Option<std::net::IpAddr>,
    pool: PoolConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            impersonate: Impersonate::default(),
            impersonate_os: None,
            base_url: None,
            user_agent: None,
            default_headers: OrderedHeaders::new(),
            headers_order: None,
            cookie_store: false,
            proxies: Vec::new(),
            no_proxy: false,
            https_only: false,
            version: Version::Auto,
            timeout: None,
            connect_timeout: None,
            read_timeout: None,
            allow_redirects: true,
            max_redirects: 10,
            retry_count: 2,
            referer: true,
            danger_accept_invalid_certs: false,
            root_certs: Vec::new(),
            tls_info: false,
            tcp_nodelay: true,
            tcp_keepalive: None,
            local_address: None,
            pool: PoolConfig::default(),
        }
    }

    /// Select the impersonation profile.
    pub fn impersonate(mut self, imp: Impersonate) -> Self {
        self.impersonate = imp;
        self
    }

    /// Select the impersonated OS.
    pub fn impersonate_os(mut self, os: ImpersonateOs) -> Self {
        self.impersonate_os = Some(os);
        self
    }

    /// Base URL joined with relative request URLs.
    pub fn base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = Some(base.into());
        self
    }

    /// Override the profile's User-Agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Session default headers (override profile defaults, overridden by
    /// per-call headers).
    pub fn default_headers<I, N, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        for (n, v) in headers {
            self.default_headers.insert(n, v);
        }
        self
    }

    /// Force a total header order on outgoing requests.
    pub fn headers_order<I: IntoIterator<Item = S>, S: Into<String>>(mut self, order: I) -> Self {
        self.headers_order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    /// Enable the persistent cookie store.
    pub fn cookie_store(mut self, enabled: bool) -> Self {
        self.cookie_store = enabled;
        self
    }

    /// Add one proxy descriptor.
    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.proxies.push(proxy);
        self
    }

    /// Replace the proxy list.
    pub fn proxies(mut self, proxies: Vec<Proxy>) -> Self {
        self.proxies = proxies;
        self
    }

    /// Ignore all configured proxies.
    pub fn no_proxy(mut self) -> Self {
        self.no_proxy = true;
        self
    }

    /// Refuse plain-HTTP URLs.
    pub fn https_only(mut self, enabled: bool) -> Self {
        self.https_only = enabled;
        self
    }

    /// Pin the HTTP version for all requests.
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Pin to HTTP/1.1.
    pub fn http1_only(mut self) -> Self {
        self.version = Version::Http1;
        self
    }

    /// Pin to HTTP/2.
    pub fn http2_only(mut self) -> Self {
        self.version = Version::Http2;
        self
    }

    /// Total per-request deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// TCP connect + TLS handshake deadline.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Per-read deadline.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Follow redirects (default true, bounded by `max_redirects`).
    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = allow;
        self
    }

    /// Redirect hop bound (default 10).
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }

    /// Transport-level retry attempts for idempotent methods (default 2).
    pub fn retry_count(mut self, count: usize) -> Self {
        self.retry_count = count;
        self
    }

    /// Emit a Referer header on redirects (default true).
    pub fn referer(mut self, enabled: bool) -> Self {
        self.referer = enabled;
        self
    }

    /// Disable TLS certificate verification. Explicit opt-in.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Add a custom trust anchor (PEM or DER).
    pub fn add_root_certificate(mut self, cert: Vec<u8>) -> Self {
        self.root_certs.push(cert);
        self
    }

    /// Expose the peer certificate on responses.
    pub fn tls_info(mut self, enabled: bool) -> Self {
        self.tls_info = enabled;
        self
    }

    /// Set `TCP_NODELAY` (default true).
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Enable TCP keepalive with an interval.
    pub fn tcp_keepalive(mut self, interval: Duration) -> Self {
        self.tcp_keepalive = Some(interval);
        self
    }

    /// Bind outgoing connections to a local address.
    pub fn local_address(mut self, addr: std::net::IpAddr) -> Self {
        self.local_address = Some(addr);
        self
    }

    /// Idle timeout for pooled connections.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool.idle_timeout = timeout;
        self
    }

    /// Idle connections kept per pool key.
    pub fn pool_max_idle_per_key(mut self, max: usize) -> Self {
        self.pool.max_idle_per_key = max;
        self
    }

    /// Concurrent connections per pool key; acquisition beyond this waits.
    pub fn pool_max_per_host(mut self, max: usize) -> Self {
        self.pool.max_per_key = max;
        self
    }

    /// Deadline for waiting on a pool slot.
    pub fn pool_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.pool.acquire_timeout = Some(timeout);
        self
    }

    /// Validate configuration and build the client.
    pub fn build(self) -> Result<Client> {
        let profile = Profile::lookup(self.impersonate, self.impersonate_os)?;

        let base_url = match &self.base_url {
            Some(raw) => {
                let url = Url::parse(raw)
                    .map_err(|e| Error::config(format!("invalid base_url {raw:?}: {e}")))?;
                Some(url)
            }
            None => None,
        };

        let mut default_headers = self.default_headers;
        if let Some(ua) = self.user_agent {
            default_headers.insert("User-Agent", ua);
        }

        let defaults = Defaults {
            profile,
            default_headers,
            headers_order: self.headers_order,
            proxies: self.proxies,
            no_proxy: self.no_proxy,
        };

        let fixed = Fixed {
            base_url,
            https_only: self.https_only,
            version: self.version,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            allow_redirects: self.allow_redirects,
            max_redirects: self.max_redirects,
            retry_count: self.retry_count,
            referer: self.referer,
            danger_accept_invalid_certs: self.danger_accept_invalid_certs,
            root_certs: self.root_certs,
            tls_info: self.tls_info,
            tcp: TcpOptions {
                nodelay: self.tcp_nodelay,
                keepalive: self.tcp_keepalive,
                local_address: self.local_address,
            },
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                defaults: RwLock::new(Arc::new(defaults)),
                fixed,
                pool: Arc::new(Pool::new(self.pool)),
                jar: Arc::new(Jar::new(self.cookie_store)),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_bad_base_url() {
        let err = Client::builder().base_url("not a url").build().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn builder_rejects_unknown_profile_combination() {
        let err = Client::builder()
            .impersonate(Impersonate::Safari18)
            .impersonate_os(ImpersonateOs::Windows)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownProfile(_)));
    }

    #[test]
    fn update_swaps_profile_for_future_connections() {
        let client = Client::builder()
            .impersonate(Impersonate::Chrome131)
            .build()
            .unwrap();
        assert_eq!(client.profile().impersonate, Impersonate::Chrome131);

        client
            .update(Update {
                impersonate: Some(Impersonate::Firefox133),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(client.profile().impersonate, Impersonate::Firefox133);
    }

    #[test]
    fn update_preserves_unnamed_fields() {
        let client = Client::builder()
            .default_headers([("X-Token", "abc")])
            .build()
            .unwrap();

        client
            .update(Update {
                impersonate: Some(Impersonate::Safari18),
                ..Default::default()
            })
            .unwrap();

        let defaults = client.inner.defaults.read().unwrap();
        assert_eq!(defaults.default_headers.get("x-token"), Some("abc"));
    }

    #[test]
    fn snapshot_is_isolated_from_update() {
        let client = Client::new();
        let before = client.inner.defaults.read().unwrap().clone();
        client
            .update(Update {
                impersonate: Some(Impersonate::Firefox128),
                ..Default::default()
            })
            .unwrap();
        // The captured snapshot keeps the old profile.
        assert_eq!(before.profile.impersonate, Impersonate::Chrome131);
    }

    #[test]
    fn is_idempotent_classification() {
        assert!(is_idempotent(&Method::GET));
        assert!(is_idempotent(&Method::PUT));
        assert!(!is_idempotent(&Method::POST));
        assert!(!is_idempotent(&Method::PATCH));
    }

    #[test]
    fn host_header_includes_explicit_port() {
        let url = Url::parse("http://example.com:8080/x").unwrap();
        assert_eq!(host_header(&url), "example.com:8080");
        let url = Url::parse("https://example.com/x").unwrap();
        assert_eq!(host_header(&url), "example.com");
    }
}
