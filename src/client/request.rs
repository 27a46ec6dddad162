//! Request construction.
//!
//! All per-call options are explicit; the body is a tagged union validated
//! when the request is built, so conflicting variants fail before any I/O.

use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use http::Method;

use crate::client::multipart::Form;
use crate::client::Client;
use crate::client::Response;
use crate::error::{Error, Result};
use crate::headers::OrderedHeaders;
use crate::proxy::Proxy;
use crate::version::Version;

/// Request body variants. Exactly one may be set per request.
pub enum Body {
    Empty,
    Bytes(Bytes),
    Text(String),
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Multipart(Form),
    /// Producer-driven body, forwarded without full buffering.
    Stream(BoxStream<'static, Result<Bytes>>),
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Body::Empty"),
            Self::Bytes(b) => write!(f, "Body::Bytes({} bytes)", b.len()),
            Self::Text(t) => write!(f, "Body::Text({} chars)", t.len()),
            Self::Json(_) => f.write_str("Body::Json"),
            Self::Form(pairs) => write!(f, "Body::Form({} pairs)", pairs.len()),
            Self::Multipart(form) => write!(f, "Body::Multipart({} parts)", form.len()),
            Self::Stream(_) => f.write_str("Body::Stream"),
        }
    }
}

/// Authentication to apply to a request.
#[derive(Debug, Clone, Default)]
pub enum Auth {
    #[default]
    None,
    Basic {
        username: String,
        password: Option<String>,
    },
    Bearer(String),
    /// Opaque `Authorization` header value.
    Raw(String),
}

/// A request under construction, bound to a client.
pub struct RequestBuilder {
    pub(crate) client: Client,
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: OrderedHeaders,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Body,
    body_set: bool,
    invalid: Option<String>,
    pub(crate) auth: Auth,
    pub(crate) version: Option<Version>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) proxy: Option<Proxy>,
    pub(crate) allow_redirects: Option<bool>,
}

impl RequestBuilder {
    pub(crate) fn new(client: Client, method: Method, url: impl Into<String>) -> Self {
        Self {
            client,
            method,
            url: url.into(),
            headers: OrderedHeaders::new(),
            query: Vec::new(),
            body: Body::Empty,
            body_set: false,
            invalid: None,
            auth: Auth::None,
            version: None,
            timeout: None,
            read_timeout: None,
            proxy: None,
            allow_redirects: None,
        }
    }

    /// Add one header (overrides profile and session defaults).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add several headers.
    pub fn headers<I, N, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        for (n, v) in headers {
            self.headers.insert(n, v);
        }
        self
    }

    /// Append query parameters to the URL.
    pub fn query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    fn set_body(mut self, body: Body) -> Self {
        if self.body_set {
            self.invalid = Some(
                "conflicting body variants: body/text/json/form/multipart are mutually exclusive"
                    .to_string(),
            );
        } else {
            self.body = body;
            self.body_set = true;
        }
        self
    }

    /// Raw bytes body.
    pub fn body(self, body: impl Into<Bytes>) -> Self {
        self.set_body(Body::Bytes(body.into()))
    }

    /// Text body.
    pub fn text(self, body: impl Into<String>) -> Self {
        self.set_body(Body::Text(body.into()))
    }

    /// JSON body, serialized up front so invalid values fail at build time.
    pub fn json<T: serde::Serialize>(self, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => self.set_body(Body::Json(json)),
            Err(e) => {
                let mut this = self;
                this.invalid = Some(format!("JSON body serialization: {e}"));
                this
            }
        }
    }

    /// URL-encoded form body.
    pub fn form<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.set_body(Body::Form(pairs))
    }

    /// Multipart form body.
    pub fn multipart(self, form: Form) -> Self {
        self.set_body(Body::Multipart(form))
    }

    /// Streaming body produced incrementally.
    pub fn body_stream(self, stream: BoxStream<'static, Result<Bytes>>) -> Self {
        self.set_body(Body::Stream(stream))
    }

    /// Basic authentication.
    pub fn basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.auth = Auth::Basic {
            username: username.into(),
            password,
        };
        self
    }

    /// Bearer token authentication.
    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.auth = Auth::Bearer(token.into());
        self
    }

    /// Opaque `Authorization` header value.
    pub fn auth(mut self, value: impl Into<String>) -> Self {
        self.auth = Auth::Raw(value.into());
        self
    }

    /// Pin the HTTP version for this request.
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Total deadline for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Per-read deadline for this request and its body stream.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Route this request through a specific proxy, bypassing the session
    /// proxy list.
    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Override the session redirect policy for this request.
    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = Some(allow);
        self
    }

    /// Validate the configuration and send the request.
    pub async fn send(self) -> Result<Response> {
        self.validate()?;
        let client = self.client.clone();
        client.execute(self).await
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(message) = &self.invalid {
            return Err(Error::config(message.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicting_bodies_are_a_configuration_error() {
        let client = Client::builder().build().unwrap();
        let builder = client
            .post("http://example.com/")
            .body(&b"raw"[..])
            .text("text");
        assert!(builder.validate().is_err());
    }

    #[test]
    fn single_body_is_accepted() {
        let client = Client::builder().build().unwrap();
        let builder = client.post("http://example.com/").text("text");
        assert!(builder.validate().is_ok());
    }
}
