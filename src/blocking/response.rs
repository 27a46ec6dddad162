//! Blocking response wrappers.

use bytes::Bytes;
use url::Url;

use super::runtime;
use crate::client;
use crate::cookie::Cookie;
use crate::error::Result;

/// Blocking view of a completed response.
pub struct Response {
    inner: client::Response,
}

impl Response {
    pub(crate) fn new(inner: client::Response) -> Self {
        Self { inner }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.inner.status()
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.inner.is_success()
    }

    /// The HTTP version actually negotiated.
    pub fn version(&self) -> &str {
        self.inner.version()
    }

    /// Final URL after redirects.
    pub fn url(&self) -> &Url {
        self.inner.url()
    }

    /// Response headers in arrival order.
    pub fn headers(&self) -> &[(String, String)] {
        self.inner.headers()
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.header(name)
    }

    /// Content length advertised by the server.
    pub fn content_length(&self) -> Option<u64> {
        self.inner.content_length()
    }

    /// Cookies observed on this response.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.inner.cookies()
    }

    /// Buffer the whole body, decompressed. One-shot.
    pub fn bytes(&self) -> Result<Bytes> {
        runtime().block_on(self.inner.bytes())
    }

    /// Body as UTF-8 text. One-shot.
    pub fn text(&self) -> Result<String> {
        runtime().block_on(self.inner.text())
    }

    /// Body deserialized as JSON. One-shot.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        runtime().block_on(self.inner.json())
    }

    /// Take the body as a blocking chunk iterator. One-shot.
    pub fn bytes_iter(&self) -> Result<BlockingBodyIter> {
        Ok(BlockingBodyIter {
            inner: self.inner.bytes_stream()?,
        })
    }
}

/// Blocking iterator over decompressed body chunks.
pub struct BlockingBodyIter {
    inner: client::BodyStream,
}

impl Iterator for BlockingBodyIter {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        runtime().block_on(self.inner.next()).transpose()
    }
}
