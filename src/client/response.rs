//! Response handling: buffered accessors and the streaming path.
//!
//! The body rides on a checked-out pooled connection. Draining it to the
//! end hands the connection back for reuse; dropping a stream early
//! discards the transport instead of returning it dirty.

use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use url::Url;

use crate::cookie::Cookie;
use crate::decoder::{decode_full, Decoder, Encoding};
use crate::error::{Error, Result};
use crate::pool::{Checkout, PooledTransport};
use crate::transport::h2::H2Body;

/// Transport-side source of body chunks.
pub(crate) enum BodySource {
    H1(Checkout),
    H2 { checkout: Checkout, body: H2Body },
}

impl BodySource {
    /// Next transfer-decoded chunk from the wire.
    pub(crate) async fn next_raw(&mut self) -> Result<Option<Bytes>> {
        match self {
            Self::H1(checkout) => match checkout.transport_mut() {
                PooledTransport::H1(conn) => conn.read_body_chunk().await,
                PooledTransport::H2(_) => unreachable!("h1 source over h2 transport"),
            },
            Self::H2 { body, .. } => body.read_chunk().await,
        }
    }

    /// Hand the connection back to the pool once fully drained.
    pub(crate) fn release(self) {
        match self {
            Self::H1(checkout) => checkout.release(),
            Self::H2 { checkout, .. } => checkout.release(),
        }
    }
}

/// A completed HTTP response.
pub struct Response {
    status: u16,
    version: String,
    url: Url,
    /// Headers in arrival order.
    headers: Vec<(String, String)>,
    body: Mutex<Option<BodySource>>,
    encoding: Encoding,
    read_timeout: Option<Duration>,
    peer_certificate: Option<Vec<u8>>,
}

impl Response {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        status: u16,
        version: String,
        url: Url,
        headers: Vec<(String, String)>,
        body: BodySource,
        read_timeout: Option<Duration>,
        peer_certificate: Option<Vec<u8>>,
    ) -> Self {
        let encoding = Encoding::from_header(
            headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case("content-encoding"))
                .map(|(_, v)| v.as_str()),
        );
        Self {
            status,
            version,
            url,
            headers,
            body: Mutex::new(Some(body)),
            encoding,
            read_timeout,
            peer_certificate,
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The HTTP version actually negotiated.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Final URL after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Response headers in arrival order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Content length advertised by the server, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    /// Cookies observed on this response.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("set-cookie"))
            .filter_map(|(_, v)| Cookie::parse_set_cookie(v, &self.url).ok())
            .collect()
    }

    /// DER bytes of the peer TLS certificate, when the client was built
    /// with `tls_info(true)`.
    pub fn peer_certificate(&self) -> Option<&[u8]> {
        self.peer_certificate.as_deref()
    }

    fn take_body(&self) -> Result<BodySource> {
        self.body
            .lock()
            .unwrap()
            .take()
            .ok_or(Error::BodyAlreadyConsumed)
    }

    /// Buffer the whole body, decompressed.
    ///
    /// Consumes the body: any later accessor or stream call fails with
    /// [`Error::BodyAlreadyConsumed`].
    pub async fn bytes(&self) -> Result<Bytes> {
        let mut source = self.take_body()?;
        let mut raw = Vec::new();
        loop {
            let chunk = self.with_read_timeout(source.next_raw()).await;
            match chunk {
                Ok(Some(chunk)) => raw.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => return Err(e),
            }
        }
        source.release();
        decode_full(self.encoding, &raw)
    }

    /// Body as UTF-8 text (lossy).
    pub async fn text(&self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Body deserialized as JSON.
    pub async fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(Error::from)
    }

    /// Take the body as a lazy chunk stream.
    ///
    /// Single-pass and forward-only; restarting requires a new request.
    pub fn bytes_stream(&self) -> Result<BodyStream> {
        let source = self.take_body()?;
        Ok(BodyStream {
            source: Some(source),
            decoder: Some(Decoder::new(self.encoding)?),
            read_timeout: self.read_timeout,
        })
    }

    async fn with_read_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| Error::ReadTimeout(timeout))?,
            None => fut.await,
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("version", &self.version)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers.len())
            .finish()
    }
}

/// Lazy, forward-only stream of decompressed body chunks.
///
/// Dropping the stream before exhaustion discards the underlying
/// connection; only a fully drained stream returns it to the pool.
pub struct BodyStream {
    source: Option<BodySource>,
    decoder: Option<Decoder>,
    read_timeout: Option<Duration>,
}

impl BodyStream {
    /// Next decompressed chunk; `None` once the body is exhausted.
    pub async fn next(&mut self) -> Result<Option<Bytes>> {
        loop {
            let Some(source) = self.source.as_mut() else {
                return Ok(None);
            };

            let chunk = match self.read_timeout {
                Some(timeout) => tokio::time::timeout(timeout, source.next_raw())
                    .await
                    .map_err(|_| Error::ReadTimeout(timeout))?,
                None => source.next_raw().await,
            }?;

            match chunk {
                Some(raw) => {
                    let decoder = self
                        .decoder
                        .as_mut()
                        .expect("decoder lives as long as the source");
                    let decoded = decoder.feed(&raw)?;
                    if decoded.is_empty() {
                        // Compressed input that produced no output yet.
                        continue;
                    }
                    return Ok(Some(decoded));
                }
                None => {
                    // Exhausted: flush the decoder tail and release the
                    // connection for reuse.
                    let source = self.source.take().expect("checked above");
                    source.release();
                    let tail = self
                        .decoder
                        .take()
                        .expect("decoder lives as long as the source")
                        .finish()?;
                    if tail.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(tail));
                }
            }
        }
    }
}
