//! HTTP/1.1 connection with hand-written framing.
//!
//! Requests are serialized manually so header order and casing reach the
//! wire exactly as the fingerprint dictates. Responses are parsed with
//! httparse; the body is exposed as an incremental chunk reader so the
//! streaming path never buffers a whole payload.

use bytes::Bytes;
use futures_util::StreamExt;
use http::Method;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Phase, Result};
use crate::transport::connector::MaybeTlsStream;

/// Maximum response head size (64KB).
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Maximum number of response headers.
const MAX_HEADERS_COUNT: usize = 100;

/// Read buffer granularity.
const READ_CHUNK: usize = 16 * 1024;

/// Parsed response head.
#[derive(Debug)]
pub struct ResponseHead {
    pub status: u16,
    pub version: String,
    /// Headers in arrival order.
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header, case-insensitive.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Request target form on the wire.
#[derive(Debug, Clone)]
pub enum RequestTarget {
    /// origin-form: `/path?query` (direct or tunneled connections).
    Origin(String),
    /// absolute-form: full URL (plain-HTTP forward proxies).
    Absolute(String),
}

/// Outgoing request body at the transport level.
pub enum OutBody {
    Empty,
    /// Fully materialized; sent with Content-Length.
    Full(Bytes),
    /// Producer-driven; sent with chunked transfer encoding.
    Chunked(futures_util::stream::BoxStream<'static, Result<Bytes>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// No response in flight.
    Idle,
    FixedBody { remaining: u64 },
    ChunkedSize,
    ChunkedData { remaining: u64 },
    ChunkedTrailer,
    /// Body delimited by connection close.
    ReadToEnd,
    /// Body fully drained; connection may be reused.
    Done,
}

/// One HTTP/1.1 connection over a (possibly TLS) stream.
pub struct H1Connection {
    stream: MaybeTlsStream,
    /// Bytes read past what the parser consumed.
    buffer: Vec<u8>,
    state: ReadState,
    should_close: bool,
}

impl H1Connection {
    pub fn new(stream: MaybeTlsStream) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            state: ReadState::Idle,
            should_close: false,
        }
    }

    /// Whether the previous response was fully drained and keep-alive holds.
    pub fn is_reusable(&self) -> bool {
        !self.should_close && self.state == ReadState::Done
    }

    /// Consume the connection after a 101 upgrade, returning the raw
    /// stream and any bytes read past the response head.
    pub fn into_upgraded(self) -> (MaybeTlsStream, Vec<u8>) {
        (self.stream, self.buffer)
    }

    /// Peer certificate of the underlying TLS session, if any.
    pub fn peer_certificate(&self) -> Option<Vec<u8>> {
        self.stream.peer_certificate()
    }

    /// Send a request head and body, then read the response head.
    ///
    /// Leaves the connection positioned at the start of the response body;
    /// drive [`read_body_chunk`](Self::read_body_chunk) until it returns
    /// `None` before reusing the connection.
    pub async fn send_request(
        &mut self,
        method: &Method,
        target: &RequestTarget,
        host_header: &str,
        headers: &[(String, String)],
        body: OutBody,
    ) -> Result<ResponseHead> {
        self.state = ReadState::Idle;

        let head = self.build_head(method, target, host_header, headers, &body);
        self.stream
            .write_all(&head)
            .await
            .map_err(|e| Error::http(Phase::Send, format!("write head: {e}")))?;

        match body {
            OutBody::Empty => {}
            OutBody::Full(bytes) => {
                self.stream
                    .write_all(&bytes)
                    .await
                    .map_err(|e| Error::http(Phase::Send, format!("write body: {e}")))?;
            }
            OutBody::Chunked(mut chunks) => {
                while let Some(chunk) = chunks.next().await {
                    let chunk = chunk?;
                    if chunk.is_empty() {
                        continue;
                    }
                    let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
                    frame.extend_from_slice(&chunk);
                    frame.extend_from_slice(b"\r\n");
                    self.stream
                        .write_all(&frame)
                        .await
                        .map_err(|e| Error::http(Phase::Send, format!("write chunk: {e}")))?;
                }
                self.stream
                    .write_all(b"0\r\n\r\n")
                    .await
                    .map_err(|e| Error::http(Phase::Send, format!("write final chunk: {e}")))?;
            }
        }
        self.stream
            .flush()
            .await
            .map_err(|e| Error::http(Phase::Send, format!("flush: {e}")))?;

        self.read_head(method, host_header).await
    }

    /// Serialize the request line and headers.
    ///
    /// Header names and values are written verbatim, in order; this is the
    /// fingerprint-bearing part of the exchange.
    fn build_head(
        &self,
        method: &Method,
        target: &RequestTarget,
        host_header: &str,
        headers: &[(String, String)],
        body: &OutBody,
    ) -> Vec<u8> {
        let mut head = Vec::with_capacity(1024);
        head.extend_from_slice(method.as_str().as_bytes());
        head.push(b' ');
        match target {
            RequestTarget::Origin(path) => head.extend_from_slice(path.as_bytes()),
            RequestTarget::Absolute(url) => head.extend_from_slice(url.as_bytes()),
        }
        head.extend_from_slice(b" HTTP/1.1\r\n");

        head.extend_from_slice(b"Host: ");
        head.extend_from_slice(host_header.as_bytes());
        head.extend_from_slice(b"\r\n");

        let has_transfer_encoding = headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case("transfer-encoding"));
        let has_content_length = headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case("content-length"));

        for (name, value) in headers {
            if name.eq_ignore_ascii_case("host") {
                continue;
            }
            head.extend_from_slice(name.as_bytes());
            head.extend_from_slice(b": ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(b"\r\n");
        }

        match body {
            OutBody::Full(bytes) if !has_content_length && !has_transfer_encoding => {
                head.extend_from_slice(b"Content-Length: ");
                head.extend_from_slice(bytes.len().to_string().as_bytes());
                head.extend_from_slice(b"\r\n");
            }
            OutBody::Chunked(_) if !has_transfer_encoding => {
                head.extend_from_slice(b"Transfer-Encoding: chunked\r\n");
            }
            OutBody::Empty
                if !has_content_length
                    && !has_transfer_encoding
                    && matches!(*method, Method::POST | Method::PUT | Method::PATCH) =>
            {
                head.extend_from_slice(b"Content-Length: 0\r\n");
            }
            _ => {}
        }

        head.extend_from_slice(b"\r\n");
        head
    }

    /// Read and parse the response head, skipping 1xx interim responses.
    async fn read_head(&mut self, method: &Method, host: &str) -> Result<ResponseHead> {
        loop {
            let head_end = loop {
                if let Some(end) = find_head_end(&self.buffer) {
                    break end;
                }
                if self.buffer.len() >= MAX_HEAD_SIZE {
                    return Err(Error::http(Phase::Receive, "response head too large"));
                }
                if self.fill_buf().await? == 0 {
                    // Closed without a single response byte: the transport
                    // died under us (stale keep-alive, mid-dial reset).
                    // Surfaced as a connect-class error so the retry policy
                    // can treat it as such.
                    if self.buffer.is_empty() {
                        return Err(Error::connect(
                            host,
                            "connection closed before response",
                        ));
                    }
                    return Err(Error::http(
                        Phase::Receive,
                        "connection closed mid response head",
                    ));
                }
            };

            let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS_COUNT];
            let mut parsed = httparse::Response::new(&mut headers);
            let consumed = match parsed
                .parse(&self.buffer[..head_end])
                .map_err(|e| Error::http(Phase::Receive, format!("parse head: {e}")))?
            {
                httparse::Status::Complete(len) => len,
                httparse::Status::Partial => {
                    return Err(Error::http(Phase::Receive, "incomplete response head"))
                }
            };

            let status = parsed
                .code
                .ok_or_else(|| Error::http(Phase::Receive, "missing status code"))?;
            let version = format!("HTTP/1.{}", parsed.version.unwrap_or(1));
            let response_headers: Vec<(String, String)> = parsed
                .headers
                .iter()
                .filter(|h| !h.name.is_empty())
                .map(|h| {
                    (
                        h.name.to_string(),
                        String::from_utf8_lossy(h.value).to_string(),
                    )
                })
                .collect();

            self.buffer.drain(..consumed);

            // Interim responses carry no body; keep reading for the final
            // head (RFC 9112 §6).
            if (100..200).contains(&status) && status != 101 {
                continue;
            }

            let head = ResponseHead {
                status,
                version,
                headers: response_headers,
            };

            if let Some(conn) = head.header("connection") {
                if conn.to_ascii_lowercase().contains("close") {
                    self.should_close = true;
                }
            }

            self.state = body_framing(method, &head)?;
            return Ok(head);
        }
    }

    /// Read the next decoded-transfer body chunk; `None` once the body is
    /// fully drained.
    pub async fn read_body_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.state {
                ReadState::Idle => {
                    return Err(Error::http(Phase::Receive, "no response in flight"))
                }
                ReadState::Done => return Ok(None),
                ReadState::FixedBody { remaining } => {
                    if remaining == 0 {
                        self.state = ReadState::Done;
                        return Ok(None);
                    }
                    if self.buffer.is_empty() && self.fill_buf().await? == 0 {
                        self.should_close = true;
                        return Err(Error::http(
                            Phase::Receive,
                            "connection closed mid-body",
                        ));
                    }
                    let take = (self.buffer.len() as u64).min(remaining) as usize;
                    let chunk = Bytes::from(self.buffer.drain(..take).collect::<Vec<u8>>());
                    let remaining = remaining - take as u64;
                    self.state = if remaining == 0 {
                        ReadState::Done
                    } else {
                        ReadState::FixedBody { remaining }
                    };
                    return Ok(Some(chunk));
                }
                ReadState::ChunkedSize => {
                    let line = self.read_line().await?;
                    let size_str = line.split(';').next().unwrap_or("").trim();
                    let size = u64::from_str_radix(size_str, 16).map_err(|_| {
                        Error::http(Phase::Receive, format!("bad chunk size {size_str:?}"))
                    })?;
                    if size == 0 {
                        self.state = ReadState::ChunkedTrailer;
                    } else {
                        self.state = ReadState::ChunkedData { remaining: size };
                    }
                }
                ReadState::ChunkedData { remaining } => {
                    if self.buffer.is_empty() && self.fill_buf().await? == 0 {
                        self.should_close = true;
                        return Err(Error::http(
                            Phase::Receive,
                            "connection closed mid-chunk",
                        ));
                    }
                    let take = (self.buffer.len() as u64).min(remaining) as usize;
                    let chunk = Bytes::from(self.buffer.drain(..take).collect::<Vec<u8>>());
                    let remaining = remaining - take as u64;
                    if remaining == 0 {
                        // Consume the CRLF that terminates the chunk data.
                        self.expect_crlf().await?;
                        self.state = ReadState::ChunkedSize;
                    } else {
                        self.state = ReadState::ChunkedData { remaining };
                    }
                    if !chunk.is_empty() {
                        return Ok(Some(chunk));
                    }
                }
                ReadState::ChunkedTrailer => {
                    let line = self.read_line().await?;
                    if line.is_empty() {
                        self.state = ReadState::Done;
                        return Ok(None);
                    }
                }
                ReadState::ReadToEnd => {
                    if !self.buffer.is_empty() {
                        let chunk =
                            Bytes::from(std::mem::take(&mut self.buffer));
                        return Ok(Some(chunk));
                    }
                    if self.fill_buf().await? == 0 {
                        self.should_close = true;
                        self.state = ReadState::Done;
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn fill_buf(&mut self) -> Result<usize> {
        let mut chunk = vec![0u8; READ_CHUNK];
        let n = self
            .stream
            .read(&mut chunk)
            .await
            .map_err(|e| Error::http(Phase::Receive, format!("read: {e}")))?;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Read one CRLF-terminated line, returning it without the terminator.
    async fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = self.buffer.windows(2).position(|w| w == b"\r\n") {
                let line: Vec<u8> = self.buffer.drain(..pos + 2).collect();
                return Ok(String::from_utf8_lossy(&line[..pos]).to_string());
            }
            if self.buffer.len() > MAX_HEAD_SIZE {
                return Err(Error::http(Phase::Receive, "chunk line too long"));
            }
            if self.fill_buf().await? == 0 {
                self.should_close = true;
                return Err(Error::http(Phase::Receive, "connection closed mid-line"));
            }
        }
    }

    async fn expect_crlf(&mut self) -> Result<()> {
        while self.buffer.len() < 2 {
            if self.fill_buf().await? == 0 {
                self.should_close = true;
                return Err(Error::http(Phase::Receive, "connection closed mid-chunk"));
            }
        }
        if &self.buffer[..2] != b"\r\n" {
            return Err(Error::http(Phase::Receive, "missing chunk terminator"));
        }
        self.buffer.drain(..2);
        Ok(())
    }
}

/// Determine body framing from the response head (RFC 9112 §6.3).
fn body_framing(method: &Method, head: &ResponseHead) -> Result<ReadState> {
    let has_body =
        !matches!(head.status, 100..=199 | 204 | 304) && *method != Method::HEAD;
    if !has_body {
        return Ok(ReadState::Done);
    }

    if let Some(te) = head.header("transfer-encoding") {
        let chunked = te
            .split(',')
            .next_back()
            .map(|s| s.trim().eq_ignore_ascii_case("chunked"))
            .unwrap_or(false);
        if chunked {
            return Ok(ReadState::ChunkedSize);
        }
        // Unknown transfer coding: body runs to connection close.
        return Ok(ReadState::ReadToEnd);
    }

    if let Some(cl) = head.header("content-length") {
        let len: u64 = cl
            .trim()
            .parse()
            .map_err(|_| Error::http(Phase::Receive, format!("bad Content-Length {cl:?}")))?;
        if len == 0 {
            return Ok(ReadState::Done);
        }
        return Ok(ReadState::FixedBody { remaining: len });
    }

    Ok(ReadState::ReadToEnd)
}

/// Find the end of the response head (`\r\n\r\n`), returning the offset
/// just past it.
fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}
