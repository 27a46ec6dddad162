//! HTTP/2 connection driven through the h2 crate directly.
//!
//! Going below hyper's abstraction keeps the SETTINGS frame under profile
//! control, which is the HTTP/2 half of the fingerprint.

use bytes::Bytes;
use futures_util::future::poll_fn;
use futures_util::StreamExt;
use h2::client::SendRequest;
use h2::SendStream;
use http::{Method, Request};

use crate::error::{Error, Phase, Result};
use crate::profile::http2::H2Profile;
use crate::transport::connector::MaybeTlsStream;
use crate::transport::h1::{OutBody, ResponseHead};

/// One HTTP/2 connection with profile-shaped SETTINGS.
pub struct H2Connection {
    send_request: SendRequest<Bytes>,
    broken: bool,
}

impl H2Connection {
    /// Perform the HTTP/2 handshake with the profile's SETTINGS and spawn
    /// the connection driver.
    pub async fn connect(stream: MaybeTlsStream, settings: &H2Profile) -> Result<Self> {
        let mut builder = h2::client::Builder::new();
        builder
            .header_table_size(settings.header_table_size)
            .initial_window_size(settings.initial_stream_window)
            .initial_connection_window_size(settings.initial_connection_window)
            .max_frame_size(settings.max_frame_size)
            .enable_push(settings.enable_push);
        if let Some(max) = settings.max_concurrent_streams {
            builder.max_concurrent_streams(max);
        }
        if let Some(max) = settings.max_header_list_size {
            builder.max_header_list_size(max);
        }

        let (send_request, connection) = builder
            .handshake(stream)
            .await
            .map_err(|e| Error::http(Phase::Handshake, format!("h2 handshake: {e}")))?;

        // The driver owns all connection I/O; nothing moves without it.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!("h2 connection terminated: {e}");
            }
        });

        Ok(Self {
            send_request,
            broken: false,
        })
    }

    /// Whether the connection survived its last exchange.
    pub fn is_reusable(&self) -> bool {
        !self.broken
    }

    /// Send a request and read the response head.
    ///
    /// Headers must already be merged and ordered; names are lowercased on
    /// the wire per RFC 9113.
    pub async fn send_request(
        &mut self,
        method: &Method,
        url: &url::Url,
        headers: &[(String, String)],
        body: OutBody,
    ) -> Result<(ResponseHead, H2Body)> {
        let sender = self.send_request.clone();
        let mut sender = sender.ready().await.map_err(|e| {
            self.broken = true;
            Error::http(Phase::Send, format!("h2 not ready: {e}"))
        })?;

        let mut builder = Request::builder().method(method.clone()).uri(url.as_str());
        for (name, value) in headers {
            if name.starts_with(':') || name.eq_ignore_ascii_case("host") {
                continue;
            }
            // Connection-oriented headers are illegal on h2.
            if matches!(
                name.to_ascii_lowercase().as_str(),
                "connection" | "keep-alive" | "transfer-encoding" | "upgrade"
            ) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = builder
            .body(())
            .map_err(|e| Error::http(Phase::Send, format!("build request: {e}")))?;

        let end_of_stream = matches!(body, OutBody::Empty);
        let (response_future, send_stream) = sender
            .send_request(request, end_of_stream)
            .map_err(|e| {
                self.broken = true;
                Error::http(Phase::Send, format!("h2 send: {e}"))
            })?;

        if !end_of_stream {
            send_body(send_stream, body).await?;
        }

        let response = response_future.await.map_err(|e| {
            self.broken = true;
            Error::http(Phase::Receive, format!("h2 response: {e}"))
        })?;

        let (parts, recv) = response.into_parts();
        let headers = parts
            .headers
            .iter()
            .map(|(n, v)| {
                (
                    n.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).to_string(),
                )
            })
            .collect();

        Ok((
            ResponseHead {
                status: parts.status.as_u16(),
                version: "HTTP/2".to_string(),
                headers,
            },
            H2Body { recv },
        ))
    }
}

/// Write the request body, waiting for flow-control capacity per chunk.
async fn send_body(mut stream: SendStream<Bytes>, body: OutBody) -> Result<()> {
    match body {
        OutBody::Empty => {
            stream
                .send_data(Bytes::new(), true)
                .map_err(|e| Error::http(Phase::Send, format!("h2 end stream: {e}")))?;
        }
        OutBody::Full(bytes) => {
            send_all(&mut stream, bytes, true).await?;
        }
        OutBody::Chunked(mut chunks) => {
            while let Some(chunk) = chunks.next().await {
                send_all(&mut stream, chunk?, false).await?;
            }
            stream
                .send_data(Bytes::new(), true)
                .map_err(|e| Error::http(Phase::Send, format!("h2 end stream: {e}")))?;
        }
    }
    Ok(())
}

async fn send_all(stream: &mut SendStream<Bytes>, mut data: Bytes, end: bool) -> Result<()> {
    if data.is_empty() {
        if end {
            stream
                .send_data(Bytes::new(), true)
                .map_err(|e| Error::http(Phase::Send, format!("h2 end stream: {e}")))?;
        }
        return Ok(());
    }
    while !data.is_empty() {
        stream.reserve_capacity(data.len());
        let capacity = poll_fn(|cx| stream.poll_capacity(cx))
            .await
            .ok_or_else(|| Error::http(Phase::Send, "h2 stream reset while sending"))?
            .map_err(|e| Error::http(Phase::Send, format!("h2 capacity: {e}")))?;
        let take = capacity.min(data.len());
        let chunk = data.split_to(take);
        let eos = end && data.is_empty();
        stream
            .send_data(chunk, eos)
            .map_err(|e| Error::http(Phase::Send, format!("h2 send data: {e}")))?;
    }
    Ok(())
}

/// Incremental HTTP/2 response body.
pub struct H2Body {
    recv: h2::RecvStream,
}

impl H2Body {
    /// Next DATA chunk, releasing flow-control capacity as data arrives.
    pub async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        match self.recv.data().await {
            Some(Ok(chunk)) => {
                let _ = self
                    .recv
                    .flow_control()
                    .release_capacity(chunk.len());
                Ok(Some(chunk))
            }
            Some(Err(e)) => Err(Error::http(Phase::Receive, format!("h2 body: {e}"))),
            None => Ok(None),
        }
    }
}
