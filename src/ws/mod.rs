//! WebSocket subsystem.
//!
//! The upgrade handshake rides the HTTP/1.1 transport over a pooled
//! connection slot; after the 101 the raw stream is split into independent
//! send and receive halves. The session owns its connection for its whole
//! lifetime and the pool slot is freed when the session drops.

pub mod codec;
pub mod message;

pub use message::Message;

use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use http::Method;
use tokio::io::{ReadHalf, WriteHalf};
use url::Url;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::headers::OrderedHeaders;
use crate::pool::{ConnectionToken, PoolKey};
use crate::profile::Profile;
use crate::proxy;
use crate::transport::connector::{Connector, MaybeTlsStream, TlsOptions};
use crate::transport::h1::{H1Connection, OutBody, RequestTarget};
use crate::transport::proxy::establish;
use crate::ws::codec::{FrameReader, FrameWriter};
use crate::ws::message::OpCode;

/// RFC 6455 handshake GUID.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    /// We sent a close frame and await the peer's echo.
    Closing,
    Closed,
    Failed,
}

type SharedWriter = Arc<tokio::sync::Mutex<FrameWriter<WriteHalf<MaybeTlsStream>>>>;
type SharedState = Arc<Mutex<State>>;
type SharedToken = Arc<ConnectionToken>;

/// A WebSocket upgrade under construction.
pub struct WebSocketBuilder {
    client: Client,
    url: String,
    protocols: Vec<String>,
    headers: OrderedHeaders,
}

impl WebSocketBuilder {
    pub(crate) fn new(client: Client, url: String) -> Self {
        Self {
            client,
            url,
            protocols: Vec::new(),
            headers: OrderedHeaders::new(),
        }
    }

    /// Offer sub-protocols in preference order.
    pub fn protocols<I: IntoIterator<Item = S>, S: Into<String>>(mut self, protocols: I) -> Self {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Add a header to the upgrade request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Perform the upgrade handshake.
    pub async fn send(self) -> Result<WebSocket> {
        let snapshot = self.client.inner.defaults.read().unwrap().clone();
        let fixed = &self.client.inner.fixed;

        let url = Url::parse(&self.url)?;
        let (connect_scheme, is_tls) = match url.scheme() {
            "ws" | "http" => ("http", false),
            "wss" | "https" => ("https", true),
            other => {
                return Err(Error::config(format!(
                    "unsupported WebSocket scheme {other:?}"
                )))
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| Error::config("URL has no host"))?
            .to_string();
        let port = url
            .port()
            .unwrap_or(if is_tls { 443 } else { 80 });

        let resolved_proxy = if snapshot.no_proxy {
            None
        } else {
            proxy::resolve(&snapshot.proxies, &url).cloned()
        };

        let key = PoolKey {
            scheme: connect_scheme.to_string(),
            host: host.clone(),
            port,
            proxy: resolved_proxy.as_ref().map(|p| p.url().to_string()),
            profile: (snapshot.profile.impersonate, snapshot.profile.os),
        };

        // A session occupies a pool slot for its whole lifetime; idle HTTP
        // connections are not reused for upgrades.
        let acquired = self.client.inner.pool.acquire(&key).await?;
        let token = acquired.into_token();

        // WebSocket always tunnels through HTTP proxies, even for ws://.
        let needs_tunnel = is_tls || resolved_proxy.is_some();
        let (tcp, _mode) =
            establish(resolved_proxy.as_ref(), &host, port, needs_tunnel, &fixed.tcp).await?;

        let stream = if is_tls {
            let options = TlsOptions {
                danger_accept_invalid_certs: fixed.danger_accept_invalid_certs,
                root_certs: fixed.root_certs.clone(),
                // The upgrade requires HTTP/1.1; never offer h2.
                alpn_override: Some(vec!["http/1.1"]),
            };
            Connector::new(snapshot.profile.tls, options)
                .handshake(tcp, &host)
                .await?
        } else {
            MaybeTlsStream::Plain(tcp)
        };

        let mut nonce = [0u8; 16];
        getrandom::getrandom(&mut nonce).expect("os entropy");
        let ws_key = BASE64.encode(nonce);

        let headers = self.upgrade_headers(&snapshot.profile, &ws_key);
        let mut conn = H1Connection::new(stream);

        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        let host_header = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        };

        let head = conn
            .send_request(
                &Method::GET,
                &RequestTarget::Origin(target),
                &host_header,
                &headers,
                OutBody::Empty,
            )
            .await?;

        if head.status != 101 {
            return Err(Error::websocket(format!(
                "upgrade refused with status {}",
                head.status
            )));
        }
        if !head
            .header("upgrade")
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false)
        {
            return Err(Error::protocol_violation("missing Upgrade: websocket"));
        }
        let expected_accept = accept_key(&ws_key);
        if head.header("sec-websocket-accept") != Some(expected_accept.as_str()) {
            return Err(Error::protocol_violation(
                "Sec-WebSocket-Accept does not match the handshake key",
            ));
        }
        let protocol = head
            .header("sec-websocket-protocol")
            .map(str::to_string);
        if let Some(p) = &protocol {
            if !self.protocols.iter().any(|offered| offered == p) {
                return Err(Error::protocol_violation(format!(
                    "server selected unoffered sub-protocol {p:?}"
                )));
            }
        }

        let status = head.status;
        let response_headers = head.headers;
        let (stream, leftover) = conn.into_upgraded();
        let (read_half, write_half) = tokio::io::split(stream);

        let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(FrameWriter::new(write_half)));
        let state: SharedState = Arc::new(Mutex::new(State::Open));
        let token: SharedToken = Arc::new(token);

        Ok(WebSocket {
            sender: WsSender {
                writer: writer.clone(),
                state: state.clone(),
                _token: token.clone(),
            },
            receiver: WsReceiver {
                reader: FrameReader::new(read_half, leftover),
                writer,
                state,
                fragments: None,
                _token: token,
            },
            status,
            headers: response_headers,
            protocol,
        })
    }

    /// Headers for the upgrade request: profile identity headers plus the
    /// RFC 6455 handshake set.
    fn upgrade_headers(&self, profile: &Profile, ws_key: &str) -> Vec<(String, String)> {
        let mut headers = OrderedHeaders::new();
        headers.insert("Connection", "Upgrade");
        headers.insert("Upgrade", "websocket");
        headers.insert("Sec-WebSocket-Version", "13");
        headers.insert("Sec-WebSocket-Key", ws_key);
        headers.insert("User-Agent", profile.user_agent());
        if !self.protocols.is_empty() {
            headers.insert("Sec-WebSocket-Protocol", self.protocols.join(", "));
        }
        headers.merge(&self.headers);
        headers.to_vec()
    }
}

/// Compute the expected `Sec-WebSocket-Accept` for a key.
fn accept_key(ws_key: &str) -> String {
    let joined = format!("{ws_key}{WS_GUID}");
    let digest = boring::hash::hash(boring::hash::MessageDigest::sha1(), joined.as_bytes())
        .expect("sha1 digest");
    BASE64.encode(&digest)
}

/// An open WebSocket session.
///
/// Send and receive are independent: [`WebSocket::split`] yields halves
/// that can run on separate tasks without blocking each other.
pub struct WebSocket {
    sender: WsSender,
    receiver: WsReceiver,
    status: u16,
    headers: Vec<(String, String)>,
    protocol: Option<String>,
}

impl WebSocket {
    /// Upgrade response status (101 on success).
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Upgrade response headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Negotiated sub-protocol, if the server selected one.
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// Send a message.
    pub async fn send(&mut self, message: Message) -> Result<()> {
        self.sender.send(message).await
    }

    /// Receive the next message; `None` once the session is closed.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        self.receiver.recv().await
    }

    /// Close handshake: send a close frame and await the peer's echo.
    pub async fn close(mut self) -> Result<()> {
        self.sender.close(1000, "").await?;
        // Drain until the peer's close frame completes the handshake.
        while self.receiver.recv().await?.is_some() {}
        Ok(())
    }

    /// Split into independently usable send and receive halves. The pool
    /// slot stays held until both halves are dropped.
    pub fn split(self) -> (WsSender, WsReceiver) {
        (self.sender, self.receiver)
    }
}

/// Send half of a WebSocket session.
pub struct WsSender {
    writer: SharedWriter,
    state: SharedState,
    _token: SharedToken,
}

impl WsSender {
    /// Send a message. Sending a [`Message::Close`] starts the close
    /// handshake.
    pub async fn send(&self, message: Message) -> Result<()> {
        let current = *self.state.lock().unwrap();
        match current {
            State::Closed | State::Failed => {
                return Err(Error::StreamClosed("WebSocket is closed".into()))
            }
            State::Closing if !matches!(message, Message::Close { .. }) => {
                return Err(Error::StreamClosed("WebSocket is closing".into()))
            }
            _ => {}
        }

        let is_close = matches!(message, Message::Close { .. });
        let opcode = message.opcode();
        let payload = message.into_payload();

        let mut writer = self.writer.lock().await;
        let result = writer.write_frame(opcode, &payload).await;
        drop(writer);

        match result {
            Ok(()) => {
                if is_close {
                    let mut state = self.state.lock().unwrap();
                    if *state == State::Open {
                        *state = State::Closing;
                    }
                }
                Ok(())
            }
            Err(e) => {
                *self.state.lock().unwrap() = State::Failed;
                Err(e)
            }
        }
    }

    /// Send a close frame with a code and reason.
    pub async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        self.send(Message::Close {
            code,
            reason: reason.to_string(),
        })
        .await
    }
}

/// Receive half of a WebSocket session.
pub struct WsReceiver {
    reader: FrameReader<ReadHalf<MaybeTlsStream>>,
    /// Shared with the sender so pings can be answered and close frames
    /// echoed from the receive path.
    writer: SharedWriter,
    state: SharedState,
    /// Reassembly buffer: (is_text, accumulated payload).
    fragments: Option<(bool, Vec<u8>)>,
    _token: SharedToken,
}

impl WsReceiver {
    /// Receive the next message.
    ///
    /// Pings are answered transparently. A close frame from the peer is
    /// echoed (completing the handshake), surfaced once as
    /// [`Message::Close`], and every later call returns `None`.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        loop {
            if matches!(*self.state.lock().unwrap(), State::Closed | State::Failed) {
                return Ok(None);
            }

            let frame = match self.reader.read_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    *self.state.lock().unwrap() = State::Closed;
                    return Ok(None);
                }
                Err(e) => {
                    *self.state.lock().unwrap() = State::Failed;
                    return Err(e);
                }
            };

            match frame.opcode {
                OpCode::Ping => {
                    let mut writer = self.writer.lock().await;
                    let _ = writer.write_frame(OpCode::Pong, &frame.payload).await;
                }
                OpCode::Pong => {
                    // Unsolicited pongs are legal and ignored.
                }
                OpCode::Close => {
                    let code = if frame.payload.len() >= 2 {
                        u16::from_be_bytes([frame.payload[0], frame.payload[1]])
                    } else {
                        1005
                    };
                    let reason =
                        String::from_utf8_lossy(&frame.payload[2.min(frame.payload.len())..])
                            .into_owned();

                    let was_closing = {
                        let mut state = self.state.lock().unwrap();
                        let was = *state == State::Closing;
                        *state = State::Closed;
                        was
                    };
                    if !was_closing {
                        // Peer initiated: echo the close frame.
                        let mut writer = self.writer.lock().await;
                        let _ = writer.write_frame(OpCode::Close, &frame.payload).await;
                        let _ = writer.shutdown().await;
                    }
                    return Ok(Some(Message::Close { code, reason }));
                }
                OpCode::Text | OpCode::Binary => {
                    let is_text = frame.opcode == OpCode::Text;
                    if frame.fin {
                        if self.fragments.is_some() {
                            *self.state.lock().unwrap() = State::Failed;
                            return Err(Error::websocket(
                                "data frame interleaved with fragmented message",
                            ));
                        }
                        return Ok(Some(assemble(is_text, frame.payload.to_vec())?));
                    }
                    self.fragments = Some((is_text, frame.payload.to_vec()));
                }
                OpCode::Continuation => {
                    let Some((is_text, mut buffered)) = self.fragments.take() else {
                        *self.state.lock().unwrap() = State::Failed;
                        return Err(Error::websocket("continuation without initial frame"));
                    };
                    buffered.extend_from_slice(&frame.payload);
                    if frame.fin {
                        return Ok(Some(assemble(is_text, buffered)?));
                    }
                    self.fragments = Some((is_text, buffered));
                }
            }
        }
    }
}

fn assemble(is_text: bool, payload: Vec<u8>) -> Result<Message> {
    if is_text {
        let text = String::from_utf8(payload)
            .map_err(|_| Error::websocket("text message is not valid UTF-8"))?;
        Ok(Message::Text(text))
    } else {
        Ok(Message::Binary(payload.into()))
    }
}
