//! Blocking WebSocket wrapper.

use super::runtime;
use crate::error::Result;
use crate::ws;
use crate::ws::Message;

/// Blocking view of a WebSocket session.
pub struct WebSocket {
    inner: ws::WebSocket,
}

impl WebSocket {
    pub(crate) fn new(inner: ws::WebSocket) -> Self {
        Self { inner }
    }

    /// Upgrade response status (101 on success).
    pub fn status(&self) -> u16 {
        self.inner.status()
    }

    /// Upgrade response headers.
    pub fn headers(&self) -> &[(String, String)] {
        self.inner.headers()
    }

    /// Negotiated sub-protocol, if any.
    pub fn protocol(&self) -> Option<&str> {
        self.inner.protocol()
    }

    /// Send a message, blocking until it is written.
    pub fn send(&mut self, message: Message) -> Result<()> {
        runtime().block_on(self.inner.send(message))
    }

    /// Receive the next message; `None` once the session is closed.
    pub fn recv(&mut self) -> Result<Option<Message>> {
        runtime().block_on(self.inner.recv())
    }

    /// Close handshake, blocking until the peer echoes.
    pub fn close(self) -> Result<()> {
        runtime().block_on(self.inner.close())
    }
}
