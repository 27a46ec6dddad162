//! WebSocket message types.

use bytes::Bytes;

/// Frame opcodes (RFC 6455 §5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpCode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl OpCode {
    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Self::Continuation),
            0x1 => Some(Self::Text),
            0x2 => Some(Self::Binary),
            0x8 => Some(Self::Close),
            0x9 => Some(Self::Ping),
            0xA => Some(Self::Pong),
            _ => None,
        }
    }

    pub(crate) fn is_control(&self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }
}

/// A complete WebSocket message.
///
/// A `Close` message is the transport-level close frame; a payload that a
/// peer application treats as "please stop" is ordinary data and does not
/// touch the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close { code: u16, reason: String },
}

impl Message {
    /// Text message from anything stringy.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Binary message.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    /// Normal-closure close message (code 1000).
    pub fn close() -> Self {
        Self::Close {
            code: 1000,
            reason: String::new(),
        }
    }

    /// Payload bytes of a data message.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) | Self::Ping(data) | Self::Pong(data) => data,
            Self::Close { reason, .. } => reason.as_bytes(),
        }
    }

    pub(crate) fn opcode(&self) -> OpCode {
        match self {
            Self::Text(_) => OpCode::Text,
            Self::Binary(_) => OpCode::Binary,
            Self::Ping(_) => OpCode::Ping,
            Self::Pong(_) => OpCode::Pong,
            Self::Close { .. } => OpCode::Close,
        }
    }

    pub(crate) fn into_payload(self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::from(text.into_bytes()),
            Self::Binary(data) | Self::Ping(data) | Self::Pong(data) => data,
            Self::Close { code, reason } => {
                let mut payload = Vec::with_capacity(2 + reason.len());
                payload.extend_from_slice(&code.to_be_bytes());
                payload.extend_from_slice(reason.as_bytes());
                Bytes::from(payload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_payload_encodes_code_and_reason() {
        let payload = Message::Close {
            code: 1001,
            reason: "bye".into(),
        }
        .into_payload();
        assert_eq!(&payload[..2], &1001u16.to_be_bytes());
        assert_eq!(&payload[2..], b"bye");
    }

    #[test]
    fn opcode_round_trip() {
        for op in [0x0u8, 0x1, 0x2, 0x8, 0x9, 0xA] {
            assert_eq!(OpCode::from_u8(op).unwrap() as u8, op);
        }
        assert!(OpCode::from_u8(0x3).is_none());
    }
}
