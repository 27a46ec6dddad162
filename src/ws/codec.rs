//! WebSocket frame codec (RFC 6455 §5).
//!
//! Client-side: outgoing frames are always masked, incoming frames must
//! not be. Fragmented data messages are reassembled by the reader; control
//! frames may interleave with fragments.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::ws::message::OpCode;

/// Refuse frames larger than this (64 MiB).
const MAX_FRAME_PAYLOAD: u64 = 64 * 1024 * 1024;

/// Control frame payloads are capped at 125 bytes by the RFC.
const MAX_CONTROL_PAYLOAD: usize = 125;

/// One parsed frame.
#[derive(Debug)]
pub(crate) struct Frame {
    pub fin: bool,
    pub opcode: OpCode,
    pub payload: Bytes,
}

/// Reads frames from the receive half of the connection.
pub(crate) struct FrameReader<R> {
    stream: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// `leftover` holds bytes read past the upgrade response head.
    pub fn new(stream: R, leftover: Vec<u8>) -> Self {
        Self {
            stream,
            buffer: leftover,
        }
    }

    async fn fill(&mut self) -> Result<usize> {
        let mut chunk = vec![0u8; 8 * 1024];
        let n = self
            .stream
            .read(&mut chunk)
            .await
            .map_err(|e| Error::websocket(format!("read: {e}")))?;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    async fn need(&mut self, len: usize) -> Result<bool> {
        while self.buffer.len() < len {
            if self.fill().await? == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Read one frame; `None` on clean EOF at a frame boundary.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.buffer.is_empty() && self.fill().await? == 0 {
            return Ok(None);
        }
        if !self.need(2).await? {
            return Err(Error::websocket("connection closed mid-frame"));
        }

        let first = self.buffer[0];
        let second = self.buffer[1];
        let fin = first & 0x80 != 0;
        if first & 0x70 != 0 {
            return Err(Error::websocket("reserved bits set without extension"));
        }
        let opcode = OpCode::from_u8(first & 0x0f)
            .ok_or_else(|| Error::websocket(format!("invalid opcode {:#x}", first & 0x0f)))?;

        // Server frames must not be masked (RFC 6455 §5.1).
        if second & 0x80 != 0 {
            return Err(Error::websocket("server sent a masked frame"));
        }

        let mut header_len = 2;
        let payload_len = match second & 0x7f {
            126 => {
                if !self.need(4).await? {
                    return Err(Error::websocket("connection closed mid-frame"));
                }
                header_len = 4;
                u16::from_be_bytes([self.buffer[2], self.buffer[3]]) as u64
            }
            127 => {
                if !self.need(10).await? {
                    return Err(Error::websocket("connection closed mid-frame"));
                }
                header_len = 10;
                u64::from_be_bytes(self.buffer[2..10].try_into().expect("length checked"))
            }
            len => len as u64,
        };

        if payload_len > MAX_FRAME_PAYLOAD {
            return Err(Error::websocket(format!("frame too large: {payload_len}")));
        }
        if opcode.is_control() {
            if !fin {
                return Err(Error::websocket("fragmented control frame"));
            }
            if payload_len as usize > MAX_CONTROL_PAYLOAD {
                return Err(Error::websocket("oversized control frame"));
            }
        }

        let total = header_len + payload_len as usize;
        if !self.need(total).await? {
            return Err(Error::websocket("connection closed mid-frame"));
        }

        let payload = Bytes::copy_from_slice(&self.buffer[header_len..total]);
        self.buffer.drain(..total);

        Ok(Some(Frame {
            fin,
            opcode,
            payload,
        }))
    }
}

/// Writes masked frames to the send half of the connection.
pub(crate) struct FrameWriter<W> {
    stream: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(stream: W) -> Self {
        Self { stream }
    }

    /// Write one complete (FIN) masked frame.
    pub async fn write_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(payload.len() + 14);
        frame.push(0x80 | opcode as u8);

        let mut mask_key = [0u8; 4];
        getrandom::getrandom(&mut mask_key).expect("os entropy");

        if payload.len() < 126 {
            frame.push(0x80 | payload.len() as u8);
        } else if payload.len() <= u16::MAX as usize {
            frame.push(0x80 | 126);
            frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        } else {
            frame.push(0x80 | 127);
            frame.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        }
        frame.extend_from_slice(&mask_key);

        let offset = frame.len();
        frame.extend_from_slice(payload);
        for (i, byte) in frame[offset..].iter_mut().enumerate() {
            *byte ^= mask_key[i % 4];
        }

        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| Error::websocket(format!("write: {e}")))?;
        self.stream
            .flush()
            .await
            .map_err(|e| Error::websocket(format!("flush: {e}")))?;
        Ok(())
    }

    /// Shut down the send direction.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| Error::websocket(format!("shutdown: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unmask a client frame the way a server would.
    fn unmask(frame: &[u8]) -> (u8, Vec<u8>) {
        let opcode = frame[0] & 0x0f;
        let len = (frame[1] & 0x7f) as usize;
        assert!(frame[1] & 0x80 != 0, "client frames must be masked");
        let mask = &frame[2..6];
        let payload: Vec<u8> = frame[6..6 + len]
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ mask[i % 4])
            .collect();
        (opcode, payload)
    }

    #[tokio::test]
    async fn writer_masks_payload() {
        let mut out = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut out);
            writer.write_frame(OpCode::Text, b"ping").await.unwrap();
        }
        let (opcode, payload) = unmask(&out);
        assert_eq!(opcode, 0x1);
        assert_eq!(payload, b"ping");
        // Masked payload on the wire must differ from the clear text
        // unless the mask happened to be all zeros.
        let wire = &out[6..10];
        if out[2..6] != [0, 0, 0, 0] {
            assert_ne!(wire, b"ping");
        }
    }

    #[tokio::test]
    async fn reader_parses_unmasked_server_frame() {
        // FIN + text, 5 byte payload, no mask.
        let wire = [0x81u8, 0x05, b'h', b'e', b'l', b'l', b'o'];
        let mut reader = FrameReader::new(&wire[..], Vec::new());
        let frame = reader.read_frame().await.unwrap().unwrap();
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(&frame.payload[..], b"hello");
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reader_rejects_masked_server_frame() {
        let wire = [0x81u8, 0x85, 1, 2, 3, 4, 0, 0, 0, 0, 0];
        let mut reader = FrameReader::new(&wire[..], Vec::new());
        assert!(reader.read_frame().await.is_err());
    }

    #[tokio::test]
    async fn reader_handles_extended_length() {
        let payload = vec![b'x'; 300];
        let mut wire = vec![0x82u8, 126];
        wire.extend_from_slice(&(300u16).to_be_bytes());
        wire.extend_from_slice(&payload);
        let mut reader = FrameReader::new(&wire[..], Vec::new());
        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.opcode, OpCode::Binary);
        assert_eq!(frame.payload.len(), 300);
    }

    #[tokio::test]
    async fn leftover_bytes_are_consumed_first() {
        let wire = vec![0x81u8, 0x02, b'h', b'i'];
        let empty: &[u8] = &[];
        let mut reader = FrameReader::new(empty, wire);
        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(&frame.payload[..], b"hi");
    }
}
