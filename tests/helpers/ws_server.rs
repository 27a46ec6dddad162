//! Minimal in-process WebSocket echo server for integration tests.
//!
//! Accepts one upgrade per connection, echoes data frames, answers pings,
//! and completes the close handshake.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub struct WsEchoServer {
    addr: std::net::SocketAddr,
}

impl WsEchoServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let _ = serve(stream).await;
                });
            }
        });
        Self { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

async fn serve(mut stream: TcpStream) -> std::io::Result<()> {
    // Read the upgrade request head.
    let mut buffer = Vec::new();
    let head_end = loop {
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
    buffer.drain(..head_end);

    let key = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("sec-websocket-key")
                .then(|| value.trim().to_string())
        })
        .unwrap_or_default();
    let protocol = head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("sec-websocket-protocol")
            .then(|| value.split(',').next().unwrap_or("").trim().to_string())
    });

    let digest = boring::hash::hash(
        boring::hash::MessageDigest::sha1(),
        format!("{key}{WS_GUID}").as_bytes(),
    )
    .unwrap();
    let accept = BASE64.encode(&digest);

    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {accept}\r\n"
    );
    if let Some(p) = &protocol {
        response.push_str(&format!("Sec-WebSocket-Protocol: {p}\r\n"));
    }
    response.push_str("\r\n");
    stream.write_all(response.as_bytes()).await?;

    // Frame loop: echo data, answer ping, echo close then stop.
    loop {
        let frame = match read_frame(&mut stream, &mut buffer).await? {
            Some(frame) => frame,
            None => return Ok(()),
        };
        let (opcode, payload) = frame;
        match opcode {
            0x1 | 0x2 => write_frame(&mut stream, opcode, &payload).await?,
            0x9 => write_frame(&mut stream, 0xA, &payload).await?,
            0x8 => {
                write_frame(&mut stream, 0x8, &payload).await?;
                return Ok(());
            }
            _ => {}
        }
    }
}

/// Read one client frame, unmasking the payload.
async fn read_frame(
    stream: &mut TcpStream,
    buffer: &mut Vec<u8>,
) -> std::io::Result<Option<(u8, Vec<u8>)>> {
    let need = |buffer: &Vec<u8>, len: usize| buffer.len() >= len;
    loop {
        if need(buffer, 2) {
            let opcode = buffer[0] & 0x0f;
            let masked = buffer[1] & 0x80 != 0;
            let short_len = (buffer[1] & 0x7f) as usize;
            let (len, header) = match short_len {
                126 if need(buffer, 4) => {
                    (u16::from_be_bytes([buffer[2], buffer[3]]) as usize, 4)
                }
                127 if need(buffer, 10) => (
                    u64::from_be_bytes(buffer[2..10].try_into().unwrap()) as usize,
                    10,
                ),
                126 | 127 => {
                    fill(stream, buffer).await?;
                    continue;
                }
                len => (len, 2),
            };
            let mask_len = if masked { 4 } else { 0 };
            let total = header + mask_len + len;
            if need(buffer, total) {
                let mask: [u8; 4] = if masked {
                    buffer[header..header + 4].try_into().unwrap()
                } else {
                    [0; 4]
                };
                let payload: Vec<u8> = buffer[header + mask_len..total]
                    .iter()
                    .enumerate()
                    .map(|(i, b)| b ^ mask[i % 4])
                    .collect();
                buffer.drain(..total);
                return Ok(Some((opcode, payload)));
            }
        }
        if fill(stream, buffer).await? == 0 {
            return Ok(None);
        }
    }
}

async fn fill(stream: &mut TcpStream, buffer: &mut Vec<u8>) -> std::io::Result<usize> {
    let mut chunk = [0u8; 4096];
    let n = stream.read(&mut chunk).await?;
    buffer.extend_from_slice(&chunk[..n]);
    Ok(n)
}

/// Write one unmasked server frame.
async fn write_frame(stream: &mut TcpStream, opcode: u8, payload: &[u8]) -> std::io::Result<()> {
    let mut frame = vec![0x80 | opcode];
    if payload.len() < 126 {
        frame.push(payload.len() as u8);
    } else if payload.len() <= u16::MAX as usize {
        frame.push(126);
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    } else {
        frame.push(127);
        frame.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    }
    frame.extend_from_slice(payload);
    stream.write_all(&frame).await?;
    stream.flush().await
}
