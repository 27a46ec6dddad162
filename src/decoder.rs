//! Incremental content decoding.
//!
//! Reverses `Content-Encoding` (gzip, deflate, br, zstd) chunk by chunk so
//! the streaming path never has to buffer a whole body. The buffered path
//! feeds one chunk and finishes.

use std::io::Write;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Supported content encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Identity,
    Gzip,
    Deflate,
    Brotli,
    Zstd,
}

impl Encoding {
    /// Map a `Content-Encoding` header value.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("gzip") | Some("x-gzip") => Self::Gzip,
            Some("deflate") => Self::Deflate,
            Some("br") => Self::Brotli,
            Some("zstd") => Self::Zstd,
            _ => Self::Identity,
        }
    }

    /// Sniff magic bytes when the header is absent.
    pub fn sniff(data: &[u8]) -> Self {
        if data.len() >= 4 && data[..4] == [0x28, 0xb5, 0x2f, 0xfd] {
            return Self::Zstd;
        }
        if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
            return Self::Gzip;
        }
        Self::Identity
    }
}

enum Inner {
    Identity,
    Gzip(Box<flate2::write::GzDecoder<Vec<u8>>>),
    Zlib(Box<flate2::write::ZlibDecoder<Vec<u8>>>),
    RawDeflate(Box<flate2::write::DeflateDecoder<Vec<u8>>>),
    /// Deflate variant not yet decided; picked by sniffing the first chunk.
    DeflatePending,
    /// Brotli and zstd decode whole-stream: input accumulates and the
    /// output is produced at finish.
    Brotli(Vec<u8>),
    Zstd(Vec<u8>),
}

/// Stateful decoder fed compressed chunks, yielding decompressed bytes.
pub struct Decoder {
    inner: Inner,
}

impl Decoder {
    /// Create a decoder for an encoding.
    pub fn new(encoding: Encoding) -> Result<Self> {
        let inner = match encoding {
            Encoding::Identity => Inner::Identity,
            Encoding::Gzip => Inner::Gzip(Box::new(flate2::write::GzDecoder::new(Vec::new()))),
            Encoding::Deflate => Inner::DeflatePending,
            Encoding::Brotli => Inner::Brotli(Vec::new()),
            Encoding::Zstd => Inner::Zstd(Vec::new()),
        };
        Ok(Self { inner })
    }

    /// Feed a compressed chunk, returning whatever decompressed output it
    /// produced.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Bytes> {
        if chunk.is_empty() {
            return Ok(Bytes::new());
        }

        // Some servers send raw deflate where zlib is declared; a zlib
        // stream starts with 0x78 (CMF: deflate, 32K window).
        if matches!(self.inner, Inner::DeflatePending) {
            self.inner = if chunk[0] & 0x0f == 8 {
                Inner::Zlib(Box::new(flate2::write::ZlibDecoder::new(Vec::new())))
            } else {
                Inner::RawDeflate(Box::new(flate2::write::DeflateDecoder::new(Vec::new())))
            };
        }

        match &mut self.inner {
            Inner::Identity => Ok(Bytes::copy_from_slice(chunk)),
            Inner::DeflatePending => unreachable!("deflate variant decided above"),
            Inner::Gzip(d) => {
                d.write_all(chunk)
                    .and_then(|_| d.flush())
                    .map_err(|e| Error::decode(format!("gzip: {e}")))?;
                Ok(Bytes::from(std::mem::take(d.get_mut())))
            }
            Inner::Zlib(d) => {
                d.write_all(chunk)
                    .and_then(|_| d.flush())
                    .map_err(|e| Error::decode(format!("deflate: {e}")))?;
                Ok(Bytes::from(std::mem::take(d.get_mut())))
            }
            Inner::RawDeflate(d) => {
                d.write_all(chunk)
                    .and_then(|_| d.flush())
                    .map_err(|e| Error::decode(format!("deflate: {e}")))?;
                Ok(Bytes::from(std::mem::take(d.get_mut())))
            }
            Inner::Brotli(buf) | Inner::Zstd(buf) => {
                buf.extend_from_slice(chunk);
                Ok(Bytes::new())
            }
        }
    }

    /// Flush trailing output after the last compressed chunk.
    pub fn finish(self) -> Result<Bytes> {
        match self.inner {
            Inner::Identity | Inner::DeflatePending => Ok(Bytes::new()),
            Inner::Gzip(d) => d
                .finish()
                .map(Bytes::from)
                .map_err(|e| Error::decode(format!("gzip finish: {e}"))),
            Inner::Zlib(d) => d
                .finish()
                .map(Bytes::from)
                .map_err(|e| Error::decode(format!("deflate finish: {e}"))),
            Inner::RawDeflate(d) => d
                .finish()
                .map(Bytes::from)
                .map_err(|e| Error::decode(format!("deflate finish: {e}"))),
            Inner::Brotli(buf) => {
                let mut decoder = brotli::Decompressor::new(&buf[..], 4096);
                let mut out = Vec::new();
                std::io::Read::read_to_end(&mut decoder, &mut out)
                    .map_err(|e| Error::decode(format!("brotli: {e}")))?;
                Ok(Bytes::from(out))
            }
            Inner::Zstd(buf) => zstd::stream::decode_all(&buf[..])
                .map(Bytes::from)
                .map_err(|e| Error::decode(format!("zstd: {e}"))),
        }
    }
}

/// Decode a fully buffered body in one shot.
pub fn decode_full(encoding: Encoding, data: &[u8]) -> Result<Bytes> {
    // Fall back to magic-byte sniffing when no encoding was declared.
    let encoding = if encoding == Encoding::Identity {
        Encoding::sniff(data)
    } else {
        encoding
    };
    if encoding == Encoding::Identity {
        return Ok(Bytes::copy_from_slice(data));
    }
    let mut decoder = Decoder::new(encoding)?;
    let mut out = Vec::new();
    out.extend_from_slice(&decoder.feed(data)?);
    out.extend_from_slice(&decoder.finish()?);
    Ok(Bytes::from(out))
}
