//! BoringSSL TLS connector parameterized by an impersonation profile.

use std::io;
use std::io::Read;
use std::pin::Pin;
use std::task::{Context, Poll};

use boring::ssl::{SslConnector, SslMethod, SslSessionCacheMode, SslVerifyMode, SslVersion};
use boring::x509::X509;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_boring::SslStream;

use crate::error::{Error, Result};
use crate::profile::tls::{CertCompression, TlsProfile};

// FFI bindings for BoringSSL extension control not exposed by the boring
// crate's safe API.
use boring_sys::{CRYPTO_BUFFER, SSL, SSL_CTX};
use std::os::raw::c_int;

extern "C" {
    /// Enable GREASE (RFC 8701) values in the ClientHello.
    fn SSL_CTX_set_grease_enabled(ctx: *mut SSL_CTX, enabled: c_int) -> c_int;
    /// Enable extension order permutation (Chrome 110+ behavior).
    fn SSL_CTX_set_permute_extensions(ctx: *mut SSL_CTX, enabled: c_int) -> c_int;
}

/// Brotli certificate decompression callback for BoringSSL.
unsafe extern "C" fn decompress_brotli_cert(
    _ssl: *mut SSL,
    out: *mut *mut CRYPTO_BUFFER,
    uncompressed_len: usize,
    in_: *const u8,
    in_len: usize,
) -> c_int {
    let compressed = std::slice::from_raw_parts(in_, in_len);
    let mut decompressed = Vec::with_capacity(uncompressed_len);
    let mut decoder = brotli::Decompressor::new(compressed, uncompressed_len);
    match decoder.read_to_end(&mut decompressed) {
        Ok(_) if decompressed.len() == uncompressed_len => {
            let buffer = boring_sys::CRYPTO_BUFFER_new(
                decompressed.as_ptr(),
                decompressed.len(),
                std::ptr::null_mut(),
            );
            if buffer.is_null() {
                return 0;
            }
            *out = buffer;
            1
        }
        _ => 0,
    }
}

/// Zlib certificate decompression callback for BoringSSL.
unsafe extern "C" fn decompress_zlib_cert(
    _ssl: *mut SSL,
    out: *mut *mut CRYPTO_BUFFER,
    uncompressed_len: usize,
    in_: *const u8,
    in_len: usize,
) -> c_int {
    let compressed = std::slice::from_raw_parts(in_, in_len);
    let mut decoder = flate2::read::ZlibDecoder::new(compressed);
    let mut decompressed = Vec::with_capacity(uncompressed_len);
    match decoder.read_to_end(&mut decompressed) {
        Ok(_) if decompressed.len() == uncompressed_len => {
            let buffer = boring_sys::CRYPTO_BUFFER_new(
                decompressed.as_ptr(),
                decompressed.len(),
                std::ptr::null_mut(),
            );
            if buffer.is_null() {
                return 0;
            }
            *out = buffer;
            1
        }
        _ => 0,
    }
}

/// Caller-controlled TLS policy, independent of the impersonation profile.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Skip certificate verification. Explicit opt-in.
    pub danger_accept_invalid_certs: bool,
    /// Additional trust anchors (DER or PEM).
    pub root_certs: Vec<Vec<u8>>,
    /// Restrict the ALPN offer (HTTP version pin); `None` offers the
    /// profile's list.
    pub alpn_override: Option<Vec<&'static str>>,
}

/// Negotiated ALPN protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alpn {
    H2,
    Http1,
    None,
}

/// TLS connector applying a profile's ClientHello parameters.
#[derive(Clone)]
pub struct Connector {
    profile: &'static TlsProfile,
    options: TlsOptions,
}

impl Connector {
    pub fn new(profile: &'static TlsProfile, options: TlsOptions) -> Self {
        Self { profile, options }
    }

    fn configure_ssl(&self, host: &str) -> Result<SslConnector> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())
            .map_err(|e| Error::tls(host, format!("connector init: {e}")))?;
        let fp = self.profile;

        if !fp.ciphers.is_empty() {
            builder
                .set_cipher_list(&fp.ciphers.join(":"))
                .map_err(|e| Error::tls(host, format!("cipher list: {e}")))?;
        }

        let curves = match fp.post_quantum {
            Some(pq) => format!("{pq}:{}", fp.curves.join(":")),
            None => fp.curves.join(":"),
        };
        builder
            .set_curves_list(&curves)
            .map_err(|e| Error::tls(host, format!("curves: {e}")))?;

        if !fp.sigalgs.is_empty() {
            builder
                .set_sigalgs_list(&fp.sigalgs.join(":"))
                .map_err(|e| Error::tls(host, format!("sigalgs: {e}")))?;
        }

        builder
            .set_min_proto_version(Some(SslVersion::TLS1_2))
            .map_err(|e| Error::tls(host, format!("min version: {e}")))?;
        builder
            .set_max_proto_version(Some(SslVersion::TLS1_3))
            .map_err(|e| Error::tls(host, format!("max version: {e}")))?;

        unsafe {
            let ctx = builder.as_ptr() as *mut SSL_CTX;
            SSL_CTX_set_grease_enabled(ctx, fp.grease as c_int);
            SSL_CTX_set_permute_extensions(ctx, fp.permute_extensions as c_int);

            match fp.cert_compression {
                CertCompression::Brotli => {
                    boring_sys::SSL_CTX_add_cert_compression_alg(
                        ctx,
                        boring_sys::TLSEXT_cert_compression_brotli as u16,
                        None,
                        Some(decompress_brotli_cert),
                    );
                }
                CertCompression::Zlib => {
                    boring_sys::SSL_CTX_add_cert_compression_alg(
                        ctx,
                        boring_sys::TLSEXT_cert_compression_zlib as u16,
                        None,
                        Some(decompress_zlib_cert),
                    );
                }
                CertCompression::None => {}
            }
        }

        for cert_bytes in &self.options.root_certs {
            let cert = X509::from_der(cert_bytes)
                .or_else(|_| X509::from_pem(cert_bytes))
                .map_err(|e| Error::config(format!("invalid root certificate: {e}")))?;
            builder
                .cert_store_mut()
                .add_cert(cert)
                .map_err(|e| Error::config(format!("root certificate rejected: {e}")))?;
        }

        if self.options.danger_accept_invalid_certs {
            builder.set_verify(SslVerifyMode::NONE);
        }

        // Browsers resume sessions; keep client-side caching on.
        builder.set_session_cache_mode(SslSessionCacheMode::CLIENT);

        let alpn: &[&str] = match &self.options.alpn_override {
            Some(list) => list,
            None => fp.alpn,
        };
        builder
            .set_alpn_protos(&encode_alpn(alpn))
            .map_err(|e| Error::tls(host, format!("ALPN: {e}")))?;

        Ok(builder.build())
    }

    /// Perform the TLS handshake over an established stream.
    ///
    /// The resulting ClientHello is wholly determined by the profile; a
    /// server that negotiates a protocol outside the offered ALPN list is a
    /// protocol violation, not a fallback.
    pub async fn handshake(&self, stream: TcpStream, host: &str) -> Result<MaybeTlsStream> {
        let connector = self.configure_ssl(host)?;
        let config = connector
            .configure()
            .map_err(|e| Error::tls(host, format!("configure: {e}")))?;

        let tls = tokio_boring::connect(config, host, stream)
            .await
            .map_err(|e| Error::tls(host, format!("handshake: {e}")))?;

        let offered: &[&str] = match &self.options.alpn_override {
            Some(list) => list,
            None => self.profile.alpn,
        };
        if let Some(proto) = tls.ssl().selected_alpn_protocol() {
            let negotiated = std::str::from_utf8(proto).unwrap_or("");
            if !offered.contains(&negotiated) {
                return Err(Error::protocol_violation(format!(
                    "server negotiated ALPN {negotiated:?}, offered {offered:?}"
                )));
            }
        }

        Ok(MaybeTlsStream::Tls(Box::new(tls)))
    }
}

/// Wire-encode an ALPN protocol list.
fn encode_alpn(protocols: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for p in protocols {
        out.push(p.len() as u8);
        out.extend_from_slice(p.as_bytes());
    }
    out
}

/// Stream that is either plain TCP or TLS-wrapped.
#[derive(Debug)]
pub enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<SslStream<TcpStream>>),
}

impl MaybeTlsStream {
    /// The negotiated ALPN protocol. Plain streams have none.
    pub fn alpn(&self) -> Alpn {
        match self {
            Self::Plain(_) => Alpn::None,
            Self::Tls(stream) => match stream.ssl().selected_alpn_protocol() {
                Some(b"h2") => Alpn::H2,
                Some(b"http/1.1") => Alpn::Http1,
                _ => Alpn::None,
            },
        }
    }

    /// DER bytes of the peer certificate, when TLS is in use.
    pub fn peer_certificate(&self) -> Option<Vec<u8>> {
        match self {
            Self::Plain(_) => None,
            Self::Tls(stream) => stream
                .ssl()
                .peer_certificate()
                .and_then(|cert| cert.to_der().ok()),
        }
    }
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}
