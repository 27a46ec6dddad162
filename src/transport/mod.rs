//! Transport implementations.
//!
//! - TCP dial with socket-level options
//! - TLS via BoringSSL, parameterized by the impersonation profile
//! - Proxy hops (HTTP CONNECT and SOCKS5)
//! - HTTP/1.1 with hand-written framing, HTTP/2 via the h2 crate

pub mod connector;
pub mod h1;
pub mod h2;
pub mod proxy;
pub mod tcp;

pub use connector::{Connector, MaybeTlsStream, TlsOptions};
