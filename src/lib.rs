//! # guise
//!
//! HTTP(S) and WebSocket client that impersonates the TLS and HTTP
//! fingerprints of real browsers: ClientHello shape via BoringSSL, HTTP/2
//! SETTINGS via h2, and ordered browser header sets, so traffic from this
//! client is indistinguishable at the protocol level from the browser it
//! mimics.
//!
//! ```no_run
//! use guise::{Client, Impersonate};
//!
//! # async fn run() -> guise::Result<()> {
//! let client = Client::builder()
//!     .impersonate(Impersonate::Chrome131)
//!     .cookie_store(true)
//!     .build()?;
//!
//! let response = client.get("https://example.com").send().await?;
//! println!("{}", response.text().await?);
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod client;
pub mod cookie;
pub mod error;
pub mod profile;
pub mod proxy;
pub mod version;
pub mod ws;

mod decoder;
mod headers;
mod pool;
mod transport;

pub use client::{
    Auth, Body, BodyStream, Client, ClientBuilder, Form, Part, RequestBuilder, Response, Update,
};
pub use cookie::{Cookie, Jar};
pub use error::{Error, Result};
pub use headers::OrderedHeaders;
pub use profile::{Impersonate, ImpersonateOs, Profile};
pub use proxy::Proxy;
pub use version::Version;
pub use ws::{Message, WebSocket, WebSocketBuilder};

use std::sync::OnceLock;

use http::Method;

/// Shared client backing the one-shot convenience calls.
fn default_client() -> &'static Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();
    CLIENT.get_or_init(Client::new)
}

/// One-shot GET on a shared default client.
pub fn get(url: impl Into<String>) -> RequestBuilder {
    default_client().get(url)
}

/// One-shot POST on a shared default client.
pub fn post(url: impl Into<String>) -> RequestBuilder {
    default_client().post(url)
}

/// One-shot PUT on a shared default client.
pub fn put(url: impl Into<String>) -> RequestBuilder {
    default_client().put(url)
}

/// One-shot PATCH on a shared default client.
pub fn patch(url: impl Into<String>) -> RequestBuilder {
    default_client().patch(url)
}

/// One-shot DELETE on a shared default client.
pub fn delete(url: impl Into<String>) -> RequestBuilder {
    default_client().delete(url)
}

/// One-shot HEAD on a shared default client.
pub fn head(url: impl Into<String>) -> RequestBuilder {
    default_client().head(url)
}

/// One-shot OPTIONS on a shared default client.
pub fn options(url: impl Into<String>) -> RequestBuilder {
    default_client().options(url)
}

/// One-shot TRACE on a shared default client.
pub fn trace(url: impl Into<String>) -> RequestBuilder {
    default_client().trace(url)
}

/// One-shot request with an arbitrary method on a shared default client.
pub fn request(method: Method, url: impl Into<String>) -> RequestBuilder {
    default_client().request(method, url)
}

/// One-shot WebSocket upgrade on a shared default client.
pub fn websocket(url: impl Into<String>) -> WebSocketBuilder {
    default_client().websocket(url)
}
