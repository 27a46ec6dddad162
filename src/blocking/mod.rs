//! Thread-blocking front-end.
//!
//! Thin wrappers that drive the async client on a shared multi-thread
//! runtime. The pool, cookie jar and profile snapshot are the same
//! structures the async front-end uses, so both call modes can share one
//! session safely.
//!
//! Calls in this module block the current thread and must not be made from
//! inside an async runtime.

mod client;
mod response;
mod ws;

pub use client::{Client, ClientBuilder, RequestBuilder};
pub use response::{BlockingBodyIter, Response};
pub use ws::WebSocket;

use std::sync::OnceLock;

use tokio::runtime::Runtime;

/// Runtime shared by every blocking handle.
pub(crate) fn runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("guise-blocking")
            .build()
            .expect("failed to start blocking runtime")
    })
}
