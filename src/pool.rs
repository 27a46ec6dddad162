//! Connection pool.
//!
//! Connections are keyed by everything that shapes their wire identity:
//! scheme, host, port, the resolved proxy, and the impersonation profile.
//! A checked-out connection is exclusively owned until it is returned, so
//! two request bodies can never interleave on one transport; returning it
//! requires the previous response to have been fully drained.
//!
//! A per-key semaphore caps concurrent connections, providing backpressure
//! instead of unbounded transport growth.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};
use crate::profile::{Impersonate, ImpersonateOs};
use crate::transport::h1::H1Connection;
use crate::transport::h2::H2Connection;
use crate::transport::proxy::ProxyMode;

/// Identity of a pooled connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PoolKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Resolved proxy URL, when one applies.
    pub proxy: Option<String>,
    pub profile: (Impersonate, ImpersonateOs),
}

/// A pooled transport: exclusive HTTP/1.1 or sequentially reused HTTP/2.
pub(crate) enum PooledTransport {
    H1(H1Connection),
    H2(H2Connection),
}

impl PooledTransport {
    fn is_reusable(&self) -> bool {
        match self {
            Self::H1(conn) => conn.is_reusable(),
            Self::H2(conn) => conn.is_reusable(),
        }
    }
}

struct IdleConn {
    transport: PooledTransport,
    mode: ProxyMode,
    since: Instant,
}

struct KeyState {
    idle: VecDeque<IdleConn>,
    limit: Arc<Semaphore>,
}

/// Pool tuning knobs.
#[derive(Debug, Clone)]
pub(crate) struct PoolConfig {
    /// Concurrent connections per key; acquisition beyond this waits.
    pub max_per_key: usize,
    /// Idle connections kept per key.
    pub max_idle_per_key: usize,
    /// Idle connections older than this are closed on next access.
    pub idle_timeout: Duration,
    /// How long acquisition may wait for a permit.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_per_key: 6,
            max_idle_per_key: 4,
            idle_timeout: Duration::from_secs(90),
            acquire_timeout: None,
        }
    }
}

/// Shared connection pool. One instance serves both call modes.
pub(crate) struct Pool {
    keys: Mutex<HashMap<PoolKey, KeyState>>,
    config: PoolConfig,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Acquire a connection slot for a key.
    ///
    /// Returns a permit (backpressure token) plus an idle transport when a
    /// fresh-enough one is available; otherwise the caller dials.
    pub async fn acquire(self: &Arc<Self>, key: &PoolKey) -> Result<Acquired> {
        let semaphore = {
            let mut keys = self.keys.lock().unwrap();
            let state = keys.entry(key.clone()).or_insert_with(|| KeyState {
                idle: VecDeque::new(),
                limit: Arc::new(Semaphore::new(self.config.max_per_key)),
            });
            state.limit.clone()
        };

        let permit = match self.config.acquire_timeout {
            Some(timeout) => tokio::time::timeout(timeout, semaphore.acquire_owned())
                .await
                .map_err(|_| Error::PoolAcquireTimeout(timeout))?,
            None => semaphore.acquire_owned().await,
        }
        .map_err(|_| Error::StreamClosed("connection pool closed".into()))?;

        let idle = self.pop_idle(key);
        Ok(Acquired {
            pool: Arc::clone(self),
            key: key.clone(),
            permit,
            idle,
        })
    }

    fn pop_idle(&self, key: &PoolKey) -> Option<(PooledTransport, ProxyMode)> {
        let mut keys = self.keys.lock().unwrap();
        let state = keys.get_mut(key)?;
        while let Some(conn) = state.idle.pop_front() {
            if conn.since.elapsed() < self.config.idle_timeout {
                return Some((conn.transport, conn.mode));
            }
            tracing::debug!(host = %key.host, "closing idle connection past timeout");
        }
        None
    }

    /// Return a drained connection for sequential reuse.
    fn put_idle(&self, key: &PoolKey, transport: PooledTransport, mode: ProxyMode) {
        if !transport.is_reusable() {
            return;
        }
        let mut keys = self.keys.lock().unwrap();
        if let Some(state) = keys.get_mut(key) {
            if state.idle.len() < self.config.max_idle_per_key {
                state.idle.push_back(IdleConn {
                    transport,
                    mode,
                    since: Instant::now(),
                });
            }
        }
    }

    /// Number of idle connections under a key (test accounting).
    #[cfg(test)]
    pub fn idle_count(&self, key: &PoolKey) -> usize {
        self.keys
            .lock()
            .unwrap()
            .get(key)
            .map(|s| s.idle.len())
            .unwrap_or(0)
    }

    /// Drop every idle connection (client shutdown).
    pub fn clear_idle(&self) {
        let mut keys = self.keys.lock().unwrap();
        for state in keys.values_mut() {
            state.idle.clear();
        }
    }
}

/// A granted pool slot, possibly carrying an idle transport.
pub(crate) struct Acquired {
    pool: Arc<Pool>,
    key: PoolKey,
    permit: OwnedSemaphorePermit,
    idle: Option<(PooledTransport, ProxyMode)>,
}

impl Acquired {
    /// Take the idle transport, if one was found.
    pub fn take_idle(&mut self) -> Option<(PooledTransport, ProxyMode)> {
        self.idle.take()
    }

    /// Keep only the permit (connections that never return to the pool,
    /// e.g. WebSocket sessions).
    pub fn into_token(self) -> ConnectionToken {
        ConnectionToken {
            _permit: self.permit,
        }
    }

    /// Convert into a checkout guard around a live transport.
    pub fn into_checkout(self, transport: PooledTransport, mode: ProxyMode) -> Checkout {
        Checkout {
            pool: self.pool,
            key: self.key,
            _permit: self.permit,
            transport: Some(transport),
            mode,
        }
    }
}

/// Exclusive ownership of a pooled connection for one exchange.
///
/// Dropping the guard without [`Checkout::release`] discards the transport
/// (a possibly-dirty connection never goes back to the pool); the permit is
/// freed either way.
pub(crate) struct Checkout {
    pool: Arc<Pool>,
    key: PoolKey,
    _permit: OwnedSemaphorePermit,
    transport: Option<PooledTransport>,
    mode: ProxyMode,
}

impl Checkout {
    /// Mutable access to the transport.
    pub fn transport_mut(&mut self) -> &mut PooledTransport {
        self.transport.as_mut().expect("transport taken")
    }

    /// Return the drained transport to the pool for sequential reuse.
    pub fn release(mut self) {
        if let Some(transport) = self.transport.take() {
            self.pool.put_idle(&self.key, transport, self.mode.clone());
        }
    }
}

/// Holds a pool permit for the lifetime of a connection that never returns
/// to the pool (WebSocket sessions).
pub(crate) struct ConnectionToken {
    _permit: OwnedSemaphorePermit,
}
