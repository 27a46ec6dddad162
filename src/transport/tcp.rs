//! DNS resolution and TCP dialing.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{lookup_host, TcpStream};
use tokio::task;

use crate::error::{Error, Result};

/// Socket-level options applied to every new connection.
#[derive(Debug, Clone, Default)]
pub struct TcpOptions {
    /// Enable `TCP_NODELAY`.
    pub nodelay: bool,
    /// Enable `SO_KEEPALIVE` with this interval.
    pub keepalive: Option<Duration>,
    /// Bind to a local address before connecting.
    pub local_address: Option<IpAddr>,
}

/// Resolve a host and connect, applying socket options.
///
/// The socket2 configure/connect sequence is blocking, so it runs on the
/// blocking pool and the finished socket is handed to tokio non-blocking.
pub async fn connect(host: &str, port: u16, options: &TcpOptions) -> Result<TcpStream> {
    let addr = resolve(host, port).await?;

    let host_owned = host.to_string();
    let options = options.clone();
    let std_stream = task::spawn_blocking(move || -> Result<std::net::TcpStream> {
        let domain = match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| Error::connect(&host_owned, format!("socket: {e}")))?;

        if options.nodelay {
            socket
                .set_nodelay(true)
                .map_err(|e| Error::connect(&host_owned, format!("TCP_NODELAY: {e}")))?;
        }
        if let Some(interval) = options.keepalive {
            let keepalive = socket2::TcpKeepalive::new().with_time(interval);
            socket
                .set_tcp_keepalive(&keepalive)
                .map_err(|e| Error::connect(&host_owned, format!("SO_KEEPALIVE: {e}")))?;
        }
        if let Some(local) = options.local_address {
            let bind_addr = SocketAddr::new(local, 0);
            socket
                .bind(&bind_addr.into())
                .map_err(|e| Error::connect(&host_owned, format!("bind {local}: {e}")))?;
        }

        socket
            .connect(&addr.into())
            .map_err(|e| Error::connect(&host_owned, format!("connect {addr}: {e}")))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| Error::connect(&host_owned, format!("nonblocking: {e}")))?;
        Ok(socket.into())
    })
    .await
    .map_err(|e| Error::connect(host, format!("connect task: {e}")))??;

    TcpStream::from_std(std_stream).map_err(|e| Error::connect(host, format!("register: {e}")))
}

/// Resolve a hostname to the first usable address.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    lookup_host((host, port))
        .await
        .map_err(|e| Error::connect(host, format!("DNS: {e}")))?
        .next()
        .ok_or_else(|| Error::connect(host, "DNS returned no addresses"))
}
