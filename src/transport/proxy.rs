//! Proxy hop establishment: HTTP CONNECT tunnels and SOCKS5.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Phase, Result};
use crate::proxy::Proxy;
use crate::transport::tcp::{self, TcpOptions};

/// How requests must be written once the proxy hop is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyMode {
    /// No proxy: requests go directly to the origin.
    Direct,
    /// Tunneled (CONNECT or SOCKS5): the stream speaks to the origin.
    Tunneled,
    /// Plain-HTTP forward proxy: requests use absolute-form and carry
    /// these extra hop headers.
    Forward { headers: Vec<(String, String)> },
}

/// Basic `Proxy-Authorization` header value.
fn proxy_authorization(proxy: &Proxy) -> Option<(String, String)> {
    proxy.credentials().map(|(user, pass)| {
        (
            "Proxy-Authorization".to_string(),
            format!("Basic {}", BASE64.encode(format!("{user}:{pass}"))),
        )
    })
}

/// Open a TCP stream to the target, routed through `proxy` when present.
///
/// For HTTPS targets the returned stream is ready for the TLS handshake
/// with the origin; for plain HTTP through an HTTP proxy the returned mode
/// instructs the request writer to use absolute-form.
pub async fn establish(
    proxy: Option<&Proxy>,
    target_host: &str,
    target_port: u16,
    target_is_tls: bool,
    options: &TcpOptions,
) -> Result<(TcpStream, ProxyMode)> {
    let Some(proxy) = proxy else {
        let stream = tcp::connect(target_host, target_port, options).await?;
        return Ok((stream, ProxyMode::Direct));
    };

    let proxy_url = proxy.url();
    let proxy_host = proxy_url
        .host_str()
        .ok_or_else(|| Error::config("proxy URL has no host"))?;
    let proxy_port = proxy_url
        .port_or_known_default()
        .unwrap_or(if proxy.is_socks() { 1080 } else { 8080 });

    let mut stream = tcp::connect(proxy_host, proxy_port, options).await?;

    if proxy.is_socks() {
        socks5_handshake(&mut stream, proxy, target_host, target_port).await?;
        return Ok((stream, ProxyMode::Tunneled));
    }

    if target_is_tls {
        connect_tunnel(&mut stream, proxy, target_host, target_port).await?;
        return Ok((stream, ProxyMode::Tunneled));
    }

    // Plain HTTP through an HTTP proxy: no tunnel, absolute-form requests.
    let mut headers: Vec<(String, String)> = Vec::new();
    if let Some(auth) = proxy_authorization(proxy) {
        headers.push(auth);
    }
    headers.extend(proxy.headers().iter().cloned());
    Ok((stream, ProxyMode::Forward { headers }))
}

/// Send a CONNECT request and wait for a 2xx.
async fn connect_tunnel(
    stream: &mut TcpStream,
    proxy: &Proxy,
    host: &str,
    port: u16,
) -> Result<()> {
    let mut request = Vec::with_capacity(256);
    request.extend_from_slice(format!("CONNECT {host}:{port} HTTP/1.1\r\n").as_bytes());
    request.extend_from_slice(format!("Host: {host}:{port}\r\n").as_bytes());
    if let Some((name, value)) = proxy_authorization(proxy) {
        request.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    for (name, value) in proxy.headers() {
        request.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    request.extend_from_slice(b"\r\n");

    stream
        .write_all(&request)
        .await
        .map_err(|e| Error::connect(host, format!("CONNECT write: {e}")))?;

    // Read until end of response head.
    let mut buffer = Vec::with_capacity(1024);
    loop {
        let mut chunk = [0u8; 1024];
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| Error::connect(host, format!("CONNECT read: {e}")))?;
        if n == 0 {
            return Err(Error::connect(host, "proxy closed during CONNECT"));
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if buffer.len() > 16 * 1024 {
            return Err(Error::http(Phase::Connect, "CONNECT response too large"));
        }
    }

    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut response = httparse::Response::new(&mut headers);
    response
        .parse(&buffer)
        .map_err(|e| Error::http(Phase::Connect, format!("CONNECT parse: {e}")))?;
    match response.code {
        Some(code) if (200..300).contains(&code) => Ok(()),
        Some(code) => Err(Error::connect(host, format!("proxy refused CONNECT: {code}"))),
        None => Err(Error::http(Phase::Connect, "CONNECT response incomplete")),
    }
}

/// SOCKS5 greeting, optional username/password auth, and CONNECT command.
async fn socks5_handshake(
    stream: &mut TcpStream,
    proxy: &Proxy,
    host: &str,
    port: u16,
) -> Result<()> {
    let has_auth = proxy.credentials().is_some();
    let methods: &[u8] = if has_auth { &[0x00, 0x02] } else { &[0x00] };

    let mut greeting = vec![0x05, methods.len() as u8];
    greeting.extend_from_slice(methods);
    stream
        .write_all(&greeting)
        .await
        .map_err(|e| Error::connect(host, format!("socks5 greeting: {e}")))?;

    let mut reply = [0u8; 2];
    stream
        .read_exact(&mut reply)
        .await
        .map_err(|e| Error::connect(host, format!("socks5 reply: {e}")))?;
    if reply[0] != 0x05 {
        return Err(Error::connect(host, "not a SOCKS5 proxy"));
    }

    match reply[1] {
        0x00 => {}
        0x02 => {
            let (user, pass) = proxy
                .credentials()
                .ok_or_else(|| Error::connect(host, "proxy requires credentials"))?;
            let mut auth = vec![0x01, user.len() as u8];
            auth.extend_from_slice(user.as_bytes());
            auth.push(pass.len() as u8);
            auth.extend_from_slice(pass.as_bytes());
            stream
                .write_all(&auth)
                .await
                .map_err(|e| Error::connect(host, format!("socks5 auth: {e}")))?;

            let mut auth_reply = [0u8; 2];
            stream
                .read_exact(&mut auth_reply)
                .await
                .map_err(|e| Error::connect(host, format!("socks5 auth reply: {e}")))?;
            if auth_reply[1] != 0x00 {
                return Err(Error::connect(host, "socks5 auth rejected"));
            }
        }
        _ => return Err(Error::connect(host, "socks5: no acceptable auth method")),
    }

    // CONNECT with domain-name address type; the proxy resolves DNS.
    if host.len() > 255 {
        return Err(Error::config("socks5 target hostname too long"));
    }
    let mut connect = vec![0x05, 0x01, 0x00, 0x03, host.len() as u8];
    connect.extend_from_slice(host.as_bytes());
    connect.extend_from_slice(&port.to_be_bytes());
    stream
        .write_all(&connect)
        .await
        .map_err(|e| Error::connect(host, format!("socks5 connect: {e}")))?;

    let mut head = [0u8; 4];
    stream
        .read_exact(&mut head)
        .await
        .map_err(|e| Error::connect(host, format!("socks5 connect reply: {e}")))?;
    if head[1] != 0x00 {
        return Err(Error::connect(host, format!("socks5 connect failed: {:#04x}", head[1])));
    }

    // Drain the bound address in the reply.
    let addr_len = match head[3] {
        0x01 => 4,
        0x04 => 16,
        0x03 => {
            let mut len = [0u8; 1];
            stream
                .read_exact(&mut len)
                .await
                .map_err(|e| Error::connect(host, format!("socks5 bound addr: {e}")))?;
            len[0] as usize
        }
        other => {
            return Err(Error::connect(host, format!("socks5 bad address type: {other}")))
        }
    };
    let mut rest = vec![0u8; addr_len + 2];
    stream
        .read_exact(&mut rest)
        .await
        .map_err(|e| Error::connect(host, format!("socks5 bound addr: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn direct_when_no_proxy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (_, mode) = establish(None, "127.0.0.1", port, false, &TcpOptions::default())
            .await
            .unwrap();
        assert_eq!(mode, ProxyMode::Direct);
    }

    #[tokio::test]
    async fn connect_tunnel_happy_path() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = sock.read(&mut buf).await.unwrap();
            let head = String::from_utf8_lossy(&buf[..n]).to_string();
            assert!(head.starts_with("CONNECT example.com:443 HTTP/1.1\r\n"));
            sock.write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                .await
                .unwrap();
        });

        let proxy = Proxy::all(&format!("http://127.0.0.1:{port}")).unwrap();
        let (_, mode) = establish(
            Some(&proxy),
            "example.com",
            443,
            true,
            &TcpOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(mode, ProxyMode::Tunneled);
    }

    #[tokio::test]
    async fn connect_tunnel_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let _ = sock.read(&mut buf).await.unwrap();
            sock.write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .await
                .unwrap();
        });

        let proxy = Proxy::all(&format!("http://127.0.0.1:{port}")).unwrap();
        let err = establish(
            Some(&proxy),
            "example.com",
            443,
            true,
            &TcpOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
    }

    #[tokio::test]
    async fn forward_mode_carries_proxy_auth() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Keep the listener alive; no bytes exchanged in forward mode setup.
        let proxy = Proxy::http(&format!("http://127.0.0.1:{port}"))
            .unwrap()
            .basic_auth("user", "pass");
        let (_, mode) = establish(
            Some(&proxy),
            "example.com",
            80,
            false,
            &TcpOptions::default(),
        )
        .await
        .unwrap();
        match mode {
            ProxyMode::Forward { headers } => {
                assert_eq!(headers[0].0, "Proxy-Authorization");
                assert!(headers[0].1.starts_with("Basic "));
            }
            other => panic!("expected forward mode, got {other:?}"),
        }
    }
}
