//! Address advertisement.
//!
//! Clients find the server by asking a well-known HTTP endpoint for the
//! current address. At startup the server works out which of its addresses
//! other machines can reach and form-posts it there.

use crate::config::ServerConfig;
use crate::error::ServerError;
use log::info;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

const ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Picks the local IPv4 address the OS would use for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only asks the routing table
/// which interface applies.
pub async fn routable_address() -> Result<IpAddr, ServerError> {
    let resolve_err = |e: std::io::Error| ServerError::AddressResolution(e.to_string());

    let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
        .await
        .map_err(resolve_err)?;
    socket
        .connect(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80))
        .await
        .map_err(resolve_err)?;
    let ip = socket.local_addr().map_err(resolve_err)?.ip();

    if ip.is_unspecified() || ip.is_loopback() {
        return Err(ServerError::AddressResolution(format!(
            "only found non-routable address {}",
            ip
        )));
    }
    Ok(ip)
}

/// The address to announce: the configured override, or whatever
/// `routable_address` finds.
pub async fn advertised_address(config: &ServerConfig) -> Result<IpAddr, ServerError> {
    match config.advertise_addr {
        Some(ip) => Ok(ip),
        None => routable_address().await,
    }
}

/// Form-posts `ipAddr=<addr>` to the discovery endpoint.
pub async fn announce(url: &str, addr: IpAddr) -> Result<(), ServerError> {
    let announce_err = |source| ServerError::Announce {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::builder()
        .timeout(ANNOUNCE_TIMEOUT)
        .build()
        .map_err(announce_err)?;

    client
        .post(url)
        .form(&[("ipAddr", addr.to_string())])
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(announce_err)?;

    info!("Announced {} to {}", addr, url);
    Ok(())
}

/// Announces this server if a discovery endpoint is configured.
pub async fn advertise(config: &ServerConfig) -> Result<(), ServerError> {
    let Some(url) = config.discovery_url.as_deref() else {
        info!("No discovery endpoint configured, skipping announcement");
        return Ok(());
    };

    let addr = advertised_address(config).await?;
    announce(url, addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn request_complete(raw: &str) -> bool {
        let Some((head, body)) = raw.split_once("\r\n\r\n") else {
            return false;
        };
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= content_length
    }

    /// Accepts one HTTP request, replies with `status`, and hands back the
    /// raw request text.
    async fn one_shot_http(status: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request_complete(&String::from_utf8_lossy(&request)) {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!("HTTP/1.1 {}\r\nContent-Length: 0\r\n\r\n", status);
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
        });

        (url, rx)
    }

    #[tokio::test]
    async fn test_announce_posts_form() {
        let (url, request) = one_shot_http("200 OK").await;
        let addr: IpAddr = "10.1.2.3".parse().unwrap();

        announce(&url, addr).await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST / HTTP/1.1"));
        assert!(request.contains("application/x-www-form-urlencoded"));
        assert!(request.ends_with("ipAddr=10.1.2.3"));
    }

    #[tokio::test]
    async fn test_announce_rejected_by_endpoint() {
        let (url, _request) = one_shot_http("500 Internal Server Error").await;
        let addr: IpAddr = "10.1.2.3".parse().unwrap();

        let err = announce(&url, addr).await.unwrap_err();
        assert!(matches!(err, ServerError::Announce { .. }));
    }

    #[tokio::test]
    async fn test_announce_unreachable_endpoint() {
        // Grab a free port and close it again so nothing is listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let err = announce(&url, "10.1.2.3".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Announce { .. }));
    }

    #[tokio::test]
    async fn test_override_wins_over_detection() {
        let config = ServerConfig {
            advertise_addr: Some("192.168.7.9".parse().unwrap()),
            ..ServerConfig::default()
        };

        let addr = advertised_address(&config).await.unwrap();
        assert_eq!(addr, "192.168.7.9".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_advertise_without_endpoint_is_noop() {
        advertise(&ServerConfig::default()).await.unwrap();
    }
}
