//! Connection to the game server.
//!
//! macroquad owns the main thread, so the socket lives on a background
//! thread with its own tokio runtime. The two sides talk through watch
//! channels: the frame loop overwrites the outgoing `ClientState` and reads
//! the newest `ServerState`, and nothing ever queues up behind a slow
//! network.

use log::{debug, info, warn};
use shared::{read_message, write_message, ClientState, ServerState, WireError};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("discovery request to {url} failed: {source}")]
    Discovery {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("discovery endpoint {0} returned no address")]
    EmptyAddress(String),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Where to find the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerTarget {
    /// A `host:port` to dial directly.
    Direct(String),
    /// Ask `url` for the host, then dial it on `port`.
    Discover { url: String, port: u16 },
}

impl ServerTarget {
    pub async fn resolve(&self) -> Result<String, ClientError> {
        match self {
            ServerTarget::Direct(addr) => Ok(addr.clone()),
            ServerTarget::Discover { url, port } => {
                let host = discover_server(url).await?;
                Ok(server_address(&host, *port))
            }
        }
    }
}

/// Appends `port` unless `host` already carries one.
pub fn server_address(host: &str, port: u16) -> String {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return SocketAddr::new(ip, port).to_string();
    }
    if host.parse::<SocketAddr>().is_ok() {
        return host.to_string();
    }
    match host.rsplit_once(':') {
        Some((_, p)) if p.parse::<u16>().is_ok() => host.to_string(),
        _ => format!("{}:{}", host, port),
    }
}

/// Fetches the server host from the discovery endpoint, which answers a GET
/// with the address as plain text.
pub async fn discover_server(url: &str) -> Result<String, ClientError> {
    let discovery_err = |source| ClientError::Discovery {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::builder()
        .timeout(DISCOVERY_TIMEOUT)
        .build()
        .map_err(discovery_err)?;

    let body = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(discovery_err)?
        .text()
        .await
        .map_err(discovery_err)?;

    let host = body.trim();
    if host.is_empty() {
        return Err(ClientError::EmptyAddress(url.to_string()));
    }
    info!("Discovered server at {}", host);
    Ok(host.to_string())
}

/// Handle the frame loop holds on the background connection.
pub struct ServerLink {
    outgoing: watch::Sender<Option<ClientState>>,
    incoming: watch::Receiver<Option<ServerState>>,
}

impl ServerLink {
    /// Resolves `target`, connects, and starts the network thread.
    ///
    /// Blocks until the TCP connection is up or has failed.
    pub fn connect(target: &ServerTarget) -> Result<Self, ClientError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let stream = runtime.block_on(async {
            let addr = target.resolve().await?;
            info!("Connecting to {}", addr);
            let stream = TcpStream::connect(&addr)
                .await
                .map_err(|source| ClientError::Connect {
                    addr: addr.clone(),
                    source,
                })?;
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not disable Nagle: {}", e);
            }
            Ok::<_, ClientError>(stream)
        })?;

        let (outgoing, outgoing_rx) = watch::channel(None);
        let (incoming_tx, incoming) = watch::channel(None);

        std::thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                match runtime.block_on(run_link(stream, outgoing_rx, incoming_tx)) {
                    Ok(()) => info!("Connection closed"),
                    Err(e) => warn!("Connection lost: {}", e),
                }
            })?;

        Ok(ServerLink { outgoing, incoming })
    }

    /// Queues this frame's state, replacing any state not yet written.
    pub fn send(&self, state: ClientState) {
        self.outgoing.send_replace(Some(state));
    }

    /// The newest snapshot, if one arrived since the last call.
    pub fn latest(&mut self) -> Option<ServerState> {
        match self.incoming.has_changed() {
            Ok(true) => self.incoming.borrow_and_update().clone(),
            _ => None,
        }
    }

    /// True once the network thread has stopped.
    pub fn is_closed(&self) -> bool {
        self.outgoing.is_closed()
    }
}

/// Pumps frames in both directions until either one fails or the frame
/// loop drops its sender.
pub async fn run_link<S>(
    stream: S,
    outgoing: watch::Receiver<Option<ClientState>>,
    incoming: watch::Sender<Option<ServerState>>,
) -> Result<(), ClientError>
where
    S: AsyncRead + AsyncWrite + Send,
{
    let (reader, writer) = tokio::io::split(stream);

    tokio::select! {
        result = read_snapshots(reader, incoming) => result,
        result = write_states(writer, outgoing) => result,
    }
}

async fn read_snapshots<R>(
    mut reader: R,
    incoming: watch::Sender<Option<ServerState>>,
) -> Result<(), ClientError>
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_message::<_, ServerState>(&mut reader).await {
            Ok(state) => {
                incoming.send_replace(Some(state));
            }
            Err(e) if e.is_disconnect() => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

async fn write_states<W>(
    mut writer: W,
    mut outgoing: watch::Receiver<Option<ClientState>>,
) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    while outgoing.changed().await.is_ok() {
        let state = *outgoing.borrow_and_update();
        if let Some(state) = state {
            write_message(&mut writer, &state).await?;
        }
    }
    Ok(())
}
