//! Fatal server errors.
//!
//! Everything here stops the process. Per-connection failures never surface
//! as a `ServerError`; they end that connection and nothing else.

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("could not resolve a routable address: {0}")]
    AddressResolution(String),

    #[error("failed to announce address to {url}: {source}")]
    Announce {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
