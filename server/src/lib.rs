//! # Tag Game Server Library
//!
//! The authoritative server for a small real-time tag game. Clients stream
//! their position over TCP; the server decides who is "it", who is
//! invincible, and who is running, and sends every client a snapshot of the
//! whole world each tick.
//!
//! ## Architecture Design
//!
//! ### Single Owner, Message Passing
//! All world state lives in one `World` value owned by the game loop task.
//! Nothing else can reach it, so there are no locks. Connection handlers
//! send `GameEvent`s (connect, disconnect, position update) over an unbounded
//! channel, and the game loop answers through a per-player outbox.
//!
//! ### Two Tasks Per Connection
//! Every accepted stream gets an inbound task (decode `ClientState`, queue a
//! position update) and an outbound task (encode the newest snapshot). The
//! first one to fail reports the disconnect and the other is aborted.
//!
//! ### Fixed Tick
//! The game loop wakes at a fixed rate (60 Hz by default). Each tick it
//! drains queued events, advances the tag state machine, and fans out one
//! snapshot per player. A slow client never holds up the tick: its outbox
//! only keeps the newest snapshot.
//!
//! ## Module Organization
//!
//! - `ids`: lock-free player id allocation
//! - `game`: the player registry and the tag state machine
//! - `connection`: per-connection inbound/outbound tasks
//! - `network`: listener, accept loop and the fixed-rate game loop
//! - `discovery`: announcing the server address to the discovery endpoint
//! - `config`: runtime configuration and game rules
//! - `error`: fatal startup errors
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod game;
pub mod ids;
pub mod network;

pub use config::{ServerConfig, TagRules};
pub use error::ServerError;
pub use game::{GameEvent, TagState, World};
pub use ids::{IdAllocator, PlayerId};
pub use network::Server;
