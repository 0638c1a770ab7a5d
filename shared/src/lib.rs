use serde::{Deserialize, Serialize};

pub mod framing;

pub use framing::{read_message, write_message, WireError, MAX_FRAME_SIZE};

pub const DEFAULT_PORT: u16 = 2667;
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Ticks a successful tagger stays untaggable.
pub const INVINCIBLE_TICKS: u32 = 300;
/// Half-width of the axis-aligned box that counts as a tag.
pub const TAG_REACH: f32 = 1.0;
pub const SPAWN_POSITION: [f32; 2] = [5.0, 5.0];

// Movement speeds in tiles per client frame.
pub const RUNNING_SPEED: f32 = 0.10;
pub const IT_SPEED: f32 = 0.12;
pub const INVINCIBLE_SPEED: f32 = 0.15;

pub const COLOR_RUNNING: [f32; 3] = [0.0, 1.0, 0.0];
pub const COLOR_IT: [f32; 3] = [1.0, 0.0, 0.0];
pub const COLOR_INVINCIBLE: [f32; 3] = [1.0, 1.0, 1.0];

/// Sent by the client once per frame.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ClientState {
    pub position: [f32; 2],
}

/// One entry of the broadcast player list.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PlayerView {
    pub position: [f32; 2],
    pub color: [f32; 3],
}

/// Sent by the server to each client once per tick.
///
/// `players` is identical for every recipient of a tick; `speed` is the
/// recipient's own movement speed, which depends on its tag state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServerState {
    pub players: Vec<PlayerView>,
    pub speed: f32,
}

impl ServerState {
    pub fn new(players: Vec<PlayerView>, speed: f32) -> Self {
        Self { players, speed }
    }
}
