//! Server configuration.

use shared::{DEFAULT_PORT, DEFAULT_TICK_RATE, INVINCIBLE_TICKS, SPAWN_POSITION, TAG_REACH};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Rules of the tag game, applied by the game loop every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagRules {
    /// Cooldown given to a player right after they tag someone.
    pub invincible_ticks: u32,
    /// Both axis distances must be strictly below this for a tag.
    pub reach: f32,
    /// Position of a freshly connected player until their first update.
    pub spawn: [f32; 2],
}

impl Default for TagRules {
    fn default() -> Self {
        Self {
            invincible_ticks: INVINCIBLE_TICKS,
            reach: TAG_REACH,
            spawn: SPAWN_POSITION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Game loop frequency in Hz.
    pub tick_rate: u32,
    /// Upper bound on events applied in one tick; the rest wait a tick.
    pub max_events_per_tick: usize,
    pub rules: TagRules,
    /// Discovery endpoint to announce our address to. `None` skips it.
    pub discovery_url: Option<String>,
    /// Address to announce instead of the auto-detected one.
    pub advertise_addr: Option<IpAddr>,
}

impl ServerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            tick_rate: DEFAULT_TICK_RATE,
            max_events_per_tick: 4096,
            rules: TagRules::default(),
            discovery_url: None,
            advertise_addr: None,
        }
    }
}
