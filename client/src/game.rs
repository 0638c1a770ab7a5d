use crate::map::TileMap;
use log::debug;
use shared::{ClientState, PlayerView, ServerState, RUNNING_SPEED, SPAWN_POSITION};

/// The player this client controls. Position is local; speed is whatever
/// the server last said it should be.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayer {
    pub position: [f32; 2],
    pub speed: f32,
}

impl LocalPlayer {
    pub fn new() -> Self {
        Self {
            position: SPAWN_POSITION,
            speed: RUNNING_SPEED,
        }
    }

    /// Moves one frame in `direction`, then pushes the player back out of
    /// any wall it ran into.
    ///
    /// The player is one tile wide and sits on the tile its center rounds
    /// to. Straight neighbours clamp the matching axis to the tile center;
    /// a diagonal neighbour clamps whichever axis penetrates less.
    pub fn step(&mut self, direction: [f32; 2], map: &TileMap) {
        self.position[0] += direction[0] * self.speed;
        self.position[1] += direction[1] * self.speed;

        let tile_x = (self.position[0] + 0.5).floor();
        let tile_y = (self.position[1] + 0.5).floor();
        let (tx, ty) = (tile_x as i32, tile_y as i32);

        let right = self.position[0] > tile_x;
        let left = self.position[0] < tile_x;
        let top = self.position[1] > tile_y;
        let bottom = self.position[1] < tile_y;

        if right && !map.is_open(tx + 1, ty) {
            self.position[0] = tile_x;
        }
        if left && !map.is_open(tx - 1, ty) {
            self.position[0] = tile_x;
        }
        if top && !map.is_open(tx, ty + 1) {
            self.position[1] = tile_y;
        }
        if bottom && !map.is_open(tx, ty - 1) {
            self.position[1] = tile_y;
        }

        let corners = [
            (top && right, 1, 1),
            (top && left, -1, 1),
            (bottom && right, 1, -1),
            (bottom && left, -1, -1),
        ];
        for (touching, sx, sy) in corners {
            if !touching || map.is_open(tx + sx, ty + sy) {
                continue;
            }
            let dx = (self.position[0] - tile_x) * sx as f32;
            let dy = (self.position[1] - tile_y) * sy as f32;
            if dx > dy {
                self.position[1] = tile_y;
            } else {
                self.position[0] = tile_x;
            }
        }
    }
}

impl Default for LocalPlayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the client knows about the match.
#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    pub player: LocalPlayer,
    players: Vec<PlayerView>,
    snapshots_received: u64,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the player list and adopts the speed the server assigned.
    pub fn apply_server_state(&mut self, state: &ServerState) {
        if state.speed != self.player.speed {
            debug!("Speed changed {} -> {}", self.player.speed, state.speed);
        }
        self.player.speed = state.speed;
        self.players.clone_from(&state.players);
        self.snapshots_received += 1;
    }

    pub fn step(&mut self, direction: [f32; 2], map: &TileMap) {
        self.player.step(direction, map);
    }

    /// The frame's report to the server.
    pub fn client_state(&self) -> ClientState {
        ClientState {
            position: self.player.position,
        }
    }

    /// Every player in the last snapshot, this client included.
    pub fn players(&self) -> &[PlayerView] {
        &self.players
    }

    pub fn snapshots_received(&self) -> u64 {
        self.snapshots_received
    }
}
