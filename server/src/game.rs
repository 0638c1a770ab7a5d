//! Authoritative world state and the tag state machine.
//!
//! `World` is owned by the game loop task and never shared. Connection
//! handlers talk to it only through `GameEvent`s, and it talks back only
//! through each player's `Outbox`.

use crate::config::TagRules;
use crate::ids::PlayerId;
use log::{debug, info, warn};
use shared::{
    PlayerView, ServerState, COLOR_INVINCIBLE, COLOR_IT, COLOR_RUNNING, INVINCIBLE_SPEED,
    IT_SPEED, RUNNING_SPEED,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Per-connection mailbox holding the newest snapshot for that client.
///
/// Sending overwrites whatever the connection has not written out yet, so a
/// slow client only ever falls behind by one snapshot and the game loop never
/// waits on it.
pub type Outbox = watch::Sender<Option<Arc<ServerState>>>;
pub type SnapshotReceiver = watch::Receiver<Option<Arc<ServerState>>>;

pub fn outbox() -> (Outbox, SnapshotReceiver) {
    watch::channel(None)
}

/// Mutation requests sent from connection handlers to the game loop.
#[derive(Debug)]
pub enum GameEvent {
    Connect { id: PlayerId, outbox: Outbox },
    Disconnect { id: PlayerId },
    PositionUpdate { id: PlayerId, position: [f32; 2] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagState {
    Running,
    It,
    Invincible { ticks_remaining: u32 },
}

impl TagState {
    pub fn is_it(self) -> bool {
        self == TagState::It
    }

    pub fn color(self) -> [f32; 3] {
        match self {
            TagState::Running => COLOR_RUNNING,
            TagState::It => COLOR_IT,
            TagState::Invincible { .. } => COLOR_INVINCIBLE,
        }
    }

    pub fn speed(self) -> f32 {
        match self {
            TagState::Running => RUNNING_SPEED,
            TagState::It => IT_SPEED,
            TagState::Invincible { .. } => INVINCIBLE_SPEED,
        }
    }

    /// One tick of cooldown. Leaves every state but Invincible untouched.
    fn cooled_down(self) -> TagState {
        match self {
            TagState::Invincible { ticks_remaining } => match ticks_remaining.saturating_sub(1) {
                0 => TagState::Running,
                left => TagState::Invincible {
                    ticks_remaining: left,
                },
            },
            other => other,
        }
    }

    /// State after being caught. Only a Running player can be caught.
    fn tagged(self) -> Option<TagState> {
        match self {
            TagState::Running => Some(TagState::It),
            _ => None,
        }
    }

    /// State after catching someone. Only It can catch.
    fn after_tagging(self, cooldown: u32) -> Option<TagState> {
        match self {
            TagState::It => Some(TagState::Invincible {
                ticks_remaining: cooldown,
            }),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct PlayerRecord {
    id: PlayerId,
    position: [f32; 2],
    state: TagState,
    outbox: Outbox,
}

impl PlayerRecord {
    fn new(id: PlayerId, position: [f32; 2], outbox: Outbox) -> Self {
        Self {
            id,
            position,
            state: TagState::Running,
            outbox,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    pub fn state(&self) -> TagState {
        self.state
    }

    pub fn invincible_ticks_remaining(&self) -> u32 {
        match self.state {
            TagState::Invincible { ticks_remaining } => ticks_remaining,
            _ => 0,
        }
    }

    fn view(&self) -> PlayerView {
        PlayerView {
            position: self.position,
            color: self.state.color(),
        }
    }
}

/// Axis-aligned contact test: both distances strictly below `reach`.
pub fn in_tag_range(a: [f32; 2], b: [f32; 2], reach: f32) -> bool {
    (a[0] - b[0]).abs() < reach && (a[1] - b[1]).abs() < reach
}

/// The player registry plus the rules that drive it.
///
/// Players are kept in id order, which makes both the snapshot order and the
/// order taggers are visited in stable across ticks.
#[derive(Debug)]
pub struct World {
    players: BTreeMap<PlayerId, PlayerRecord>,
    rules: TagRules,
    tick: u64,
}

impl World {
    pub fn new(rules: TagRules) -> Self {
        Self {
            players: BTreeMap::new(),
            rules,
            tick: 0,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerRecord> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.values()
    }

    pub fn it_count(&self) -> usize {
        self.players.values().filter(|p| p.state.is_it()).count()
    }

    /// Runs one full tick: apply `events` in order, advance the tag game,
    /// then deliver a snapshot to every player.
    ///
    /// Returns the number of players that received a snapshot.
    pub fn step(&mut self, events: Vec<GameEvent>) -> usize {
        for event in events {
            self.apply_event(event);
        }
        self.advance_tag_state();
        self.tick += 1;
        self.broadcast()
    }

    /// Applies one event. Events naming an unknown player are ignored.
    pub fn apply_event(&mut self, event: GameEvent) {
        match event {
            GameEvent::Connect { id, outbox } => {
                info!(
                    "Player {} joined at ({}, {})",
                    id, self.rules.spawn[0], self.rules.spawn[1]
                );
                self.players
                    .insert(id, PlayerRecord::new(id, self.rules.spawn, outbox));
            }
            GameEvent::Disconnect { id } => {
                if self.players.remove(&id).is_some() {
                    info!("Player {} left", id);
                } else {
                    debug!("Disconnect for unknown player {}", id);
                }
            }
            GameEvent::PositionUpdate { id, position } => match self.players.get_mut(&id) {
                Some(player) => player.position = position,
                None => debug!("Position update for unknown player {}", id),
            },
        }
    }

    /// Cooldowns, then tags, then the nobody-is-it rule.
    pub fn advance_tag_state(&mut self) {
        self.cool_down_invincible();
        self.resolve_tags();
        self.ensure_someone_is_it();
    }

    fn cool_down_invincible(&mut self) {
        for player in self.players.values_mut() {
            player.state = player.state.cooled_down();
        }
    }

    fn resolve_tags(&mut self) {
        // Only players that were It before any tag this tick get a turn.
        let taggers: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.state.is_it())
            .map(PlayerRecord::id)
            .collect();

        for tagger_id in taggers {
            let Some(tagger) = self.players.get(&tagger_id) else {
                continue;
            };
            if !tagger.state.is_it() {
                continue;
            }

            let reach = self.rules.reach;
            let tagger_position = tagger.position;
            let victim_id = self
                .players
                .values()
                .find(|p| {
                    p.id() != tagger_id
                        && p.state.tagged().is_some()
                        && in_tag_range(tagger_position, p.position, reach)
                })
                .map(PlayerRecord::id);

            let Some(victim_id) = victim_id else {
                continue;
            };

            if let Some(victim) = self.players.get_mut(&victim_id) {
                if let Some(next) = victim.state.tagged() {
                    victim.state = next;
                }
            }
            if let Some(tagger) = self.players.get_mut(&tagger_id) {
                if let Some(next) = tagger.state.after_tagging(self.rules.invincible_ticks) {
                    tagger.state = next;
                }
            }
            info!("Player {} tagged player {}", tagger_id, victim_id);
        }
    }

    fn ensure_someone_is_it(&mut self) {
        if self.players.is_empty() || self.it_count() > 0 {
            return;
        }
        for player in self.players.values_mut() {
            player.state = TagState::It;
        }
        info!("Nobody was it, all {} players are it now", self.players.len());
    }

    /// The player list shared by every snapshot of this tick.
    pub fn player_views(&self) -> Vec<PlayerView> {
        self.players.values().map(PlayerRecord::view).collect()
    }

    /// Pushes a personalized snapshot into every outbox.
    ///
    /// A player whose connection already dropped its end of the outbox is
    /// removed. Returns the number of snapshots delivered.
    pub fn broadcast(&mut self) -> usize {
        let views = self.player_views();

        let mut closed = Vec::new();
        for player in self.players.values() {
            let snapshot = ServerState::new(views.clone(), player.state.speed());
            if player.outbox.send(Some(Arc::new(snapshot))).is_err() {
                closed.push(player.id);
            }
        }

        for id in &closed {
            warn!("Outbox for player {} closed, removing player", id);
            self.players.remove(id);
        }

        self.players.len()
    }
}
