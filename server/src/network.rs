//! Server network layer: TCP accept loop and game loop coordination

use crate::config::ServerConfig;
use crate::connection::{handle_connection, EventReceiver, EventSender};
use crate::error::ServerError;
use crate::game::{GameEvent, World};
use crate::ids::IdAllocator;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{interval, MissedTickBehavior};

/// Main server: owns the listening socket and wires connections to the
/// game loop.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    ids: Arc<IdAllocator>,
}

impl Server {
    /// Binds the listening socket. Nothing is accepted until `run`.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            config,
            ids: Arc::new(IdAllocator::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Starts the game loop and accepts connections forever.
    ///
    /// Accept errors are logged and skipped; they never stop the server.
    pub async fn run(self) -> Result<(), ServerError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let world = World::new(self.config.rules);
        tokio::spawn(run_game_loop(
            world,
            events_rx,
            self.config.tick_duration(),
            self.config.max_events_per_tick,
        ));

        info!(
            "Game loop running at {} Hz",
            self.config.tick_rate.max(1)
        );

        self.accept_loop(events_tx).await
    }

    async fn accept_loop(self, events: EventSender) -> Result<(), ServerError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        Arc::clone(&self.ids),
                        events.clone(),
                    ));
                }
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Takes whatever is queued right now, up to `limit` events.
///
/// Returns the events and whether every sender is gone.
pub fn drain_events(events: &mut EventReceiver, limit: usize) -> (Vec<GameEvent>, bool) {
    let mut pending = Vec::new();
    while pending.len() < limit {
        match events.try_recv() {
            Ok(event) => pending.push(event),
            Err(TryRecvError::Empty) => return (pending, false),
            Err(TryRecvError::Disconnected) => return (pending, true),
        }
    }
    (pending, false)
}

/// Fixed-rate game loop: the only code that touches the `World`.
///
/// Runs until every event sender has been dropped, which only happens once
/// the accept loop is gone.
pub async fn run_game_loop(
    mut world: World,
    mut events: EventReceiver,
    tick_duration: Duration,
    max_events_per_tick: usize,
) -> World {
    let mut tick_interval = interval(tick_duration);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tick_interval.tick().await;

        let (pending, closed) = drain_events(&mut events, max_events_per_tick.max(1));
        let event_count = pending.len();
        let delivered = world.step(pending);

        // Periodic performance monitoring
        if world.tick() % 60 == 0 && !world.is_empty() {
            debug!(
                "Tick {}: {} players, {} it, {} events, {} snapshots",
                world.tick(),
                world.len(),
                world.it_count(),
                event_count,
                delivered
            );
        }

        if closed {
            info!("Event channel closed, stopping game loop");
            return world;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagRules;
    use crate::game::{outbox, TagState};
    use tokio::time::timeout;

    #[test]
    fn test_drain_respects_limit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ids = IdAllocator::new();
        let id = ids.next_id();
        for i in 0..10 {
            tx.send(GameEvent::PositionUpdate {
                id,
                position: [i as f32, 0.0],
            })
            .unwrap();
        }

        let (first, closed) = drain_events(&mut rx, 4);
        assert_eq!(first.len(), 4);
        assert!(!closed);

        let (rest, closed) = drain_events(&mut rx, 100);
        assert_eq!(rest.len(), 6);
        assert!(!closed);
    }

    #[test]
    fn test_drain_reports_closed_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(GameEvent::Disconnect {
            id: IdAllocator::new().next_id(),
        })
        .unwrap();
        drop(tx);

        let (pending, closed) = drain_events(&mut rx, 100);
        assert_eq!(pending.len(), 1);
        assert!(closed);
    }

    #[test]
    fn test_drain_empty_channel() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<GameEvent>();
        let (pending, closed) = drain_events(&mut rx, 100);
        assert!(pending.is_empty());
        assert!(!closed);
    }

    #[tokio::test]
    async fn test_game_loop_applies_events_and_broadcasts() {
        let (tx, rx) = mpsc::unbounded_channel();
        let ids = IdAllocator::new();
        let id = ids.next_id();
        let (player_outbox, mut snapshots) = outbox();

        // Queued before the loop starts, so both land in the first tick.
        tx.send(GameEvent::Connect {
            id,
            outbox: player_outbox,
        })
        .unwrap();
        tx.send(GameEvent::PositionUpdate {
            id,
            position: [2.0, 3.0],
        })
        .unwrap();

        let game = tokio::spawn(run_game_loop(
            World::new(TagRules::default()),
            rx,
            Duration::from_millis(5),
            64,
        ));

        timeout(Duration::from_secs(2), snapshots.changed())
            .await
            .unwrap()
            .unwrap();
        let snapshot = snapshots.borrow_and_update().clone().unwrap();
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].position, [2.0, 3.0]);

        drop(tx);
        let world = timeout(Duration::from_secs(2), game)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(world.player(id).unwrap().state(), TagState::It);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            bind_addr: taken.local_addr().unwrap(),
            ..ServerConfig::default()
        };

        let result = Server::bind(config).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..ServerConfig::default()
        };

        let server = Server::bind(config).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }
}
