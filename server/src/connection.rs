//! Per-connection I/O.
//!
//! Each accepted stream becomes one handler task that registers the player,
//! waits until the game loop has placed them in the world, and then runs two
//! tasks:
//! - **inbound**: decodes `ClientState` frames into position updates
//! - **outbound**: writes the newest snapshot from the player's outbox
//!
//! Whichever side stops first ends the handler, which aborts the other side
//! and reports the disconnect itself.

use crate::game::{outbox, GameEvent, SnapshotReceiver};
use crate::ids::{IdAllocator, PlayerId};
use log::{debug, info, warn};
use shared::{read_message, write_message, ClientState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<GameEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<GameEvent>;

/// Runs a client connection until either direction fails.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ids: Arc<IdAllocator>,
    events: EventSender,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", peer, e);
    }

    let id = ids.next_id();
    info!("Connection from {} assigned player {}", peer, id);

    let (reader, writer) = stream.into_split();
    run_player(id, reader, writer, events).await;

    info!("Connection from {} (player {}) closed", peer, id);
}

/// How one direction of a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// The stream failed or the peer hung up; the game loop must be told.
    Failed,
    /// The game loop already dropped the player, or is gone itself.
    Removed,
}

/// Registers `id` with the game loop and drives both directions of the
/// connection until one of them stops.
///
/// Only this function reports the disconnect, so it is sent at most once
/// however the two directions end.
pub async fn run_player<R, W>(id: PlayerId, reader: R, writer: W, events: EventSender)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut snapshots) = outbox();
    if events.send(GameEvent::Connect { id, outbox: tx }).is_err() {
        warn!("Game loop is gone, dropping player {}", id);
        return;
    }

    // The first snapshot doubles as the acknowledgement that we are in the
    // registry. Until then nothing is read or written.
    if snapshots.changed().await.is_err() {
        debug!("Player {} was removed before its first snapshot", id);
        return;
    }

    let mut inbound = tokio::spawn(inbound_loop(id, reader, events.clone()));
    let mut outbound = tokio::spawn(outbound_loop(id, writer, snapshots));

    let exit = tokio::select! {
        result = &mut inbound => {
            outbound.abort();
            result
        }
        result = &mut outbound => {
            inbound.abort();
            result
        }
    };

    // A panicked task counts as a failure.
    if exit.unwrap_or(Exit::Failed) == Exit::Failed {
        let _ = events.send(GameEvent::Disconnect { id });
    }
}

async fn inbound_loop<R>(id: PlayerId, mut reader: R, events: EventSender) -> Exit
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_message::<_, ClientState>(&mut reader).await {
            Ok(state) => {
                let update = GameEvent::PositionUpdate {
                    id,
                    position: state.position,
                };
                if events.send(update).is_err() {
                    return Exit::Removed;
                }
            }
            Err(e) => {
                if e.is_disconnect() {
                    debug!("Player {} closed the stream", id);
                } else {
                    warn!("Bad frame from player {}: {}", id, e);
                }
                return Exit::Failed;
            }
        }
    }
}

async fn outbound_loop<W>(id: PlayerId, mut writer: W, mut snapshots: SnapshotReceiver) -> Exit
where
    W: AsyncWrite + Unpin,
{
    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        if let Some(snapshot) = snapshot {
            if let Err(e) = write_message(&mut writer, snapshot.as_ref()).await {
                debug!("Failed to send snapshot to player {}: {}", id, e);
                return Exit::Failed;
            }
        }

        // Err means the game loop dropped our record.
        if snapshots.changed().await.is_err() {
            return Exit::Removed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{PlayerView, ServerState, COLOR_IT};
    use std::time::Duration;
    use tokio::io::duplex;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    async fn next_event(rx: &mut EventReceiver) -> GameEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    fn snapshot(x: f32) -> Option<Arc<ServerState>> {
        Some(Arc::new(ServerState::new(
            vec![PlayerView {
                position: [x, 0.0],
                color: COLOR_IT,
            }],
            0.12,
        )))
    }

    #[tokio::test]
    async fn test_connect_is_sent_before_anything_else() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let ids = IdAllocator::new();
        let id = ids.next_id();

        let (server_side, mut client_side) = duplex(1024);
        let (reader, writer) = tokio::io::split(server_side);
        let handle = tokio::spawn(run_player(id, reader, writer, events_tx));

        // Client speaks before being acknowledged; its update must still be
        // queued after the connect.
        write_message(&mut client_side, &ClientState { position: [1.0, 2.0] })
            .await
            .unwrap();

        let outbox = match next_event(&mut events_rx).await {
            GameEvent::Connect { id: got, outbox } => {
                assert_eq!(got, id);
                outbox
            }
            other => panic!("expected connect, got {:?}", other),
        };

        // Nothing is read until the first snapshot arrives.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(events_rx.try_recv().is_err());

        outbox.send(snapshot(3.0)).unwrap();

        let first: ServerState = timeout(WAIT, read_message(&mut client_side))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.players[0].position, [3.0, 0.0]);

        match next_event(&mut events_rx).await {
            GameEvent::PositionUpdate { id: got, position } => {
                assert_eq!(got, id);
                assert_eq!(position, [1.0, 2.0]);
            }
            other => panic!("expected position update, got {:?}", other),
        }

        drop(outbox);
        drop(client_side);
        timeout(WAIT, handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_client_hangup_sends_one_disconnect() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let id = IdAllocator::new().next_id();

        let (server_side, mut client_side) = duplex(1024);
        let (reader, writer) = tokio::io::split(server_side);
        let handle = tokio::spawn(run_player(id, reader, writer, events_tx));

        let outbox = match next_event(&mut events_rx).await {
            GameEvent::Connect { outbox, .. } => outbox,
            other => panic!("expected connect, got {:?}", other),
        };
        outbox.send(snapshot(0.0)).unwrap();
        let _: ServerState = timeout(WAIT, read_message(&mut client_side))
            .await
            .unwrap()
            .unwrap();

        drop(client_side);

        match next_event(&mut events_rx).await {
            GameEvent::Disconnect { id: got } => assert_eq!(got, id),
            other => panic!("expected disconnect, got {:?}", other),
        }

        // The game loop reacts by dropping the record, which ends the writer.
        drop(outbox);
        timeout(WAIT, handle).await.unwrap().unwrap();

        // Every sender is gone now, so only the one disconnect was queued.
        assert!(events_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_both_directions_failing_send_one_disconnect() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let id = IdAllocator::new().next_id();

        let (server_side, mut client_side) = duplex(1024);
        let (reader, writer) = tokio::io::split(server_side);
        let handle = tokio::spawn(run_player(id, reader, writer, events_tx));

        let outbox = match next_event(&mut events_rx).await {
            GameEvent::Connect { outbox, .. } => outbox,
            other => panic!("expected connect, got {:?}", other),
        };
        outbox.send(snapshot(0.0)).unwrap();
        let _: ServerState = timeout(WAIT, read_message(&mut client_side))
            .await
            .unwrap()
            .unwrap();

        // A pending snapshot makes the writer hit the closed stream while the
        // reader sees end of stream.
        outbox.send(snapshot(1.0)).unwrap();
        drop(client_side);

        match next_event(&mut events_rx).await {
            GameEvent::Disconnect { id: got } => assert_eq!(got, id),
            other => panic!("expected disconnect, got {:?}", other),
        }

        drop(outbox);
        timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(events_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_removed_after_joining_sends_no_disconnect() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let id = IdAllocator::new().next_id();

        let (server_side, mut client_side) = duplex(1024);
        let (reader, writer) = tokio::io::split(server_side);
        let handle = tokio::spawn(run_player(id, reader, writer, events_tx));

        let outbox = match next_event(&mut events_rx).await {
            GameEvent::Connect { outbox, .. } => outbox,
            other => panic!("expected connect, got {:?}", other),
        };
        outbox.send(snapshot(0.0)).unwrap();
        let _: ServerState = timeout(WAIT, read_message(&mut client_side))
            .await
            .unwrap()
            .unwrap();

        // The game loop dropped the record; the client is still connected.
        drop(outbox);
        timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(events_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_frame_disconnects() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let id = IdAllocator::new().next_id();

        let (server_side, mut client_side) = duplex(1024);
        let (reader, writer) = tokio::io::split(server_side);
        tokio::spawn(run_player(id, reader, writer, events_tx));

        let outbox = match next_event(&mut events_rx).await {
            GameEvent::Connect { outbox, .. } => outbox,
            other => panic!("expected connect, got {:?}", other),
        };
        outbox.send(snapshot(0.0)).unwrap();

        use tokio::io::AsyncWriteExt;
        client_side
            .write_all(&[0xff, 0xff, 0xff, 0xff])
            .await
            .unwrap();

        match next_event(&mut events_rx).await {
            GameEvent::Disconnect { id: got } => assert_eq!(got, id),
            other => panic!("expected disconnect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_removed_before_first_snapshot_ends_quietly() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let id = IdAllocator::new().next_id();

        let (server_side, _client_side) = duplex(1024);
        let (reader, writer) = tokio::io::split(server_side);
        let handle = tokio::spawn(run_player(id, reader, writer, events_tx));

        match next_event(&mut events_rx).await {
            GameEvent::Connect { outbox, .. } => drop(outbox),
            other => panic!("expected connect, got {:?}", other),
        }

        timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(events_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_writer_sends_latest_snapshot() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let id = IdAllocator::new().next_id();

        let (server_side, mut client_side) = duplex(4096);
        let (reader, writer) = tokio::io::split(server_side);
        tokio::spawn(run_player(id, reader, writer, events_tx));

        let outbox = match next_event(&mut events_rx).await {
            GameEvent::Connect { outbox, .. } => outbox,
            other => panic!("expected connect, got {:?}", other),
        };

        outbox.send(snapshot(1.0)).unwrap();
        let first: ServerState = timeout(WAIT, read_message(&mut client_side))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.players[0].position, [1.0, 0.0]);

        outbox.send(snapshot(2.0)).unwrap();
        let second: ServerState = timeout(WAIT, read_message(&mut client_side))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.players[0].position, [2.0, 0.0]);
    }

    #[tokio::test]
    async fn test_game_loop_gone_drops_player() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        drop(events_rx);
        let id = IdAllocator::new().next_id();

        let (server_side, _client_side) = duplex(64);
        let (reader, writer) = tokio::io::split(server_side);

        timeout(WAIT, run_player(id, reader, writer, events_tx))
            .await
            .unwrap();
    }
}
