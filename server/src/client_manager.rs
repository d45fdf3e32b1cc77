//! Connection bookkeeping for the arena server
//!
//! This module tracks every open connection independently of the simulation:
//! - Connection lifecycle (accept, join, death, close)
//! - The mapping from player identity to the connection that owns it
//! - Best-effort outbound delivery that never blocks the game loop
//!
//! Player identity is owned by the world; a connection only refers to it.

use crate::entity::PlayerId;
use log::{debug, error, info};
use shared::ServerMessage;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Transport identity, assigned by the acceptor in arrival order.
/// Independent of the player identity a connection may later control.
pub type ConnectionId = u64;

/// Serialized frames queued for a connection's writer task.
pub type Outbound = mpsc::Sender<Arc<str>>;

/// Where a connection stands relative to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no ship yet.
    Unjoined,
    /// Bound to a living ship.
    Active(PlayerId),
    /// Ship destroyed; the connection may ask to respawn.
    Dead,
}

/// Represents one open connection
#[derive(Debug)]
pub struct Client {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub state: SessionState,
    /// Display name from the last join, reused on respawn
    pub username: Option<String>,
    pub connected_at: Instant,
    /// Frames dropped because the outbound queue was full
    pub dropped_frames: u64,
    sender: Outbound,
}

impl Client {
    /// Creates a record for a connection that has not joined yet.
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: Outbound) -> Self {
        Self {
            id,
            addr,
            state: SessionState::Unjoined,
            username: None,
            connected_at: Instant::now(),
            dropped_frames: 0,
            sender,
        }
    }

    /// Queues a frame without waiting. A full or closed queue drops the
    /// frame for this connection only.
    pub fn send(&mut self, frame: &Arc<str>) -> bool {
        match self.sender.try_send(Arc::clone(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped_frames += 1;
                debug!(
                    "Connection {} outbound queue full, dropped frame ({} total)",
                    self.id, self.dropped_frames
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Connection {} outbound queue closed", self.id);
                false
            }
        }
    }

    /// The living ship this connection controls, if any.
    pub fn player(&self) -> Option<PlayerId> {
        match self.state {
            SessionState::Active(id) => Some(id),
            _ => None,
        }
    }
}

/// Manages all open connections and their bound players
pub struct ClientManager {
    clients: HashMap<ConnectionId, Client>,
    /// Reverse index from living player to owning connection
    players: HashMap<PlayerId, ConnectionId>,
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry that accepts at most `max_clients`
    /// simultaneous connections.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            players: HashMap::new(),
            max_clients,
        }
    }

    /// Registers a new connection. Returns false if the server is at
    /// capacity or the identity is already taken.
    pub fn add_client(&mut self, id: ConnectionId, addr: SocketAddr, sender: Outbound) -> bool {
        if self.clients.len() >= self.max_clients || self.clients.contains_key(&id) {
            return false;
        }
        info!("Connection {} opened from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, sender));
        true
    }

    /// Forgets a connection and returns the player it was bound to, if any.
    pub fn remove_client(&mut self, id: ConnectionId) -> Option<PlayerId> {
        let client = self.clients.remove(&id)?;
        info!("Connection {} closed", client.id);
        let player = client.player()?;
        self.players.remove(&player);
        Some(player)
    }

    /// Looks up a connection record by its identity.
    pub fn get(&self, id: ConnectionId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Current session state of a connection, or `None` if it is unknown.
    pub fn state(&self, id: ConnectionId) -> Option<SessionState> {
        self.clients.get(&id).map(|client| client.state)
    }

    /// Marks a connection as controlling `player` and remembers the name
    /// it joined with so a later respawn can reuse it.
    ///
    /// Any previous binding of the connection is replaced. Returns false if
    /// the connection is unknown.
    pub fn bind_player(&mut self, id: ConnectionId, player: PlayerId, username: &str) -> bool {
        let Some(client) = self.clients.get_mut(&id) else {
            return false;
        };
        if let Some(previous) = client.player() {
            self.players.remove(&previous);
        }
        client.state = SessionState::Active(player);
        client.username = Some(username.to_string());
        self.players.insert(player, id);
        true
    }

    /// Unbinds a destroyed player, leaving its connection open in the dead
    /// state. Returns the owning connection.
    pub fn mark_dead(&mut self, player: PlayerId) -> Option<ConnectionId> {
        let id = self.players.remove(&player)?;
        if let Some(client) = self.clients.get_mut(&id) {
            client.state = SessionState::Dead;
        }
        Some(id)
    }

    /// Finds the connection that owns a living player.
    pub fn connection_for(&self, player: PlayerId) -> Option<ConnectionId> {
        self.players.get(&player).copied()
    }

    /// Queues one message for a single connection.
    ///
    /// Returns false when the connection is unknown or its queue refused
    /// the frame; the caller never waits.
    pub fn send_to_connection(&mut self, id: ConnectionId, message: &ServerMessage) -> bool {
        let Some(frame) = encode(message) else {
            return false;
        };
        match self.clients.get_mut(&id) {
            Some(client) => client.send(&frame),
            None => false,
        }
    }

    /// Queues one message for whichever connection owns `player`.
    pub fn send_to_player(&mut self, player: PlayerId, message: &ServerMessage) -> bool {
        match self.connection_for(player) {
            Some(id) => self.send_to_connection(id, message),
            None => false,
        }
    }

    /// Serializes `message` once and offers it to every connection.
    /// Returns how many connections accepted the frame.
    pub fn broadcast(&mut self, message: &ServerMessage) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };
        self.clients
            .values_mut()
            .map(|client| client.send(&frame))
            .filter(|sent| *sent)
            .count()
    }

    /// Number of open connections, joined or not.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true when no connection is open.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Number of connections currently bound to a living ship.
    pub fn active_players(&self) -> usize {
        self.players.len()
    }
}

fn encode(message: &ServerMessage) -> Option<Arc<str>> {
    match message.to_json() {
        Ok(text) => Some(Arc::from(text)),
        Err(e) => {
            error!("Failed to serialize outbound message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn channel(capacity: usize) -> (Outbound, mpsc::Receiver<Arc<str>>) {
        mpsc::channel(capacity)
    }

    #[test]
    fn test_client_starts_unjoined() {
        let (tx, _rx) = channel(4);
        let client = Client::new(1, test_addr(), tx);
        assert_eq!(client.state, SessionState::Unjoined);
        assert_eq!(client.player(), None);
        assert_eq!(client.dropped_frames, 0);
    }

    #[test]
    fn test_add_client_enforces_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx1, _rx1) = channel(4);
        let (tx2, _rx2) = channel(4);
        assert!(manager.add_client(1, test_addr(), tx1));
        assert!(!manager.add_client(2, test_addr(), tx2));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_duplicate_connection_id_rejected() {
        let mut manager = ClientManager::new(4);
        let (tx1, _rx1) = channel(4);
        let (tx2, _rx2) = channel(4);
        assert!(manager.add_client(1, test_addr(), tx1));
        assert!(!manager.add_client(1, test_addr(), tx2));
    }

    #[test]
    fn test_bind_and_remove_returns_player() {
        let mut manager = ClientManager::new(4);
        let (tx, _rx) = channel(4);
        manager.add_client(7, test_addr(), tx);

        assert!(manager.bind_player(7, 42, "ace"));
        assert_eq!(manager.state(7), Some(SessionState::Active(42)));
        assert_eq!(manager.get(7).unwrap().username.as_deref(), Some("ace"));
        assert_eq!(manager.connection_for(42), Some(7));

        assert_eq!(manager.remove_client(7), Some(42));
        assert_eq!(manager.connection_for(42), None);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_remove_unjoined_client_has_no_player() {
        let mut manager = ClientManager::new(4);
        let (tx, _rx) = channel(4);
        manager.add_client(7, test_addr(), tx);
        assert_eq!(manager.remove_client(7), None);
        assert_eq!(manager.remove_client(7), None);
    }

    #[test]
    fn test_mark_dead_keeps_connection() {
        let mut manager = ClientManager::new(4);
        let (tx, _rx) = channel(4);
        manager.add_client(3, test_addr(), tx);
        manager.bind_player(3, 9, "ace");

        assert_eq!(manager.mark_dead(9), Some(3));
        assert_eq!(manager.state(3), Some(SessionState::Dead));
        assert_eq!(manager.active_players(), 0);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.mark_dead(9), None);
    }

    #[test]
    fn test_send_to_player_routes_to_owner() {
        let mut manager = ClientManager::new(4);
        let (tx1, mut rx1) = channel(4);
        let (tx2, mut rx2) = channel(4);
        manager.add_client(1, test_addr(), tx1);
        manager.add_client(2, test_addr(), tx2);
        manager.bind_player(2, 20, "ace");

        assert!(manager.send_to_player(20, &ServerMessage::Dead));
        assert!(rx1.try_recv().is_err());
        assert_eq!(&*rx2.try_recv().unwrap(), r#"{"type":"dead"}"#);
        assert!(!manager.send_to_player(99, &ServerMessage::Dead));
    }

    #[test]
    fn test_broadcast_skips_full_and_closed_queues() {
        let mut manager = ClientManager::new(4);
        let (full_tx, _full_rx) = channel(1);
        let (closed_tx, closed_rx) = channel(4);
        let (ok_tx, mut ok_rx) = channel(4);
        manager.add_client(1, test_addr(), full_tx);
        manager.add_client(2, test_addr(), closed_tx);
        manager.add_client(3, test_addr(), ok_tx);
        drop(closed_rx);

        assert!(manager.send_to_connection(1, &ServerMessage::Dead));
        let delivered = manager.broadcast(&ServerMessage::Joined { id: 5 });

        assert_eq!(delivered, 1);
        assert_eq!(manager.get(1).unwrap().dropped_frames, 1);
        assert_eq!(&*ok_rx.try_recv().unwrap(), r#"{"type":"joined","id":5}"#);
    }
}
