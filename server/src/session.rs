//! Glue between connections and the world.
//!
//! [`GameSession`] owns the [`World`] and the [`ClientManager`] and is the
//! only thing the network loop talks to. Each call runs to completion before
//! the next one starts, so the world never needs a lock.

use crate::client_manager::{ClientManager, ConnectionId, Outbound, SessionState};
use crate::entity::PlayerId;
use crate::game::{World, WorldEvent};
use log::{debug, info};
use shared::{ClientMessage, ServerMessage, Vec2};
use std::net::SocketAddr;
use std::time::Instant;

/// The world plus the connections playing in it.
pub struct GameSession {
    world: World,
    clients: ClientManager,
}

impl GameSession {
    /// Wraps `world` with an empty connection registry.
    pub fn new(world: World, max_clients: usize) -> Self {
        Self {
            world,
            clients: ClientManager::new(max_clients),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Read access to the connection registry.
    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    /// Registers a freshly opened connection. Returns false when refused.
    pub fn connect(&mut self, id: ConnectionId, addr: SocketAddr, sender: Outbound) -> bool {
        self.clients.add_client(id, addr, sender)
    }

    /// Drops a connection and, immediately, any ship bound to it.
    pub fn disconnect(&mut self, id: ConnectionId) {
        if let Some(player) = self.clients.remove_client(id) {
            self.world.remove_player(player);
        }
    }

    /// Applies one intent from `id`. Intents that do not fit the
    /// connection's state are ignored.
    pub fn handle_intent(&mut self, id: ConnectionId, message: ClientMessage, now: Instant) {
        let Some(state) = self.clients.state(id) else {
            debug!("Intent from unknown connection {}", id);
            return;
        };

        match (state, message) {
            (SessionState::Unjoined, ClientMessage::Join { username }) => {
                if let Some(player) = self.spawn(id, &username) {
                    self.clients
                        .send_to_connection(id, &ServerMessage::Joined { id: player });
                }
            }
            (SessionState::Dead, ClientMessage::Respawn) => {
                let username = self
                    .clients
                    .get(id)
                    .and_then(|client| client.username.clone())
                    .unwrap_or_default();
                if let Some(player) = self.spawn(id, &username) {
                    if let Some(state) = self.world.player(player).map(|p| p.state()) {
                        self.clients
                            .send_to_connection(id, &ServerMessage::Respawn { player: state });
                    }
                }
            }
            (SessionState::Active(player), ClientMessage::Move { x, y, angle }) => {
                let events = self.world.move_player(player, x, y, angle);
                self.dispatch(events);
            }
            (SessionState::Active(player), ClientMessage::Rotate { angle }) => {
                self.world.rotate_player(player, angle);
            }
            (SessionState::Active(player), ClientMessage::Shoot { x, y, angle, .. }) => {
                let fired = self.world.fire(player, angle, Vec2::new(x, y), now);
                if fired > 0 {
                    debug!("Player {} fired {} projectiles", player, fired);
                }
            }
            (state, message) => {
                debug!(
                    "Ignoring {:?} from connection {} in state {:?}",
                    message, id, state
                );
            }
        }
    }

    fn spawn(&mut self, id: ConnectionId, username: &str) -> Option<PlayerId> {
        let player = self.world.add_player(username)?;
        let username = self
            .world
            .player(player)
            .map(|p| p.username.clone())
            .unwrap_or_default();
        self.clients.bind_player(id, player, &username);
        info!("Connection {} now controls player {} ({})", id, player, username);
        Some(player)
    }

    /// Runs one simulation step, delivers its point events and broadcasts
    /// the snapshot. Returns how many connections took the snapshot.
    pub fn tick(&mut self, now: Instant) -> usize {
        let events = self.world.tick(now);
        self.dispatch(events);
        if self.clients.is_empty() {
            return 0;
        }
        let snapshot = self.world.snapshot();
        self.clients.broadcast(&snapshot)
    }

    fn dispatch(&mut self, events: Vec<WorldEvent>) {
        for event in events {
            match event {
                WorldEvent::Hit {
                    target,
                    health,
                    shield_health,
                } => {
                    self.clients.send_to_player(
                        target,
                        &ServerMessage::Hit {
                            id: target,
                            health,
                            shield_health,
                        },
                    );
                }
                WorldEvent::Died { target, .. } => {
                    if let Some(connection) = self.clients.mark_dead(target) {
                        self.clients
                            .send_to_connection(connection, &ServerMessage::Dead);
                    }
                }
                WorldEvent::LevelUp(level_up) => {
                    self.clients.send_to_player(
                        level_up.player,
                        &ServerMessage::LevelUp {
                            new_tier: level_up.new_tier,
                            ship_name: level_up.ship_name,
                        },
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::GameConfig;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn quiet_config() -> GameConfig {
        let mut config = GameConfig::default();
        config.stars.initial = 0;
        config.stars.minimum = 0;
        config.shield.block_chance = 0.0;
        config
    }

    fn session() -> GameSession {
        GameSession::new(World::with_seed(quiet_config(), 1), 8)
    }

    fn connect(
        session: &mut GameSession,
        id: ConnectionId,
    ) -> mpsc::Receiver<Arc<str>> {
        let (tx, rx) = mpsc::channel(64);
        assert!(session.connect(id, "127.0.0.1:9000".parse().unwrap(), tx));
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<str>>) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    fn join(session: &mut GameSession, id: ConnectionId, name: &str) -> PlayerId {
        session.handle_intent(
            id,
            ClientMessage::Join {
                username: name.to_string(),
            },
            Instant::now(),
        );
        session.clients().get(id).unwrap().player().unwrap()
    }

    #[test]
    fn test_join_binds_player_and_acknowledges() {
        let mut session = session();
        let mut rx = connect(&mut session, 1);
        let player = join(&mut session, 1, "ace");

        assert!(session.world().player(player).is_some());
        let frames = drain(&mut rx);
        assert_eq!(frames[0]["type"], "joined");
        assert_eq!(frames[0]["id"], player);
    }

    #[test]
    fn test_snapshot_echoes_username_as_sent() {
        let mut session = session();
        let mut rx = connect(&mut session, 1);
        let player = join(&mut session, 1, "  Maverick  ");
        drain(&mut rx);

        session.tick(Instant::now());
        let frames = drain(&mut rx);
        let players = frames[0]["players"].as_array().unwrap();
        assert!(players
            .iter()
            .any(|p| p["id"] == player && p["username"] == "  Maverick  "));
    }

    #[test]
    fn test_overlong_join_leaves_connection_unjoined() {
        let mut session = session();
        let mut rx = connect(&mut session, 1);
        session.handle_intent(
            1,
            ClientMessage::Join {
                username: "x".repeat(shared::MAX_USERNAME_LEN + 1),
            },
            Instant::now(),
        );
        assert_eq!(session.clients().state(1), Some(SessionState::Unjoined));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_second_join_is_ignored() {
        let mut session = session();
        let _rx = connect(&mut session, 1);
        let first = join(&mut session, 1, "ace");
        let second = join(&mut session, 1, "again");
        assert_eq!(first, second);
        assert_eq!(session.world().player_count(), 1);
    }

    #[test]
    fn test_blank_join_leaves_connection_unjoined() {
        let mut session = session();
        let _rx = connect(&mut session, 1);
        session.handle_intent(
            1,
            ClientMessage::Join {
                username: "  ".to_string(),
            },
            Instant::now(),
        );
        assert_eq!(session.clients().state(1), Some(SessionState::Unjoined));
        assert_eq!(session.world().player_count(), 0);
    }

    #[test]
    fn test_intents_before_join_are_ignored() {
        let mut session = session();
        let _rx = connect(&mut session, 1);
        session.handle_intent(
            1,
            ClientMessage::Move {
                x: 1.0,
                y: 1.0,
                angle: 0.0,
            },
            Instant::now(),
        );
        session.handle_intent(
            99,
            ClientMessage::Rotate { angle: 1.0 },
            Instant::now(),
        );
        assert_eq!(session.world().player_count(), 0);
    }

    #[test]
    fn test_move_rotate_shoot_apply_to_bound_player() {
        let mut session = session();
        let _rx = connect(&mut session, 1);
        let player = join(&mut session, 1, "ace");
        let now = Instant::now();

        session.handle_intent(
            1,
            ClientMessage::Move {
                x: 700.0,
                y: 800.0,
                angle: 0.5,
            },
            now,
        );
        session.handle_intent(1, ClientMessage::Rotate { angle: 1.5 }, now);
        session.handle_intent(
            1,
            ClientMessage::Shoot {
                x: 720.0,
                y: 800.0,
                angle: 0.0,
                speed: Some(999.0),
            },
            now,
        );

        let ship = session.world().player(player).unwrap();
        assert_eq!(ship.position, Vec2::new(700.0, 800.0));
        assert_eq!(ship.angle, 1.5);
        let bullets = session.world().bullets();
        assert_eq!(bullets.len(), 1);
        assert_eq!(bullets[0].speed, 10.0);
        assert_eq!(bullets[0].owner, player);
    }

    #[test]
    fn test_disconnect_removes_player() {
        let mut session = session();
        let _rx = connect(&mut session, 1);
        let player = join(&mut session, 1, "ace");
        session.disconnect(1);
        assert!(session.world().player(player).is_none());
        assert!(session.clients().is_empty());
    }

    #[test]
    fn test_tick_broadcasts_snapshot_to_everyone() {
        let mut session = session();
        let mut rx1 = connect(&mut session, 1);
        let mut rx2 = connect(&mut session, 2);
        join(&mut session, 1, "ace");
        drain(&mut rx1);

        assert_eq!(session.tick(Instant::now()), 2);
        for rx in [&mut rx1, &mut rx2] {
            let frames = drain(rx);
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0]["type"], "gameState");
            assert_eq!(frames[0]["players"].as_array().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_hit_and_death_are_unicast_then_respawn() {
        let mut session = session();
        let mut shooter_rx = connect(&mut session, 1);
        let mut victim_rx = connect(&mut session, 2);
        let shooter = join(&mut session, 1, "shooter");
        let victim = join(&mut session, 2, "victim");
        let now = Instant::now();

        session.handle_intent(
            1,
            ClientMessage::Move {
                x: 100.0,
                y: 500.0,
                angle: 0.0,
            },
            now,
        );
        session.handle_intent(
            2,
            ClientMessage::Move {
                x: 520.0,
                y: 500.0,
                angle: 0.0,
            },
            now,
        );
        session.world_mut().player_mut(victim).unwrap().health = 5.0;
        session.handle_intent(
            1,
            ClientMessage::Shoot {
                x: 500.0,
                y: 500.0,
                angle: 0.0,
                speed: None,
            },
            now,
        );
        drain(&mut shooter_rx);
        drain(&mut victim_rx);

        session.tick(now);

        let victim_frames = drain(&mut victim_rx);
        let kinds: Vec<&str> = victim_frames
            .iter()
            .map(|f| f["type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["hit", "dead", "gameState"]);
        assert_eq!(victim_frames[0]["health"], 0.0);
        assert_eq!(session.clients().state(2), Some(SessionState::Dead));

        let shooter_frames = drain(&mut shooter_rx);
        assert!(shooter_frames.iter().all(|f| f["type"] == "gameState"));
        assert_eq!(session.world().player(shooter).unwrap().exp, 55.0);

        session.handle_intent(2, ClientMessage::Respawn, now);
        let frames = drain(&mut victim_rx);
        assert_eq!(frames[0]["type"], "respawn");
        assert_eq!(frames[0]["player"]["tier"], 0);
        assert_eq!(frames[0]["player"]["username"], "victim");
        let reborn = session.clients().get(2).unwrap().player().unwrap();
        assert!(reborn > victim);
        assert_eq!(session.world().player(reborn).unwrap().health, 100.0);
    }

    #[test]
    fn test_respawn_only_after_death() {
        let mut session = session();
        let _rx = connect(&mut session, 1);
        let player = join(&mut session, 1, "ace");
        session.handle_intent(1, ClientMessage::Respawn, Instant::now());
        assert_eq!(session.clients().get(1).unwrap().player(), Some(player));
        assert_eq!(session.world().player_count(), 1);
    }

    #[test]
    fn test_level_up_is_unicast() {
        let mut session = session();
        let mut rx = connect(&mut session, 1);
        let mut other_rx = connect(&mut session, 2);
        let player = join(&mut session, 1, "ace");
        session.world_mut().player_mut(player).unwrap().exp = 99.0;
        session.world_mut().insert_star(Vec2::new(300.0, 300.0), 5);
        drain(&mut rx);

        session.handle_intent(
            1,
            ClientMessage::Move {
                x: 300.0,
                y: 300.0,
                angle: 0.0,
            },
            Instant::now(),
        );

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "levelUp");
        assert_eq!(frames[0]["newTier"], 1);
        assert_eq!(frames[0]["shipName"], "Fighter");
        assert!(drain(&mut other_rx).is_empty());
    }
}
