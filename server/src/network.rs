//! Server network layer handling WebSocket connections and game loop coordination

use crate::client_manager::{ConnectionId, Outbound};
use crate::game::World;
use crate::session::GameSession;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ClientMessage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Frames a slow connection may have queued before new ones are dropped.
pub const OUTBOUND_QUEUE: usize = 256;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum NetworkEvent {
    Connected {
        id: ConnectionId,
        addr: SocketAddr,
        sender: Outbound,
    },
    Intent {
        id: ConnectionId,
        message: ClientMessage,
    },
    Closed {
        id: ConnectionId,
    },
}

/// Main server coordinating networking and game simulation
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    session: GameSession,
    tick_duration: Duration,

    /// Handed to the acceptor on `run`; once every connection task and the
    /// acceptor are gone, `event_rx` closes and the loop ends.
    event_tx: Option<mpsc::UnboundedSender<NetworkEvent>>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl Server {
    /// Binds the listener and prepares the session. Nothing is accepted
    /// until [`Server::run`] is called.
    pub async fn bind(
        addr: &str,
        world: World,
        tick_duration: Duration,
        max_clients: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            session: GameSession::new(world, max_clients),
            tick_duration,
            event_tx: Some(event_tx),
            event_rx,
        })
    }

    /// The bound address; useful when binding to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The session the main loop drives.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Spawns task that accepts connections and hands each one its own tasks.
    /// The server keeps no sender of its own afterwards.
    fn spawn_acceptor(&mut self) {
        let Some(event_tx) = self.event_tx.take() else {
            return;
        };
        let Some(listener) = self.listener.take() else {
            return;
        };

        tokio::spawn(async move {
            let mut next_id: ConnectionId = 1;
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let id = next_id;
                        next_id += 1;
                        tokio::spawn(handle_connection(stream, addr, id, event_tx.clone()));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
                if event_tx.is_closed() {
                    break;
                }
            }
        });
    }

    fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Connected { id, addr, sender } => {
                if !self.session.connect(id, addr, sender) {
                    warn!("Refusing connection {} from {}: server full", id, addr);
                }
            }
            NetworkEvent::Intent { id, message } => {
                self.session
                    .handle_intent(id, message, std::time::Instant::now());
            }
            NetworkEvent::Closed { id } => {
                self.session.disconnect(id);
            }
        }
    }

    /// Main server loop: inbound events run to completion one at a time,
    /// interleaved with fixed-rate simulation ticks.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = std::time::Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            info!("No connections or listener left, server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = std::time::Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    let delivered = self.session.tick(now);

                    let world = self.session.world();
                    if world.tick % 60 == 0 && !self.session.clients().is_empty() {
                        debug!(
                            "Tick {}: {} connections, {} ships, {} bullets, {} stars, {:.1}Hz, {} snapshots delivered",
                            world.tick,
                            self.session.clients().len(),
                            world.player_count(),
                            world.bullets().len(),
                            world.stars().len(),
                            1.0 / dt.max(f32::EPSILON),
                            delivered
                        );
                    }
                },
            }
        }

        Ok(())
    }
}

/// Performs the handshake, then splits the socket into a reader that feeds
/// the main loop and a writer that drains this connection's outbound queue.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: ConnectionId,
    events: mpsc::UnboundedSender<NetworkEvent>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Arc<str>>(OUTBOUND_QUEUE);
    if events
        .send(NetworkEvent::Connected {
            id,
            addr,
            sender: outbound_tx,
        })
        .is_err()
    {
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = write.send(Message::text(frame.to_string())).await {
                debug!("Write to connection {} failed: {}", id, e);
                return;
            }
        }
        // Queue dropped by the session: refused or forgotten connection.
        let _ = write.close().await;
    });

    loop {
        tokio::select! {
            frame = read.next() => {
                let Some(frame) = frame else {
                    break;
                };
                if !forward_frame(frame, id, addr, &events) {
                    break;
                }
            }
            // A failed write or a dropped queue ends the connection as well.
            _ = &mut writer => {
                debug!("Writer for connection {} stopped", id);
                break;
            }
        }
    }

    writer.abort();
    let _ = events.send(NetworkEvent::Closed { id });
}

/// Handles one inbound frame. Returns false when the connection should end.
fn forward_frame(
    frame: Result<Message, tokio_tungstenite::tungstenite::Error>,
    id: ConnectionId,
    addr: SocketAddr,
    events: &mpsc::UnboundedSender<NetworkEvent>,
) -> bool {
    match frame {
        Ok(Message::Text(text)) => match ClientMessage::parse(text.as_str()) {
            Ok(message) => events.send(NetworkEvent::Intent { id, message }).is_ok(),
            Err(e) => {
                warn!("Ignoring malformed message from {}: {}", addr, e);
                true
            }
        },
        Ok(Message::Close(_)) => false,
        Ok(Message::Binary(_)) => {
            debug!("Ignoring binary frame from {}", addr);
            true
        }
        Ok(_) => true,
        Err(e) => {
            debug!("Read from connection {} failed: {}", id, e);
            false
        }
    }
}
