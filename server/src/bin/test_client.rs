//! Headless bot for poking a running server: joins, wanders, shoots at the
//! nearest ship and respawns after dying.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rand::Rng;
use shared::{ClientMessage, PlayerState, ServerMessage};
use std::time::Duration;
use tokio::time::{interval, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server WebSocket URL
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Display name to join with
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Seconds to stay connected
    #[arg(short, long, default_value = "30")]
    duration: u64,
}

#[derive(Debug, Default)]
struct Stats {
    snapshots: u64,
    hits_taken: u64,
    deaths: u64,
    level_ups: u64,
}

fn encode(message: &ClientMessage) -> Result<Message, serde_json::Error> {
    Ok(Message::text(serde_json::to_string(message)?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    info!("Connecting to {}", args.server);
    let (ws, _) = connect_async(args.server.as_str()).await?;
    let (mut write, mut read) = ws.split();

    write
        .send(encode(&ClientMessage::Join {
            username: args.name.clone(),
        })?)
        .await?;

    let mut rng = rand::thread_rng();
    let mut me: Option<u32> = None;
    let mut ship: Option<PlayerState> = None;
    let mut others: Vec<PlayerState> = Vec::new();
    let mut stats = Stats::default();

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut think = interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,

            frame = read.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                };
                let message: ServerMessage = match serde_json::from_str(text.as_str()) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Unreadable server message: {}", e);
                        continue;
                    }
                };
                match message {
                    ServerMessage::Joined { id } => {
                        info!("Joined as player {}", id);
                        me = Some(id);
                    }
                    ServerMessage::GameState { players, .. } => {
                        stats.snapshots += 1;
                        ship = players.iter().find(|p| Some(p.id) == me).cloned();
                        others = players.into_iter().filter(|p| Some(p.id) != me).collect();
                    }
                    ServerMessage::Hit { health, shield_health, .. } => {
                        stats.hits_taken += 1;
                        debug!("Hit: health {} shield {}", health, shield_health);
                    }
                    ServerMessage::Dead => {
                        stats.deaths += 1;
                        info!("Destroyed, respawning");
                        me = None;
                        ship = None;
                        write.send(encode(&ClientMessage::Respawn)?).await?;
                    }
                    ServerMessage::LevelUp { new_tier, ship_name } => {
                        stats.level_ups += 1;
                        info!("Advanced to tier {} ({})", new_tier, ship_name);
                    }
                    ServerMessage::Respawn { player } => {
                        info!("Respawned as player {}", player.id);
                        me = Some(player.id);
                        ship = Some(player);
                    }
                }
            }

            _ = think.tick() => {
                let Some(current) = ship.as_mut() else {
                    continue;
                };

                let heading = current.angle + rng.gen_range(-0.3..0.3);
                current.x += heading.cos() * 5.0;
                current.y += heading.sin() * 5.0;
                current.angle = heading;
                write
                    .send(encode(&ClientMessage::Move {
                        x: current.x,
                        y: current.y,
                        angle: heading,
                    })?)
                    .await?;

                let (x, y) = (current.x, current.y);
                let nearest = others.iter().min_by(|a, b| {
                    let da = (a.x - x).powi(2) + (a.y - y).powi(2);
                    let db = (b.x - x).powi(2) + (b.y - y).powi(2);
                    da.total_cmp(&db)
                });
                if let Some(target) = nearest {
                    let aim = (target.y - y).atan2(target.x - x);
                    write
                        .send(encode(&ClientMessage::Shoot {
                            x,
                            y,
                            angle: aim,
                            speed: None,
                        })?)
                        .await?;
                }
            }
        }
    }

    let _ = write.close().await;
    info!(
        "Done: {} snapshots, {} hits taken, {} deaths, {} level-ups",
        stats.snapshots, stats.hits_taken, stats.deaths, stats.level_ups
    );
    Ok(())
}
