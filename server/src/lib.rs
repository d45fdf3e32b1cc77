//! # Arena Server Library
//!
//! This library provides the authoritative server for the multiplayer arena
//! shooter. It owns the canonical world, applies player intents, runs the
//! combat and progression rules, and streams world snapshots to every
//! connected client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server decides every outcome: bullet flight, hits, shield blocks,
//! deaths, star pickups and tier advancement. Clients only send intents and
//! render what the server tells them.
//!
//! ### Client Management
//! Handles the lifecycle of each connection:
//! - Connection establishment and joining as a named ship
//! - Routing intents to the ship the connection controls
//! - Death, respawn and disconnection cleanup
//!
//! ### State Broadcasting
//! Once per tick the full world is serialized a single time and offered to
//! every connection. A connection whose queue is full misses that snapshot;
//! nobody else waits for it.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! One task owns the world. Inbound intents arrive over a channel and are
//! applied one at a time, interleaved with fixed-rate ticks, so no rule ever
//! observes a half-applied update and the world needs no locks.
//!
//! ### WebSocket Communication
//! Clients speak JSON text frames over WebSocket. Each connection gets a
//! reader task (parsing happens off the simulation path) and a writer task
//! draining a bounded outbound queue.
//!
//! ### Point Events
//! Rules that affect one player (hit, death, level-up) come out of the world
//! as events addressed by player identity and are delivered to that player's
//! connection only.
//!
//! ## Module Organization
//!
//! ### Entity Module (`entity`)
//! Ships, stars and bullets as the world stores them, plus their wire views.
//!
//! ### Progression Module (`progression`)
//! Experience credit and single-step tier advancement.
//!
//! ### Combat Module (`combat`)
//! Trait-driven firing patterns, reload timing, shield absorption and
//! damage application.
//!
//! ### Game Module (`game`)
//! The world and its tick: bullet movement, collisions, rewards, shield
//! regeneration, star upkeep and snapshots.
//!
//! ### Client Manager Module (`client_manager`)
//! Connection bookkeeping and best-effort outbound delivery.
//!
//! ### Session Module (`session`)
//! Binds connections to ships and turns world events into messages.
//!
//! ### Network Module (`network`)
//! Listener, per-connection tasks and the main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::World;
//! use server::network::Server;
//! use shared::GameConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let world = World::new(GameConfig::default());
//!     // 60Hz, at most 64 connections
//!     let mut server = Server::bind(
//!         "127.0.0.1:3000",
//!         world,
//!         Duration::from_secs_f64(1.0 / 60.0),
//!         64,
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Trust Model
//!
//! Positions reported by clients are accepted as long as they lie on the
//! map; there is no speed check. Everything else (reload timing, projectile
//! speed, damage, shields, experience) is computed on the server and client
//! claims about it are ignored.

pub mod client_manager;
pub mod combat;
pub mod entity;
pub mod game;
pub mod network;
pub mod progression;
pub mod session;
