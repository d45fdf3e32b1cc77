//! Types shared between the arena server and anything that talks to it:
//! the JSON wire protocol, world geometry, the tier table and the game
//! configuration.

pub mod config;
pub mod geometry;
pub mod protocol;
pub mod tiers;

pub use config::{ConfigError, GameConfig};
pub use geometry::{Bounds, Vec2};
pub use protocol::{BulletState, ClientMessage, PlayerState, ProtocolError, ServerMessage, StarState};
pub use tiers::{default_tiers, Capability, ShipTrait, TierSpec};

/// Simulation rate the browser client is tuned for.
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Longest display name kept after trimming.
pub const MAX_USERNAME_LEN: usize = 24;
