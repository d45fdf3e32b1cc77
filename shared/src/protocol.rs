//! Wire protocol between the server and its clients.
//!
//! Every frame is a JSON object tagged by a `"type"` field, which is what the
//! browser client sends and switches on.

use crate::tiers::ShipTrait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("non-finite value in field `{0}`")]
    NonFinite(&'static str),
}

/// Intents a client may submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Join {
        username: String,
    },
    /// Client-reported position. The server does not validate speed.
    Move {
        x: f32,
        y: f32,
        angle: f32,
    },
    Rotate {
        angle: f32,
    },
    /// `x`/`y` is the aim origin. `speed` is accepted for compatibility and
    /// ignored; projectile speed comes from the server configuration.
    Shoot {
        x: f32,
        y: f32,
        angle: f32,
        #[serde(default)]
        speed: Option<f32>,
    },
    /// Ask for a fresh ship after dying, keeping the connection open.
    Respawn,
}

impl ClientMessage {
    /// Decodes a text frame, rejecting payloads carrying non-finite numbers.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let message: ClientMessage = serde_json::from_str(text)?;
        message.check_finite()?;
        Ok(message)
    }

    fn check_finite(&self) -> Result<(), ProtocolError> {
        let fields: Vec<(&'static str, f32)> = match self {
            ClientMessage::Move { x, y, angle } | ClientMessage::Shoot { x, y, angle, .. } => {
                vec![("x", *x), ("y", *y), ("angle", *angle)]
            }
            ClientMessage::Rotate { angle } => vec![("angle", *angle)],
            ClientMessage::Join { .. } | ClientMessage::Respawn => Vec::new(),
        };
        match fields.iter().find(|(_, value)| !value.is_finite()) {
            Some((name, _)) => Err(ProtocolError::NonFinite(name)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub id: u32,
    pub username: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub tier: usize,
    pub exp: f32,
    pub health: f32,
    pub max_health: f32,
    pub shield_health: f32,
    pub damage: f32,
    #[serde(rename = "trait")]
    pub ship_trait: ShipTrait,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarState {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletState {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub speed: f32,
    pub damage: f32,
    pub owner_id: u32,
    pub size: f32,
}

/// Messages the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Identity assigned to the joining connection.
    Joined { id: u32 },
    /// Full world snapshot, broadcast every tick.
    GameState {
        players: Vec<PlayerState>,
        stars: Vec<StarState>,
        bullets: Vec<BulletState>,
    },
    Hit {
        id: u32,
        health: f32,
        #[serde(rename = "shieldHealth")]
        shield_health: f32,
    },
    Dead,
    LevelUp {
        #[serde(rename = "newTier")]
        new_tier: usize,
        #[serde(rename = "shipName")]
        ship_name: String,
    },
    Respawn { player: PlayerState },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
