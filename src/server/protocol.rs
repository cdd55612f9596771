//! Wire message definitions
//! These are the types exchanged with the transport layer

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::events::GameEvent;
use crate::game::snapshot::WorldSnapshot;
use crate::game::PlayerInput;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Held input of one player, applied at the start of the next tick
    Input { player: u8, input: PlayerInput },

    /// Player left; their tank stays paused for the rest of the session
    Leave { player: u8 },
}

impl ClientMsg {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn player(&self) -> u8 {
        match self {
            ClientMsg::Input { player, .. } | ClientMsg::Leave { player } => *player,
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        session_id: Uuid,
        /// Session seed the level maps derive from
        seed: u64,
        server_time: u64,
    },

    /// Game state snapshot (sent at regular intervals)
    Snapshot {
        /// Server tick number
        tick: u64,
        state: WorldSnapshot,
        /// Events that occurred since last snapshot
        events: Vec<GameEvent>,
    },

    /// Error message
    Error { code: String, message: String },

    /// The loop stopped; no further snapshots follow
    Shutdown,
}

impl ServerMsg {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
