//! Game simulation modules

pub mod ai;
pub mod combat;
pub mod effects;
pub mod events;
pub mod geometry;
pub mod layout;
pub mod level_gen;
pub mod map;
pub mod physics;
pub mod powerup;
pub mod snapshot;
pub mod spatial;
pub mod spawner;
pub mod tank;
pub mod tile;
pub mod ufo;
pub mod world;

pub use world::{GamePhase, GameWorld, PlayerStats};

use serde::{Deserialize, Serialize};

use self::geometry::Direction;

/// Held input state of one player for the current tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInput {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub shoot: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl PlayerInput {
    /// Requested heading; vertical keys win over horizontal ones
    pub fn direction(&self) -> Option<Direction> {
        if self.up {
            Some(Direction::Up)
        } else if self.down {
            Some(Direction::Down)
        } else if self.left {
            Some(Direction::Left)
        } else if self.right {
            Some(Direction::Right)
        } else {
            None
        }
    }
}
