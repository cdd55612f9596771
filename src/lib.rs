//! Tank Battle Server - authoritative simulation core
//!
//! A fixed-tick engine that advances tanks, projectiles and destructible
//! terrain, runs enemy AI, and exports full or delta snapshots:
//! - `game`: the world and its tick pipeline
//! - `server`: the headless loop, input queue and wire protocol
//! - `config`: environment and difficulty settings

pub mod config;
pub mod game;
pub mod server;
pub mod util;

pub use config::{Config, Difficulty, GameConfig};
pub use game::{GamePhase, GameWorld, PlayerInput};
pub use server::{GameServer, ServerHandle};
