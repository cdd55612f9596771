//! Configuration module - environment variable parsing and game settings

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::game::tile::Tile;
use crate::util::time::{secs_to_ticks, DEFAULT_SNAPSHOT_TPS};

/// Smallest map edge (in tiles) that still fits spawns, base and border
pub const MIN_MAP_SIZE: usize = 13;
/// Largest supported map edge (in tiles)
pub const MAX_MAP_SIZE: usize = 64;
pub const DEFAULT_MAP_SIZE: usize = 26;
pub const MAX_PLAYERS: u8 = 4;

/// Server configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Snapshots broadcast per second
    pub snapshot_tps: u32,
    /// Settings handed to the simulation
    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let difficulty = match env::var("DIFFICULTY") {
            Ok(raw) => raw.parse()?,
            Err(_) => Difficulty::Normal,
        };

        let mut game = GameConfig::new(difficulty);
        game.seed = parse_var("GAME_SEED")?.unwrap_or(game.seed);
        if let Some(players) = parse_var::<u8>("PLAYER_COUNT")? {
            game = game.with_players(players);
        }
        let width = parse_var::<usize>("MAP_WIDTH")?.unwrap_or(game.map_width);
        let height = parse_var::<usize>("MAP_HEIGHT")?.unwrap_or(game.map_height);
        game = game.with_map_size(width, height);
        game.start_level = parse_var::<u32>("START_LEVEL")?.unwrap_or(1).max(1);

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            snapshot_tps: parse_var("SNAPSHOT_TPS")?.unwrap_or(DEFAULT_SNAPSHOT_TPS),
            game,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

/// Difficulty tag selected by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "normal" => Ok(Self::Normal),
            "hard" => Ok(Self::Hard),
            other => Err(ConfigError::UnknownDifficulty(other.to_string())),
        }
    }
}

impl Difficulty {
    /// Stable index used when deriving per-level generator seeds
    pub fn index(self) -> u64 {
        match self {
            Self::Easy => 0,
            Self::Normal => 1,
            Self::Hard => 2,
        }
    }

    pub fn profile(self) -> DifficultyProfile {
        match self {
            Self::Easy => DifficultyProfile {
                difficulty: self,
                border_tile: Tile::Empty,
                empty_fraction_min: 0.55,
                empty_fraction_max: 0.70,
                steel_chance: 0.2,
                enemy_speed_multiplier: 0.85,
                total_enemies: 15,
                max_enemies_on_screen: 3,
                ai_base_bias: 0.2,
                ai_shoot_cooldown: (60, 150),
                ufo_spawn_chance: 1.0 / 7200.0,
            },
            Self::Normal => DifficultyProfile {
                difficulty: self,
                border_tile: Tile::Brick,
                empty_fraction_min: 0.35,
                empty_fraction_max: 0.50,
                steel_chance: 0.3,
                enemy_speed_multiplier: 1.0,
                total_enemies: 20,
                max_enemies_on_screen: 4,
                ai_base_bias: 0.3,
                ai_shoot_cooldown: (40, 120),
                ufo_spawn_chance: 1.0 / 6000.0,
            },
            Self::Hard => DifficultyProfile {
                difficulty: self,
                border_tile: Tile::Steel,
                empty_fraction_min: 0.25,
                empty_fraction_max: 0.40,
                steel_chance: 0.45,
                enemy_speed_multiplier: 1.2,
                total_enemies: 25,
                max_enemies_on_screen: 6,
                ai_base_bias: 0.5,
                ai_shoot_cooldown: (25, 80),
                ufo_spawn_chance: 1.0 / 4800.0,
            },
        }
    }
}

/// Data record built once from a [`Difficulty`] and read by every component
/// that scales with difficulty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    pub difficulty: Difficulty,
    /// Tile laid around the outermost ring of the map
    pub border_tile: Tile,
    /// Target band for the fraction of empty playable tiles
    pub empty_fraction_min: f32,
    pub empty_fraction_max: f32,
    /// Probability that a generated structure is Steel instead of Brick
    pub steel_chance: f64,
    /// Speed multiplier applied to enemy tanks
    pub enemy_speed_multiplier: f32,
    pub total_enemies: u32,
    pub max_enemies_on_screen: usize,
    /// Probability that an AI heading change aims for the base
    pub ai_base_bias: f64,
    /// Inclusive range for the AI shoot cooldown (ticks)
    pub ai_shoot_cooldown: (u32, u32),
    /// Per-tick chance of a UFO appearing
    pub ufo_spawn_chance: f64,
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Difficulty::Normal.profile()
    }
}

/// Settings passed explicitly into the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub profile: DifficultyProfile,
    pub seed: u64,
    /// Map width in tiles
    pub map_width: usize,
    /// Map height in tiles
    pub map_height: usize,
    pub player_count: u8,
    pub start_level: u32,
    pub starting_lives: u32,
    pub player_health: u32,
    /// Ticks between enemy admissions
    pub enemy_spawn_delay: u32,
    /// Ticks the victory condition must hold before the level is finalized
    pub victory_delay: u32,
}

impl GameConfig {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            profile: difficulty.profile(),
            seed: 0x7A4C_B477_1E00_0001,
            map_width: DEFAULT_MAP_SIZE,
            map_height: DEFAULT_MAP_SIZE,
            player_count: 1,
            start_level: 1,
            starting_lives: 3,
            player_health: 3,
            enemy_spawn_delay: secs_to_ticks(3),
            victory_delay: secs_to_ticks(3),
        }
    }

    /// Player count clamped to 1..=4
    pub fn with_players(mut self, players: u8) -> Self {
        self.player_count = players.clamp(1, MAX_PLAYERS);
        self
    }

    /// Map size clamped to the supported range
    pub fn with_map_size(mut self, width: usize, height: usize) -> Self {
        self.map_width = width.clamp(MIN_MAP_SIZE, MAX_MAP_SIZE);
        self.map_height = height.clamp(MIN_MAP_SIZE, MAX_MAP_SIZE);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new(Difficulty::Normal)
    }
}
