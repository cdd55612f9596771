//! Timed world effects: base protection, freezes and the enemy speed boost

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::map::TileMap;
use super::tank::{Tank, TankId};
use super::tile::Tile;

/// Ticks the base ring stays armored
pub const BASE_PROTECTION_TIME: u32 = 1200;
/// Ticks between ring toggles while protection is running out
pub const FLASH_INTERVAL: u32 = 15;
/// Armor/brick toggles before the ring settles on brick
pub const FLASH_TOGGLES: u32 = 8;
pub const FREEZE_TICKS: u32 = 600;
pub const SPEED_BOOST_TICKS: u32 = 600;
/// Added to `temp_speed_boost` while the enemy boost runs
pub const ENEMY_SPEED_BOOST: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BaseProtection {
    Idle,
    Active {
        remaining: u32,
        /// Ring is Ground instead of Steel
        ground: bool,
    },
    Flashing {
        toggles_left: u32,
        countdown: u32,
        ground: bool,
        /// Ring currently shows armor (else brick)
        armored: bool,
    },
}

impl BaseProtection {
    fn armor(ground: bool) -> Tile {
        if ground {
            Tile::Ground
        } else {
            Tile::Steel
        }
    }
}

#[derive(Debug, Clone)]
pub struct EffectManager {
    ring: Vec<(usize, usize)>,
    base_protection: BaseProtection,
    enemy_freeze: u32,
    player_freeze: u32,
    speed_boost: u32,
    /// Enemy that keeps its boost after the shared timer runs out
    boost_holder: Option<TankId>,
}

impl EffectManager {
    pub fn new(ring: Vec<(usize, usize)>) -> Self {
        Self {
            ring,
            base_protection: BaseProtection::Idle,
            enemy_freeze: 0,
            player_freeze: 0,
            speed_boost: 0,
            boost_holder: None,
        }
    }

    pub fn base_protection(&self) -> BaseProtection {
        self.base_protection
    }

    pub fn enemy_freeze_ticks(&self) -> u32 {
        self.enemy_freeze
    }

    pub fn player_freeze_ticks(&self) -> u32 {
        self.player_freeze
    }

    pub fn speed_boost_ticks(&self) -> u32 {
        self.speed_boost
    }

    pub fn boost_holder(&self) -> Option<TankId> {
        self.boost_holder
    }

    pub fn enemies_frozen(&self) -> bool {
        self.enemy_freeze > 0
    }

    pub fn players_frozen(&self) -> bool {
        self.player_freeze > 0
    }

    /// Armor the ring. Collecting protection again while it is active
    /// upgrades the ring to Ground.
    pub fn protect_base(&mut self, map: &mut TileMap) {
        let ground = matches!(self.base_protection, BaseProtection::Active { .. });
        self.activate_base_protection(map, ground);
    }

    pub fn activate_base_protection(&mut self, map: &mut TileMap, use_ground: bool) {
        let ground = use_ground
            || matches!(
                self.base_protection,
                BaseProtection::Active { ground: true, .. }
                    | BaseProtection::Flashing { ground: true, .. }
            );
        self.base_protection = BaseProtection::Active {
            remaining: BASE_PROTECTION_TIME,
            ground,
        };
        self.paint_ring(map, BaseProtection::armor(ground));
        debug!(ground, "Base protection activated");
    }

    /// Tear the ring down to open ground
    pub fn strip_base(&mut self, map: &mut TileMap) {
        self.base_protection = BaseProtection::Idle;
        self.paint_ring(map, Tile::Empty);
        debug!("Base ring stripped");
    }

    pub fn freeze_enemies(&mut self) {
        self.enemy_freeze = FREEZE_TICKS;
    }

    pub fn freeze_players(&mut self) {
        self.player_freeze = FREEZE_TICKS;
    }

    /// Give the holder a permanent boost and every other enemy a timed one
    pub fn boost_enemies(&mut self, holder: TankId, tanks: &mut [Tank]) {
        self.boost_holder = Some(holder);
        self.speed_boost = SPEED_BOOST_TICKS;
        for tank in tanks.iter_mut().filter(|t| !t.is_player()) {
            tank.temp_speed_boost = ENEMY_SPEED_BOOST;
        }
    }

    /// Boost a newly spawned enemy should start with
    pub fn spawn_boost(&self) -> f32 {
        if self.speed_boost > 0 {
            ENEMY_SPEED_BOOST
        } else {
            0.0
        }
    }

    pub fn tick(&mut self, map: &mut TileMap, tanks: &mut [Tank]) {
        self.enemy_freeze = self.enemy_freeze.saturating_sub(1);
        self.player_freeze = self.player_freeze.saturating_sub(1);

        if self.speed_boost > 0 {
            self.speed_boost -= 1;
            if self.speed_boost == 0 {
                let holder = self.boost_holder;
                for tank in tanks
                    .iter_mut()
                    .filter(|t| !t.is_player() && Some(t.id) != holder)
                {
                    tank.temp_speed_boost = 0.0;
                }
            }
        }

        self.tick_base_protection(map);
    }

    fn tick_base_protection(&mut self, map: &mut TileMap) {
        match self.base_protection {
            BaseProtection::Idle => {}
            BaseProtection::Active { remaining, ground } => {
                self.base_protection = if remaining > 1 {
                    BaseProtection::Active {
                        remaining: remaining - 1,
                        ground,
                    }
                } else {
                    BaseProtection::Flashing {
                        toggles_left: FLASH_TOGGLES,
                        countdown: FLASH_INTERVAL,
                        ground,
                        armored: true,
                    }
                };
            }
            BaseProtection::Flashing {
                toggles_left,
                countdown,
                ground,
                armored,
            } => {
                if countdown > 1 {
                    self.base_protection = BaseProtection::Flashing {
                        toggles_left,
                        countdown: countdown - 1,
                        ground,
                        armored,
                    };
                } else if toggles_left == 0 {
                    self.paint_ring(map, Tile::Brick);
                    self.base_protection = BaseProtection::Idle;
                } else {
                    let armored = !armored;
                    let tile = if armored {
                        BaseProtection::armor(ground)
                    } else {
                        Tile::Brick
                    };
                    self.paint_ring(map, tile);
                    self.base_protection = BaseProtection::Flashing {
                        toggles_left: toggles_left - 1,
                        countdown: FLASH_INTERVAL,
                        ground,
                        armored,
                    };
                }
            }
        }
    }

    fn paint_ring(&self, map: &mut TileMap, tile: Tile) {
        for &(row, col) in &self.ring {
            map.set(row, col, tile);
        }
    }
}
