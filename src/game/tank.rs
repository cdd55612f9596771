//! Tank state, per-type stats and the damage rules

use serde::{Deserialize, Serialize};

use super::ai::AiState;
use super::geometry::{Bounds, BoundedEntity, Direction};
use super::tile::TILE_SIZE;

/// Regular tank footprint in pixels
pub const TANK_SIZE: f32 = 28.0;
/// Boss footprint in pixels (just under two tiles)
pub const BOSS_SIZE: f32 = TILE_SIZE * 2.0 - 4.0;
/// Pixels per tick at speed multiplier 1.0
pub const BASE_SPEED: f32 = 2.0;
pub const SPAWN_SHIELD_TICKS: u32 = 180;
pub const RESPAWN_DELAY_TICKS: u32 = 120;
pub const BASE_FIRE_COOLDOWN: u32 = 20;
pub const MIN_FIRE_COOLDOWN: u32 = 8;
pub const MAX_MACHINEGUN: u8 = 4;

/// Stable identifier of a tank within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TankId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyType {
    Regular,
    Armored,
    Fast,
    Power,
    Heavy,
    Boss,
}

impl EnemyType {
    pub const ALL: [EnemyType; 6] = [
        EnemyType::Regular,
        EnemyType::Armored,
        EnemyType::Fast,
        EnemyType::Power,
        EnemyType::Heavy,
        EnemyType::Boss,
    ];

    /// Slot in per-type kill counters
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Per-type data record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyStats {
    pub health: u32,
    pub speed_multiplier: f32,
    pub bullet_power: u8,
    pub size: f32,
    /// Points awarded to the killer
    pub score: u32,
    /// Every kill drops a power-up
    pub always_drops: bool,
}

impl EnemyStats {
    pub const BOSS_BASE_HEALTH: u32 = 10;
    pub const BOSS_HEALTH_PER_LEVEL: u32 = 5;

    pub fn for_type(enemy_type: EnemyType, level: u32) -> Self {
        match enemy_type {
            EnemyType::Regular => Self {
                health: 1,
                speed_multiplier: 1.0,
                bullet_power: 1,
                size: TANK_SIZE,
                score: 100,
                always_drops: false,
            },
            EnemyType::Armored => Self {
                health: 3,
                speed_multiplier: 0.75,
                bullet_power: 1,
                size: TANK_SIZE,
                score: 200,
                always_drops: false,
            },
            EnemyType::Fast => Self {
                health: 1,
                speed_multiplier: 1.5,
                bullet_power: 1,
                size: TANK_SIZE,
                score: 200,
                always_drops: false,
            },
            EnemyType::Power => Self {
                health: 2,
                speed_multiplier: 1.0,
                bullet_power: 1,
                size: TANK_SIZE,
                score: 300,
                always_drops: true,
            },
            EnemyType::Heavy => Self {
                health: 4,
                speed_multiplier: 0.6,
                bullet_power: 2,
                size: TANK_SIZE,
                score: 400,
                always_drops: false,
            },
            EnemyType::Boss => Self {
                health: Self::BOSS_BASE_HEALTH
                    + Self::BOSS_HEALTH_PER_LEVEL * level.saturating_sub(1),
                speed_multiplier: 0.5,
                bullet_power: 2,
                size: BOSS_SIZE,
                score: 1000,
                always_drops: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "side", rename_all = "snake_case")]
pub enum TankKind {
    Player { number: u8 },
    Enemy { enemy_type: EnemyType },
}

/// Autonomous ice slide after movement input is released
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IceSlide {
    pub direction: Direction,
    /// Pixels left to travel
    pub remaining: f32,
}

/// Result of a single point of damage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageResult {
    /// Dead, respawning or shielded: nothing happened
    Ignored,
    /// The swim charge soaked the hit
    Absorbed,
    Damaged { remaining: u32 },
    Killed,
}

#[derive(Debug, Clone)]
pub struct Tank {
    pub id: TankId,
    pub kind: TankKind,

    // Spatial
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
    pub size: f32,

    // Combat
    pub health: u32,
    pub max_health: u32,
    pub lives: u32,
    pub alive: bool,
    pub shoot_cooldown: u32,
    pub active_bullets: u32,

    // Modifiers
    pub bullet_power: u8,
    pub speed_multiplier: f32,
    pub temp_speed_boost: f32,
    pub can_swim: bool,
    /// One-shot hit absorption that comes with the ship
    pub swim_charge: bool,
    pub can_destroy_trees: bool,
    pub machinegun_count: u8,
    pub shoot_cooldown_reduction: u32,
    /// Ticks left during which shots are lasers
    pub laser_duration: u32,
    pub shield_ticks: u32,
    /// Invulnerable while the owning player is paused or disconnected
    pub pause_shield: bool,

    // Respawn
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub respawn_timer: Option<u32>,

    // Movement
    pub slide: Option<IceSlide>,
    /// Moved under input last tick (arms the ice slide)
    pub moved_last_tick: bool,

    /// Kills scored while holding the machine gun
    pub machinegun_kills: u32,
    pub ai: Option<AiState>,
}

impl Tank {
    pub fn player(id: TankId, number: u8, x: f32, y: f32, health: u32, lives: u32) -> Self {
        let mut tank = Self::base(id, TankKind::Player { number }, x, y, TANK_SIZE);
        tank.health = health.max(1);
        tank.max_health = health.max(1);
        tank.lives = lives.max(1);
        tank.shield_ticks = SPAWN_SHIELD_TICKS;
        tank
    }

    pub fn enemy(id: TankId, enemy_type: EnemyType, x: f32, y: f32, level: u32) -> Self {
        let stats = EnemyStats::for_type(enemy_type, level);
        let mut tank = Self::base(id, TankKind::Enemy { enemy_type }, x, y, stats.size);
        tank.direction = Direction::Down;
        tank.health = stats.health;
        tank.max_health = stats.health;
        tank.lives = 1;
        tank.bullet_power = stats.bullet_power;
        tank.speed_multiplier = stats.speed_multiplier;
        tank.can_swim = enemy_type == EnemyType::Boss;
        tank.ai = Some(AiState::default());
        tank
    }

    fn base(id: TankId, kind: TankKind, x: f32, y: f32, size: f32) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            direction: Direction::Up,
            size,
            health: 1,
            max_health: 1,
            lives: 1,
            alive: true,
            shoot_cooldown: 0,
            active_bullets: 0,
            bullet_power: 1,
            speed_multiplier: 1.0,
            temp_speed_boost: 0.0,
            can_swim: false,
            swim_charge: false,
            can_destroy_trees: false,
            machinegun_count: 0,
            shoot_cooldown_reduction: 0,
            laser_duration: 0,
            shield_ticks: 0,
            pause_shield: false,
            spawn_x: x,
            spawn_y: y,
            respawn_timer: None,
            slide: None,
            moved_last_tick: false,
            machinegun_kills: 0,
            ai: None,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, TankKind::Player { .. })
    }

    /// Player number 1-4, or 0 for enemies
    pub fn player_number(&self) -> u8 {
        match self.kind {
            TankKind::Player { number } => number,
            TankKind::Enemy { .. } => 0,
        }
    }

    pub fn enemy_type(&self) -> Option<EnemyType> {
        match self.kind {
            TankKind::Enemy { enemy_type } => Some(enemy_type),
            TankKind::Player { .. } => None,
        }
    }

    pub fn is_boss(&self) -> bool {
        self.enemy_type() == Some(EnemyType::Boss)
    }

    pub fn has_shield(&self) -> bool {
        self.shield_ticks > 0 || self.pause_shield
    }

    /// Alive and not waiting to respawn
    pub fn is_active(&self) -> bool {
        self.alive && self.respawn_timer.is_none()
    }

    /// Out of lives with no respawn pending
    pub fn is_eliminated(&self) -> bool {
        !self.alive && self.lives == 0 && self.respawn_timer.is_none()
    }

    pub fn max_bullets(&self) -> u32 {
        1 + u32::from(self.machinegun_count)
    }

    pub fn fire_cooldown(&self) -> u32 {
        BASE_FIRE_COOLDOWN
            .saturating_sub(self.shoot_cooldown_reduction)
            .max(MIN_FIRE_COOLDOWN)
    }

    pub fn can_fire(&self) -> bool {
        self.is_active()
            && !self.pause_shield
            && self.shoot_cooldown == 0
            && (self.laser_duration > 0 || self.active_bullets < self.max_bullets())
    }

    /// Muzzle position for a projectile of `size`, centered on the facing edge
    pub fn muzzle(&self, size: f32) -> (f32, f32) {
        let (cx, cy) = self.bounds().center();
        let half = self.size / 2.0;
        let (dx, dy) = self.direction.delta();
        (
            cx + dx * half - size / 2.0 + dx * size / 2.0,
            cy + dy * half - size / 2.0 + dy * size / 2.0,
        )
    }

    /// Apply one point of damage.
    ///
    /// No-op on dead or respawning tanks and while any shield is up. A
    /// remaining swim charge absorbs the hit instead of health.
    pub fn damage(&mut self) -> DamageResult {
        if !self.is_active() || self.has_shield() {
            return DamageResult::Ignored;
        }
        if self.swim_charge {
            self.swim_charge = false;
            return DamageResult::Absorbed;
        }

        self.health = self.health.saturating_sub(1);
        if self.health == 0 {
            self.die();
            DamageResult::Killed
        } else {
            DamageResult::Damaged {
                remaining: self.health,
            }
        }
    }

    /// Kill outright, ignoring shields (Boss contact). Returns false if the
    /// tank was already dead.
    pub fn instant_kill(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.health = 0;
        self.die();
        true
    }

    fn die(&mut self) {
        self.alive = false;
        self.lives = self.lives.saturating_sub(1);
        self.slide = None;
        self.moved_last_tick = false;
        self.respawn_timer = (self.lives > 0).then_some(RESPAWN_DELAY_TICKS);
    }

    /// Count down timers owned by the tank itself. Returns true on the tick
    /// the tank respawns.
    pub fn tick_timers(&mut self) -> bool {
        if let Some(remaining) = self.respawn_timer {
            if remaining > 1 {
                self.respawn_timer = Some(remaining - 1);
            } else {
                self.respawn();
                return true;
            }
            return false;
        }
        if !self.alive {
            return false;
        }
        self.shield_ticks = self.shield_ticks.saturating_sub(1);
        self.shoot_cooldown = self.shoot_cooldown.saturating_sub(1);
        self.laser_duration = self.laser_duration.saturating_sub(1);
        false
    }

    /// Bring the tank back at its spawn point with a spawn shield
    pub fn respawn(&mut self) {
        self.respawn_timer = None;
        self.alive = true;
        self.health = self.max_health;
        self.x = self.spawn_x;
        self.y = self.spawn_y;
        self.direction = Direction::Up;
        self.shield_ticks = SPAWN_SHIELD_TICKS;
        self.shoot_cooldown = 0;
        self.slide = None;
        self.moved_last_tick = false;
    }

    /// A projectile owned by this tank left play
    pub fn release_bullet(&mut self) {
        self.active_bullets = self.active_bullets.saturating_sub(1);
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }
}

impl BoundedEntity for Tank {
    fn bounds(&self) -> Bounds {
        Bounds::square(self.x, self.y, self.size)
    }
}
