//! Power-up pickups, the easter egg, and what collecting them does

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::geometry::{BoundedEntity, Bounds};
use super::tank::{Tank, TankId, MAX_MACHINEGUN};
use super::tile::TILE_SIZE;

/// Ticks a pickup stays on the map
pub const POWER_UP_LIFETIME: u32 = 600;
pub const POWER_UP_SIZE: f32 = TILE_SIZE;
/// Chance that a non-Power enemy drops a pickup on death
pub const DROP_CHANCE: f64 = 0.3;
/// Score for a player collecting any pickup
pub const PICKUP_SCORE: u32 = 500;

pub const HELMET_SHIELD_TICKS: u32 = 600;
pub const STAR_COOLDOWN_STEP: u32 = 5;
pub const MAX_COOLDOWN_REDUCTION: u32 = 15;
pub const CAR_SPEED_STEP: f32 = 0.25;
pub const MAX_SPEED_MULTIPLIER: f32 = 2.0;
pub const LASER_TICKS: u32 = 600;
pub const EASTER_EGG_SHIELD_TICKS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    Helmet,
    Star,
    Tank,
    Shovel,
    Bomb,
    Freeze,
    Gun,
    Car,
    Ship,
    Saw,
    Machinegun,
    Laser,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 12] = [
        PowerUpKind::Helmet,
        PowerUpKind::Star,
        PowerUpKind::Tank,
        PowerUpKind::Shovel,
        PowerUpKind::Bomb,
        PowerUpKind::Freeze,
        PowerUpKind::Gun,
        PowerUpKind::Car,
        PowerUpKind::Ship,
        PowerUpKind::Saw,
        PowerUpKind::Machinegun,
        PowerUpKind::Laser,
    ];

    /// Rewards for killing a Boss: only kinds that act on the killer alone
    pub const BOSS_REWARDS: [PowerUpKind; 9] = [
        PowerUpKind::Helmet,
        PowerUpKind::Star,
        PowerUpKind::Tank,
        PowerUpKind::Gun,
        PowerUpKind::Car,
        PowerUpKind::Ship,
        PowerUpKind::Saw,
        PowerUpKind::Machinegun,
        PowerUpKind::Laser,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn random_boss_reward<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::BOSS_REWARDS[rng.gen_range(0..Self::BOSS_REWARDS.len())]
    }
}

/// Consequence of a pickup that reaches beyond the collecting tank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamEffect {
    ProtectBase,
    StripBase,
    FreezeEnemies,
    FreezePlayers,
    /// Destroy non-Boss enemies, one damage to a Boss
    BombEnemies,
    /// One damage to every player
    BombPlayers,
    /// Collector keeps the boost; every other enemy gets it temporarily
    EnemySpeedBoost { holder: TankId },
}

/// Apply a pickup to the collecting tank. Returns the team-wide effect the
/// world still has to carry out.
pub fn apply_pickup(kind: PowerUpKind, tank: &mut Tank) -> Option<TeamEffect> {
    let player = tank.is_player();
    match kind {
        PowerUpKind::Helmet => {
            tank.shield_ticks = tank.shield_ticks.max(HELMET_SHIELD_TICKS);
            None
        }
        PowerUpKind::Star => {
            tank.shoot_cooldown_reduction =
                (tank.shoot_cooldown_reduction + STAR_COOLDOWN_STEP).min(MAX_COOLDOWN_REDUCTION);
            None
        }
        PowerUpKind::Tank => {
            tank.lives += 1;
            None
        }
        PowerUpKind::Gun => {
            tank.bullet_power = tank.bullet_power.max(2);
            None
        }
        PowerUpKind::Ship => {
            tank.can_swim = true;
            tank.swim_charge = true;
            None
        }
        PowerUpKind::Saw => {
            tank.can_destroy_trees = true;
            None
        }
        PowerUpKind::Machinegun => {
            tank.machinegun_count = (tank.machinegun_count + 1).min(MAX_MACHINEGUN);
            None
        }
        PowerUpKind::Laser => {
            tank.laser_duration = LASER_TICKS;
            None
        }
        PowerUpKind::Car if player => {
            tank.speed_multiplier = (tank.speed_multiplier + CAR_SPEED_STEP).min(MAX_SPEED_MULTIPLIER);
            None
        }
        PowerUpKind::Car => Some(TeamEffect::EnemySpeedBoost { holder: tank.id }),
        PowerUpKind::Shovel if player => Some(TeamEffect::ProtectBase),
        PowerUpKind::Shovel => Some(TeamEffect::StripBase),
        PowerUpKind::Freeze if player => Some(TeamEffect::FreezeEnemies),
        PowerUpKind::Freeze => Some(TeamEffect::FreezePlayers),
        PowerUpKind::Bomb if player => Some(TeamEffect::BombEnemies),
        PowerUpKind::Bomb => Some(TeamEffect::BombPlayers),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: u32,
    pub kind: PowerUpKind,
    pub x: f32,
    pub y: f32,
    pub remaining: u32,
}

impl PowerUp {
    pub fn new(id: u32, kind: PowerUpKind, x: f32, y: f32) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            remaining: POWER_UP_LIFETIME,
        }
    }

    /// Count down; false once expired
    pub fn tick(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining > 0
    }
}

impl BoundedEntity for PowerUp {
    fn bounds(&self) -> Bounds {
        Bounds::square(self.x, self.y, POWER_UP_SIZE)
    }
}

/// Left behind by a destroyed UFO; only players can collect it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EasterEgg {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub remaining: u32,
}

impl EasterEgg {
    pub fn new(id: u32, x: f32, y: f32) -> Self {
        Self {
            id,
            x,
            y,
            remaining: POWER_UP_LIFETIME,
        }
    }

    pub fn tick(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining > 0
    }

    /// Extra life and a fresh shield
    pub fn apply(tank: &mut Tank) {
        tank.lives += 1;
        tank.shield_ticks = tank.shield_ticks.max(EASTER_EGG_SHIELD_TICKS);
    }
}

impl BoundedEntity for EasterEgg {
    fn bounds(&self) -> Bounds {
        Bounds::square(self.x, self.y, POWER_UP_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tank::EnemyType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn player() -> Tank {
        let mut tank = Tank::player(TankId(1), 1, 0.0, 0.0, 3, 3);
        tank.shield_ticks = 0;
        tank
    }

    fn enemy() -> Tank {
        Tank::enemy(TankId(7), EnemyType::Fast, 0.0, 0.0, 1)
    }

    #[test]
    fn test_star_and_machinegun_are_capped() {
        let mut tank = player();
        for _ in 0..10 {
            apply_pickup(PowerUpKind::Star, &mut tank);
            apply_pickup(PowerUpKind::Machinegun, &mut tank);
        }
        assert_eq!(tank.shoot_cooldown_reduction, MAX_COOLDOWN_REDUCTION);
        assert_eq!(tank.machinegun_count, MAX_MACHINEGUN);
    }

    #[test]
    fn test_car_caps_player_speed() {
        let mut tank = player();
        for _ in 0..10 {
            assert_eq!(apply_pickup(PowerUpKind::Car, &mut tank), None);
        }
        assert_eq!(tank.speed_multiplier, MAX_SPEED_MULTIPLIER);
    }

    #[test]
    fn test_team_effects_depend_on_side() {
        let mut p = player();
        let mut e = enemy();
        assert_eq!(apply_pickup(PowerUpKind::Shovel, &mut p), Some(TeamEffect::ProtectBase));
        assert_eq!(apply_pickup(PowerUpKind::Shovel, &mut e), Some(TeamEffect::StripBase));
        assert_eq!(apply_pickup(PowerUpKind::Freeze, &mut p), Some(TeamEffect::FreezeEnemies));
        assert_eq!(apply_pickup(PowerUpKind::Freeze, &mut e), Some(TeamEffect::FreezePlayers));
        assert_eq!(apply_pickup(PowerUpKind::Bomb, &mut p), Some(TeamEffect::BombEnemies));
        assert_eq!(apply_pickup(PowerUpKind::Bomb, &mut e), Some(TeamEffect::BombPlayers));
        assert_eq!(
            apply_pickup(PowerUpKind::Car, &mut e),
            Some(TeamEffect::EnemySpeedBoost { holder: TankId(7) })
        );
    }

    #[test]
    fn test_ship_grants_swim_and_charge() {
        let mut tank = player();
        apply_pickup(PowerUpKind::Ship, &mut tank);
        assert!(tank.can_swim);
        assert!(tank.swim_charge);
    }

    #[test]
    fn test_boss_rewards_never_touch_team_state() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..200 {
            let kind = PowerUpKind::random_boss_reward(&mut rng);
            assert!(!matches!(
                kind,
                PowerUpKind::Freeze | PowerUpKind::Bomb | PowerUpKind::Shovel
            ));
            assert_eq!(apply_pickup(kind, &mut player()), None);
        }
    }

    #[test]
    fn test_pickup_expires() {
        let mut pickup = PowerUp::new(1, PowerUpKind::Helmet, 0.0, 0.0);
        for _ in 0..POWER_UP_LIFETIME - 1 {
            assert!(pickup.tick());
        }
        assert!(!pickup.tick());
    }

    #[test]
    fn test_easter_egg_grants_life_and_shield() {
        let mut tank = player();
        EasterEgg::apply(&mut tank);
        assert_eq!(tank.lives, 4);
        assert!(tank.has_shield());
    }
}
