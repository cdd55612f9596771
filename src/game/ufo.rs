//! The UFO side quest: a wandering saucer that shoots down at players and
//! leaves an easter egg behind when destroyed

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::geometry::{BoundedEntity, Bounds};
use super::tile::TILE_SIZE;

pub const UFO_WIDTH: f32 = 40.0;
pub const UFO_HEIGHT: f32 = 20.0;
pub const UFO_HEALTH: u32 = 3;
/// Pixels per tick along each axis, at most
pub const UFO_SPEED: f32 = 1.5;
/// Ticks before the UFO gives up and leaves
pub const UFO_LIFETIME: u32 = 1200;
pub const UFO_SHOOT_INTERVAL: u32 = 90;
pub const UFO_TURN_INTERVAL: u32 = 120;
pub const UFO_KILL_SCORE: u32 = 20;
/// Machine-gun kills by one player that summon the UFO
pub const MACHINEGUN_KILLS_FOR_UFO: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ufo {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub health: u32,
    pub lifetime: u32,
    shoot_timer: u32,
    turn_timer: u32,
    /// Vertical band the UFO bounces within
    min_y: f32,
    max_y: f32,
}

/// What the UFO wants this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UfoAction {
    pub fire: bool,
    pub escaped: bool,
}

impl Ufo {
    pub fn new<R: Rng + ?Sized>(x: f32, y: f32, min_y: f32, max_y: f32, rng: &mut R) -> Self {
        let mut ufo = Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            health: UFO_HEALTH,
            lifetime: UFO_LIFETIME,
            shoot_timer: UFO_SHOOT_INTERVAL,
            turn_timer: UFO_TURN_INTERVAL,
            min_y,
            max_y: max_y.max(min_y),
        };
        ufo.randomize_heading(rng);
        ufo
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// One point of damage; true on the hit that destroys it
    pub fn damage(&mut self) -> bool {
        if self.health == 0 {
            return false;
        }
        self.health -= 1;
        self.health == 0
    }

    fn randomize_heading<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.vx = if rng.gen_bool(0.5) { UFO_SPEED } else { -UFO_SPEED };
        self.vy = rng.gen_range(-UFO_SPEED..=UFO_SPEED);
    }

    /// Wander one tick inside the map's width and the vertical band
    pub fn update<R: Rng + ?Sized>(&mut self, map_width: f32, rng: &mut R) -> UfoAction {
        let mut action = UfoAction::default();

        self.lifetime = self.lifetime.saturating_sub(1);
        if self.lifetime == 0 {
            action.escaped = true;
            return action;
        }

        self.turn_timer = self.turn_timer.saturating_sub(1);
        if self.turn_timer == 0 {
            self.randomize_heading(rng);
            self.turn_timer = UFO_TURN_INTERVAL;
        }

        self.x += self.vx;
        self.y += self.vy;

        let max_x = (map_width - UFO_WIDTH).max(0.0);
        if self.x < 0.0 || self.x > max_x {
            self.x = self.x.clamp(0.0, max_x);
            self.vx = -self.vx;
        }
        if self.y < self.min_y || self.y > self.max_y {
            self.y = self.y.clamp(self.min_y, self.max_y);
            self.vy = -self.vy;
        }

        self.shoot_timer = self.shoot_timer.saturating_sub(1);
        if self.shoot_timer == 0 {
            action.fire = true;
            self.shoot_timer = UFO_SHOOT_INTERVAL;
        }
        action
    }
}

impl BoundedEntity for Ufo {
    fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, UFO_WIDTH, UFO_HEIGHT)
    }
}

/// One UFO at a time. The random roll succeeds at most once per level;
/// machine-gun kills can summon another whenever the sky is clear.
#[derive(Debug, Clone, Default)]
pub struct UfoManager {
    ufo: Option<Ufo>,
    appeared_this_level: bool,
}

impl UfoManager {
    pub fn ufo(&self) -> Option<&Ufo> {
        self.ufo.as_ref()
    }

    pub fn ufo_mut(&mut self) -> Option<&mut Ufo> {
        self.ufo.as_mut()
    }

    pub fn reset(&mut self) {
        self.ufo = None;
        self.appeared_this_level = false;
    }

    /// Spawn a UFO when triggered or on a per-tick random roll. Returns its
    /// spawn position.
    pub fn maybe_spawn<R: Rng + ?Sized>(
        &mut self,
        chance: f64,
        triggered: bool,
        map_width: f32,
        map_height: f32,
        rng: &mut R,
    ) -> Option<(f32, f32)> {
        if self.ufo.is_some() {
            return None;
        }
        if !triggered && (self.appeared_this_level || !rng.gen_bool(chance.clamp(0.0, 1.0))) {
            return None;
        }

        let min_y = TILE_SIZE;
        let max_y = (map_height / 2.0).max(min_y);
        let x = rng.gen_range(0.0..=(map_width - UFO_WIDTH).max(0.0));
        let y = min_y + TILE_SIZE;
        self.ufo = Some(Ufo::new(x, y.min(max_y), min_y, max_y, rng));
        self.appeared_this_level = true;
        debug!(x, y, triggered, "UFO appeared");
        Some((x, y))
    }

    /// Advance the UFO. A UFO whose lifetime ran out is removed and
    /// reported as escaped.
    pub fn tick<R: Rng + ?Sized>(&mut self, map_width: f32, rng: &mut R) -> UfoAction {
        let Some(ufo) = self.ufo.as_mut() else {
            return UfoAction::default();
        };
        let action = ufo.update(map_width, rng);
        if action.escaped {
            self.ufo = None;
        }
        action
    }

    /// Remove a destroyed UFO; returns where it was
    pub fn take_destroyed(&mut self) -> Option<(f32, f32)> {
        match &self.ufo {
            Some(ufo) if !ufo.is_alive() => {
                let position = (ufo.x, ufo.y);
                self.ufo = None;
                Some(position)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_three_hits_destroy() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ufo = Ufo::new(0.0, 64.0, 32.0, 300.0, &mut rng);
        assert!(!ufo.damage());
        assert!(!ufo.damage());
        assert!(ufo.damage());
        assert!(!ufo.is_alive());
        assert!(!ufo.damage());
    }

    #[test]
    fn test_stays_in_band_and_fires() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut ufo = Ufo::new(100.0, 64.0, 32.0, 200.0, &mut rng);
        let mut shots = 0;
        for _ in 0..600 {
            let action = ufo.update(416.0, &mut rng);
            assert!(!action.escaped);
            if action.fire {
                shots += 1;
            }
            assert!(ufo.y >= 32.0 && ufo.y <= 200.0);
            assert!(ufo.x >= 0.0 && ufo.x <= 416.0 - UFO_WIDTH);
        }
        assert_eq!(shots, 600 / UFO_SHOOT_INTERVAL);
    }

    #[test]
    fn test_escapes_after_lifetime() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut manager = UfoManager::default();
        assert!(manager.maybe_spawn(0.0, true, 832.0, 832.0, &mut rng).is_some());
        let mut escaped = false;
        for _ in 0..UFO_LIFETIME {
            escaped |= manager.tick(832.0, &mut rng).escaped;
        }
        assert!(escaped);
        assert!(manager.ufo().is_none());
    }

    #[test]
    fn test_random_ufo_once_per_level() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut manager = UfoManager::default();
        assert!(manager.maybe_spawn(0.0, false, 832.0, 832.0, &mut rng).is_none());
        assert!(manager.maybe_spawn(1.0, false, 832.0, 832.0, &mut rng).is_some());
        assert!(manager.maybe_spawn(1.0, true, 832.0, 832.0, &mut rng).is_none());
        for _ in 0..3 {
            manager.ufo_mut().unwrap().damage();
        }
        assert!(manager.take_destroyed().is_some());
        assert!(manager.maybe_spawn(1.0, false, 832.0, 832.0, &mut rng).is_none());
        manager.reset();
        assert!(manager.maybe_spawn(1.0, false, 832.0, 832.0, &mut rng).is_some());
    }

    #[test]
    fn test_machinegun_trigger_summons_after_random_ufo() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut manager = UfoManager::default();
        assert!(manager.maybe_spawn(1.0, false, 832.0, 832.0, &mut rng).is_some());
        for _ in 0..UFO_LIFETIME {
            manager.tick(832.0, &mut rng);
        }
        assert!(manager.ufo().is_none());
        assert!(manager.maybe_spawn(0.0, false, 832.0, 832.0, &mut rng).is_none());
        assert!(manager.maybe_spawn(0.0, true, 832.0, 832.0, &mut rng).is_some());
    }
}
