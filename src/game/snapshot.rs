//! Snapshot building: full and delta terrain sync

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::combat::{Bullet, Laser};
use super::effects::BaseProtection;
use super::geometry::Direction;
use super::map::{TileChange, TileGrid};
use super::powerup::{EasterEgg, PowerUp};
use super::tank::{Tank, TankId, TankKind};
use super::ufo::Ufo;
use super::world::{GamePhase, GameWorld, PlayerStats};

/// Public fields of a tank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankSnapshot {
    pub id: TankId,
    #[serde(flatten)]
    pub kind: TankKind,
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
    pub size: f32,
    pub health: u32,
    pub max_health: u32,
    pub lives: u32,
    pub alive: bool,
    pub respawning: bool,
    pub shield: bool,
    pub bullet_power: u8,
    pub speed_multiplier: f32,
    pub can_swim: bool,
    pub can_destroy_trees: bool,
    pub machinegun_count: u8,
    pub laser_active: bool,
}

impl From<&Tank> for TankSnapshot {
    fn from(tank: &Tank) -> Self {
        Self {
            id: tank.id,
            kind: tank.kind,
            x: tank.x,
            y: tank.y,
            direction: tank.direction,
            size: tank.size,
            health: tank.health,
            max_health: tank.max_health,
            lives: tank.lives,
            alive: tank.alive,
            respawning: tank.respawn_timer.is_some(),
            shield: tank.has_shield(),
            bullet_power: tank.bullet_power,
            speed_multiplier: tank.speed_multiplier + tank.temp_speed_boost,
            can_swim: tank.can_swim,
            can_destroy_trees: tank.can_destroy_trees,
            machinegun_count: tank.machinegun_count,
            laser_active: tank.laser_duration > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub number: u8,
    pub nickname: String,
    pub tank: TankId,
    pub connected: bool,
    pub paused: bool,
    pub stats: PlayerStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectsSnapshot {
    pub base_protection: BaseProtection,
    pub enemy_freeze_ticks: u32,
    pub player_freeze_ticks: u32,
    pub speed_boost_ticks: u32,
}

/// Terrain payload: the whole grid, or only the cells changed since the
/// last committed snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "data", rename_all = "snake_case")]
pub enum TerrainSync {
    Full(TileGrid),
    Delta(Vec<TileChange>),
}

impl TerrainSync {
    pub fn is_full(&self) -> bool {
        matches!(self, TerrainSync::Full(_))
    }
}

/// Value copy of everything a client needs to draw one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub level: u32,
    pub phase: GamePhase,
    pub base_alive: bool,
    pub enemies_remaining: u32,
    /// Every enemy is down and the level is about to complete
    pub victory_pending: bool,
    pub tanks: Vec<TankSnapshot>,
    pub players: Vec<PlayerSnapshot>,
    pub bullets: Vec<Bullet>,
    pub lasers: Vec<Laser>,
    pub power_ups: Vec<PowerUp>,
    pub easter_eggs: Vec<EasterEgg>,
    pub ufo: Option<Ufo>,
    pub effects: EffectsSnapshot,
    pub terrain: TerrainSync,
}

impl WorldSnapshot {
    pub fn capture(world: &GameWorld, terrain: TerrainSync) -> Self {
        let effects = world.effects();
        let remaining = world.spawner().remaining() + world.live_enemies() as u32;
        Self {
            level: world.level(),
            phase: world.phase(),
            base_alive: world.base_alive(),
            enemies_remaining: remaining,
            victory_pending: world.spawner().victory_latched(),
            tanks: world.tanks().iter().map(TankSnapshot::from).collect(),
            players: world
                .players()
                .iter()
                .map(|p| PlayerSnapshot {
                    number: p.number,
                    nickname: p.nickname.clone(),
                    tank: p.tank,
                    connected: p.connected,
                    paused: p.paused,
                    stats: p.stats.clone(),
                })
                .collect(),
            bullets: world.bullets().to_vec(),
            lasers: world.lasers().to_vec(),
            power_ups: world.power_ups().to_vec(),
            easter_eggs: world.easter_eggs().to_vec(),
            ufo: world.ufo().cloned(),
            effects: EffectsSnapshot {
                base_protection: effects.base_protection(),
                enemy_freeze_ticks: effects.enemy_freeze_ticks(),
                player_freeze_ticks: effects.player_freeze_ticks(),
                speed_boost_ticks: effects.speed_boost_ticks(),
            },
            terrain,
        }
    }
}

/// Builds snapshots for network transmission
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
    /// Next snapshot carries the whole grid
    full_requested: bool,
    full_sent: u64,
    delta_sent: u64,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            full_requested: false,
            full_sent: 0,
            delta_sent: 0,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Send the whole grid with the next snapshot (a late subscriber has
    /// no baseline to apply deltas to)
    pub fn request_full(&mut self) {
        self.full_requested = true;
        self.force_next();
    }

    /// Capture the world and commit its terrain as the new sync baseline.
    /// Terrain goes out in full after a level change or once the delta
    /// grows past the refresh threshold.
    pub fn build(&mut self, world: &mut GameWorld) -> WorldSnapshot {
        let level_changed = world.take_level_changed();
        let requested = std::mem::take(&mut self.full_requested);
        let terrain = if level_changed || requested || world.map().needs_full_sync() {
            self.full_sent += 1;
            debug!(level_changed, tick = world.tick_count(), "Full terrain sync");
            TerrainSync::Full(world.map().export_full())
        } else {
            self.delta_sent += 1;
            TerrainSync::Delta(world.map().export_delta())
        };

        let state = WorldSnapshot::capture(world, terrain);
        world.commit_sync();
        state
    }

    pub fn full_sent(&self) -> u64 {
        self.full_sent
    }

    pub fn delta_sent(&self) -> u64 {
        self.delta_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::tile::Tile;

    fn first_non_steel(world: &GameWorld) -> (usize, usize) {
        world
            .map()
            .cells()
            .find(|&(row, col, tile)| {
                !world.layout().is_border(row, col) && tile != Tile::Steel && tile != Tile::Water
            })
            .map(|(row, col, _)| (row, col))
            .unwrap()
    }

    #[test]
    fn test_should_send_interval() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(!builder.should_send());
        assert!(!builder.should_send());
        assert!(builder.should_send());
        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn test_first_snapshot_is_full_then_delta() {
        let mut world = GameWorld::new(GameConfig::default());
        let mut builder = SnapshotBuilder::new(1);

        let first = builder.build(&mut world);
        assert!(first.terrain.is_full());

        let second = builder.build(&mut world);
        assert_eq!(second.terrain, TerrainSync::Delta(Vec::new()));

        let (row, col) = first_non_steel(&world);
        world.map_mut().set(row, col, Tile::Steel);
        let third = builder.build(&mut world);
        assert_eq!(
            &third.terrain,
            &TerrainSync::Delta(vec![TileChange {
                row,
                col,
                tile: Tile::Steel.ordinal(),
            }])
        );
        assert_eq!(builder.full_sent(), 1);
        assert_eq!(builder.delta_sent(), 2);
    }

    #[test]
    fn test_large_change_forces_full() {
        let mut world = GameWorld::new(GameConfig::default());
        let mut builder = SnapshotBuilder::new(1);
        builder.build(&mut world);

        let (w, h) = (world.map().width(), world.map().height());
        let target = w * h / 10 + 1;
        let mut changed = 0;
        'outer: for row in 1..h - 1 {
            for col in 1..w - 1 {
                let next = if world.map().get(row as isize, col as isize) == Tile::Ice {
                    Tile::Empty
                } else {
                    Tile::Ice
                };
                world.map_mut().set(row, col, next);
                changed += 1;
                if changed == target {
                    break 'outer;
                }
            }
        }
        assert!(world.map().needs_full_sync());
        let snapshot = builder.build(&mut world);
        assert!(snapshot.terrain.is_full());
        assert!(!world.map().needs_full_sync());
    }

    #[test]
    fn test_requested_full_sync() {
        let mut world = GameWorld::new(GameConfig::default());
        let mut builder = SnapshotBuilder::new(5);
        builder.build(&mut world);
        builder.request_full();
        assert!(builder.should_send());
        assert!(builder.build(&mut world).terrain.is_full());
        assert!(!builder.build(&mut world).terrain.is_full());
    }

    #[test]
    fn test_victory_pending_once_field_is_clear() {
        let mut config = GameConfig::default();
        config.profile.total_enemies = 0;
        config.profile.ufo_spawn_chance = 0.0;
        config.victory_delay = 1_000;
        let mut world = GameWorld::new(config);
        let before = WorldSnapshot::capture(&world, TerrainSync::Delta(Vec::new()));
        assert!(!before.victory_pending);

        world.tick();
        let after = WorldSnapshot::capture(&world, TerrainSync::Delta(Vec::new()));
        assert!(after.victory_pending);
        assert_eq!(after.phase, GamePhase::Playing);
        assert_eq!(after.enemies_remaining, 0);
    }

    #[test]
    fn test_snapshot_is_a_value() {
        let mut world = GameWorld::new(GameConfig::default());
        let before = WorldSnapshot::capture(&world, TerrainSync::Delta(Vec::new()));
        for _ in 0..30 {
            world.tick();
        }
        let x = before.tanks[0].x;
        let after = WorldSnapshot::capture(&world, TerrainSync::Delta(Vec::new()));
        assert_eq!(before.tanks[0].x, x);
        assert_eq!(after.players.len(), before.players.len());
        assert_eq!(before.level, 1);
    }
}
