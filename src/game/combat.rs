//! Combat system - bullets, lasers, hit detection and damage resolution

use serde::{Deserialize, Serialize};

use super::geometry::{BoundedEntity, Bounds, Direction};
use super::map::{TerrainHit, TileMap};
use super::spatial::SpatialGrid;
use super::tank::{DamageResult, Tank, TankId};
use super::tile::TILE_SIZE;
use super::ufo::Ufo;

pub const BULLET_SIZE: f32 = 8.0;
/// Pixels per tick
pub const BULLET_SPEED: f32 = 6.0;
pub const LASER_WIDTH: f32 = 8.0;
/// Ticks a laser beam stays live
pub const LASER_LIFETIME: u32 = 20;
/// Damage points a laser deals to each target it crosses
pub const LASER_DAMAGE: u32 = 3;

/// Monotonic id source for projectiles and pickups, reset at level start
#[derive(Debug, Clone, Default)]
pub struct IdCounter {
    next: u32,
}

impl IdCounter {
    pub fn next_id(&mut self) -> u32 {
        self.next = self.next.wrapping_add(1);
        self.next
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub id: u32,
    /// Firing tank; `None` for UFO shots
    pub owner: Option<TankId>,
    /// Owning player's number, 0 for the enemy side
    pub owner_player: u8,
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
    pub power: u8,
    pub ignites_trees: bool,
}

impl Bullet {
    pub fn from_tank(id: u32, tank: &Tank) -> Self {
        let (x, y) = tank.muzzle(BULLET_SIZE);
        Self {
            id,
            owner: Some(tank.id),
            owner_player: tank.player_number(),
            x,
            y,
            direction: tank.direction,
            power: tank.bullet_power,
            ignites_trees: tank.can_destroy_trees,
        }
    }

    /// Enemy-side bullet fired straight down from a UFO
    pub fn from_ufo(id: u32, ufo: &Ufo) -> Self {
        let (cx, _) = ufo.bounds().center();
        Self {
            id,
            owner: None,
            owner_player: 0,
            x: cx - BULLET_SIZE / 2.0,
            y: ufo.bounds().bottom(),
            direction: Direction::Down,
            power: 1,
            ignites_trees: false,
        }
    }

    pub fn is_player_bullet(&self) -> bool {
        self.owner_player > 0
    }

    pub fn advance(&mut self) {
        let (dx, dy) = self.direction.delta();
        self.x += dx * BULLET_SPEED;
        self.y += dy * BULLET_SPEED;
    }
}

impl BoundedEntity for Bullet {
    fn bounds(&self) -> Bounds {
        Bounds::square(self.x, self.y, BULLET_SIZE)
    }
}

/// A beam from the muzzle to the map edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Laser {
    pub id: u32,
    pub owner: TankId,
    pub owner_player: u8,
    /// Beam start on the tank's facing edge
    pub origin_x: f32,
    pub origin_y: f32,
    pub direction: Direction,
    pub length: f32,
    pub remaining: u32,
    /// Targets already damaged by this beam
    #[serde(skip)]
    hit: Vec<LaserTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaserTarget {
    Tank(TankId),
    Ufo,
    Base,
}

impl Laser {
    pub fn from_tank(id: u32, tank: &Tank, map: &TileMap) -> Self {
        let b = tank.bounds();
        let (cx, cy) = b.center();
        let (origin_x, origin_y, length) = match tank.direction {
            Direction::Up => (cx, b.y, b.y),
            Direction::Down => (cx, b.bottom(), map.pixel_height() - b.bottom()),
            Direction::Left => (b.x, cy, b.x),
            Direction::Right => (b.right(), cy, map.pixel_width() - b.right()),
        };
        Self {
            id,
            owner: tank.id,
            owner_player: tank.player_number(),
            origin_x,
            origin_y,
            direction: tank.direction,
            length: length.max(0.0),
            remaining: LASER_LIFETIME,
            hit: Vec::new(),
        }
    }

    pub fn is_player_laser(&self) -> bool {
        self.owner_player > 0
    }

    /// True if a Steel or Ground tile sits on the beam's centerline between
    /// the origin and `target`
    pub fn armor_between(&self, map: &TileMap, target: &Bounds) -> bool {
        let (dx, dy) = self.direction.delta();
        let distance = match self.direction {
            Direction::Up => self.origin_y - target.bottom(),
            Direction::Down => target.y - self.origin_y,
            Direction::Left => self.origin_x - target.right(),
            Direction::Right => target.x - self.origin_x,
        };
        if distance <= 0.0 {
            return false;
        }

        let step = TILE_SIZE / 4.0;
        let mut travelled = step / 2.0;
        while travelled < distance {
            let x = self.origin_x + dx * travelled;
            let y = self.origin_y + dy * travelled;
            if map.tile_at(x, y).is_indestructible() {
                return true;
            }
            travelled += step;
        }
        false
    }

    fn mark(&mut self, target: LaserTarget) -> bool {
        if self.hit.contains(&target) {
            return false;
        }
        self.hit.push(target);
        true
    }
}

impl BoundedEntity for Laser {
    fn bounds(&self) -> Bounds {
        let half = LASER_WIDTH / 2.0;
        match self.direction {
            Direction::Up => Bounds::new(self.origin_x - half, self.origin_y - self.length, LASER_WIDTH, self.length),
            Direction::Down => Bounds::new(self.origin_x - half, self.origin_y, LASER_WIDTH, self.length),
            Direction::Left => Bounds::new(self.origin_x - self.length, self.origin_y - half, self.length, LASER_WIDTH),
            Direction::Right => Bounds::new(self.origin_x, self.origin_y - half, self.length, LASER_WIDTH),
        }
    }
}

/// What fired this tick
#[derive(Debug, Clone, PartialEq)]
pub enum Shot {
    Bullet(Bullet),
    Laser(Laser),
}

/// Mutable world state a combat pass resolves against
pub struct Battlefield<'a> {
    pub map: &'a mut TileMap,
    pub tanks: &'a mut [Tank],
    pub ufo: Option<&'a mut Ufo>,
    /// Base bounds while the base stands
    pub base: Option<Bounds>,
}

/// A tank struck by a projectile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankHit {
    pub victim: TankId,
    pub attacker: Option<TankId>,
    pub result: DamageResult,
    pub x: f32,
    pub y: f32,
}

impl TankHit {
    pub fn killed(&self) -> bool {
        self.result == DamageResult::Killed
    }
}

/// Everything a combat pass did to the world
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombatReport {
    pub hits: Vec<TankHit>,
    /// A projectile damaged the UFO
    pub ufo_hit: bool,
    /// Player tank credited with destroying the UFO
    pub ufo_destroyed_by: Option<TankId>,
    pub base_destroyed: bool,
    /// Ids of mutually annihilated bullet pairs
    pub collisions: Vec<(u32, u32)>,
    pub terrain: TerrainHit,
    /// Some bullet bounced off armor it could not break
    pub armor_hit: bool,
}

impl CombatReport {
    pub fn merge(&mut self, other: CombatReport) {
        self.hits.extend(other.hits);
        self.ufo_hit |= other.ufo_hit;
        self.ufo_destroyed_by = self.ufo_destroyed_by.or(other.ufo_destroyed_by);
        self.base_destroyed |= other.base_destroyed;
        self.collisions.extend(other.collisions);
        self.terrain.blocked |= other.terrain.blocked;
        self.terrain.destroyed.extend(other.terrain.destroyed);
        self.terrain.ignited.extend(other.terrain.ignited);
        self.armor_hit |= other.armor_hit;
    }
}

/// Combat system for firing and projectile resolution
pub struct CombatSystem;

impl CombatSystem {
    /// Fire if the tank is able. Puts the tank on cooldown and counts the
    /// bullet against its in-flight limit.
    pub fn fire(tank: &mut Tank, ids: &mut IdCounter, map: &TileMap) -> Option<Shot> {
        if !tank.can_fire() {
            return None;
        }
        tank.shoot_cooldown = tank.fire_cooldown();
        if tank.laser_duration > 0 {
            return Some(Shot::Laser(Laser::from_tank(ids.next_id(), tank, map)));
        }
        tank.active_bullets += 1;
        Some(Shot::Bullet(Bullet::from_tank(ids.next_id(), tank)))
    }

    /// Advance every bullet one tick and resolve it against terrain, map
    /// bounds, the UFO, the opposing side and the base, then annihilate
    /// overlapping bullet pairs. Removed bullets release their owner's slot.
    pub fn update_bullets(bullets: &mut Vec<Bullet>, field: &mut Battlefield<'_>) -> CombatReport {
        let mut report = CombatReport::default();

        let mut grid: SpatialGrid<usize> = SpatialGrid::default();
        for (idx, tank) in field.tanks.iter().enumerate() {
            if tank.is_active() {
                grid.insert_bounds(idx, &tank.bounds());
            }
        }

        let mut removed: Vec<usize> = Vec::new();
        for (idx, bullet) in bullets.iter_mut().enumerate() {
            bullet.advance();
            if Self::resolve_bullet(bullet, field, &grid, &mut report) {
                removed.push(idx);
            }
        }

        Self::annihilate(bullets, &mut removed, field.tanks, &mut report);

        removed.sort_unstable();
        removed.dedup();
        for idx in removed.into_iter().rev() {
            let bullet = bullets.remove(idx);
            Self::release(field.tanks, bullet.owner);
        }
        report
    }

    /// Resolve one bullet; true if it must be removed
    fn resolve_bullet(
        bullet: &Bullet,
        field: &mut Battlefield<'_>,
        grid: &SpatialGrid<usize>,
        report: &mut CombatReport,
    ) -> bool {
        let bounds = bullet.bounds();

        let terrain = field
            .map
            .resolve_bullet_hit(&bounds, bullet.power, bullet.ignites_trees);
        if terrain.blocked && terrain.destroyed.is_empty() {
            report.armor_hit = true;
        }
        let blocked = terrain.blocked;
        report.terrain.destroyed.extend(terrain.destroyed);
        report.terrain.ignited.extend(terrain.ignited);
        if blocked {
            report.terrain.blocked = true;
            return true;
        }

        if bounds.x < 0.0
            || bounds.y < 0.0
            || bounds.right() > field.map.pixel_width()
            || bounds.bottom() > field.map.pixel_height()
        {
            return true;
        }

        if bullet.is_player_bullet() {
            if let Some(ufo) = field.ufo.as_deref_mut() {
                if ufo.is_alive() && ufo.bounds().intersects(&bounds) {
                    report.ufo_hit = true;
                    if ufo.damage() {
                        report.ufo_destroyed_by = bullet.owner;
                    }
                    return true;
                }
            }
        }

        let (cx, cy) = bounds.center();
        for idx in grid.query_near(cx, cy) {
            let tank = &mut field.tanks[idx];
            if !tank.is_active()
                || tank.is_player() == bullet.is_player_bullet()
                || !tank.bounds().intersects(&bounds)
            {
                continue;
            }
            let result = tank.damage();
            report.hits.push(TankHit {
                victim: tank.id,
                attacker: bullet.owner,
                result,
                x: tank.x,
                y: tank.y,
            });
            return true;
        }

        if field.base.is_some_and(|base| base.intersects(&bounds)) {
            report.base_destroyed = true;
            field.base = None;
            return true;
        }

        false
    }

    /// Overlapping bullets from different owners destroy each other. Owners
    /// get their reload back immediately.
    fn annihilate(bullets: &[Bullet], removed: &mut Vec<usize>, tanks: &mut [Tank], report: &mut CombatReport) {
        let mut grid: SpatialGrid<usize> = SpatialGrid::default();
        for (idx, bullet) in bullets.iter().enumerate() {
            if !removed.contains(&idx) {
                grid.insert_bounds(idx, &bullet.bounds());
            }
        }

        for (idx, bullet) in bullets.iter().enumerate() {
            if removed.contains(&idx) {
                continue;
            }
            let (cx, cy) = bullet.bounds().center();
            let other = grid.query_near(cx, cy).into_iter().find(|&j| {
                j != idx
                    && !removed.contains(&j)
                    && !(bullet.owner.is_some() && bullet.owner == bullets[j].owner)
                    && bullets[j].bounds().intersects(&bullet.bounds())
            });
            if let Some(j) = other {
                removed.push(idx);
                removed.push(j);
                report.collisions.push((bullet.id, bullets[j].id));
                for owner in [bullet.owner, bullets[j].owner].into_iter().flatten() {
                    if let Some(tank) = tanks.iter_mut().find(|t| t.id == owner) {
                        tank.shoot_cooldown = 0;
                    }
                }
            }
        }
    }

    fn release(tanks: &mut [Tank], owner: Option<TankId>) {
        if let Some(tank) = owner.and_then(|id| tanks.iter_mut().find(|t| t.id == id)) {
            tank.release_bullet();
        }
    }

    /// Re-test every live beam against tanks, the UFO and the base, then age
    /// it. Each target is damaged at most once per beam.
    pub fn update_lasers(lasers: &mut Vec<Laser>, field: &mut Battlefield<'_>) -> CombatReport {
        let mut report = CombatReport::default();

        for laser in lasers.iter_mut() {
            let beam = laser.bounds();

            for tank in field.tanks.iter_mut() {
                if !tank.is_active()
                    || tank.id == laser.owner
                    || tank.is_player() == laser.is_player_laser()
                    || !tank.bounds().intersects(&beam)
                    || !laser.mark(LaserTarget::Tank(tank.id))
                {
                    continue;
                }
                let result = Self::laser_damage(tank);
                report.hits.push(TankHit {
                    victim: tank.id,
                    attacker: Some(laser.owner),
                    result,
                    x: tank.x,
                    y: tank.y,
                });
            }

            if laser.is_player_laser() {
                if let Some(ufo) = field.ufo.as_deref_mut() {
                    if ufo.is_alive() && ufo.bounds().intersects(&beam) && laser.mark(LaserTarget::Ufo) {
                        report.ufo_hit = true;
                        let destroyed = (0..LASER_DAMAGE).any(|_| ufo.damage());
                        if destroyed {
                            report.ufo_destroyed_by = Some(laser.owner);
                        }
                    }
                }
            }

            if let Some(base) = field.base {
                if base.intersects(&beam)
                    && !laser.armor_between(&*field.map, &base)
                    && laser.mark(LaserTarget::Base)
                {
                    report.base_destroyed = true;
                    field.base = None;
                }
            }

            laser.remaining = laser.remaining.saturating_sub(1);
        }

        lasers.retain(|l| l.remaining > 0);
        report
    }

    /// Three single points of damage, stopping once the tank dies
    fn laser_damage(tank: &mut Tank) -> DamageResult {
        let mut last = DamageResult::Ignored;
        for _ in 0..LASER_DAMAGE {
            last = tank.damage();
            if last == DamageResult::Killed {
                break;
            }
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tank::EnemyType;
    use crate::game::tile::Tile;

    fn player(x: f32, y: f32) -> Tank {
        let mut tank = Tank::player(TankId(1), 1, x, y, 3, 3);
        tank.shield_ticks = 0;
        tank
    }

    fn field<'a>(map: &'a mut TileMap, tanks: &'a mut [Tank]) -> Battlefield<'a> {
        Battlefield {
            map,
            tanks,
            ufo: None,
            base: None,
        }
    }

    #[test]
    fn test_ids_are_monotonic_and_reset() {
        let mut ids = IdCounter::default();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        ids.reset();
        assert_eq!(ids.next_id(), 1);
    }

    #[test]
    fn test_fire_respects_bullet_limit() {
        let map = TileMap::new(10, 10);
        let mut ids = IdCounter::default();
        let mut tank = player(100.0, 100.0);
        assert!(matches!(CombatSystem::fire(&mut tank, &mut ids, &map), Some(Shot::Bullet(_))));
        assert_eq!(tank.active_bullets, 1);
        tank.shoot_cooldown = 0;
        assert!(CombatSystem::fire(&mut tank, &mut ids, &map).is_none());
    }

    #[test]
    fn test_laser_when_laser_active() {
        let map = TileMap::new(10, 10);
        let mut ids = IdCounter::default();
        let mut tank = player(100.0, 100.0);
        tank.laser_duration = 10;
        let Some(Shot::Laser(laser)) = CombatSystem::fire(&mut tank, &mut ids, &map) else {
            panic!("expected a laser");
        };
        assert_eq!(tank.active_bullets, 0);
        assert_eq!(laser.bounds(), Bounds::new(110.0, 0.0, LASER_WIDTH, 100.0));
    }

    #[test]
    fn test_bullet_destroys_brick_and_stops() {
        let mut map = TileMap::new(10, 10);
        map.set(2, 3, Tile::Brick);
        let mut tanks = vec![player(100.0, 200.0)];
        tanks[0].active_bullets = 1;
        let mut bullets = vec![Bullet::from_tank(1, &tanks[0])];
        bullets[0].y = 64.0 + 32.0 + 2.0;

        let report = CombatSystem::update_bullets(&mut bullets, &mut field(&mut map, &mut tanks));
        assert!(bullets.is_empty());
        assert_eq!(map.get(2, 3), Tile::Empty);
        assert_eq!(report.terrain.destroyed, vec![(2, 3, Tile::Brick)]);
        assert_eq!(tanks[0].active_bullets, 0);
    }

    #[test]
    fn test_bullet_passes_unburnt_trees() {
        let mut map = TileMap::new(10, 10);
        map.set(2, 3, Tile::Trees);
        let mut tanks = vec![player(100.0, 200.0)];
        let mut bullets = vec![Bullet::from_tank(1, &tanks[0])];
        bullets[0].y = 64.0 + 20.0;

        CombatSystem::update_bullets(&mut bullets, &mut field(&mut map, &mut tanks));
        assert_eq!(bullets.len(), 1);
        assert!(!map.is_burning(2, 3));
    }

    #[test]
    fn test_player_bullet_damages_enemy_only() {
        let mut map = TileMap::new(10, 10);
        let mut tanks = vec![
            player(100.0, 200.0),
            Tank::enemy(TankId(2), EnemyType::Armored, 100.0, 100.0, 1),
        ];
        let mut bullets = vec![Bullet::from_tank(1, &tanks[0])];
        bullets[0].y = 130.0;

        let report = CombatSystem::update_bullets(&mut bullets, &mut field(&mut map, &mut tanks));
        assert!(bullets.is_empty());
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].result, DamageResult::Damaged { remaining: 2 });
        assert_eq!(report.hits[0].attacker, Some(TankId(1)));
    }

    #[test]
    fn test_shielded_target_absorbs_bullet() {
        let mut map = TileMap::new(10, 10);
        let mut tanks = vec![
            player(100.0, 200.0),
            Tank::enemy(TankId(2), EnemyType::Regular, 100.0, 100.0, 1),
        ];
        tanks[1].shield_ticks = 30;
        let mut bullets = vec![Bullet::from_tank(1, &tanks[0])];
        bullets[0].y = 130.0;

        let report = CombatSystem::update_bullets(&mut bullets, &mut field(&mut map, &mut tanks));
        assert!(bullets.is_empty());
        assert_eq!(report.hits[0].result, DamageResult::Ignored);
        assert_eq!(tanks[1].health, 1);
    }

    #[test]
    fn test_bullet_leaving_map_is_removed() {
        let mut map = TileMap::new(10, 10);
        let mut tanks = vec![player(100.0, 200.0)];
        tanks[0].active_bullets = 1;
        let mut bullets = vec![Bullet::from_tank(1, &tanks[0])];
        bullets[0].y = 2.0;
        CombatSystem::update_bullets(&mut bullets, &mut field(&mut map, &mut tanks));
        assert!(bullets.is_empty());
        assert_eq!(tanks[0].active_bullets, 0);
    }

    #[test]
    fn test_bullet_destroys_base() {
        let mut map = TileMap::new(10, 10);
        let mut tanks = vec![Tank::enemy(TankId(2), EnemyType::Regular, 100.0, 100.0, 1)];
        let mut bullets = vec![Bullet::from_tank(1, &tanks[0])];
        let mut battlefield = field(&mut map, &mut tanks);
        let (bx, by) = (bullets[0].x, bullets[0].y + BULLET_SPEED);
        battlefield.base = Some(Bounds::square(bx - 4.0, by, TILE_SIZE));

        let report = CombatSystem::update_bullets(&mut bullets, &mut battlefield);
        assert!(report.base_destroyed);
        assert!(battlefield.base.is_none());
    }

    #[test]
    fn test_laser_hits_each_target_once() {
        let mut map = TileMap::new(10, 10);
        let mut tanks = vec![
            player(100.0, 200.0),
            Tank::enemy(TankId(2), EnemyType::Heavy, 100.0, 40.0, 1),
        ];
        tanks[0].laser_duration = 100;
        let mut lasers = vec![Laser::from_tank(5, &tanks[0], &map)];

        let report = CombatSystem::update_lasers(&mut lasers, &mut field(&mut map, &mut tanks));
        assert_eq!(report.hits.len(), 1);
        assert_eq!(tanks[1].health, 1);

        let report = CombatSystem::update_lasers(&mut lasers, &mut field(&mut map, &mut tanks));
        assert!(report.hits.is_empty());
        assert_eq!(tanks[1].health, 1);
        assert_eq!(lasers[0].remaining, LASER_LIFETIME - 2);
    }

    #[test]
    fn test_laser_expires() {
        let mut map = TileMap::new(10, 10);
        let mut tanks = vec![player(100.0, 200.0)];
        let mut lasers = vec![Laser::from_tank(5, &tanks[0], &map)];
        for _ in 0..LASER_LIFETIME {
            CombatSystem::update_lasers(&mut lasers, &mut field(&mut map, &mut tanks));
        }
        assert!(lasers.is_empty());
    }

    #[test]
    fn test_same_owner_bullets_do_not_annihilate() {
        let mut map = TileMap::new(10, 10);
        let mut tanks = vec![player(100.0, 200.0)];
        let first = Bullet::from_tank(1, &tanks[0]);
        let mut second = first.clone();
        second.id = 2;
        let mut bullets = vec![first, second];
        let report = CombatSystem::update_bullets(&mut bullets, &mut field(&mut map, &mut tanks));
        assert!(report.collisions.is_empty());
        assert_eq!(bullets.len(), 2);
    }
}
