//! Enemy admission policy and the victory latch

use rand::Rng;
use tracing::debug;

use super::geometry::Bounds;
use super::layout::Layout;
use super::tank::{EnemyStats, EnemyType, Tank, TankId};

/// Weighted roll for enemies before the Heavy tail
pub const SPAWN_WEIGHTS: [(EnemyType, u32); 4] = [
    (EnemyType::Regular, 40),
    (EnemyType::Fast, 25),
    (EnemyType::Armored, 20),
    (EnemyType::Power, 15),
];
/// Enemies right before the Boss that are always Heavy
pub const HEAVY_TAIL: u32 = 10;

#[derive(Debug, Clone)]
pub struct EnemySpawner {
    total: u32,
    spawned: u32,
    max_on_screen: usize,
    spawn_delay: u32,
    timer: u32,
    /// Entry area tried first on the next admission
    next_area: usize,
    victory_delay: u32,
    victory_timer: Option<u32>,
}

impl EnemySpawner {
    pub fn new(total: u32, max_on_screen: usize, spawn_delay: u32, victory_delay: u32) -> Self {
        Self {
            total,
            spawned: 0,
            max_on_screen: max_on_screen.max(1),
            spawn_delay,
            timer: 0,
            next_area: 0,
            victory_delay,
            victory_timer: None,
        }
    }

    pub fn spawned(&self) -> u32 {
        self.spawned
    }

    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.spawned)
    }

    pub fn all_spawned(&self) -> bool {
        self.spawned >= self.total
    }

    /// Type of the next enemy, driven by how many are left to admit
    pub fn next_type<R: Rng + ?Sized>(&self, rng: &mut R) -> EnemyType {
        match self.remaining() {
            1 => EnemyType::Boss,
            n if n <= HEAVY_TAIL + 1 => EnemyType::Heavy,
            _ => {
                let total: u32 = SPAWN_WEIGHTS.iter().map(|&(_, w)| w).sum();
                let mut roll = rng.gen_range(0..total);
                for &(enemy_type, weight) in &SPAWN_WEIGHTS {
                    if roll < weight {
                        return enemy_type;
                    }
                    roll -= weight;
                }
                EnemyType::Regular
            }
        }
    }

    /// Count down and, when due, build the next enemy at the first free
    /// entry area. A blocked admission is retried on the next tick.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        live_enemies: usize,
        occupied: &[Bounds],
        layout: &Layout,
        level: u32,
        id: TankId,
        rng: &mut R,
    ) -> Option<Tank> {
        self.timer = self.timer.saturating_sub(1);
        if self.timer > 0 || self.all_spawned() || live_enemies >= self.max_on_screen {
            return None;
        }

        let enemy_type = self.next_type(rng);
        let size = EnemyStats::for_type(enemy_type, level).size;
        let areas = layout.enemy_spawn_cells();
        let (x, y, area) = (0..areas.len())
            .map(|offset| (self.next_area + offset) % areas.len())
            .find_map(|area| {
                let (row, col) = areas[area];
                let (x, y) = Layout::area_origin(row, col, size);
                let candidate = Bounds::square(x, y, size);
                (!occupied.iter().any(|b| b.intersects(&candidate))).then_some((x, y, area))
            })?;

        self.next_area = (area + 1) % areas.len();
        self.spawned += 1;
        self.timer = self.spawn_delay;
        debug!(?enemy_type, spawned = self.spawned, total = self.total, "Enemy admitted");
        Some(Tank::enemy(id, enemy_type, x, y, level))
    }

    /// Victory holds once every enemy has been admitted and destroyed. It
    /// is latched for the victory delay; returns true on the tick it is final.
    pub fn update_victory(&mut self, live_enemies: usize) -> bool {
        match self.victory_timer {
            None if self.all_spawned() && live_enemies == 0 => {
                debug!("Victory latched");
                self.victory_timer = Some(self.victory_delay);
                self.victory_delay == 0
            }
            None => false,
            Some(0) => true,
            Some(remaining) => {
                self.victory_timer = Some(remaining - 1);
                remaining == 1
            }
        }
    }

    pub fn victory_latched(&self) -> bool {
        self.victory_timer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn spawner(total: u32) -> EnemySpawner {
        EnemySpawner::new(total, 4, 10, 5)
    }

    #[test]
    fn test_type_schedule() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let layout = Layout::new(26, 26);
        let mut s = EnemySpawner::new(20, 100, 0, 0);
        let mut types = Vec::new();
        for i in 0..20 {
            let tank = s.tick(0, &[], &layout, 1, TankId(i), &mut rng).unwrap();
            types.push(tank.enemy_type().unwrap());
        }
        assert_eq!(types[19], EnemyType::Boss);
        assert!(types[9..19].iter().all(|&t| t == EnemyType::Heavy));
        assert!(types[..9]
            .iter()
            .all(|&t| t != EnemyType::Heavy && t != EnemyType::Boss));
        assert!(s.all_spawned());
    }

    #[test]
    fn test_delay_and_screen_cap() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let layout = Layout::new(26, 26);
        let mut s = spawner(20);
        assert!(s.tick(0, &[], &layout, 1, TankId(1), &mut rng).is_some());
        for _ in 0..9 {
            assert!(s.tick(1, &[], &layout, 1, TankId(2), &mut rng).is_none());
        }
        // Due, but the screen is full
        assert!(s.tick(4, &[], &layout, 1, TankId(2), &mut rng).is_none());
        assert!(s.tick(3, &[], &layout, 1, TankId(2), &mut rng).is_some());
    }

    #[test]
    fn test_blocked_areas_retry() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let layout = Layout::new(26, 26);
        let mut s = spawner(5);
        let occupied: Vec<Bounds> = layout
            .enemy_spawn_cells()
            .iter()
            .map(|&(row, col)| {
                let (x, y) = Layout::area_origin(row, col, 60.0);
                Bounds::square(x, y, 60.0)
            })
            .collect();
        assert!(s.tick(0, &occupied, &layout, 1, TankId(1), &mut rng).is_none());
        assert_eq!(s.spawned(), 0);
        assert!(s.tick(0, &occupied[1..], &layout, 1, TankId(1), &mut rng).is_some());
    }

    #[test]
    fn test_areas_rotate() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let layout = Layout::new(26, 26);
        let mut s = EnemySpawner::new(5, 10, 0, 0);
        let a = s.tick(0, &[], &layout, 1, TankId(1), &mut rng).unwrap();
        let b = s.tick(0, &[], &layout, 1, TankId(2), &mut rng).unwrap();
        assert_ne!(a.x, b.x);
    }

    #[test]
    fn test_boss_health_follows_level() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let layout = Layout::new(26, 26);
        let mut s = EnemySpawner::new(1, 4, 0, 0);
        let boss = s.tick(0, &[], &layout, 3, TankId(1), &mut rng).unwrap();
        assert!(boss.is_boss());
        assert_eq!(boss.health, 20);
    }

    #[test]
    fn test_victory_latch_waits() {
        let mut s = EnemySpawner::new(0, 4, 0, 3);
        assert!(!s.update_victory(0));
        assert!(s.victory_latched());
        assert!(!s.update_victory(0));
        assert!(!s.update_victory(0));
        assert!(s.update_victory(0));
    }

    #[test]
    fn test_no_victory_while_enemies_live() {
        let mut s = EnemySpawner::new(0, 4, 0, 3);
        assert!(!s.update_victory(2));
        assert!(!s.victory_latched());
    }
}
