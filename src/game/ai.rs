//! Enemy decision loop: cooldown-driven heading changes, firing, and escape
//! from stuck or tank-blocked positions

use rand::Rng;

use super::geometry::{BoundedEntity, Bounds, Direction};
use super::physics::{MoveOutcome, Obstacle};
use super::tank::Tank;
use super::tile::TILE_SIZE;

/// Consecutive ticks blocked by a tank before escaping
pub const TANK_BLOCK_THRESHOLD: u32 = 30;
/// Consecutive ticks without displacement before picking a new heading
pub const STUCK_THRESHOLD: u32 = 45;
pub const STUCK_EPSILON: f32 = 0.1;
/// Inclusive range (ticks) between voluntary heading changes
pub const MOVE_CHANGE_COOLDOWN: (u32, u32) = (60, 180);
/// How far ahead a heading is probed for blocking tanks
const PROBE_DISTANCE: f32 = TILE_SIZE / 2.0;

/// Per-enemy decision state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiState {
    pub move_cooldown: u32,
    pub shoot_cooldown: u32,
    pub stuck_ticks: u32,
    pub tank_block_ticks: u32,
    last_x: f32,
    last_y: f32,
}

/// What the enemy can see this tick
pub struct AiView<'a> {
    pub obstacles: &'a [Obstacle],
    /// Base center while the base stands
    pub base_center: Option<(f32, f32)>,
    pub frozen: bool,
    /// Probability that a heading change aims for the base
    pub base_bias: f64,
    pub shoot_cooldown: (u32, u32),
}

/// This tick's intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiDecision {
    /// Heading to move in, `None` while frozen
    pub direction: Option<Direction>,
    pub fire: bool,
}

pub struct EnemyAi;

impl EnemyAi {
    /// Update decision state and pick a heading and whether to fire
    pub fn decide<R: Rng + ?Sized>(tank: &mut Tank, view: &AiView<'_>, rng: &mut R) -> AiDecision {
        let mut ai = tank.ai.take().unwrap_or_default();
        let frozen = view.frozen && !tank.is_boss();

        ai.move_cooldown = ai.move_cooldown.saturating_sub(1);
        ai.shoot_cooldown = ai.shoot_cooldown.saturating_sub(1);

        if !frozen {
            if ai.tank_block_ticks > TANK_BLOCK_THRESHOLD {
                tank.direction = Self::escape_heading(tank, view.obstacles, rng);
                ai.tank_block_ticks = 0;
                ai.stuck_ticks = 0;
                ai.move_cooldown = rng.gen_range(MOVE_CHANGE_COOLDOWN.0..=MOVE_CHANGE_COOLDOWN.1);
            } else if ai.stuck_ticks > STUCK_THRESHOLD {
                let current = tank.direction;
                let others: Vec<Direction> = Direction::ALL.into_iter().filter(|&d| d != current).collect();
                tank.direction = others[rng.gen_range(0..others.len())];
                ai.stuck_ticks = 0;
            }
        }

        let mut fire = false;
        if ai.shoot_cooldown == 0 {
            fire = true;
            let (lo, hi) = view.shoot_cooldown;
            ai.shoot_cooldown = rng.gen_range(lo.min(hi)..=hi.max(lo)).max(1);
        }

        if ai.move_cooldown == 0 && !frozen {
            tank.direction = Self::pick_heading(tank, view, rng);
            ai.move_cooldown = rng.gen_range(MOVE_CHANGE_COOLDOWN.0..=MOVE_CHANGE_COOLDOWN.1);
        }

        tank.ai = Some(ai);
        AiDecision {
            direction: (!frozen).then_some(tank.direction),
            fire,
        }
    }

    /// Record how the attempted move went
    pub fn observe_move(tank: &mut Tank, outcome: MoveOutcome) {
        let (x, y) = (tank.x, tank.y);
        let Some(ai) = tank.ai.as_mut() else {
            return;
        };

        if matches!(outcome, MoveOutcome::BlockedByTank(_)) {
            ai.tank_block_ticks += 1;
        } else {
            ai.tank_block_ticks = 0;
        }

        if (x - ai.last_x).abs() + (y - ai.last_y).abs() < STUCK_EPSILON {
            ai.stuck_ticks += 1;
        } else {
            ai.stuck_ticks = 0;
        }
        ai.last_x = x;
        ai.last_y = y;
    }

    /// New heading: biased toward the base, else uniform, avoiding headings
    /// a nearby tank blocks right away
    fn pick_heading<R: Rng + ?Sized>(tank: &Tank, view: &AiView<'_>, rng: &mut R) -> Direction {
        let preferred = match view.base_center {
            Some(base) if rng.gen_bool(view.base_bias.clamp(0.0, 1.0)) => Self::toward(tank, base),
            _ => vec![Direction::random(rng)],
        };

        preferred
            .into_iter()
            .find(|&d| !Self::blocked_by_tank(tank, d, view.obstacles))
            .or_else(|| {
                let open: Vec<Direction> = Direction::ALL
                    .into_iter()
                    .filter(|&d| !Self::blocked_by_tank(tank, d, view.obstacles))
                    .collect();
                (!open.is_empty()).then(|| open[rng.gen_range(0..open.len())])
            })
            .unwrap_or(tank.direction)
    }

    /// Headings toward a point, dominant axis first
    fn toward(tank: &Tank, (tx, ty): (f32, f32)) -> Vec<Direction> {
        let (cx, cy) = tank.bounds().center();
        let (dx, dy) = (tx - cx, ty - cy);
        let horizontal = if dx < 0.0 { Direction::Left } else { Direction::Right };
        let vertical = if dy < 0.0 { Direction::Up } else { Direction::Down };
        if dx.abs() > dy.abs() {
            vec![horizontal, vertical]
        } else {
            vec![vertical, horizontal]
        }
    }

    /// Perpendicular first (random order), then opposite
    fn escape_heading<R: Rng + ?Sized>(tank: &Tank, obstacles: &[Obstacle], rng: &mut R) -> Direction {
        let mut sides = tank.direction.perpendicular();
        if rng.gen_bool(0.5) {
            sides.swap(0, 1);
        }
        let candidates = [sides[0], sides[1], tank.direction.opposite()];
        candidates
            .into_iter()
            .find(|&d| !Self::blocked_by_tank(tank, d, obstacles))
            .unwrap_or(tank.direction.opposite())
    }

    fn blocked_by_tank(tank: &Tank, direction: Direction, obstacles: &[Obstacle]) -> bool {
        let (dx, dy) = direction.delta();
        let current = tank.bounds();
        let probe: Bounds = current.translated(dx * PROBE_DISTANCE, dy * PROBE_DISTANCE);
        obstacles
            .iter()
            .any(|o| o.id != tank.id && o.bounds.intersects(&probe) && !o.bounds.intersects(&current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tank::{EnemyType, TankId, TANK_SIZE};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn view(obstacles: &[Obstacle]) -> AiView<'_> {
        AiView {
            obstacles,
            base_center: Some((400.0, 800.0)),
            frozen: false,
            base_bias: 0.0,
            shoot_cooldown: (40, 120),
        }
    }

    fn enemy() -> Tank {
        Tank::enemy(TankId(10), EnemyType::Regular, 200.0, 200.0, 1)
    }

    #[test]
    fn test_first_decision_fires_and_picks_heading() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut tank = enemy();
        let decision = EnemyAi::decide(&mut tank, &view(&[]), &mut rng);
        assert!(decision.fire);
        assert!(decision.direction.is_some());
        let ai = tank.ai.as_ref().unwrap();
        assert!(ai.shoot_cooldown >= 40);
        assert!(ai.move_cooldown >= MOVE_CHANGE_COOLDOWN.0);
    }

    #[test]
    fn test_frozen_enemy_still_shoots_but_does_not_move() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut tank = enemy();
        let mut frozen = view(&[]);
        frozen.frozen = true;
        let decision = EnemyAi::decide(&mut tank, &frozen, &mut rng);
        assert_eq!(decision.direction, None);
        assert!(decision.fire);
    }

    #[test]
    fn test_boss_ignores_freeze() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut boss = Tank::enemy(TankId(11), EnemyType::Boss, 100.0, 100.0, 1);
        let mut frozen = view(&[]);
        frozen.frozen = true;
        assert!(EnemyAi::decide(&mut boss, &frozen, &mut rng).direction.is_some());
    }

    #[test]
    fn test_base_bias_heads_for_base() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut tank = enemy();
        let mut biased = view(&[]);
        biased.base_bias = 1.0;
        let decision = EnemyAi::decide(&mut tank, &biased, &mut rng);
        assert_eq!(decision.direction, Some(Direction::Down));
    }

    #[test]
    fn test_escape_after_being_blocked_by_tank() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut tank = enemy();
        tank.direction = Direction::Down;
        let blocker = [Obstacle {
            id: TankId(99),
            bounds: Bounds::square(200.0, 229.0, TANK_SIZE),
            is_boss: false,
        }];
        // Burn the initial cooldowns so only the escape rule changes heading
        EnemyAi::decide(&mut tank, &view(&blocker), &mut rng);
        tank.direction = Direction::Down;

        for _ in 0..=TANK_BLOCK_THRESHOLD {
            EnemyAi::observe_move(&mut tank, MoveOutcome::BlockedByTank(TankId(99)));
        }
        let decision = EnemyAi::decide(&mut tank, &view(&blocker), &mut rng);
        let heading = decision.direction.unwrap();
        assert!(heading == Direction::Left || heading == Direction::Right);
        assert_eq!(tank.ai.as_ref().unwrap().tank_block_ticks, 0);
    }

    #[test]
    fn test_stuck_detection_changes_heading() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut tank = enemy();
        EnemyAi::decide(&mut tank, &view(&[]), &mut rng);
        let before = tank.direction;
        for _ in 0..=STUCK_THRESHOLD + 1 {
            EnemyAi::observe_move(&mut tank, MoveOutcome::BlockedByTerrain);
        }
        let decision = EnemyAi::decide(&mut tank, &view(&[]), &mut rng);
        assert_ne!(decision.direction, Some(before));
    }
}
