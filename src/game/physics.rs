//! Tank movement: terrain and tank collision, edge wraparound, alignment
//! slides and ice

use super::geometry::{BoundedEntity, Bounds, Direction};
use super::map::TileMap;
use super::tank::{IceSlide, Tank, TankId, BASE_SPEED};
use super::tile::{Tile, TILE_SIZE};

/// Another tank as seen by the mover
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub id: TankId,
    pub bounds: Bounds,
    pub is_boss: bool,
}

/// World state a move is resolved against
pub struct MoveContext<'a> {
    pub map: &'a mut TileMap,
    pub obstacles: &'a [Obstacle],
    /// Base bounds while the base stands
    pub base: Option<Bounds>,
    /// Difficulty multiplier for this tank's side
    pub speed_scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// Blocked ahead, nudged sideways toward grid alignment instead
    Aligned,
    BlockedByTank(TankId),
    BlockedByBase,
    BlockedByTerrain,
    BlockedByEdge,
}

impl MoveOutcome {
    pub fn moved(self) -> bool {
        matches!(self, MoveOutcome::Moved | MoveOutcome::Aligned)
    }
}

/// Everything a single move did to the world
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub outcome: MoveOutcome,
    /// Tanks crushed by a Boss on this move
    pub crushed: Vec<TankId>,
    /// A Boss rolled over the base
    pub base_crushed: bool,
    /// Tiles a Boss flattened, with what they held before
    pub tiles_crushed: Vec<(usize, usize, Tile)>,
}

impl MoveReport {
    fn new(outcome: MoveOutcome) -> Self {
        Self {
            outcome,
            crushed: Vec::new(),
            base_crushed: false,
            tiles_crushed: Vec::new(),
        }
    }

    pub fn moved(&self) -> bool {
        self.outcome.moved()
    }
}

/// Physics system for tank movement
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Pixels per tick for a tank
    pub fn speed(tank: &Tank, speed_scale: f32, on_ice: bool) -> f32 {
        let ice = if on_ice { 2.0 } else { 1.0 };
        BASE_SPEED * (tank.speed_multiplier + tank.temp_speed_boost) * speed_scale * ice
    }

    /// Turn to `direction` and try to advance one tick's worth
    pub fn move_tank(tank: &mut Tank, direction: Direction, ctx: &mut MoveContext<'_>) -> MoveReport {
        tank.direction = direction;
        let on_ice = ctx.map.is_on_ice(&tank.bounds());
        let speed = Self::speed(tank, ctx.speed_scale, on_ice);
        Self::step(tank, direction, speed, ctx, true)
    }

    /// Start an ice slide if the tank just stopped on ice
    pub fn arm_slide(tank: &mut Tank, map: &TileMap) {
        if tank.moved_last_tick && tank.slide.is_none() && map.is_on_ice(&tank.bounds()) {
            tank.slide = Some(IceSlide {
                direction: tank.direction,
                remaining: TILE_SIZE,
            });
        }
        tank.moved_last_tick = false;
    }

    /// Advance an active ice slide; any collision cancels it
    pub fn continue_slide(tank: &mut Tank, ctx: &mut MoveContext<'_>) -> Option<MoveReport> {
        let slide = tank.slide?;
        let speed = Self::speed(tank, ctx.speed_scale, true).min(slide.remaining);
        let report = Self::step(tank, slide.direction, speed, ctx, false);

        if report.outcome == MoveOutcome::Moved {
            let remaining = slide.remaining - speed;
            tank.slide = (remaining > 0.0).then_some(IceSlide {
                direction: slide.direction,
                remaining,
            });
        } else {
            tank.slide = None;
        }
        Some(report)
    }

    fn step(
        tank: &mut Tank,
        direction: Direction,
        speed: f32,
        ctx: &mut MoveContext<'_>,
        allow_align: bool,
    ) -> MoveReport {
        let (dx, dy) = direction.delta();
        let Some((x, y)) = Self::wrap_or_clamp(tank, tank.x + dx * speed, tank.y + dy * speed, ctx.map)
        else {
            return MoveReport::new(MoveOutcome::BlockedByEdge);
        };

        let current = tank.bounds();
        let candidate = Bounds::square(x, y, tank.size);

        if tank.is_boss() {
            return Self::boss_step(tank, candidate, ctx);
        }

        if let Some(other) = ctx
            .obstacles
            .iter()
            .find(|o| o.id != tank.id && o.bounds.intersects(&candidate) && !o.bounds.intersects(&current))
        {
            return MoveReport::new(MoveOutcome::BlockedByTank(other.id));
        }

        if ctx.base.is_some_and(|base| base.intersects(&candidate)) {
            return MoveReport::new(MoveOutcome::BlockedByBase);
        }

        if ctx.map.collides_bounds(&candidate, tank.can_swim) {
            if allow_align {
                if let Some(report) = Self::align(tank, direction, speed, ctx) {
                    return report;
                }
            }
            return MoveReport::new(MoveOutcome::BlockedByTerrain);
        }

        tank.set_position(x, y);
        MoveReport::new(MoveOutcome::Moved)
    }

    /// Apply edge wraparound. A tank leaving the map reappears flush with the
    /// opposite edge only when the opposite boundary tile on its row/column is
    /// empty; otherwise it stops at the edge. `None` means it cannot move.
    fn wrap_or_clamp(tank: &Tank, x: f32, y: f32, map: &TileMap) -> Option<(f32, f32)> {
        let max_x = map.pixel_width() - tank.size;
        let max_y = map.pixel_height() - tank.size;
        let (cx, cy) = tank.bounds().center();
        let row = (cy / TILE_SIZE).floor() as isize;
        let col = (cx / TILE_SIZE).floor() as isize;
        let last_col = map.width() as isize - 1;
        let last_row = map.height() as isize - 1;

        let (mut nx, mut ny) = (x, y);
        if x < 0.0 {
            nx = if map.get(row, last_col) == Tile::Empty { max_x } else { 0.0 };
        } else if x > max_x {
            nx = if map.get(row, 0) == Tile::Empty { 0.0 } else { max_x };
        }
        if y < 0.0 {
            ny = if map.get(last_row, col) == Tile::Empty { max_y } else { 0.0 };
        } else if y > max_y {
            ny = if map.get(0, col) == Tile::Empty { 0.0 } else { max_y };
        }

        if (nx - tank.x).abs() < f32::EPSILON && (ny - tank.y).abs() < f32::EPSILON {
            None
        } else {
            Some((nx, ny))
        }
    }

    /// Bosses crush everything but steel: tanks die, the base falls and
    /// brick/trees in the footprint are flattened
    fn boss_step(tank: &mut Tank, candidate: Bounds, ctx: &mut MoveContext<'_>) -> MoveReport {
        if let Some(other) = ctx
            .obstacles
            .iter()
            .find(|o| o.id != tank.id && o.is_boss && o.bounds.intersects(&candidate))
        {
            return MoveReport::new(MoveOutcome::BlockedByTank(other.id));
        }

        let (row0, col0, row1, col1) = ctx.map.cells_overlapping(&candidate);
        let cells: Vec<(isize, isize)> = (row0..=row1)
            .flat_map(|row| (col0..=col1).map(move |col| (row, col)))
            .collect();
        if cells
            .iter()
            .any(|&(row, col)| ctx.map.get(row, col).is_indestructible())
        {
            return MoveReport::new(MoveOutcome::BlockedByTerrain);
        }
        if !tank.can_swim && ctx.map.any_tile_in(&candidate, Tile::Water) {
            return MoveReport::new(MoveOutcome::BlockedByTerrain);
        }

        let mut report = MoveReport::new(MoveOutcome::Moved);
        for (row, col) in cells {
            let tile = ctx.map.get(row, col);
            if matches!(tile, Tile::Brick | Tile::Trees) && ctx.map.set(row as usize, col as usize, Tile::Empty) {
                report.tiles_crushed.push((row as usize, col as usize, tile));
            }
        }
        report.crushed = ctx
            .obstacles
            .iter()
            .filter(|o| o.id != tank.id && !o.is_boss && o.bounds.intersects(&candidate))
            .map(|o| o.id)
            .collect();
        report.base_crushed = ctx.base.is_some_and(|base| base.intersects(&candidate));

        tank.set_position(candidate.x, candidate.y);
        report
    }

    /// Nudge a tank blocked by terrain toward the nearest half-tile alignment
    /// on the perpendicular axis so it does not lodge between two corners
    fn align(tank: &mut Tank, direction: Direction, speed: f32, ctx: &mut MoveContext<'_>) -> Option<MoveReport> {
        let half = TILE_SIZE / 2.0;
        let margin = (TILE_SIZE - tank.size).rem_euclid(half) / 2.0;
        let current = if direction.is_vertical() { tank.x } else { tank.y };
        let aligned = ((current - margin) / half).round() * half + margin;
        let diff = aligned - current;
        if diff.abs() < 0.01 {
            return None;
        }

        let shift = diff.signum() * diff.abs().min(speed);
        let (x, y) = if direction.is_vertical() {
            (tank.x + shift, tank.y)
        } else {
            (tank.x, tank.y + shift)
        };
        let current_bounds = tank.bounds();
        let candidate = Bounds::square(x, y, tank.size);

        let blocked_by_tank = ctx.obstacles.iter().any(|o| {
            o.id != tank.id && o.bounds.intersects(&candidate) && !o.bounds.intersects(&current_bounds)
        });
        let blocked_by_base = ctx.base.is_some_and(|base| base.intersects(&candidate));
        if blocked_by_tank || blocked_by_base || ctx.map.collides_bounds(&candidate, tank.can_swim) {
            return None;
        }

        tank.set_position(x, y);
        Some(MoveReport::new(MoveOutcome::Aligned))
    }
}
