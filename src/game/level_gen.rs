//! Randomized level layouts
//!
//! Generation is a pure function of `(width, height, seed, profile)`: the
//! generator owns its own ChaCha stream, so regenerating a level on restart
//! reproduces the same grid tile for tile.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::DifficultyProfile;

use super::layout::Layout;
use super::map::TileMap;
use super::tile::Tile;

/// Geometric building blocks stamped into the interior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    Rectangle,
    Cross,
    Diamond,
    L,
    T,
    U,
    Zigzag,
    Spiral,
}

impl Structure {
    const ALL: [Structure; 8] = [
        Structure::Rectangle,
        Structure::Cross,
        Structure::Diamond,
        Structure::L,
        Structure::T,
        Structure::U,
        Structure::Zigzag,
        Structure::Spiral,
    ];

    /// Cell offsets inside an `n`x`n` box
    pub fn cells(self, n: usize) -> Vec<(usize, usize)> {
        let last = n - 1;
        let mid = n / 2;
        let mut cells = Vec::new();
        for r in 0..n {
            for c in 0..n {
                let hit = match self {
                    Structure::Rectangle => r == 0 || c == 0 || r == last || c == last,
                    Structure::Cross => r == mid || c == mid,
                    Structure::Diamond => r.abs_diff(mid) + c.abs_diff(mid) == mid,
                    Structure::L => c == 0 || r == last,
                    Structure::T => r == 0 || c == mid,
                    Structure::U => c == 0 || c == last || r == last,
                    Structure::Zigzag => c == r || c == r + 1,
                    Structure::Spiral => {
                        r == 0
                            || c == last
                            || r == last
                            || (c == 0 && r >= 2)
                            || (r == 2 && c + 2 <= last && last >= 4)
                    }
                };
                if hit {
                    cells.push((r, c));
                }
            }
        }
        cells
    }
}

/// Builds tile layouts for a difficulty profile
pub struct LevelGenerator<'a> {
    width: usize,
    height: usize,
    profile: &'a DifficultyProfile,
    layout: Layout,
    rng: ChaCha8Rng,
    grid: Vec<Tile>,
}

/// Generate a level. Identical arguments always produce identical grids.
pub fn generate(width: usize, height: usize, seed: u64, profile: &DifficultyProfile) -> TileMap {
    LevelGenerator::new(width, height, seed, profile).build()
}

/// Seed for a given level of a session, so each level differs but a restart
/// replays the same map
pub fn level_seed(session_seed: u64, level: u32, profile: &DifficultyProfile) -> u64 {
    session_seed
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(u64::from(level) << 8)
        .wrapping_add(profile.difficulty.index())
}

impl<'a> LevelGenerator<'a> {
    pub fn new(width: usize, height: usize, seed: u64, profile: &'a DifficultyProfile) -> Self {
        Self {
            width,
            height,
            profile,
            layout: Layout::new(width, height),
            rng: ChaCha8Rng::seed_from_u64(seed),
            grid: vec![Tile::Empty; width * height],
        }
    }

    pub fn build(mut self) -> TileMap {
        self.lay_border();
        self.stamp_structures();
        if self.rng.gen_bool(0.5) {
            self.mirror();
        }
        self.carve_corridors();
        self.add_patches(Tile::Water, 1..=3, (2, 4), (1, 2));
        self.add_patches(Tile::Trees, 1..=3, (2, 4), (2, 3));
        self.add_patches(Tile::Ice, 1..=2, (2, 5), (2, 3));
        self.scatter_blocks();
        self.clear_reserved();
        self.balance_density();

        let mut map = TileMap::new(self.width, self.height);
        for (idx, &tile) in self.grid.iter().enumerate() {
            map.set(idx / self.width, idx % self.width, tile);
        }
        map.commit();
        map
    }

    fn set(&mut self, row: usize, col: usize, tile: Tile) {
        if row < self.height && col < self.width {
            self.grid[row * self.width + col] = tile;
        }
    }

    fn get(&self, row: usize, col: usize) -> Tile {
        self.grid[row * self.width + col]
    }

    /// Only touch cells strictly inside the border
    fn set_interior(&mut self, row: usize, col: usize, tile: Tile) {
        if row >= 1 && col >= 1 && row + 1 < self.height && col + 1 < self.width {
            self.set(row, col, tile);
        }
    }

    fn lay_border(&mut self) {
        let tile = self.profile.border_tile;
        for col in 0..self.width {
            self.set(0, col, tile);
            self.set(self.height - 1, col, tile);
        }
        for row in 0..self.height {
            self.set(row, 0, tile);
            self.set(row, self.width - 1, tile);
        }
    }

    fn stamp_structures(&mut self) {
        let count = self.rng.gen_range(2..=4);
        for _ in 0..count {
            let shape = Structure::ALL[self.rng.gen_range(0..Structure::ALL.len())];
            let material = if self.rng.gen_bool(self.profile.steel_chance) {
                Tile::Steel
            } else {
                Tile::Brick
            };
            let size = self.rng.gen_range(3..=5).min(self.width - 4).min(self.height - 8);
            let row = self.rng.gen_range(3..=self.height - 5 - size);
            let col = self.rng.gen_range(2..=self.width - 2 - size);
            for (dr, dc) in shape.cells(size) {
                self.set_interior(row + dr, col + dc, material);
            }
        }
    }

    /// Copy the left half onto the right half for a symmetric layout
    fn mirror(&mut self) {
        for row in 1..self.height - 1 {
            for col in 1..self.width / 2 {
                let tile = self.get(row, col);
                self.set(row, self.width - 1 - col, tile);
            }
        }
    }

    fn carve_corridors(&mut self) {
        let horizontal = self.rng.gen_range(1..=2);
        for _ in 0..horizontal {
            let row = self.rng.gen_range(3..self.height - 4);
            for col in 1..self.width - 1 {
                self.set(row, col, Tile::Empty);
            }
        }
        if self.rng.gen_bool(0.5) {
            let col = self.rng.gen_range(2..self.width - 2);
            for row in 3..self.height - 4 {
                self.set(row, col, Tile::Empty);
            }
        }
    }

    fn add_patches(
        &mut self,
        tile: Tile,
        count: std::ops::RangeInclusive<usize>,
        width: (usize, usize),
        height: (usize, usize),
    ) {
        let count = self.rng.gen_range(count);
        for _ in 0..count {
            let w = self.rng.gen_range(width.0..=width.1);
            let h = self.rng.gen_range(height.0..=height.1);
            let row = self.rng.gen_range(3..=(self.height - 5).saturating_sub(h).max(3));
            let col = self.rng.gen_range(1..=(self.width - 1).saturating_sub(w).max(1));
            for r in row..row + h {
                for c in col..col + w {
                    self.set_interior(r, c, tile);
                }
            }
        }
    }

    fn scatter_blocks(&mut self) {
        let count = self.rng.gen_range(4..=8);
        for _ in 0..count {
            let row = self.rng.gen_range(2..self.height - 3);
            let col = self.rng.gen_range(1..self.width - 2);
            let tile = if self.rng.gen_bool(0.2) {
                Tile::Steel
            } else {
                Tile::Brick
            };
            self.set_interior(row, col, tile);
            if self.rng.gen_bool(0.5) {
                self.set_interior(row, col + 1, tile);
            }
        }
    }

    /// Cells kept free of generated content: spawn areas and the base
    fn reserved_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for (row, col) in self.layout.enemy_spawn_cells() {
            for dr in 0..2 {
                for dc in 0..2 {
                    cells.push((row + dr, col + dc));
                }
            }
        }
        for player in 1..=4 {
            let (row, col) = self.layout.player_spawn_cell(player);
            cells.push((row, col));
            cells.push((row - 1, col));
        }
        cells.push((self.layout.base_row, self.layout.base_col));
        cells
    }

    /// Whether a cell is one the density pass may not touch
    fn is_fixed(&self, row: usize, col: usize, wall_row: Option<usize>) -> bool {
        self.layout.is_border(row, col)
            || self.reserved_cells().contains(&(row, col))
            || self.layout.ring_cells().contains(&(row, col))
            || wall_row == Some(row) && col.abs_diff(self.layout.base_col) <= 3
    }

    fn wall_row(&self) -> Option<usize> {
        let row = self.layout.base_row.checked_sub(3)?;
        (row >= 3).then_some(row)
    }

    fn clear_reserved(&mut self) {
        for (row, col) in self.reserved_cells() {
            self.set(row, col, Tile::Empty);
        }
        for (row, col) in self.layout.ring_cells() {
            self.set(row, col, Tile::Brick);
        }
        if let Some(row) = self.wall_row() {
            let half = self.rng.gen_range(1..=3usize);
            for col in self.layout.base_col - half..=self.layout.base_col + half {
                self.set_interior(row, col, Tile::Brick);
            }
        }
    }

    /// Add or remove blocks until the empty share of the free cells falls
    /// inside the profile's target band
    fn balance_density(&mut self) {
        let wall_row = self.wall_row();
        let free: Vec<(usize, usize)> = (0..self.height)
            .flat_map(|row| (0..self.width).map(move |col| (row, col)))
            .filter(|&(row, col)| !self.is_fixed(row, col, wall_row))
            .collect();
        if free.is_empty() {
            return;
        }

        let total = free.len() as f32;
        let max_empty = (self.profile.empty_fraction_max * total).floor() as usize;
        let min_empty = (self.profile.empty_fraction_min * total).ceil() as usize;

        for pass in 0..8 {
            let (empty, filled): (Vec<_>, Vec<_>) = free
                .iter()
                .copied()
                .partition(|&(row, col)| self.get(row, col) == Tile::Empty);

            if empty.len() > max_empty {
                let excess = (empty.len() - max_empty).div_ceil(2).max(1);
                let picks: Vec<_> = empty.choose_multiple(&mut self.rng, excess).copied().collect();
                for (row, col) in picks {
                    let tile = if self.rng.gen_bool(self.profile.steel_chance / 2.0) {
                        Tile::Steel
                    } else {
                        Tile::Brick
                    };
                    self.set(row, col, tile);
                }
            } else if empty.len() < min_empty {
                let deficit = (min_empty - empty.len()).div_ceil(2).max(1);
                let picks: Vec<_> = filled.choose_multiple(&mut self.rng, deficit).copied().collect();
                for (row, col) in picks {
                    self.set(row, col, Tile::Empty);
                }
            } else {
                debug!(pass, empty = empty.len(), free = free.len(), "Level density settled");
                return;
            }
        }

        // Converge exactly on the nearest band edge
        let (empty, filled): (Vec<_>, Vec<_>) = free
            .iter()
            .copied()
            .partition(|&(row, col)| self.get(row, col) == Tile::Empty);
        if empty.len() > max_empty {
            let picks: Vec<_> = empty
                .choose_multiple(&mut self.rng, empty.len() - max_empty)
                .copied()
                .collect();
            for (row, col) in picks {
                self.set(row, col, Tile::Brick);
            }
        } else if empty.len() < min_empty {
            let picks: Vec<_> = filled
                .choose_multiple(&mut self.rng, min_empty - empty.len())
                .copied()
                .collect();
            for (row, col) in picks {
                self.set(row, col, Tile::Empty);
            }
        }
    }
}

/// Fraction of empty tiles among the cells the generator is free to fill
pub fn free_empty_fraction(map: &TileMap) -> f32 {
    let layout = Layout::new(map.width(), map.height());
    let reserved: Vec<(usize, usize)> = {
        let mut cells = Vec::new();
        for (row, col) in layout.enemy_spawn_cells() {
            for dr in 0..2 {
                for dc in 0..2 {
                    cells.push((row + dr, col + dc));
                }
            }
        }
        for player in 1..=4 {
            let (row, col) = layout.player_spawn_cell(player);
            cells.push((row, col));
            cells.push((row - 1, col));
        }
        cells.push((layout.base_row, layout.base_col));
        cells.extend(layout.ring_cells());
        cells
    };
    let wall_row = layout.base_row.checked_sub(3).filter(|&row| row >= 3);

    let (mut free, mut empty) = (0usize, 0usize);
    for (row, col, tile) in map.cells() {
        let is_wall = wall_row == Some(row) && col.abs_diff(layout.base_col) <= 3;
        if layout.is_border(row, col) || reserved.contains(&(row, col)) || is_wall {
            continue;
        }
        free += 1;
        if tile == Tile::Empty {
            empty += 1;
        }
    }
    if free == 0 {
        0.0
    } else {
        empty as f32 / free as f32
    }
}
