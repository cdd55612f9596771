//! Fixed map landmarks derived from the map dimensions

use super::geometry::Bounds;
use super::tile::TILE_SIZE;

/// Column offsets of player spawn cells from the base column, by player number
const PLAYER_SPAWN_OFFSETS: [isize; 4] = [-4, 4, -8, 8];

/// Positions of the base, its protective ring and every spawn point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub width: usize,
    pub height: usize,
    pub base_row: usize,
    pub base_col: usize,
}

impl Layout {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            base_row: height.saturating_sub(2),
            base_col: width / 2,
        }
    }

    pub fn base_bounds(&self) -> Bounds {
        Bounds::square(
            self.base_col as f32 * TILE_SIZE,
            self.base_row as f32 * TILE_SIZE,
            TILE_SIZE,
        )
    }

    /// Cells that base protection converts to steel
    pub fn ring_cells(&self) -> Vec<(usize, usize)> {
        let (row, col) = (self.base_row, self.base_col);
        vec![
            (row - 1, col - 1),
            (row - 1, col),
            (row - 1, col + 1),
            (row, col - 1),
            (row, col + 1),
        ]
    }

    /// Spawn cell for a player number (1-4); other numbers fall back to player 1
    pub fn player_spawn_cell(&self, player_number: u8) -> (usize, usize) {
        let idx = usize::from(player_number.clamp(1, 4) - 1);
        let col = (self.base_col as isize + PLAYER_SPAWN_OFFSETS[idx])
            .clamp(1, self.width as isize - 2) as usize;
        (self.base_row, col)
    }

    /// Top-left cells of the 2x2 enemy entry areas
    pub fn enemy_spawn_cells(&self) -> [(usize, usize); 3] {
        [
            (1, 1),
            (1, self.base_col - 1),
            (1, self.width - 3),
        ]
    }

    /// Pixel position that centers a tank of `size` inside a 1x1 cell
    pub fn cell_origin(row: usize, col: usize, size: f32) -> (f32, f32) {
        let offset = (TILE_SIZE - size) / 2.0;
        (col as f32 * TILE_SIZE + offset, row as f32 * TILE_SIZE + offset)
    }

    /// Pixel position that centers a tank of `size` inside a 2x2 area
    pub fn area_origin(row: usize, col: usize, size: f32) -> (f32, f32) {
        let offset = (2.0 * TILE_SIZE - size).max(0.0) / 2.0;
        (col as f32 * TILE_SIZE + offset, row as f32 * TILE_SIZE + offset)
    }

    pub fn is_border(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row + 1 == self.height || col + 1 == self.width
    }
}
