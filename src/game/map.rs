//! Tile map: terrain grid, destructible tiles, burning trees and sync tracking
//!
//! The map keeps a shadow copy of the grid as it was at the last committed
//! snapshot. Every mutation goes through [`TileMap::set`], which records the
//! touched cell so a delta can be produced without rescanning the grid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::geometry::Bounds;
use super::tile::{Tile, TILE_SIZE};

/// Ticks a tree keeps burning before it turns into open ground
pub const TREE_BURN_TICKS: u32 = 60;

/// Share of the grid that may change before a full refresh is cheaper than a delta
pub const FULL_SYNC_FRACTION_DENOM: usize = 10;

/// A single tile change as shipped in delta snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileChange {
    pub row: usize,
    pub col: usize,
    /// Tile ordinal (see [`Tile::ordinal`])
    pub tile: u8,
}

/// Complete grid as shipped in full snapshots (row-major ordinals)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<u8>,
}

/// Outcome of a projectile striking terrain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerrainHit {
    /// Projectile must stop here
    pub blocked: bool,
    /// Cells destroyed by this hit, with the tile they used to hold
    pub destroyed: Vec<(usize, usize, Tile)>,
    /// Tree cells set on fire by this hit
    pub ignited: Vec<(usize, usize)>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TileMapError {
    #[error("tile grid is {found_width}x{found_height}, expected {width}x{height}")]
    Dimensions {
        width: usize,
        height: usize,
        found_width: usize,
        found_height: usize,
    },
}

#[derive(Debug, Clone)]
pub struct TileMap {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
    /// Burning tree cells and the ticks they have left
    burning: BTreeMap<(usize, usize), u32>,
    /// Grid as of the last commit
    synced: Vec<Tile>,
    /// Cells touched since the last commit, in first-touch order
    pending: Vec<(usize, usize)>,
    touched: Vec<bool>,
}

impl TileMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, Tile::Empty)
    }

    pub fn filled(width: usize, height: usize, tile: Tile) -> Self {
        let len = width * height;
        Self {
            width,
            height,
            tiles: vec![tile; len],
            burning: BTreeMap::new(),
            synced: vec![tile; len],
            pending: Vec::new(),
            touched: vec![false; len],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_width(&self) -> f32 {
        self.width as f32 * TILE_SIZE
    }

    pub fn pixel_height(&self) -> f32 {
        self.height as f32 * TILE_SIZE
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    fn index(&self, row: isize, col: isize) -> Option<usize> {
        if row < 0 || col < 0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < self.height && col < self.width).then(|| row * self.width + col)
    }

    /// Tile at a cell. Anything outside the map reads as `Steel`.
    pub fn get(&self, row: isize, col: isize) -> Tile {
        self.index(row, col)
            .map(|idx| self.tiles[idx])
            .unwrap_or(Tile::Steel)
    }

    /// Tile under a pixel coordinate
    pub fn tile_at(&self, x: f32, y: f32) -> Tile {
        self.get(
            (y / TILE_SIZE).floor() as isize,
            (x / TILE_SIZE).floor() as isize,
        )
    }

    /// Overwrite a cell. Out-of-range writes are ignored. Returns whether the
    /// tile actually changed.
    pub fn set(&mut self, row: usize, col: usize, tile: Tile) -> bool {
        let Some(idx) = self.index(row as isize, col as isize) else {
            return false;
        };
        if self.tiles[idx] == tile {
            return false;
        }
        self.tiles[idx] = tile;
        if tile != Tile::Trees {
            self.burning.remove(&(row, col));
        }
        if !self.touched[idx] {
            self.touched[idx] = true;
            self.pending.push((row, col));
        }
        true
    }

    /// Inclusive cell range overlapped by a pixel rectangle (may extend off-map)
    pub fn cells_overlapping(&self, bounds: &Bounds) -> (isize, isize, isize, isize) {
        let eps = 0.001;
        let col0 = (bounds.x / TILE_SIZE).floor() as isize;
        let row0 = (bounds.y / TILE_SIZE).floor() as isize;
        let col1 = ((bounds.right() - eps) / TILE_SIZE).floor() as isize;
        let row1 = ((bounds.bottom() - eps) / TILE_SIZE).floor() as isize;
        (row0, col0, row1, col1)
    }

    /// AABB-vs-grid test for a square entity
    pub fn collides_solid(&self, x: f32, y: f32, size: f32, can_swim: bool) -> bool {
        self.collides_bounds(&Bounds::square(x, y, size), can_swim)
    }

    pub fn collides_bounds(&self, bounds: &Bounds, can_swim: bool) -> bool {
        let (row0, col0, row1, col1) = self.cells_overlapping(bounds);
        (row0..=row1).any(|row| (col0..=col1).any(|col| self.get(row, col).blocks_tank(can_swim)))
    }

    /// Any overlapped cell holds the given tile
    pub fn any_tile_in(&self, bounds: &Bounds, tile: Tile) -> bool {
        let (row0, col0, row1, col1) = self.cells_overlapping(bounds);
        (row0..=row1).any(|row| (col0..=col1).any(|col| self.get(row, col) == tile))
    }

    /// Whether the tile under the entity's center is ice
    pub fn is_on_ice(&self, bounds: &Bounds) -> bool {
        let (cx, cy) = bounds.center();
        self.tile_at(cx, cy) == Tile::Ice
    }

    /// Apply a projectile strike to every cell the projectile overlaps.
    ///
    /// Brick is destroyed and blocks. Steel blocks and is destroyed only by
    /// power 2 or more. Ground always blocks. Unburnt trees let the projectile
    /// through and catch fire if it ignites trees; burning trees block.
    pub fn resolve_bullet_hit(&mut self, bounds: &Bounds, power: u8, ignites_trees: bool) -> TerrainHit {
        let mut hit = TerrainHit::default();
        let (row0, col0, row1, col1) = self.cells_overlapping(bounds);

        for row in row0..=row1 {
            for col in col0..=col1 {
                let tile = self.get(row, col);
                match tile {
                    Tile::Brick => {
                        hit.blocked = true;
                        if self.set(row as usize, col as usize, Tile::Empty) {
                            hit.destroyed.push((row as usize, col as usize, tile));
                        }
                    }
                    Tile::Steel => {
                        hit.blocked = true;
                        if power >= 2 && self.set(row as usize, col as usize, Tile::Empty) {
                            hit.destroyed.push((row as usize, col as usize, tile));
                        }
                    }
                    Tile::Ground => hit.blocked = true,
                    Tile::Trees => {
                        let cell = (row as usize, col as usize);
                        if self.burning.contains_key(&cell) {
                            hit.blocked = true;
                        } else if ignites_trees && self.ignite(cell.0, cell.1) {
                            hit.ignited.push(cell);
                        }
                    }
                    Tile::Empty | Tile::Water | Tile::Ice => {}
                }
            }
        }

        hit
    }

    /// Set a tree on fire (no-op for non-tree cells)
    fn ignite(&mut self, row: usize, col: usize) -> bool {
        if self.get(row as isize, col as isize) != Tile::Trees {
            return false;
        }
        self.burning.entry((row, col)).or_insert(TREE_BURN_TICKS);
        true
    }

    pub fn is_burning(&self, row: usize, col: usize) -> bool {
        self.burning.contains_key(&(row, col))
    }

    pub fn burning_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.burning.keys().copied()
    }

    /// Advance burn timers; returns the cells that burnt out this tick
    pub fn tick(&mut self) -> Vec<(usize, usize)> {
        let mut burnt = Vec::new();
        for (cell, remaining) in self.burning.iter_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                burnt.push(*cell);
            }
        }
        for &(row, col) in &burnt {
            self.burning.remove(&(row, col));
            self.set(row, col, Tile::Empty);
        }
        burnt
    }

    /// Entire grid as ordinals
    pub fn export_full(&self) -> TileGrid {
        TileGrid {
            width: self.width,
            height: self.height,
            tiles: self.tiles.iter().map(|t| t.ordinal()).collect(),
        }
    }

    /// Cells that differ from the last committed grid
    pub fn export_delta(&self) -> Vec<TileChange> {
        self.pending
            .iter()
            .filter_map(|&(row, col)| {
                let idx = row * self.width + col;
                (self.tiles[idx] != self.synced[idx]).then(|| TileChange {
                    row,
                    col,
                    tile: self.tiles[idx].ordinal(),
                })
            })
            .collect()
    }

    /// Number of cells that differ from the last committed grid
    pub fn changed_tile_count(&self) -> usize {
        self.pending
            .iter()
            .filter(|&&(row, col)| {
                let idx = row * self.width + col;
                self.tiles[idx] != self.synced[idx]
            })
            .count()
    }

    /// True once strictly more than a tenth of the grid changed since commit
    pub fn needs_full_sync(&self) -> bool {
        self.changed_tile_count() * FULL_SYNC_FRACTION_DENOM > self.tile_count()
    }

    /// Mark the current grid as the new sync baseline
    pub fn commit(&mut self) {
        self.synced.copy_from_slice(&self.tiles);
        for &(row, col) in &self.pending {
            self.touched[row * self.width + col] = false;
        }
        self.pending.clear();
    }

    /// Apply changes received from an authoritative peer. The changes become
    /// part of the baseline. Out-of-range cells and unknown ordinals are
    /// skipped; returns how many changes were applied.
    pub fn apply_delta(&mut self, changes: &[TileChange]) -> usize {
        let mut applied = 0;
        for change in changes {
            let Some(idx) = self.index(change.row as isize, change.col as isize) else {
                warn!(row = change.row, col = change.col, "Delta change outside map");
                continue;
            };
            let Some(tile) = Tile::from_ordinal(change.tile as i32) else {
                warn!(ordinal = change.tile, "Delta change with unknown tile");
                continue;
            };
            self.tiles[idx] = tile;
            self.synced[idx] = tile;
            if tile != Tile::Trees {
                self.burning.remove(&(change.row, change.col));
            }
            applied += 1;
        }
        applied
    }

    /// Replace the grid with a full snapshot from an authoritative peer
    pub fn apply_full(&mut self, grid: &TileGrid) -> Result<(), TileMapError> {
        let rows: Vec<Vec<i32>> = grid
            .tiles
            .chunks(grid.width.max(1))
            .map(|row| row.iter().map(|&t| t as i32).collect())
            .collect();
        if grid.width * grid.height != grid.tiles.len() {
            return Err(self.dimension_error(grid.width, grid.height));
        }
        self.import_tiles(&rows)
    }

    fn dimension_error(&self, found_width: usize, found_height: usize) -> TileMapError {
        TileMapError::Dimensions {
            width: self.width,
            height: self.height,
            found_width,
            found_height,
        }
    }

    /// Load a row-major ordinal grid. Grids of the wrong shape are rejected;
    /// unknown ordinals are clamped to `Empty`. The loaded grid becomes the
    /// sync baseline and all fires are put out.
    pub fn import_tiles(&mut self, rows: &[Vec<i32>]) -> Result<(), TileMapError> {
        let found_width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.len() != self.height || rows.iter().any(|row| row.len() != self.width) {
            return Err(self.dimension_error(found_width, rows.len()));
        }

        let mut clamped = 0usize;
        for (row, values) in rows.iter().enumerate() {
            for (col, &ordinal) in values.iter().enumerate() {
                let tile = Tile::from_ordinal(ordinal).unwrap_or_else(|| {
                    clamped += 1;
                    Tile::Empty
                });
                self.tiles[row * self.width + col] = tile;
            }
        }
        if clamped > 0 {
            warn!(clamped, "Unknown tile ordinals replaced with empty tiles");
        }

        self.burning.clear();
        self.commit();
        Ok(())
    }

    /// Row-major ordinal grid for level persistence
    pub fn export_tiles(&self) -> Vec<Vec<i32>> {
        self.tiles
            .chunks(self.width)
            .map(|row| row.iter().map(|t| t.ordinal() as i32).collect())
            .collect()
    }

    /// Iterate all cells as `(row, col, tile)`
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, Tile)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .map(move |(idx, &tile)| (idx / self.width, idx % self.width, tile))
    }
}
