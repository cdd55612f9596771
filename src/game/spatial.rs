//! Uniform grid for neighbour queries
//!
//! Rebuilt from scratch every tick; entity counts are in the tens, so there is
//! no incremental maintenance.

use std::collections::HashMap;

use super::geometry::Bounds;
use super::tile::TILE_SIZE;

/// Default cell edge: two tiles
pub const DEFAULT_CELL_SIZE: f32 = TILE_SIZE * 2.0;

#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<T>>,
}

impl<T: Copy + PartialEq> SpatialGrid<T> {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            cells: HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    fn cell_of(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Insert a point entity
    pub fn insert(&mut self, entity: T, x: f32, y: f32) {
        let cell = self.cell_of(x, y);
        let bucket = self.cells.entry(cell).or_default();
        if !bucket.contains(&entity) {
            bucket.push(entity);
        }
    }

    /// Insert an entity into every cell its bounds overlap
    pub fn insert_bounds(&mut self, entity: T, bounds: &Bounds) {
        let (c0, r0) = self.cell_of(bounds.x, bounds.y);
        let (c1, r1) = self.cell_of(bounds.right() - 0.001, bounds.bottom() - 0.001);
        for cy in r0..=r1 {
            for cx in c0..=c1 {
                let bucket = self.cells.entry((cx, cy)).or_default();
                if !bucket.contains(&entity) {
                    bucket.push(entity);
                }
            }
        }
    }

    /// Entities in the 3x3 block of cells around `(x, y)`, without duplicates
    pub fn query_near(&self, x: f32, y: f32) -> Vec<T> {
        let (cx, cy) = self.cell_of(x, y);
        let mut found: Vec<T> = Vec::new();
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) {
                    for &entity in bucket {
                        if !found.contains(&entity) {
                            found.push(entity);
                        }
                    }
                }
            }
        }
        found
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<T: Copy + PartialEq> Default for SpatialGrid<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_finds_neighbours_only() {
        let mut grid = SpatialGrid::new(64.0);
        grid.insert(1u32, 10.0, 10.0);
        grid.insert(2u32, 100.0, 10.0);
        grid.insert(3u32, 500.0, 500.0);

        let near = grid.query_near(20.0, 20.0);
        assert!(near.contains(&1));
        assert!(near.contains(&2));
        assert!(!near.contains(&3));
    }

    #[test]
    fn test_spanning_entity_is_deduplicated() {
        let mut grid = SpatialGrid::new(64.0);
        grid.insert_bounds(7u32, &Bounds::square(50.0, 50.0, 60.0));
        assert_eq!(grid.query_near(64.0, 64.0), vec![7]);
        // Reachable from a cell the entity only partly covers
        assert_eq!(grid.query_near(170.0, 64.0), vec![7]);
    }

    #[test]
    fn test_clear_empties_grid() {
        let mut grid = SpatialGrid::default();
        grid.insert(1u8, 0.0, 0.0);
        grid.clear();
        assert!(grid.is_empty());
        assert!(grid.query_near(0.0, 0.0).is_empty());
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = SpatialGrid::new(64.0);
        grid.insert(4u16, -10.0, -10.0);
        assert_eq!(grid.query_near(5.0, 5.0), vec![4]);
    }
}
