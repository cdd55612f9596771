//! Terrain tile types

use serde::{Deserialize, Serialize};

/// Edge length of one tile in pixels
pub const TILE_SIZE: f32 = 32.0;

/// A single terrain cell. The discriminant is the ordinal used by level files
/// and delta snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Tile {
    #[default]
    Empty = 0,
    Brick = 1,
    Steel = 2,
    Water = 3,
    Trees = 4,
    Ice = 5,
    /// Indestructible steel variant used by upgraded base protection
    Ground = 6,
}

impl Tile {
    pub const ALL: [Tile; 7] = [
        Tile::Empty,
        Tile::Brick,
        Tile::Steel,
        Tile::Water,
        Tile::Trees,
        Tile::Ice,
        Tile::Ground,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Look up a tile by ordinal; unknown values yield `None`
    pub fn from_ordinal(ordinal: i32) -> Option<Tile> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// Blocks tank movement (water only for tanks that cannot swim)
    pub fn blocks_tank(self, can_swim: bool) -> bool {
        match self {
            Tile::Brick | Tile::Steel | Tile::Ground => true,
            Tile::Water => !can_swim,
            Tile::Empty | Tile::Trees | Tile::Ice => false,
        }
    }

    /// Steel-like tiles that even a Boss cannot crush
    pub fn is_indestructible(self) -> bool {
        matches!(self, Tile::Steel | Tile::Ground)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_round_trip() {
        for tile in Tile::ALL {
            assert_eq!(Tile::from_ordinal(tile.ordinal() as i32), Some(tile));
        }
    }

    #[test]
    fn test_unknown_ordinals() {
        assert_eq!(Tile::from_ordinal(-1), None);
        assert_eq!(Tile::from_ordinal(7), None);
        assert_eq!(Tile::from_ordinal(i32::MAX), None);
    }

    #[test]
    fn test_water_blocks_unless_swimming() {
        assert!(Tile::Water.blocks_tank(false));
        assert!(!Tile::Water.blocks_tank(true));
        assert!(!Tile::Trees.blocks_tank(false));
        assert!(Tile::Ground.blocks_tank(true));
    }
}
