//! Properties of the tile map, the level generator and base protection

use proptest::prelude::*;

use tank_battle_server::config::Difficulty;
use tank_battle_server::game::effects::{BaseProtection, EffectManager, BASE_PROTECTION_TIME, FLASH_TOGGLES};
use tank_battle_server::game::geometry::Bounds;
use tank_battle_server::game::layout::Layout;
use tank_battle_server::game::level_gen;
use tank_battle_server::game::map::TileMap;
use tank_battle_server::game::tile::{Tile, TILE_SIZE};

proptest! {
    #[test]
    fn prop_weak_bullets_never_clear_steel(
        row in 1usize..12,
        col in 1usize..12,
        dx in 0.0f32..24.0,
        dy in 0.0f32..24.0,
        power in 0u8..2,
    ) {
        let mut map = TileMap::new(13, 13);
        map.set(row, col, Tile::Steel);
        let bounds = Bounds::square(col as f32 * TILE_SIZE + dx, row as f32 * TILE_SIZE + dy, 8.0);

        let hit = map.resolve_bullet_hit(&bounds, power, false);
        prop_assert!(hit.blocked);
        prop_assert!(hit.destroyed.is_empty());
        prop_assert_eq!(map.get(row as isize, col as isize), Tile::Steel);
    }

    #[test]
    fn prop_strong_bullets_clear_steel(
        row in 1usize..12,
        col in 1usize..12,
        dx in 0.0f32..24.0,
        dy in 0.0f32..24.0,
        power in 2u8..6,
    ) {
        let mut map = TileMap::new(13, 13);
        map.set(row, col, Tile::Steel);
        let bounds = Bounds::square(col as f32 * TILE_SIZE + dx, row as f32 * TILE_SIZE + dy, 8.0);

        let hit = map.resolve_bullet_hit(&bounds, power, false);
        prop_assert!(hit.blocked);
        prop_assert_eq!(map.get(row as isize, col as isize), Tile::Empty);
        prop_assert!(hit.destroyed.contains(&(row, col, Tile::Steel)));
    }

    #[test]
    fn prop_generator_is_deterministic(seed in any::<u64>(), level in 1u32..20) {
        let profile = Difficulty::Hard.profile();
        let level_seed = level_gen::level_seed(seed, level, &profile);
        prop_assert_eq!(level_seed, level_gen::level_seed(seed, level, &profile));

        let a = level_gen::generate(26, 26, level_seed, &profile);
        let b = level_gen::generate(26, 26, level_seed, &profile);
        prop_assert_eq!(a.export_full(), b.export_full());
    }

    #[test]
    fn prop_full_sync_only_past_a_tenth(changed in 0usize..60) {
        let mut map = TileMap::new(20, 20);
        for i in 0..changed {
            map.set(i / 20, i % 20, Tile::Brick);
        }
        prop_assert_eq!(map.changed_tile_count(), changed);
        prop_assert_eq!(map.needs_full_sync(), changed * 10 > 400);
        map.commit();
        prop_assert!(!map.needs_full_sync());
    }
}

#[test]
fn test_full_sync_boundary() {
    let mut map = TileMap::new(20, 20);
    for i in 0..40 {
        map.set(i / 20, i % 20, Tile::Brick);
    }
    assert!(!map.needs_full_sync(), "exactly a tenth is still a delta");
    map.set(2, 0, Tile::Brick);
    assert!(map.needs_full_sync());
}

#[test]
fn test_base_protection_flashes_then_settles_on_brick() {
    let layout = Layout::new(26, 26);
    let ring = layout.ring_cells();
    let (row, col) = ring[0];
    let mut map = TileMap::new(26, 26);
    let mut effects = EffectManager::new(ring.clone());

    effects.activate_base_protection(&mut map, false);
    assert!(ring
        .iter()
        .all(|&(r, c)| map.get(r as isize, c as isize) == Tile::Steel));

    let mut shown = vec![Tile::Steel];
    for _ in 0..BASE_PROTECTION_TIME + 400 {
        effects.tick(&mut map, &mut []);
        let tile = map.get(row as isize, col as isize);
        if shown.last() != Some(&tile) {
            shown.push(tile);
        }
    }

    // Steel, then alternating Brick/Steel for every toggle, then final Brick
    assert_eq!(shown.len(), FLASH_TOGGLES as usize + 2);
    assert_eq!(shown.last(), Some(&Tile::Brick));
    assert!(shown
        .windows(2)
        .all(|pair| matches!(pair, [Tile::Steel, Tile::Brick] | [Tile::Brick, Tile::Steel])));
    assert_eq!(effects.base_protection(), BaseProtection::Idle);
    assert!(ring
        .iter()
        .all(|&(r, c)| map.get(r as isize, c as isize) == Tile::Brick));
}
