//! Whole-tick combat scenarios driven through the public world API

use tank_battle_server::config::GameConfig;
use tank_battle_server::game::events::GameEvent;
use tank_battle_server::game::geometry::Direction;
use tank_battle_server::game::layout::Layout;
use tank_battle_server::game::tank::{EnemyType, TankId, BOSS_SIZE, TANK_SIZE};
use tank_battle_server::game::tile::Tile;
use tank_battle_server::game::{GamePhase, GameWorld};

const PLAYER: TankId = TankId(1);

fn quiet_config(seed: u64) -> GameConfig {
    let mut config = GameConfig::default().with_seed(seed);
    config.profile.total_enemies = 0;
    config.profile.ufo_spawn_chance = 0.0;
    config.victory_delay = 100_000;
    config
}

/// A world with an empty playfield and enemies that hold still and hold fire
fn open_world(seed: u64) -> GameWorld {
    let mut world = GameWorld::new(quiet_config(seed));
    let (w, h) = (world.map().width(), world.map().height());
    for row in 1..h - 1 {
        for col in 1..w - 1 {
            world.map_mut().set(row, col, Tile::Empty);
        }
    }
    world.commit_sync();
    world.effects_mut().freeze_enemies();
    world
}

fn idle_enemy(world: &mut GameWorld, enemy_type: EnemyType, x: f32, y: f32) -> TankId {
    let id = world.spawn_enemy(enemy_type, x, y);
    let tank = world.tank_mut(id).unwrap();
    let ai = tank.ai.as_mut().unwrap();
    ai.shoot_cooldown = 10_000;
    ai.move_cooldown = 10_000;
    id
}

fn player_position(world: &GameWorld) -> (f32, f32) {
    let tank = world.tank(PLAYER).unwrap();
    (tank.x, tank.y)
}

/// Tick until `done` sees the tick's events or the budget runs out
fn run_until(world: &mut GameWorld, ticks: usize, mut done: impl FnMut(&[GameEvent]) -> bool) -> Vec<GameEvent> {
    let mut all = Vec::new();
    for _ in 0..ticks {
        let events = world.tick();
        let finished = done(&events);
        all.extend(events);
        if finished {
            break;
        }
    }
    all
}

fn killed(events: &[GameEvent], id: TankId) -> bool {
    events
        .iter()
        .any(|e| matches!(e, GameEvent::TankKilled { victim, .. } if *victim == id))
}

fn drops(events: &[GameEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, GameEvent::PowerUpSpawned { .. }))
        .count()
}

/// Player fires straight up at an enemy parked right above it
fn shoot_enemy_above(world: &mut GameWorld, enemy_type: EnemyType) -> (TankId, Vec<GameEvent>) {
    let (x, y) = player_position(world);
    let enemy = idle_enemy(world, enemy_type, x, y - TANK_SIZE - 20.0);
    assert!(world.fire(PLAYER));
    let events = run_until(world, 20, |events| {
        events.iter().any(|e| {
            matches!(e, GameEvent::TankKilled { .. } | GameEvent::TankDamaged { .. })
        })
    });
    (enemy, events)
}

#[test]
fn test_regular_enemy_dies_to_one_bullet() {
    let mut world = open_world(1);
    let (enemy, events) = shoot_enemy_above(&mut world, EnemyType::Regular);

    assert!(killed(&events, enemy));
    assert!(world.tank(enemy).is_none(), "eliminated enemies leave the roster");
    let stats = &world.player(1).unwrap().stats;
    assert_eq!(stats.kills, 1);
    assert_eq!(stats.kills_by_type[EnemyType::Regular.index()], 1);
    assert!(stats.score >= 100);
    assert_eq!(world.tank(PLAYER).unwrap().active_bullets, 0);
}

#[test]
fn test_drop_rate_is_roughly_thirty_percent() {
    let trials = 200;
    let mut dropped = 0;
    for seed in 0..trials {
        let mut world = open_world(seed);
        let (enemy, events) = shoot_enemy_above(&mut world, EnemyType::Regular);
        assert!(killed(&events, enemy));
        dropped += drops(&events);
    }
    let rate = dropped as f64 / trials as f64;
    assert!((0.15..=0.45).contains(&rate), "drop rate {rate}");
}

#[test]
fn test_power_enemy_always_drops() {
    for seed in 0..20 {
        let mut world = open_world(seed);
        let (x, y) = player_position(&world);
        let enemy = idle_enemy(&mut world, EnemyType::Power, x, y - TANK_SIZE - 20.0);
        world.tank_mut(enemy).unwrap().health = 1;
        assert!(world.fire(PLAYER));
        let events = run_until(&mut world, 20, |events| killed(events, enemy));
        assert!(killed(&events, enemy));
        assert_eq!(drops(&events), 1);
    }
}

#[test]
fn test_shielded_enemy_takes_no_damage_and_drops_nothing() {
    let mut world = open_world(3);
    let (x, y) = player_position(&world);
    let enemy = idle_enemy(&mut world, EnemyType::Power, x, y - TANK_SIZE - 20.0);
    world.tank_mut(enemy).unwrap().shield_ticks = 1_000;
    assert!(world.fire(PLAYER));

    let events = run_until(&mut world, 20, |_| false);
    let tank = world.tank(enemy).unwrap();
    assert_eq!(tank.health, tank.max_health);
    assert!(!killed(&events, enemy));
    assert_eq!(drops(&events), 0);
    assert!(world.bullets().is_empty());
}

#[test]
fn test_head_on_bullets_annihilate() {
    let mut world = open_world(4);
    let (x, y) = player_position(&world);
    let enemy = idle_enemy(&mut world, EnemyType::Regular, x, y - 200.0);
    assert_eq!(world.tank(enemy).unwrap().direction, Direction::Down);

    assert!(world.fire(PLAYER));
    assert!(world.fire(enemy));
    let events = run_until(&mut world, 40, |events| {
        events
            .iter()
            .any(|e| matches!(e, GameEvent::BulletsCollided { .. }))
    });

    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::BulletsCollided { .. })));
    assert!(world.bullets().is_empty());
    for id in [PLAYER, enemy] {
        let tank = world.tank(id).unwrap();
        assert!(tank.alive);
        assert_eq!(tank.active_bullets, 0);
        assert_eq!(tank.shoot_cooldown, 0);
    }
}

#[test]
fn test_boss_contact_kill_costs_one_life_despite_shield() {
    let mut world = open_world(5);
    let (x, y) = player_position(&world);
    assert!(world.tank(PLAYER).unwrap().has_shield());

    let boss = idle_enemy(&mut world, EnemyType::Boss, x, y - BOSS_SIZE - 2.0);
    assert_eq!(world.tank(boss).unwrap().direction, Direction::Down);

    let events = run_until(&mut world, 40, |_| false);
    let player = world.tank(PLAYER).unwrap();
    assert_eq!(player.lives, 2);
    let deaths = events
        .iter()
        .filter(|e| matches!(e, GameEvent::TankKilled { victim, .. } if *victim == PLAYER))
        .count();
    assert_eq!(deaths, 1);
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::TankKilled { victim, killer: Some(k), .. } if *victim == PLAYER && *k == boss
    )));
}

fn laser_at_base(in_between: Option<Tile>) -> GameWorld {
    let mut world = open_world(6);
    let (base_row, base_col) = {
        let base = world.layout().base_bounds();
        ((base.y / 32.0) as usize, (base.x / 32.0) as usize)
    };
    if let Some(tile) = in_between {
        world.map_mut().set(base_row - 2, base_col, tile);
    }

    let (x, y) = Layout::cell_origin(base_row - 4, base_col, TANK_SIZE);
    let tank = world.tank_mut(PLAYER).unwrap();
    tank.set_position(x, y);
    tank.direction = Direction::Down;
    tank.laser_duration = 600;
    assert!(world.fire(PLAYER));
    assert_eq!(world.lasers().len(), 1);

    world.tick();
    world
}

#[test]
fn test_laser_destroys_base_in_the_open() {
    let world = laser_at_base(None);
    assert!(!world.base_alive());
    assert_eq!(world.phase(), GamePhase::GameOver);
}

fn assert_base_shielded_from_laser(tile: Tile) {
    let mut world = laser_at_base(Some(tile));
    for _ in 0..30 {
        world.tick();
    }
    assert!(world.base_alive(), "{tile:?} should block the beam");
    assert_eq!(world.phase(), GamePhase::Playing);
    // Lasers pass through terrain without breaking it
    let base = world.layout().base_bounds();
    let (row, col) = ((base.y / 32.0) as usize, (base.x / 32.0) as usize);
    assert_eq!(world.map().get(row as isize - 2, col as isize), tile);
}

#[test]
fn test_steel_shields_base_from_laser() {
    assert_base_shielded_from_laser(Tile::Steel);
}

#[test]
fn test_ground_shields_base_from_laser() {
    assert_base_shielded_from_laser(Tile::Ground);
}
