//! The authoritative world: owns every entity and runs the tick pipeline

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{GameConfig, MAX_PLAYERS};

use super::ai::{AiView, EnemyAi};
use super::combat::{Battlefield, Bullet, CombatReport, CombatSystem, IdCounter, Laser, Shot};
use super::effects::EffectManager;
use super::events::{AudioSink, EventBus, GameEvent, SoundCue};
use super::geometry::{BoundedEntity, Bounds};
use super::layout::Layout;
use super::level_gen;
use super::map::TileMap;
use super::physics::{MoveContext, MoveReport, Obstacle, PhysicsSystem};
use super::powerup::{
    apply_pickup, EasterEgg, PowerUp, PowerUpKind, TeamEffect, DROP_CHANCE, PICKUP_SCORE, POWER_UP_SIZE,
};
use super::spawner::EnemySpawner;
use super::tank::{DamageResult, EnemyStats, EnemyType, Tank, TankId, TANK_SIZE};
use super::tile::Tile;
use super::ufo::{Ufo, UfoManager, MACHINEGUN_KILLS_FOR_UFO, UFO_KILL_SCORE};
use super::PlayerInput;

/// Random source owned by the world
pub type GameRng = ChaCha8Rng;

const MAX_NICKNAME_LEN: usize = 16;
const DROP_PLACEMENT_ATTEMPTS: usize = 32;
/// Enemy ids start after the player ids
const FIRST_ENEMY_ID: u32 = MAX_PLAYERS as u32 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Playing,
    LevelComplete,
    GameOver,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub kills: u32,
    pub score: u32,
    /// Score earned in the current level
    pub level_score: u32,
    /// Kills per enemy type, indexed by [`EnemyType::index`]
    pub kills_by_type: [u32; 6],
}

impl PlayerStats {
    pub fn add_score(&mut self, points: u32) {
        self.score += points;
        self.level_score += points;
    }

    pub fn record_kill(&mut self, enemy_type: EnemyType, points: u32) {
        self.kills += 1;
        self.kills_by_type[enemy_type.index()] += 1;
        self.add_score(points);
    }
}

/// A player seat and its tank
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub number: u8,
    pub tank: TankId,
    pub nickname: String,
    pub connected: bool,
    pub paused: bool,
    pub stats: PlayerStats,
    input: PlayerInput,
}

impl PlayerSlot {
    fn new(number: u8) -> Self {
        Self {
            number,
            tank: TankId(u32::from(number)),
            nickname: format!("Player {number}"),
            connected: true,
            paused: false,
            stats: PlayerStats::default(),
            input: PlayerInput::default(),
        }
    }
}

pub struct GameWorld {
    config: GameConfig,
    level: u32,
    phase: GamePhase,
    tick: u64,
    map: TileMap,
    layout: Layout,
    base_alive: bool,
    tanks: Vec<Tank>,
    bullets: Vec<Bullet>,
    lasers: Vec<Laser>,
    power_ups: Vec<PowerUp>,
    easter_eggs: Vec<EasterEgg>,
    effects: EffectManager,
    spawner: EnemySpawner,
    ufo: UfoManager,
    players: Vec<PlayerSlot>,
    ids: IdCounter,
    next_tank_id: u32,
    rng: GameRng,
    events: EventBus,
    /// Set on level start until the next sync checkpoint
    level_changed: bool,
}

impl GameWorld {
    pub fn new(config: GameConfig) -> Self {
        let rng = GameRng::seed_from_u64(config.seed);
        Self::with_rng(config, rng)
    }

    /// Build a world with an injected random source
    pub fn with_rng(config: GameConfig, rng: GameRng) -> Self {
        let (width, height) = (config.map_width, config.map_height);
        let config = config.with_map_size(width, height);
        if (config.map_width, config.map_height) != (width, height) {
            warn!(
                width,
                height,
                clamped_width = config.map_width,
                clamped_height = config.map_height,
                "Map size out of range, clamped"
            );
        }
        let layout = Layout::new(config.map_width, config.map_height);
        let profile = &config.profile;
        let mut world = Self {
            level: config.start_level.max(1),
            phase: GamePhase::Playing,
            tick: 0,
            map: TileMap::new(config.map_width, config.map_height),
            effects: EffectManager::new(layout.ring_cells()),
            spawner: EnemySpawner::new(
                profile.total_enemies,
                profile.max_enemies_on_screen,
                config.enemy_spawn_delay,
                config.victory_delay,
            ),
            layout,
            base_alive: true,
            tanks: Vec::new(),
            bullets: Vec::new(),
            lasers: Vec::new(),
            power_ups: Vec::new(),
            easter_eggs: Vec::new(),
            ufo: UfoManager::default(),
            players: Vec::new(),
            ids: IdCounter::default(),
            next_tank_id: FIRST_ENEMY_ID,
            rng,
            events: EventBus::default(),
            level_changed: true,
            config,
        };
        world.create_players();
        world.start_level(world.level);
        world
    }

    /// Route sound cues to an audio collaborator
    pub fn set_audio(&mut self, audio: Arc<dyn AudioSink>) {
        let pending = self.events.drain();
        self.events = EventBus::new(audio);
        for event in pending {
            self.events.push(event);
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut TileMap {
        &mut self.map
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn base_alive(&self) -> bool {
        self.base_alive
    }

    pub fn tanks(&self) -> &[Tank] {
        &self.tanks
    }

    pub fn tank(&self, id: TankId) -> Option<&Tank> {
        self.tanks.iter().find(|t| t.id == id)
    }

    pub fn tank_mut(&mut self, id: TankId) -> Option<&mut Tank> {
        self.tanks.iter_mut().find(|t| t.id == id)
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn lasers(&self) -> &[Laser] {
        &self.lasers
    }

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.power_ups
    }

    pub fn easter_eggs(&self) -> &[EasterEgg] {
        &self.easter_eggs
    }

    pub fn ufo(&self) -> Option<&Ufo> {
        self.ufo.ufo()
    }

    pub fn effects(&self) -> &EffectManager {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectManager {
        &mut self.effects
    }

    pub fn spawner(&self) -> &EnemySpawner {
        &self.spawner
    }

    pub fn players(&self) -> &[PlayerSlot] {
        &self.players
    }

    pub fn player(&self, number: u8) -> Option<&PlayerSlot> {
        self.players.iter().find(|p| p.number == number)
    }

    fn slot_index(&self, number: u8) -> Option<usize> {
        self.players.iter().position(|p| p.number == number)
    }

    fn tank_index(&self, id: TankId) -> Option<usize> {
        self.tanks.iter().position(|t| t.id == id)
    }

    fn base_bounds(&self) -> Option<Bounds> {
        self.base_alive.then(|| self.layout.base_bounds())
    }

    /// Enemies still on the board, including any waiting to respawn
    pub fn live_enemies(&self) -> usize {
        self.tanks
            .iter()
            .filter(|t| !t.is_player() && !t.is_eliminated())
            .count()
    }

    pub fn level_changed(&self) -> bool {
        self.level_changed
    }

    /// True once and then false until the next level change; a level change
    /// forces a full terrain refresh
    pub fn take_level_changed(&mut self) -> bool {
        std::mem::take(&mut self.level_changed)
    }

    /// Mark the current terrain as the sync baseline
    pub fn commit_sync(&mut self) {
        self.map.commit();
    }

    // --- Input -------------------------------------------------------------

    /// Apply one player's input for the next tick. Unknown or disconnected
    /// players are ignored.
    pub fn apply_input(&mut self, player: u8, input: PlayerInput) {
        let Some(slot_idx) = self.slot_index(player) else {
            debug!(player, "Input for unknown player ignored");
            return;
        };
        let slot = &mut self.players[slot_idx];
        if !slot.connected {
            return;
        }

        if let Some(name) = input.nickname.as_deref() {
            let name: String = name.trim().chars().take(MAX_NICKNAME_LEN).collect();
            if !name.is_empty() {
                slot.nickname = name;
            }
        }

        let enter_pressed = input.enter && !slot.input.enter;
        slot.input = input;
        if enter_pressed {
            self.handle_enter(slot_idx);
        }
    }

    /// Player left: the tank stays, paused and shielded, for the rest of the session
    pub fn disconnect(&mut self, player: u8) {
        let Some(slot_idx) = self.slot_index(player) else {
            return;
        };
        let slot = &mut self.players[slot_idx];
        if !slot.connected {
            return;
        }
        slot.connected = false;
        slot.paused = true;
        slot.input = PlayerInput::default();
        let tank_id = slot.tank;
        if let Some(tank) = self.tank_mut(tank_id) {
            tank.pause_shield = true;
        }
        info!(player, "Player disconnected");
    }

    fn handle_enter(&mut self, slot_idx: usize) {
        match self.phase {
            GamePhase::Playing => {
                let slot = &mut self.players[slot_idx];
                slot.paused = !slot.paused;
                let (paused, tank_id, number) = (slot.paused, slot.tank, slot.number);
                if let Some(tank) = self.tank_mut(tank_id) {
                    tank.pause_shield = paused;
                }
                debug!(player = number, paused, "Pause toggled");
            }
            GamePhase::LevelComplete => self.start_level(self.level + 1),
            GamePhase::GameOver => self.restart(),
        }
    }

    /// Fire from a tank if it is able; false if nothing was fired
    pub fn fire(&mut self, id: TankId) -> bool {
        match self.tank_index(id) {
            Some(idx) => self.try_fire(idx),
            None => false,
        }
    }

    /// Place an enemy directly, outside the spawner's schedule
    pub fn spawn_enemy(&mut self, enemy_type: EnemyType, x: f32, y: f32) -> TankId {
        let id = TankId(self.next_tank_id);
        self.next_tank_id += 1;
        let mut tank = Tank::enemy(id, enemy_type, x, y, self.level);
        tank.temp_speed_boost = self.effects.spawn_boost();
        self.tanks.push(tank);
        id
    }

    // --- Level lifecycle ---------------------------------------------------

    fn create_players(&mut self) {
        self.tanks.retain(|t| !t.is_player());
        self.players.clear();
        for number in 1..=self.config.player_count.clamp(1, MAX_PLAYERS) {
            let slot = PlayerSlot::new(number);
            let (row, col) = self.layout.player_spawn_cell(number);
            let (x, y) = Layout::cell_origin(row, col, TANK_SIZE);
            self.tanks.push(Tank::player(
                slot.tank,
                number,
                x,
                y,
                self.config.player_health,
                self.config.starting_lives,
            ));
            self.players.push(slot);
        }
    }

    /// Regenerate the map for `level` and reset everything that is per level.
    /// Surviving players keep their modifiers.
    fn start_level(&mut self, level: u32) {
        let profile = &self.config.profile;
        let seed = level_gen::level_seed(self.config.seed, level, profile);
        self.level = level;
        self.map = level_gen::generate(self.config.map_width, self.config.map_height, seed, profile);
        self.layout = Layout::new(self.config.map_width, self.config.map_height);
        self.base_alive = true;
        self.bullets.clear();
        self.lasers.clear();
        self.power_ups.clear();
        self.easter_eggs.clear();
        self.ids.reset();
        self.effects = EffectManager::new(self.layout.ring_cells());
        self.spawner = EnemySpawner::new(
            profile.total_enemies,
            profile.max_enemies_on_screen,
            self.config.enemy_spawn_delay,
            self.config.victory_delay,
        );
        self.ufo.reset();
        self.tanks.retain(|t| t.is_player());
        self.next_tank_id = FIRST_ENEMY_ID;

        for tank in self.tanks.iter_mut() {
            let (row, col) = self.layout.player_spawn_cell(tank.player_number());
            let (x, y) = Layout::cell_origin(row, col, TANK_SIZE);
            tank.spawn_x = x;
            tank.spawn_y = y;
            tank.active_bullets = 0;
            tank.machinegun_kills = 0;
            tank.temp_speed_boost = 0.0;
            if !tank.is_eliminated() {
                tank.respawn();
            }
        }
        for slot in self.players.iter_mut() {
            slot.stats.level_score = 0;
            if let Some(tank) = self.tanks.iter_mut().find(|t| t.id == slot.tank) {
                tank.pause_shield = slot.paused;
            }
        }

        self.phase = GamePhase::Playing;
        self.level_changed = true;
        self.events.push(GameEvent::LevelStarted { level });
        info!(level, seed, difficulty = ?self.config.profile.difficulty, "Level started");
    }

    /// Start the current level over with fresh players
    pub fn restart(&mut self) {
        let seats: Vec<(u8, bool, String)> = self
            .players
            .iter()
            .map(|p| (p.number, p.connected, p.nickname.clone()))
            .collect();
        self.create_players();
        for (number, connected, nickname) in seats {
            if let Some(slot) = self.players.iter_mut().find(|p| p.number == number) {
                slot.connected = connected;
                slot.paused = !connected;
                slot.nickname = nickname;
            }
        }
        info!(level = self.level, "Game restarted");
        self.start_level(self.level);
    }

    // --- Tick pipeline -----------------------------------------------------

    /// Advance the world one tick and return what happened
    pub fn tick(&mut self) -> Vec<GameEvent> {
        self.tick += 1;
        if self.phase == GamePhase::Playing {
            self.step();
        }
        self.events.drain()
    }

    fn step(&mut self) {
        for (row, col) in self.map.tick() {
            self.events.push(GameEvent::TileDestroyed { row, col });
        }
        self.effects.tick(&mut self.map, &mut self.tanks);
        self.tick_tank_timers();
        self.update_players();
        self.update_enemies();
        self.update_ufo();
        self.update_projectiles();
        self.update_pickups();
        self.admit_enemies();
        self.tanks.retain(|t| t.is_player() || !t.is_eliminated());
        self.check_end_conditions();
    }

    fn tick_tank_timers(&mut self) {
        for tank in self.tanks.iter_mut() {
            if tank.tick_timers() && tank.is_player() {
                self.events.push(GameEvent::PlayerRespawned {
                    tank: tank.id,
                    player: tank.player_number(),
                });
            }
        }
    }

    fn obstacles(&self) -> Vec<Obstacle> {
        self.tanks
            .iter()
            .filter(|t| t.is_active())
            .map(|t| Obstacle {
                id: t.id,
                bounds: t.bounds(),
                is_boss: t.is_boss(),
            })
            .collect()
    }

    fn sync_obstacle(obstacles: &mut [Obstacle], tank: &Tank) {
        if let Some(o) = obstacles.iter_mut().find(|o| o.id == tank.id) {
            o.bounds = tank.bounds();
        }
    }

    fn update_players(&mut self) {
        let frozen = self.effects.players_frozen();
        let mut obstacles = self.obstacles();

        for slot_idx in 0..self.players.len() {
            let slot = &self.players[slot_idx];
            if slot.paused || !slot.connected {
                continue;
            }
            let input = slot.input.clone();
            let Some(idx) = self.tank_index(slot.tank) else {
                continue;
            };
            if !self.tanks[idx].is_active() {
                continue;
            }

            if !frozen {
                let base = self.base_bounds();
                let tank = &mut self.tanks[idx];
                let direction = input.direction();
                if direction.is_none() {
                    PhysicsSystem::arm_slide(tank, &self.map);
                }
                let mut ctx = MoveContext {
                    map: &mut self.map,
                    obstacles: &obstacles,
                    base,
                    speed_scale: 1.0,
                };
                match direction {
                    Some(direction) => {
                        tank.slide = None;
                        let report = PhysicsSystem::move_tank(tank, direction, &mut ctx);
                        tank.moved_last_tick = report.moved();
                    }
                    None => {
                        PhysicsSystem::continue_slide(tank, &mut ctx);
                    }
                }
                Self::sync_obstacle(&mut obstacles, &self.tanks[idx]);
            }

            if input.shoot {
                self.try_fire(idx);
            }
        }
    }

    fn update_enemies(&mut self) {
        let frozen = self.effects.enemies_frozen();
        let profile = &self.config.profile;
        let (speed_scale, base_bias, shoot_cooldown) = (
            profile.enemy_speed_multiplier,
            profile.ai_base_bias,
            profile.ai_shoot_cooldown,
        );
        let mut obstacles = self.obstacles();

        for idx in 0..self.tanks.len() {
            if self.tanks[idx].is_player() || !self.tanks[idx].is_active() {
                continue;
            }

            let base = self.base_bounds();
            let view = AiView {
                obstacles: &obstacles,
                base_center: base.map(|b| b.center()),
                frozen,
                base_bias,
                shoot_cooldown,
            };
            let decision = EnemyAi::decide(&mut self.tanks[idx], &view, &mut self.rng);

            if let Some(direction) = decision.direction {
                let tank = &mut self.tanks[idx];
                let mut ctx = MoveContext {
                    map: &mut self.map,
                    obstacles: &obstacles,
                    base,
                    speed_scale,
                };
                let report = PhysicsSystem::move_tank(tank, direction, &mut ctx);
                EnemyAi::observe_move(tank, report.outcome);
                Self::sync_obstacle(&mut obstacles, &self.tanks[idx]);
                self.apply_crush(idx, report, &mut obstacles);
            }

            if decision.fire && self.tanks[idx].is_active() {
                self.try_fire(idx);
            }
        }
    }

    /// Carry out what a Boss flattened on its move
    fn apply_crush(&mut self, boss_idx: usize, report: MoveReport, obstacles: &mut Vec<Obstacle>) {
        let boss = self.tanks[boss_idx].id;
        for &(row, col, _) in &report.tiles_crushed {
            self.events.push(GameEvent::TileDestroyed { row, col });
        }
        for victim in report.crushed {
            let Some(idx) = self.tank_index(victim) else {
                continue;
            };
            if self.tanks[idx].instant_kill() {
                obstacles.retain(|o| o.id != victim);
                self.on_tank_killed(idx, Some(boss), false);
            }
        }
        if report.base_crushed {
            self.destroy_base();
        }
    }

    fn try_fire(&mut self, idx: usize) -> bool {
        match CombatSystem::fire(&mut self.tanks[idx], &mut self.ids, &self.map) {
            Some(Shot::Bullet(bullet)) => {
                self.bullets.push(bullet);
                self.events.play(SoundCue::Shoot);
                true
            }
            Some(Shot::Laser(laser)) => {
                self.lasers.push(laser);
                self.events.play(SoundCue::Laser);
                true
            }
            None => false,
        }
    }

    fn update_ufo(&mut self) {
        let trigger = self
            .tanks
            .iter()
            .position(|t| t.is_player() && t.machinegun_kills >= MACHINEGUN_KILLS_FOR_UFO);
        let (width, height) = (self.map.pixel_width(), self.map.pixel_height());

        if let Some((x, y)) = self.ufo.maybe_spawn(
            self.config.profile.ufo_spawn_chance,
            trigger.is_some(),
            width,
            height,
            &mut self.rng,
        ) {
            if let Some(idx) = trigger {
                self.tanks[idx].machinegun_kills = 0;
            }
            self.events.push(GameEvent::UfoSpawned { x, y });
            self.events.play(SoundCue::UfoAppear);
        }

        let action = self.ufo.tick(width, &mut self.rng);
        if action.escaped {
            debug!("UFO escaped");
            self.events.push(GameEvent::UfoEscaped);
        }
        if action.fire {
            if let Some(ufo) = self.ufo.ufo() {
                let bullet = Bullet::from_ufo(self.ids.next_id(), ufo);
                self.bullets.push(bullet);
            }
        }
    }

    fn update_projectiles(&mut self) {
        let mut field = Battlefield {
            map: &mut self.map,
            tanks: &mut self.tanks,
            ufo: self.ufo.ufo_mut(),
            base: self.base_alive.then(|| self.layout.base_bounds()),
        };
        let mut report = CombatSystem::update_bullets(&mut self.bullets, &mut field);
        report.merge(CombatSystem::update_lasers(&mut self.lasers, &mut field));
        self.apply_combat(report);
    }

    fn apply_combat(&mut self, report: CombatReport) {
        if !report.terrain.destroyed.is_empty() {
            self.events.play(SoundCue::BrickHit);
        }
        for &(row, col, _) in &report.terrain.destroyed {
            self.events.push(GameEvent::TileDestroyed { row, col });
        }
        if !report.terrain.ignited.is_empty() {
            self.events.play(SoundCue::TreeBurn);
        }
        for &(row, col) in &report.terrain.ignited {
            self.events.push(GameEvent::TreeIgnited { row, col });
        }
        if report.armor_hit {
            self.events.play(SoundCue::SteelHit);
        }
        for &(first, second) in &report.collisions {
            self.events.push(GameEvent::BulletsCollided { first, second });
        }

        for hit in &report.hits {
            match hit.result {
                DamageResult::Damaged { remaining } => self.events.push(GameEvent::TankDamaged {
                    tank: hit.victim,
                    remaining,
                }),
                DamageResult::Killed => {
                    if let Some(idx) = self.tank_index(hit.victim) {
                        self.on_tank_killed(idx, hit.attacker, true);
                    }
                }
                DamageResult::Absorbed | DamageResult::Ignored => {}
            }
        }

        if let Some((x, y)) = self.ufo.take_destroyed() {
            let killer = report.ufo_destroyed_by;
            self.events.push(GameEvent::UfoDestroyed { killer });
            self.events.play(SoundCue::Explosion);
            if let Some(number) = killer.and_then(|id| self.tank(id)).map(|t| t.player_number()) {
                if let Some(idx) = self.slot_index(number) {
                    self.players[idx].stats.add_score(UFO_KILL_SCORE);
                }
            }
            let id = self.ids.next_id();
            self.easter_eggs.push(EasterEgg::new(id, x, y));
            self.events.push(GameEvent::EasterEggSpawned { id, x, y });
            info!(x, y, "UFO destroyed");
        }

        if report.base_destroyed {
            self.destroy_base();
        }
    }

    /// Bookkeeping for a tank that just died: events, score, boss reward
    /// and the drop roll
    fn on_tank_killed(&mut self, idx: usize, killer: Option<TankId>, allow_drop: bool) {
        let (victim, enemy_type, x, y) = {
            let tank = &self.tanks[idx];
            (tank.id, tank.enemy_type(), tank.x, tank.y)
        };
        self.events.push(GameEvent::TankKilled {
            victim,
            killer,
            enemy_type,
            x,
            y,
        });
        self.events.play(SoundCue::Explosion);

        let Some(enemy_type) = enemy_type else {
            debug!(tank = victim.0, "Player tank destroyed");
            return;
        };
        if enemy_type == EnemyType::Boss {
            info!(level = self.level, "Boss destroyed");
        }

        let Some(k) = killer
            .and_then(|id| self.tank_index(id))
            .filter(|&k| self.tanks[k].is_player())
        else {
            return;
        };

        let stats = EnemyStats::for_type(enemy_type, self.level);
        let killer_tank = &mut self.tanks[k];
        if killer_tank.machinegun_count > 0 {
            killer_tank.machinegun_kills += 1;
        }
        let (collector, number) = (killer_tank.id, killer_tank.player_number());
        if let Some(slot) = self.slot_index(number) {
            self.players[slot].stats.record_kill(enemy_type, stats.score);
        }

        if enemy_type == EnemyType::Boss {
            let kind = PowerUpKind::random_boss_reward(&mut self.rng);
            let effect = apply_pickup(kind, &mut self.tanks[k]);
            let id = self.ids.next_id();
            self.events.push(GameEvent::PowerUpCollected { id, kind, collector });
            if let Some(effect) = effect {
                self.apply_team_effect(collector, effect);
            }
        }

        if allow_drop && self.roll_drop(enemy_type) {
            self.spawn_power_up(x, y);
        }
    }

    fn roll_drop(&mut self, enemy_type: EnemyType) -> bool {
        EnemyStats::for_type(enemy_type, self.level).always_drops || self.rng.gen_bool(DROP_CHANCE)
    }

    /// Drop a random pickup on a random open tile, falling back to `(x, y)`
    fn spawn_power_up(&mut self, x: f32, y: f32) {
        let (width, height) = (self.map.width(), self.map.height());
        let mut position = (x, y);
        if width > 2 && height > 2 {
            for _ in 0..DROP_PLACEMENT_ATTEMPTS {
                let row = self.rng.gen_range(1..height - 1);
                let col = self.rng.gen_range(1..width - 1);
                if self.map.get(row as isize, col as isize) == Tile::Empty {
                    position = Layout::cell_origin(row, col, POWER_UP_SIZE);
                    break;
                }
            }
        }

        let kind = PowerUpKind::random(&mut self.rng);
        let id = self.ids.next_id();
        let (x, y) = position;
        self.power_ups.push(PowerUp::new(id, kind, x, y));
        self.events.push(GameEvent::PowerUpSpawned { id, kind, x, y });
        self.events.play(SoundCue::PowerUpSpawn);
        debug!(id, ?kind, x, y, "Power-up dropped");
    }

    fn destroy_base(&mut self) {
        if !self.base_alive {
            return;
        }
        self.base_alive = false;
        self.events.push(GameEvent::BaseDestroyed);
        self.events.play(SoundCue::BaseDestroyed);
        info!(level = self.level, tick = self.tick, "Base destroyed");
    }

    fn update_pickups(&mut self) {
        let mut expired = Vec::new();
        self.power_ups.retain_mut(|p| {
            let alive = p.tick();
            if !alive {
                expired.push(p.id);
            }
            alive
        });
        for id in expired {
            self.events.push(GameEvent::PowerUpExpired { id });
        }
        self.easter_eggs.retain_mut(|e| e.tick());

        let mut i = 0;
        while i < self.power_ups.len() {
            let pickup = &self.power_ups[i];
            match self
                .tanks
                .iter()
                .position(|t| t.is_active() && t.overlaps(pickup))
            {
                Some(idx) => {
                    let pickup = self.power_ups.remove(i);
                    self.collect(idx, pickup);
                }
                None => i += 1,
            }
        }

        let mut i = 0;
        while i < self.easter_eggs.len() {
            let egg = &self.easter_eggs[i];
            match self
                .tanks
                .iter()
                .position(|t| t.is_player() && t.is_active() && t.overlaps(egg))
            {
                Some(idx) => {
                    self.easter_eggs.remove(i);
                    EasterEgg::apply(&mut self.tanks[idx]);
                    let collector = self.tanks[idx].id;
                    self.events.push(GameEvent::EasterEggCollected { collector });
                    self.events.play(SoundCue::PowerUpCollect);
                }
                None => i += 1,
            }
        }
    }

    fn collect(&mut self, idx: usize, pickup: PowerUp) {
        let effect = apply_pickup(pickup.kind, &mut self.tanks[idx]);
        let (collector, number) = (self.tanks[idx].id, self.tanks[idx].player_number());
        self.events.push(GameEvent::PowerUpCollected {
            id: pickup.id,
            kind: pickup.kind,
            collector,
        });
        self.events.play(SoundCue::PowerUpCollect);
        if let Some(slot) = self.slot_index(number) {
            self.players[slot].stats.add_score(PICKUP_SCORE);
        }
        debug!(kind = ?pickup.kind, collector = collector.0, "Power-up collected");

        if let Some(effect) = effect {
            self.apply_team_effect(collector, effect);
        }
    }

    fn apply_team_effect(&mut self, collector: TankId, effect: TeamEffect) {
        match effect {
            TeamEffect::ProtectBase => self.effects.protect_base(&mut self.map),
            TeamEffect::StripBase => self.effects.strip_base(&mut self.map),
            TeamEffect::FreezeEnemies => self.effects.freeze_enemies(),
            TeamEffect::FreezePlayers => self.effects.freeze_players(),
            TeamEffect::BombEnemies => self.bomb(collector, false),
            TeamEffect::BombPlayers => self.bomb(collector, true),
            TeamEffect::EnemySpeedBoost { holder } => self.effects.boost_enemies(holder, &mut self.tanks),
        }
    }

    /// Bomb against one side. Against enemies, non-Boss tanks die outright
    /// and a Boss takes one hit; players take one hit each.
    fn bomb(&mut self, collector: TankId, against_players: bool) {
        for idx in 0..self.tanks.len() {
            let tank = &mut self.tanks[idx];
            if tank.is_player() != against_players || !tank.is_active() {
                continue;
            }
            let result = if against_players || tank.is_boss() {
                tank.damage()
            } else if tank.instant_kill() {
                DamageResult::Killed
            } else {
                DamageResult::Ignored
            };
            let killer = (!against_players).then_some(collector);
            match result {
                DamageResult::Killed => self.on_tank_killed(idx, killer, false),
                DamageResult::Damaged { remaining } => self.events.push(GameEvent::TankDamaged {
                    tank: self.tanks[idx].id,
                    remaining,
                }),
                DamageResult::Absorbed | DamageResult::Ignored => {}
            }
        }
    }

    fn admit_enemies(&mut self) {
        let live = self.live_enemies();
        let occupied: Vec<Bounds> = self
            .tanks
            .iter()
            .filter(|t| t.is_active())
            .map(|t| t.bounds())
            .collect();
        let id = TankId(self.next_tank_id);
        let Some(mut tank) = self
            .spawner
            .tick(live, &occupied, &self.layout, self.level, id, &mut self.rng)
        else {
            return;
        };

        self.next_tank_id += 1;
        tank.temp_speed_boost = self.effects.spawn_boost();
        let enemy_type = tank.enemy_type().unwrap_or(EnemyType::Regular);
        self.events.push(GameEvent::EnemySpawned { tank: id, enemy_type });
        if tank.is_boss() {
            info!(level = self.level, health = tank.health, "Boss spawned");
            self.events.push(GameEvent::BossSpawned {
                tank: id,
                health: tank.health,
            });
        }
        self.tanks.push(tank);
    }

    fn players_eliminated(&self) -> bool {
        let mut players = self.tanks.iter().filter(|t| t.is_player()).peekable();
        players.peek().is_some() && players.all(|t| t.is_eliminated())
    }

    fn check_end_conditions(&mut self) {
        if !self.base_alive || self.players_eliminated() {
            self.phase = GamePhase::GameOver;
            self.events.push(GameEvent::GameOver { level: self.level });
            self.events.play(SoundCue::GameOver);
            info!(level = self.level, base_alive = self.base_alive, "Game over");
            return;
        }

        let live = self.live_enemies();
        if self.spawner.update_victory(live) {
            self.phase = GamePhase::LevelComplete;
            self.events.push(GameEvent::LevelComplete { level: self.level });
            self.events.play(SoundCue::Victory);
            info!(level = self.level, "Level complete");
        }
    }
}

impl std::fmt::Debug for GameWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameWorld")
            .field("level", &self.level)
            .field("phase", &self.phase)
            .field("tick", &self.tick)
            .field("tanks", &self.tanks.len())
            .field("bullets", &self.bullets.len())
            .finish_non_exhaustive()
    }
}
