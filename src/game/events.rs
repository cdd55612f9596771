//! Per-tick game events and the fire-and-forget audio boundary

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::powerup::PowerUpKind;
use super::tank::{EnemyType, TankId};

/// Something a renderer or remote peer should know happened this tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    LevelStarted {
        level: u32,
    },
    EnemySpawned {
        tank: TankId,
        enemy_type: EnemyType,
    },
    BossSpawned {
        tank: TankId,
        health: u32,
    },
    PlayerRespawned {
        tank: TankId,
        player: u8,
    },
    TankDamaged {
        tank: TankId,
        remaining: u32,
    },
    TankKilled {
        victim: TankId,
        /// Tank credited with the kill, if any
        killer: Option<TankId>,
        enemy_type: Option<EnemyType>,
        x: f32,
        y: f32,
    },
    BaseDestroyed,
    BulletsCollided {
        first: u32,
        second: u32,
    },
    TileDestroyed {
        row: usize,
        col: usize,
    },
    TreeIgnited {
        row: usize,
        col: usize,
    },
    PowerUpSpawned {
        id: u32,
        kind: PowerUpKind,
        x: f32,
        y: f32,
    },
    PowerUpCollected {
        id: u32,
        kind: PowerUpKind,
        collector: TankId,
    },
    PowerUpExpired {
        id: u32,
    },
    UfoSpawned {
        x: f32,
        y: f32,
    },
    UfoDestroyed {
        killer: Option<TankId>,
    },
    UfoEscaped,
    EasterEggSpawned {
        id: u32,
        x: f32,
        y: f32,
    },
    EasterEggCollected {
        collector: TankId,
    },
    LevelComplete {
        level: u32,
    },
    GameOver {
        level: u32,
    },
}

/// Sounds the simulation asks the audio layer to play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Shoot,
    Laser,
    Explosion,
    BrickHit,
    SteelHit,
    TreeBurn,
    PowerUpSpawn,
    PowerUpCollect,
    BaseDestroyed,
    UfoAppear,
    Victory,
    GameOver,
}

/// Audio collaborator. Calls are fire-and-forget; implementations must not
/// block the tick and nothing they do feeds back into the simulation.
pub trait AudioSink: Send + Sync {
    fn play(&self, cue: SoundCue);
}

/// Sink that drops every cue (headless servers)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&self, _cue: SoundCue) {}
}

/// Collects the events of the current tick and forwards sound cues
pub struct EventBus {
    events: Vec<GameEvent>,
    audio: Arc<dyn AudioSink>,
}

impl EventBus {
    pub fn new(audio: Arc<dyn AudioSink>) -> Self {
        Self {
            events: Vec::new(),
            audio,
        }
    }

    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn play(&self, cue: SoundCue) {
        self.audio.play(cue);
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Take everything recorded since the last drain
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Arc::new(NullAudio))
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<SoundCue>>);

    impl AudioSink for Recorder {
        fn play(&self, cue: SoundCue) {
            self.0.lock().push(cue);
        }
    }

    #[test]
    fn test_drain_empties_bus() {
        let mut bus = EventBus::default();
        bus.push(GameEvent::BaseDestroyed);
        bus.push(GameEvent::UfoEscaped);
        assert_eq!(bus.events().len(), 2);
        assert_eq!(bus.drain(), vec![GameEvent::BaseDestroyed, GameEvent::UfoEscaped]);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn test_cues_reach_sink() {
        let recorder = Arc::new(Recorder::default());
        let bus = EventBus::new(recorder.clone());
        bus.play(SoundCue::Shoot);
        bus.play(SoundCue::Explosion);
        assert_eq!(*recorder.0.lock(), vec![SoundCue::Shoot, SoundCue::Explosion]);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_string(&GameEvent::LevelComplete { level: 3 }).unwrap();
        assert_eq!(json, r#"{"type":"level_complete","level":3}"#);
    }
}
