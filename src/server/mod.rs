//! Headless server loop: fixed-rate ticking, input capture and snapshot fan-out

pub mod input;
pub mod protocol;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::events::GameEvent;
use crate::game::snapshot::SnapshotBuilder;
use crate::game::GameWorld;
use crate::util::time::{snapshot_interval, tick_duration, unix_millis};

pub use self::input::{InputQueue, PlayerCommand};
pub use self::protocol::{ClientMsg, ServerMsg};

/// Snapshots buffered per subscriber before it starts lagging
const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// Cloneable handle to a running server loop
#[derive(Clone)]
pub struct ServerHandle {
    session_id: Uuid,
    seed: u64,
    inputs: Arc<InputQueue>,
    snapshot_tx: broadcast::Sender<Arc<ServerMsg>>,
    stop_tx: Arc<watch::Sender<bool>>,
    resync: Arc<AtomicBool>,
}

impl ServerHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Queue a command for the next tick; false if it was dropped
    pub fn submit(&self, command: PlayerCommand) -> bool {
        if self.is_stopped() {
            return false;
        }
        self.inputs.push(command)
    }

    /// Parse and queue a raw client message
    pub fn submit_json(&self, raw: &str) -> Result<bool, serde_json::Error> {
        let msg = ClientMsg::from_json(raw)?;
        Ok(self.submit(msg.into()))
    }

    /// Receive every snapshot from now on. The next snapshot carries the
    /// full terrain grid.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ServerMsg>> {
        self.resync.store(true, Ordering::Release);
        self.snapshot_tx.subscribe()
    }

    pub fn welcome(&self) -> ServerMsg {
        ServerMsg::Welcome {
            session_id: self.session_id,
            seed: self.seed,
            server_time: unix_millis(),
        }
    }

    /// Ask the loop to stop at the next tick boundary. Safe to call repeatedly.
    pub fn stop(&self) {
        let changed = self.stop_tx.send_if_modified(|stopped| !std::mem::replace(stopped, true));
        if changed {
            info!(session_id = %self.session_id, "Stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

/// The authoritative loop that owns the world
pub struct GameServer {
    session_id: Uuid,
    world: GameWorld,
    inputs: Arc<InputQueue>,
    snapshot_tx: broadcast::Sender<Arc<ServerMsg>>,
    stop_rx: watch::Receiver<bool>,
    resync: Arc<AtomicBool>,
    snapshot_builder: SnapshotBuilder,
    /// Events since the last broadcast snapshot
    pending_events: Vec<GameEvent>,
}

impl GameServer {
    pub fn new(world: GameWorld, snapshot_tps: u32) -> (Self, ServerHandle) {
        Self::with_session_id(world, snapshot_tps, Uuid::new_v4())
    }

    pub fn with_session_id(world: GameWorld, snapshot_tps: u32, session_id: Uuid) -> (Self, ServerHandle) {
        let inputs = Arc::new(InputQueue::new());
        let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        let resync = Arc::new(AtomicBool::new(false));

        let handle = ServerHandle {
            session_id,
            seed: world.config().seed,
            inputs: inputs.clone(),
            snapshot_tx: snapshot_tx.clone(),
            stop_tx: Arc::new(stop_tx),
            resync: resync.clone(),
        };

        let server = Self {
            session_id,
            world,
            inputs,
            snapshot_tx,
            stop_rx,
            resync,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval(snapshot_tps)),
            pending_events: Vec::new(),
        };

        (server, handle)
    }

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    /// Direct world access between ticks
    pub fn world_mut(&mut self) -> &mut GameWorld {
        &mut self.world
    }

    /// Run the authoritative tick loop until stopped
    pub async fn run(mut self) -> GameWorld {
        info!(
            session_id = %self.session_id,
            seed = self.world.config().seed,
            level = self.world.level(),
            "Server loop started"
        );

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *self.stop_rx.borrow() {
                break;
            }
            tokio::select! {
                changed = self.stop_rx.changed() => {
                    // All handles dropped: nobody can stop us or submit input
                    if changed.is_err() {
                        info!(session_id = %self.session_id, "All handles dropped");
                        break;
                    }
                    continue;
                }
                _ = tick_interval.tick() => {}
            }

            self.step();
        }

        if self.snapshot_tx.send(Arc::new(ServerMsg::Shutdown)).is_err() {
            debug!(session_id = %self.session_id, "Shutdown without subscribers");
        }
        info!(
            session_id = %self.session_id,
            tick = self.world.tick_count(),
            "Server loop stopped"
        );
        self.world
    }

    /// One full tick: apply queued input, advance the world, broadcast a
    /// snapshot when one is due. Returns whether a snapshot went out.
    pub fn step(&mut self) -> bool {
        for command in self.inputs.drain() {
            match command {
                PlayerCommand::Input { player, input } => self.world.apply_input(player, input),
                PlayerCommand::Leave { player } => self.world.disconnect(player),
            }
        }

        let events = self.world.tick();
        self.pending_events.extend(events);

        if self.resync.swap(false, Ordering::AcqRel) {
            self.snapshot_builder.request_full();
        }
        if self.world.level_changed() {
            self.snapshot_builder.force_next();
        }
        if !self.snapshot_builder.should_send() {
            return false;
        }

        let state = self.snapshot_builder.build(&mut self.world);
        let msg = ServerMsg::Snapshot {
            tick: self.world.tick_count(),
            state,
            events: std::mem::take(&mut self.pending_events),
        };
        // No subscribers is fine; the snapshot is simply dropped
        if self.snapshot_tx.send(Arc::new(msg)).is_err() {
            debug!(tick = self.world.tick_count(), "Snapshot without subscribers");
        }
        true
    }
}
