//! Inbound input queue: the only cross-thread mutation point of the world

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::MAX_PLAYERS;
use crate::game::PlayerInput;
use crate::util::rate_limit::{PlayerRateLimiter, INPUT_RATE_LIMIT};

use super::protocol::ClientMsg;

/// A validated command waiting for the next tick
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Input { player: u8, input: PlayerInput },
    Leave { player: u8 },
}

impl PlayerCommand {
    pub fn player(&self) -> u8 {
        match self {
            PlayerCommand::Input { player, .. } | PlayerCommand::Leave { player } => *player,
        }
    }
}

impl From<ClientMsg> for PlayerCommand {
    fn from(msg: ClientMsg) -> Self {
        match msg {
            ClientMsg::Input { player, input } => PlayerCommand::Input { player, input },
            ClientMsg::Leave { player } => PlayerCommand::Leave { player },
        }
    }
}

/// Commands captured between ticks, drained atomically at tick start
pub struct InputQueue {
    pending: Mutex<Vec<PlayerCommand>>,
    limiters: DashMap<u8, PlayerRateLimiter>,
    rate: u32,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::with_rate(INPUT_RATE_LIMIT)
    }

    pub fn with_rate(rate: u32) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            limiters: DashMap::new(),
            rate,
        }
    }

    /// Queue a command. Unknown player numbers and input over the per-player
    /// rate are dropped; leaving is never rate limited.
    pub fn push(&self, command: PlayerCommand) -> bool {
        let player = command.player();
        if player == 0 || player > MAX_PLAYERS {
            debug!(player, "Command for invalid player dropped");
            return false;
        }

        if matches!(command, PlayerCommand::Input { .. }) {
            let allowed = self
                .limiters
                .entry(player)
                .or_insert_with(|| PlayerRateLimiter::with_rate(self.rate))
                .check_input();
            if !allowed {
                debug!(player, "Rate limited input");
                return false;
            }
        }

        self.pending.lock().push(command);
        true
    }

    /// Take everything queued so far, in arrival order
    pub fn drain(&self) -> Vec<PlayerCommand> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}
