//! Time utilities for the simulation clock

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // 60 ticks per second
pub const DEFAULT_SNAPSHOT_TPS: u32 = 20; // 20 snapshots per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Wall-clock duration of a single tick
pub fn tick_duration() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}

/// Convert seconds of game time into whole ticks
pub const fn secs_to_ticks(secs: u32) -> u32 {
    secs * SIMULATION_TPS
}

/// Number of simulation ticks between two snapshots for a given snapshot rate.
/// Rates above the simulation rate collapse to one snapshot per tick.
pub fn snapshot_interval(snapshot_tps: u32) -> u32 {
    if snapshot_tps == 0 {
        return SIMULATION_TPS;
    }
    (SIMULATION_TPS / snapshot_tps).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_interval() {
        assert_eq!(snapshot_interval(20), 3);
        assert_eq!(snapshot_interval(60), 1);
        assert_eq!(snapshot_interval(120), 1);
        assert_eq!(snapshot_interval(0), SIMULATION_TPS);
    }

    #[test]
    fn test_secs_to_ticks() {
        assert_eq!(secs_to_ticks(10), 600);
        assert_eq!(tick_duration().as_micros(), 16_666);
    }
}
