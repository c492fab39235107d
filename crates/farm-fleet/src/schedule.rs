//! Farming cycle arithmetic
//!
//! Pure functions: given the backend's `FarmInfo` and a "now" in whole epoch
//! seconds, decide what the loop does next and how long it sleeps. The loop
//! captures "now" once per iteration, before any mutating call, and every
//! sleep in that iteration is measured against it.

use std::time::Duration;

use timefarm_api::{ActiveCycle, FarmInfo};

/// Source of the current time in whole seconds since the epoch.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// What one iteration does after reading the farm state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No cycle running: start one.
    Start,
    /// The running cycle has finished: claim it, then start a new one.
    ClaimAndStart,
    /// The running cycle finishes later: sleep for the remainder.
    Wait(Duration),
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Start => "start",
            Decision::ClaimAndStart => "claim_and_start",
            Decision::Wait(_) => "wait",
        }
    }
}

/// Epoch second at which `cycle` becomes claimable.
///
/// The start time is taken at millisecond precision, the reward duration is
/// added, and the sum is floored.
pub fn completion_time(cycle: &ActiveCycle) -> i64 {
    let started = cycle.started_at.timestamp_millis() as f64 / 1000.0;
    (started + cycle.duration_secs).floor() as i64
}

/// `max(0, completion - now)` as a duration.
pub fn remaining(completion: i64, now: i64) -> Duration {
    Duration::from_secs(completion.saturating_sub(now).max(0) as u64)
}

/// Decide the next step for the observed farm state.
pub fn decide(info: &FarmInfo, now: i64) -> Decision {
    match info.active_cycle() {
        None => Decision::Start,
        Some(cycle) => {
            let completion = completion_time(&cycle);
            if completion <= now {
                Decision::ClaimAndStart
            } else {
                Decision::Wait(remaining(completion, now))
            }
        }
    }
}

/// Sleep until the cycle in `info` completes, measured from `now`.
///
/// `None` if `info` shows no running cycle.
pub fn sleep_until_complete(info: &FarmInfo, now: i64) -> Option<Duration> {
    info.active_cycle()
        .map(|cycle| remaining(completion_time(&cycle), now))
}
