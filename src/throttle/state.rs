use serde::Serialize;
use std::fmt;

/// Lifecycle of a [`ThrottlingBatcher`](super::ThrottlingBatcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleLifecycleState {
    /// Buffering only; no ticks are scheduled.
    Idle,
    /// Pumping bursts to the sink.
    Active,
    /// Draining the queue before completing the executor.
    Completing,
    /// Terminal.
    Completed,
}

impl ThrottleLifecycleState {
    pub(crate) fn from_flags(active: bool, completing: bool) -> Self {
        match (active, completing) {
            (_, true) => ThrottleLifecycleState::Completing,
            (true, false) => ThrottleLifecycleState::Active,
            (false, false) => ThrottleLifecycleState::Idle,
        }
    }
}

impl fmt::Display for ThrottleLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThrottleLifecycleState::Idle => "idle",
            ThrottleLifecycleState::Active => "active",
            ThrottleLifecycleState::Completing => "completing",
            ThrottleLifecycleState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a batcher, taken on its worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThrottleSnapshot {
    pub state: ThrottleLifecycleState,
    /// Messages waiting in the incoming queue.
    pub queued: usize,
    pub burst_size: usize,
    pub tick_interval_ms: u64,
    pub dedup_enabled: bool,
    pub has_sink: bool,
    /// Ticks that ran while active.
    pub ticks: u64,
    /// Messages handed to a sink.
    pub delivered: u64,
    /// Messages discarded as in-burst duplicates.
    pub duplicates_dropped: u64,
}
