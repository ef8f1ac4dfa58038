use std::fmt;

/// Lifecycle of a [`SerializedExecutor`](super::SerializedExecutor).
///
/// Transitions are monotonic: `Running -> Completing -> Completed`, or
/// `Running -> Completed` directly on cancellation or worker failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorState {
    /// Accepting and executing operations.
    Running,
    /// No longer accepting operations; the queue is still being drained.
    Completing,
    /// Terminal. The worker has stopped.
    Completed,
}

impl ExecutorState {
    pub fn is_accepting(self) -> bool {
        matches!(self, ExecutorState::Running)
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutorState::Running => "running",
            ExecutorState::Completing => "completing",
            ExecutorState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// How a completed executor reached [`ExecutorState::Completed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// `complete()` was requested (or every handle dropped) and the queue drained.
    Drained,
    /// The cancellation context fired; undrained operations resolved as cancelled.
    Cancelled,
    /// A light operation failed or a panic escaped the worker.
    Faulted(String),
}

/// Value published on the executor's status channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Status {
    pub(crate) state: ExecutorState,
    pub(crate) termination: Option<Termination>,
}

impl Status {
    pub(crate) fn running() -> Self {
        Self {
            state: ExecutorState::Running,
            termination: None,
        }
    }
}
