use super::config::{Dedup, ThrottleConfig};
use super::sink::MessageSink;
use super::state::{ThrottleLifecycleState, ThrottleSnapshot};
use crate::executor::{ExecutorState, SerializedExecutor, Submission, WeakExecutor};
use crate::Result;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

type ExecutorHandle<M> = WeakExecutor<ThrottleState<M>>;

/// Upper bound on the burst buffer's up-front allocation. Larger bursts grow
/// the buffer on demand.
const MAX_PREALLOCATED_BURST: usize = 1024;

fn burst_capacity(burst_size: usize) -> usize {
    burst_size.min(MAX_PREALLOCATED_BURST)
}

/// Worker-owned state of a batcher. Only ever touched by executor operations.
struct ThrottleState<M> {
    config: ThrottleConfig,
    dedup: Dedup<M>,
    sink: Option<Box<dyn MessageSink<M>>>,
    incoming: VecDeque<M>,
    // Reused every tick; empty between ticks.
    outgoing: Vec<M>,
    active: bool,
    completing: bool,
    // Bumped by every start so ticks scheduled before a stop/start pair die out.
    generation: u64,
    ticks: u64,
    delivered: u64,
    duplicates_dropped: u64,
    lifecycle: watch::Sender<ThrottleLifecycleState>,
}

impl<M: Send + 'static> ThrottleState<M> {
    fn new(
        config: ThrottleConfig,
        sink: Option<Box<dyn MessageSink<M>>>,
        lifecycle: watch::Sender<ThrottleLifecycleState>,
    ) -> Self {
        let outgoing = Vec::with_capacity(burst_capacity(config.burst_size));
        Self {
            config,
            dedup: Dedup::Disabled,
            sink,
            incoming: VecDeque::new(),
            outgoing,
            active: false,
            completing: false,
            generation: 0,
            ticks: 0,
            delivered: 0,
            duplicates_dropped: 0,
            lifecycle,
        }
    }

    fn lifecycle_state(&self) -> ThrottleLifecycleState {
        ThrottleLifecycleState::from_flags(self.active, self.completing)
    }

    fn publish(&self) {
        self.lifecycle.send_replace(self.lifecycle_state());
    }

    fn set_burst_size(&mut self, burst_size: usize) {
        self.config.burst_size = burst_size;
        let capacity = burst_capacity(burst_size);
        self.outgoing.shrink_to(capacity);
        self.outgoing.reserve_exact(capacity);
    }

    /// One delivery step. Returns true when a pending completion should now
    /// complete the executor.
    fn send_messages(&mut self) -> bool {
        if !self.active {
            return false;
        }
        if let Some(sink) = self.sink.as_mut() {
            let burst_size = self.config.burst_size;
            while self.outgoing.len() < burst_size {
                let Some(message) = self.incoming.pop_front() else {
                    break;
                };
                if self.dedup.is_duplicate(&self.outgoing, &message) {
                    self.duplicates_dropped += 1;
                    continue;
                }
                self.outgoing.push(message);
            }
            self.delivered += self.outgoing.len() as u64;
            for message in self.outgoing.drain(..) {
                sink.push(message);
            }
        }
        self.completing && self.incoming.is_empty()
    }

    fn tick(&mut self, executor: ExecutorHandle<M>, generation: u64) {
        if generation != self.generation || !self.active {
            trace!(generation, "stale pump tick ignored");
            return;
        }
        self.ticks += 1;
        if self.send_messages() {
            debug!(ticks = self.ticks, delivered = self.delivered, "queue drained; completing");
            complete_executor(&executor);
            return;
        }
        schedule_tick(executor, generation, self.config.tick_interval());
    }

    fn snapshot(&self) -> ThrottleSnapshot {
        ThrottleSnapshot {
            state: self.lifecycle_state(),
            queued: self.incoming.len(),
            burst_size: self.config.burst_size,
            tick_interval_ms: self.config.tick_interval_ms,
            dedup_enabled: self.dedup.is_enabled(),
            has_sink: self.sink.is_some(),
            ticks: self.ticks,
            delivered: self.delivered,
            duplicates_dropped: self.duplicates_dropped,
        }
    }
}

fn complete_executor<M>(executor: &ExecutorHandle<M>) {
    if let Some(executor) = executor.upgrade() {
        executor.complete();
    }
}

/// Queue the next tick now, or after `delay` without holding the worker.
fn schedule_tick<M: Send + 'static>(executor: ExecutorHandle<M>, generation: u64, delay: Duration) {
    if delay.is_zero() {
        enqueue_tick(&executor, generation);
        return;
    }
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        enqueue_tick(&executor, generation);
    });
}

fn enqueue_tick<M: Send + 'static>(executor: &ExecutorHandle<M>, generation: u64) {
    let Some(strong) = executor.upgrade() else {
        trace!("batcher dropped; pump stopped");
        return;
    };
    let next = executor.clone();
    let submitted = strong.submit_light(move |state, _| {
        state.tick(next, generation);
        Ok(())
    });
    if let Err(err) = submitted {
        trace!(error = %err, "pump tick rejected");
    }
}

/// Buffers messages and releases them to a sink in bounded bursts at a fixed
/// cadence, optionally dropping duplicates within each burst.
///
/// Every method is a submission to the batcher's own [`SerializedExecutor`],
/// so posts, configuration changes and delivery ticks apply in call order and
/// never overlap. Methods never block and never fail; calls made after the
/// batcher has completed are ignored.
///
/// ```rust
/// use serial_actor::throttle::{CollectingSink, ThrottleConfig, ThrottlingBatcher};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> serial_actor::Result<()> {
/// let sink = CollectingSink::new();
/// let batcher = ThrottlingBatcher::new(
///     ThrottleConfig::new(2, Duration::from_millis(10)),
///     sink.clone(),
/// );
/// for i in 0..5 {
///     batcher.post(i);
/// }
/// batcher.start();
/// batcher.complete();
/// batcher.completion().await?;
/// assert_eq!(sink.items(), vec![0, 1, 2, 3, 4]);
/// # Ok(())
/// # }
/// ```
pub struct ThrottlingBatcher<M> {
    executor: SerializedExecutor<ThrottleState<M>>,
    lifecycle: watch::Receiver<ThrottleLifecycleState>,
}

impl<M> Clone for ThrottlingBatcher<M> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<M: Send + 'static> ThrottlingBatcher<M> {
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new<K>(config: ThrottleConfig, sink: K) -> Self
    where
        K: MessageSink<M> + 'static,
    {
        Self::build(config, Some(Box::new(sink)), CancellationToken::new())
    }

    /// A batcher with no sink yet; messages accumulate until one is set.
    pub fn detached(config: ThrottleConfig) -> Self {
        Self::build(config, None, CancellationToken::new())
    }

    /// Cancelling `token` stops the batcher immediately; undelivered messages are dropped.
    pub fn with_cancellation<K>(config: ThrottleConfig, sink: K, token: CancellationToken) -> Self
    where
        K: MessageSink<M> + 'static,
    {
        Self::build(config, Some(Box::new(sink)), token)
    }

    fn build(
        config: ThrottleConfig,
        sink: Option<Box<dyn MessageSink<M>>>,
        token: CancellationToken,
    ) -> Self {
        if let Err(err) = config.validate() {
            warn!(error = %err, "invalid throttle config; clamping");
        }
        let (tx, rx) = watch::channel(ThrottleLifecycleState::Idle);
        let state = ThrottleState::new(config.normalized(), sink, tx);
        Self {
            executor: SerializedExecutor::with_cancellation(state, token),
            lifecycle: rx,
        }
    }

    fn apply<F>(&self, operation: &'static str, f: F)
    where
        F: FnOnce(&mut ThrottleState<M>) + Send + 'static,
    {
        let submitted = self.executor.submit_light(move |state, _| {
            f(state);
            Ok(())
        });
        if let Err(err) = submitted {
            debug!(operation, error = %err, "batcher operation ignored");
        }
    }

    /// Append a message to the incoming queue.
    pub fn post(&self, message: M) {
        self.apply("post", move |state| state.incoming.push_back(message));
    }

    /// Begin pumping. Ignored while already active or completing.
    pub fn start(&self) {
        let executor = self.executor.downgrade();
        self.apply("start", move |state| {
            if state.active || state.completing {
                return;
            }
            state.active = true;
            state.generation += 1;
            state.publish();
            debug!(generation = state.generation, queued = state.incoming.len(), "pump started");
            schedule_tick(executor, state.generation, Duration::ZERO);
        });
    }

    /// Halt pumping after any in-flight tick. Queued messages are kept and a
    /// later [`start`](Self::start) resumes delivering them. Stopping while
    /// completing completes the batcher right away.
    pub fn stop(&self) {
        let executor = self.executor.downgrade();
        self.apply("stop", move |state| {
            state.active = false;
            state.publish();
            debug!(queued = state.incoming.len(), "pump stopped");
            if state.completing {
                complete_executor(&executor);
            }
        });
    }

    /// Request graceful shutdown. When idle the batcher completes at once and
    /// still-queued messages are never delivered; when active it completes
    /// after a tick finds the incoming queue empty.
    pub fn complete(&self) {
        let executor = self.executor.downgrade();
        self.apply("complete", move |state| {
            state.completing = true;
            state.publish();
            if !state.active {
                complete_executor(&executor);
            }
        });
    }

    /// Takes effect from the next scheduled tick.
    pub fn set_tick_interval(&self, interval: Duration) {
        self.apply("set_tick_interval", move |state| {
            state.config = state.config.clone().with_tick_interval(interval);
        });
    }

    /// Takes effect from the next tick. Zero is clamped to one.
    pub fn set_burst_size(&self, burst_size: usize) {
        let burst_size = if burst_size == 0 {
            warn!("burst_size 0 requested; using 1");
            1
        } else {
            burst_size
        };
        self.apply("set_burst_size", move |state| state.set_burst_size(burst_size));
    }

    pub fn set_dedup(&self, dedup: Dedup<M>) {
        self.apply("set_dedup", move |state| state.dedup = dedup);
    }

    /// Replace the sink. The next delivered burst goes to `sink`.
    pub fn set_sink<K>(&self, sink: K)
    where
        K: MessageSink<M> + 'static,
    {
        let sink: Box<dyn MessageSink<M>> = Box::new(sink);
        self.apply("set_sink", move |state| state.sink = Some(sink));
    }

    /// Remove the sink; messages accumulate until a new one is set.
    pub fn clear_sink(&self) {
        self.apply("clear_sink", |state| state.sink = None);
    }

    /// Snapshot taken in order with previously submitted calls.
    pub fn snapshot(&self) -> Submission<ThrottleSnapshot> {
        self.executor.submit_action(|state, _| state.snapshot())
    }

    pub fn state(&self) -> ThrottleLifecycleState {
        if self.executor.state() == ExecutorState::Completed {
            ThrottleLifecycleState::Completed
        } else {
            *self.lifecycle.borrow()
        }
    }

    /// Resolves once the underlying executor has completed.
    pub fn completion(&self) -> impl Future<Output = Result<()>> + Send + 'static {
        self.executor.completion()
    }
}
