use super::context::OperationContext;
use super::state::{ExecutorState, Status, Termination};
use super::submission::Submission;
use crate::{Error, Result};
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, Instrument};
use uuid::Uuid;

/// What the worker decided to do with a dequeued operation.
enum Disposition<'a, S> {
    Run {
        state: &'a mut S,
        ctx: &'a OperationContext,
    },
    Cancel,
}

type Job<S> = Box<dyn for<'a> FnOnce(Disposition<'a, S>) -> Result<()> + Send>;

/// A queued operation. Returning `Err` from `job` is fatal to the worker.
struct PendingOperation<S> {
    token: Option<CancellationToken>,
    job: Job<S>,
}

impl<S> PendingOperation<S> {
    fn new<F>(token: Option<CancellationToken>, job: F) -> Self
    where
        F: for<'a> FnOnce(Disposition<'a, S>) -> Result<()> + Send + 'static,
    {
        Self {
            token,
            job: Box::new(job),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn cancel(self) {
        // Cancel dispositions never fail.
        let _ = (self.job)(Disposition::Cancel);
    }
}

struct Shared {
    id: Uuid,
    token: CancellationToken,
    status: watch::Sender<Status>,
}

impl Shared {
    fn state(&self) -> ExecutorState {
        self.status.borrow().state
    }

    fn mark_completing(&self) {
        self.status.send_if_modified(|status| {
            if status.state == ExecutorState::Running {
                status.state = ExecutorState::Completing;
                true
            } else {
                false
            }
        });
    }

    fn finish(&self, termination: Termination) {
        debug!(executor = %self.id, ?termination, "executor completed");
        self.status.send_replace(Status {
            state: ExecutorState::Completed,
            termination: Some(termination),
        });
    }
}

struct Inner<S> {
    // `None` once `complete()` has been requested.
    sender: Mutex<Option<mpsc::UnboundedSender<PendingOperation<S>>>>,
    shared: Arc<Shared>,
}

/// Serialized task executor: a single worker that runs submitted operations
/// one at a time, in acceptance order, against state it owns exclusively.
///
/// Handles are cheap to clone and may be used from any thread. Dropping the
/// last handle has the same effect as [`complete`](Self::complete).
pub struct SerializedExecutor<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for SerializedExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for SerializedExecutor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedExecutor")
            .field("id", &self.inner.shared.id)
            .field("state", &self.inner.shared.state())
            .finish()
    }
}

impl<S: Send + 'static> SerializedExecutor<S> {
    /// Spawn a worker owning `state`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(state: S) -> Self {
        Self::with_cancellation(state, CancellationToken::new())
    }

    /// Spawn a worker that stops early once `token` is cancelled.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn with_cancellation(state: S, token: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(Status::running());
        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            token,
            status,
        });
        let span = tracing::debug_span!("serialized_executor", id = %shared.id);
        tokio::spawn(run_worker(state, rx, Arc::clone(&shared)).instrument(span));
        Self {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(tx)),
                shared,
            }),
        }
    }

    /// Queue `func` and return a future of its result.
    ///
    /// An `Err` returned by `func`, or a panic inside it, resolves this
    /// submission with [`Error::OperationFailed`] and does not affect other
    /// operations. A `func` that is skipped because the executor was
    /// cancelled, or that returns [`Error::Cancelled`] (for example through
    /// `ctx.check_cancelled()?`), resolves [`Error::Cancelled`]. Any other
    /// error is reported as-is even when a token has fired.
    pub fn submit<T, F>(&self, func: F) -> Submission<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S, &OperationContext) -> anyhow::Result<T> + Send + 'static,
    {
        self.submit_inner(None, func)
    }

    /// Like [`submit`](Self::submit), but the operation is also cancelled when
    /// `token` fires. A cancelled-while-queued operation never runs, and the
    /// executor carries on with the next one.
    pub fn submit_with_token<T, F>(&self, token: CancellationToken, func: F) -> Submission<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S, &OperationContext) -> anyhow::Result<T> + Send + 'static,
    {
        self.submit_inner(Some(token), func)
    }

    /// Queue an infallible operation. `T = ()` is the plain action form.
    pub fn submit_action<T, F>(&self, action: F) -> Submission<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S, &OperationContext) -> T + Send + 'static,
    {
        self.submit_inner(None, move |state, ctx| Ok(action(state, ctx)))
    }

    /// Fire-and-forget submission. No future is allocated.
    ///
    /// Rejection is reported synchronously with [`Error::InvalidState`].
    ///
    /// **Caller obligation:** `action` must not fail except by returning
    /// [`Error::Cancelled`]. Any other `Err`, or a panic, is not isolated: it
    /// halts the worker, discards the rest of the queue and completes the
    /// executor with [`Termination::Faulted`]. Pending submissions then resolve
    /// [`Error::FatalWorkerFailure`].
    pub fn submit_light<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&mut S, &OperationContext) -> anyhow::Result<()> + Send + 'static,
    {
        let op = PendingOperation::new(None, move |disposition| match disposition {
            Disposition::Cancel => Ok(()),
            Disposition::Run { state, ctx } => match action(state, ctx) {
                Ok(()) => Ok(()),
                Err(err) if is_cancellation(&err) => Ok(()),
                Err(err) => Err(Error::FatalWorkerFailure {
                    message: format!("light operation failed: {err:#}"),
                }),
            },
        });
        self.enqueue(op)
    }

    fn submit_inner<T, F>(&self, token: Option<CancellationToken>, func: F) -> Submission<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S, &OperationContext) -> anyhow::Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let op = PendingOperation::new(token, move |disposition| {
            let outcome = match disposition {
                Disposition::Cancel => Err(Error::Cancelled),
                Disposition::Run { state, ctx } => {
                    match panic::catch_unwind(AssertUnwindSafe(|| func(state, ctx))) {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(err)) => Err(classify_failure(err)),
                        Err(payload) => Err(Error::operation_failed(panic_message(payload))),
                    }
                }
            };
            // The caller may have dropped the submission.
            let _ = tx.send(outcome);
            Ok(())
        });
        match self.enqueue(op) {
            Ok(()) => Submission::pending(rx),
            Err(err) => Submission::rejected(err),
        }
    }

    fn enqueue(&self, op: PendingOperation<S>) -> Result<()> {
        let shared = &self.inner.shared;
        if shared.token.is_cancelled() {
            return Err(Error::InvalidState {
                state: ExecutorState::Completed,
            });
        }
        let guard = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let state = shared.state();
        let Some(sender) = guard.as_ref().filter(|_| state.is_accepting()) else {
            return Err(Error::InvalidState { state });
        };
        sender.send(op).map_err(|_| Error::InvalidState {
            state: shared.state(),
        })
    }
}

impl<S> SerializedExecutor<S> {
    /// Stop accepting new operations. Already queued operations still run.
    /// Idempotent.
    pub fn complete(&self) {
        let mut guard = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.take().is_some() {
            debug!(executor = %self.inner.shared.id, "completion requested");
            self.inner.shared.mark_completing();
        }
    }

    /// Future that resolves once the executor reaches [`ExecutorState::Completed`].
    ///
    /// Resolves `Ok(())` after a graceful drain, `Err(Error::Cancelled)` after
    /// cancellation and `Err(Error::FatalWorkerFailure)` after a worker fault.
    /// The future does not borrow the executor.
    pub fn completion(&self) -> impl Future<Output = Result<()>> + Send + 'static {
        let mut rx = self.inner.shared.status.subscribe();
        async move {
            let termination = rx
                .wait_for(|status| status.state == ExecutorState::Completed)
                .await
                .ok()
                .and_then(|status| status.termination.clone());
            match termination {
                Some(Termination::Drained) => Ok(()),
                Some(Termination::Cancelled) => Err(Error::Cancelled),
                Some(Termination::Faulted(message)) => Err(Error::FatalWorkerFailure { message }),
                None => Err(Error::worker_halted()),
            }
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.inner.shared.state()
    }

    /// `None` until the executor has completed.
    pub fn termination(&self) -> Option<Termination> {
        self.inner.shared.status.borrow().termination.clone()
    }

    pub fn is_accepting(&self) -> bool {
        !self.inner.shared.token.is_cancelled() && self.state().is_accepting()
    }

    /// Identifier recorded on the worker's tracing span.
    pub fn id(&self) -> Uuid {
        self.inner.shared.id
    }

    pub fn downgrade(&self) -> WeakExecutor<S> {
        WeakExecutor {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle that does not keep the executor accepting work.
pub struct WeakExecutor<S> {
    inner: Weak<Inner<S>>,
}

impl<S> Clone for WeakExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S> WeakExecutor<S> {
    pub fn upgrade(&self) -> Option<SerializedExecutor<S>> {
        self.inner
            .upgrade()
            .map(|inner| SerializedExecutor { inner })
    }
}

/// Publishes the termination even if the worker unwinds.
struct WorkerExit {
    shared: Arc<Shared>,
    termination: Option<Termination>,
}

impl Drop for WorkerExit {
    fn drop(&mut self) {
        let termination = self.termination.take().unwrap_or_else(|| {
            error!(executor = %self.shared.id, "worker panicked; queue abandoned");
            Termination::Faulted("operation panicked on the worker".to_string())
        });
        self.shared.finish(termination);
    }
}

enum Next<S> {
    Cancelled,
    Operation(Option<PendingOperation<S>>),
}

async fn run_worker<S>(
    mut state: S,
    mut rx: mpsc::UnboundedReceiver<PendingOperation<S>>,
    shared: Arc<Shared>,
) {
    let mut exit = WorkerExit {
        shared: Arc::clone(&shared),
        termination: None,
    };
    let token = shared.token.clone();
    debug!("worker started");

    let termination = loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => Next::Cancelled,
            op = rx.recv() => Next::Operation(op),
        };
        let op = match next {
            Next::Cancelled => break Termination::Cancelled,
            Next::Operation(None) => break Termination::Drained,
            Next::Operation(Some(op)) => op,
        };
        if token.is_cancelled() {
            op.cancel();
            break Termination::Cancelled;
        }
        if op.is_cancelled() {
            trace!("operation cancelled before it ran");
            op.cancel();
            continue;
        }
        let ctx = OperationContext::new(token.clone(), op.token.clone());
        if let Err(err) = (op.job)(Disposition::Run {
            state: &mut state,
            ctx: &ctx,
        }) {
            error!(error = %err, "worker halted by a failing light operation");
            break Termination::Faulted(err.to_string());
        }
    };

    match termination {
        Termination::Cancelled => {
            rx.close();
            let mut discarded = 0usize;
            while let Ok(op) = rx.try_recv() {
                op.cancel();
                discarded += 1;
            }
            debug!(discarded, "worker cancelled");
        }
        Termination::Faulted(_) => {
            // Queued operations are dropped unrun; their submissions observe
            // the closed result channel as a fatal worker failure.
            rx.close();
        }
        Termination::Drained => {}
    }
    drop(rx);
    exit.termination = Some(termination);
}

fn is_cancellation(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<Error>(), Some(Error::Cancelled))
}

fn classify_failure(err: anyhow::Error) -> Error {
    if is_cancellation(&err) {
        Error::Cancelled
    } else {
        Error::operation_failed(err)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("operation panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("operation panicked: {s}")
    } else {
        "operation panicked".to_string()
    }
}
