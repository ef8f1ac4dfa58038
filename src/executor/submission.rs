use crate::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Future returned by [`SerializedExecutor::submit`](super::SerializedExecutor::submit)
/// and friends.
///
/// A rejected submission resolves immediately with `Error::InvalidState`; the
/// producer never waits on a queue that will not run its operation.
#[must_use = "the operation still runs, but its result is lost unless the submission is awaited"]
pub struct Submission<T> {
    inner: Inner<T>,
}

enum Inner<T> {
    Pending(oneshot::Receiver<Result<T>>),
    Rejected(Option<Error>),
}

impl<T> Submission<T> {
    pub(crate) fn pending(rx: oneshot::Receiver<Result<T>>) -> Self {
        Self {
            inner: Inner::Pending(rx),
        }
    }

    pub(crate) fn rejected(err: Error) -> Self {
        Self {
            inner: Inner::Rejected(Some(err)),
        }
    }

    /// True when the executor refused the operation at submission time.
    pub fn is_rejected(&self) -> bool {
        matches!(self.inner, Inner::Rejected(_))
    }

    /// Block the current thread until the operation resolves.
    ///
    /// Intended for producers that are not running inside an async context.
    /// Calling this from a runtime worker thread stalls that thread.
    pub fn wait_blocking(self) -> Result<T> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for Submission<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Inner::Pending(rx) => Pin::new(rx)
                .poll(cx)
                .map(|res| res.unwrap_or_else(|_| Err(Error::worker_halted()))),
            Inner::Rejected(err) => {
                Poll::Ready(Err(err.take().unwrap_or_else(Error::worker_halted)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorState;
    use tokio_test::{assert_ready, task};

    #[test]
    fn test_rejected_submission_is_ready_immediately() {
        let mut fut = task::spawn(Submission::<u32>::rejected(Error::InvalidState {
            state: ExecutorState::Completed,
        }));
        let res = assert_ready!(fut.poll());
        assert!(res.unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_dropped_sender_resolves_fatal() {
        let (tx, rx) = oneshot::channel::<Result<u32>>();
        let mut fut = task::spawn(Submission::pending(rx));
        assert!(fut.poll().is_pending());
        drop(tx);
        assert!(fut.is_woken());
        let res = assert_ready!(fut.poll());
        assert!(res.unwrap_err().is_fatal());
    }

    #[test]
    fn test_wait_blocking_returns_value() {
        let (tx, rx) = oneshot::channel();
        tx.send(Ok(7u32)).unwrap();
        assert_eq!(Submission::pending(rx).wait_blocking().unwrap(), 7);
    }
}
