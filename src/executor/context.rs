use crate::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Capability handed to every operation while it runs on the worker.
///
/// Long-running operations call [`check_cancelled`](Self::check_cancelled) at
/// convenient points to stop cooperatively.
#[derive(Debug, Clone)]
pub struct OperationContext {
    executor_token: CancellationToken,
    operation_token: Option<CancellationToken>,
}

impl OperationContext {
    pub(crate) fn new(
        executor_token: CancellationToken,
        operation_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            executor_token,
            operation_token,
        }
    }

    /// True once the executor's cancellation context or this operation's own
    /// token has been triggered.
    pub fn is_cancelled(&self) -> bool {
        self.executor_token.is_cancelled()
            || self
                .operation_token
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
    }

    /// Returns `Err(Error::Cancelled)` when cancelled, so bodies can use `?`.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
