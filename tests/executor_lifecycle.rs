//! Completion, cancellation and the fire-and-forget failure hazard.

use serial_actor::{Error, ExecutorState, SerializedExecutor, Submission, Termination};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

/// Occupy the worker until the returned sender is dropped or written to.
fn block_worker<S: Send + 'static>(
    executor: &SerializedExecutor<S>,
) -> (std_mpsc::Sender<()>, Submission<()>) {
    let (release_tx, release_rx) = std_mpsc::channel::<()>();
    let (started_tx, started_rx) = std_mpsc::channel::<()>();
    let blocker = executor.submit_action(move |_, _| {
        let _ = started_tx.send(());
        let _ = release_rx.recv();
    });
    started_rx
        .recv_timeout(WAIT)
        .expect("blocker should start running");
    (release_tx, blocker)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_complete_drains_queue_then_rejects() {
    let executor = SerializedExecutor::new(Vec::<u32>::new());
    let (release, blocker) = block_worker(&executor);

    let queued: Vec<_> = (0..5)
        .map(|i| executor.submit_action(move |v, _| v.push(i)))
        .collect();
    let total = executor.submit_action(|v, _| v.clone());
    executor.complete();

    assert_eq!(executor.state(), ExecutorState::Completing);
    let rejected = executor.submit_action(|_, _| ());
    assert!(rejected.is_rejected());
    assert!(matches!(
        rejected.await,
        Err(Error::InvalidState {
            state: ExecutorState::Completing
        })
    ));

    release.send(()).unwrap();
    blocker.await.unwrap();
    for q in queued {
        q.await.unwrap();
    }
    assert_eq!(total.await.unwrap(), vec![0, 1, 2, 3, 4]);

    tokio::time::timeout(WAIT, executor.completion())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(executor.state(), ExecutorState::Completed);
    assert_eq!(executor.termination(), Some(Termination::Drained));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancellation_resolves_queued_operations() {
    let token = CancellationToken::new();
    let executor = SerializedExecutor::with_cancellation(0u32, token.clone());
    let (release, blocker) = block_worker(&executor);

    let queued: Vec<_> = (0..10)
        .map(|_| {
            executor.submit_action(|n, _| {
                *n += 1;
                *n
            })
        })
        .collect();

    token.cancel();
    assert!(!executor.is_accepting());
    let late = executor.submit_action(|_, _| ());
    assert!(late.await.unwrap_err().is_invalid_state());
    assert!(executor.submit_light(|_, _| Ok(())).unwrap_err().is_invalid_state());

    release.send(()).unwrap();
    // The blocker was already running; its value is still delivered.
    blocker.await.unwrap();
    for q in queued {
        assert!(q.await.unwrap_err().is_cancelled(), "queued work must not run");
    }

    let outcome = tokio::time::timeout(WAIT, executor.completion()).await.unwrap();
    assert!(outcome.unwrap_err().is_cancelled());
    assert_eq!(executor.state(), ExecutorState::Completed);
    assert_eq!(executor.termination(), Some(Termination::Cancelled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cooperative_cancellation_mid_operation() {
    let token = CancellationToken::new();
    let executor = SerializedExecutor::with_cancellation((), token.clone());

    let long_running = executor.submit(|_, ctx| -> anyhow::Result<()> {
        loop {
            ctx.check_cancelled()?;
            std::thread::sleep(Duration::from_millis(1));
        }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let outcome = tokio::time::timeout(WAIT, long_running).await.unwrap();
    assert!(outcome.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_per_operation_token() {
    let executor = SerializedExecutor::new(0u32);
    let token = CancellationToken::new();
    token.cancel();

    let skipped = executor.submit_with_token(token, |n, _| {
        *n += 1;
        Ok(*n)
    });
    assert!(skipped.await.unwrap_err().is_cancelled());

    // Only the operation was cancelled, not the executor.
    assert_eq!(executor.state(), ExecutorState::Running);
    assert_eq!(executor.submit_action(|n, _| *n).await.unwrap(), 0);

    let live = CancellationToken::new();
    let ran = executor.submit_with_token(live, |n, _| {
        *n += 1;
        Ok(*n)
    });
    assert_eq!(ran.await.unwrap(), 1);
}

#[tokio::test]
async fn test_real_error_survives_cancellation() {
    let executor = SerializedExecutor::new(());
    let token = CancellationToken::new();
    let trigger = token.clone();

    let failed = executor.submit_with_token(token, move |_, ctx| -> anyhow::Result<()> {
        trigger.cancel();
        assert!(ctx.is_cancelled());
        anyhow::bail!("disk full")
    });
    match failed.await {
        Err(err @ Error::OperationFailed { .. }) => assert!(err.to_string().contains("disk full")),
        other => panic!("expected the body's own error, got {other:?}"),
    }

    // Same for the executor-wide token.
    let shared = CancellationToken::new();
    let cancelling = SerializedExecutor::with_cancellation((), shared.clone());
    let failed = cancelling.submit(move |_, _| -> anyhow::Result<()> {
        shared.cancel();
        anyhow::bail!("disk full")
    });
    assert!(matches!(failed.await, Err(Error::OperationFailed { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_light_operation_halts_worker() {
    let executor = SerializedExecutor::new(0u32);
    let (release, blocker) = block_worker(&executor);

    executor
        .submit_light(|_, _| Err(anyhow::anyhow!("unexpected")))
        .unwrap();
    let stranded = executor.submit_action(|n, _| {
        *n += 1;
        *n
    });

    release.send(()).unwrap();
    blocker.await.unwrap();

    let err = tokio::time::timeout(WAIT, stranded).await.unwrap().unwrap_err();
    assert!(err.is_fatal(), "queued work is abandoned, got {err:?}");

    let outcome = tokio::time::timeout(WAIT, executor.completion()).await.unwrap();
    match outcome {
        Err(Error::FatalWorkerFailure { message }) => assert!(message.contains("unexpected")),
        other => panic!("expected a fatal worker failure, got {other:?}"),
    }
    assert_eq!(executor.state(), ExecutorState::Completed);
    assert!(executor.submit_action(|_, _| ()).await.unwrap_err().is_invalid_state());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_light_operation_halts_worker() {
    let executor = SerializedExecutor::new(());
    executor
        .submit_light(|_, _| panic!("light operation blew up"))
        .unwrap();

    let outcome = tokio::time::timeout(WAIT, executor.completion()).await.unwrap();
    assert!(outcome.unwrap_err().is_fatal());
    assert!(matches!(
        executor.termination(),
        Some(Termination::Faulted(_))
    ));
}

#[tokio::test]
async fn test_completion_has_many_waiters() {
    let executor = SerializedExecutor::new(());
    let first = tokio::spawn(executor.completion());
    let second = tokio::spawn(executor.completion());
    executor.complete();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    // Subscribing after the fact resolves immediately.
    executor.completion().await.unwrap();
}
