//! Downstream targets for throttled messages.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::trace;

/// Receiver of delivered messages, one at a time.
///
/// Called on the batcher's worker. Implementations should return quickly and
/// must not assume any backpressure reaches the batcher.
pub trait MessageSink<M>: Send {
    fn push(&mut self, message: M);
}

impl<M> MessageSink<M> for Box<dyn MessageSink<M>> {
    fn push(&mut self, message: M) {
        (**self).push(message)
    }
}

/// Forwards into a channel; messages sent after the receiver is gone are dropped.
impl<M: Send> MessageSink<M> for mpsc::UnboundedSender<M> {
    fn push(&mut self, message: M) {
        if self.send(message).is_err() {
            trace!("sink channel closed; message dropped");
        }
    }
}

/// Sink backed by a closure. Build one with [`from_fn`].
pub struct FnSink<F> {
    f: F,
}

/// Wrap a closure as a [`MessageSink`].
pub fn from_fn<M, F>(f: F) -> FnSink<F>
where
    F: FnMut(M) + Send,
{
    FnSink { f }
}

impl<M, F> MessageSink<M> for FnSink<F>
where
    F: FnMut(M) + Send,
{
    fn push(&mut self, message: M) {
        (self.f)(message)
    }
}

/// In-memory sink for testing; clones share the same buffer.
pub struct CollectingSink<M> {
    items: Arc<Mutex<Vec<M>>>,
}

impl<M> CollectingSink<M> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return everything collected so far.
    pub fn take(&self) -> Vec<M> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<M>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<M: Clone> CollectingSink<M> {
    pub fn items(&self) -> Vec<M> {
        self.lock().clone()
    }
}

impl<M> Default for CollectingSink<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for CollectingSink<M> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<M: Send> MessageSink<M> for CollectingSink<M> {
    fn push(&mut self, message: M) {
        self.lock().push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::wrappers::UnboundedReceiverStream;
    use tokio_stream::StreamExt;

    #[test]
    fn test_collecting_sink_shares_buffer() {
        let sink = CollectingSink::new();
        let mut writer = sink.clone();
        writer.push(1);
        writer.push(2);
        assert_eq!(sink.items(), vec![1, 2]);
        assert_eq!(sink.take(), vec![1, 2]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_fn_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = from_fn(|m: u8| seen.push(m));
            sink.push(3);
            sink.push(4);
        }
        assert_eq!(seen, vec![3, 4]);
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let collected = CollectingSink::new();
        let mut boxed: Box<dyn MessageSink<&str>> = Box::new(collected.clone());
        boxed.push("x");
        assert_eq!(collected.items(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (mut tx, rx) = mpsc::unbounded_channel();
        for i in 0..3 {
            MessageSink::push(&mut tx, i);
        }
        drop(tx);
        let got: Vec<i32> = UnboundedReceiverStream::new(rx).collect().await;
        assert_eq!(got, vec![0, 1, 2]);
    }

    #[test]
    fn test_channel_sink_tolerates_closed_receiver() {
        let (mut tx, rx) = mpsc::unbounded_channel::<u8>();
        drop(rx);
        tx.push(1);
    }
}
