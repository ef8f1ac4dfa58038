//! 限流批处理模块：按固定节奏、有界突发地向下游投递消息，可选突发内去重。
//!
//! # Throttling Batcher Module
//!
//! A [`ThrottlingBatcher`] queues messages and, once started, delivers at most
//! `burst_size` of them to a [`MessageSink`] every `tick_interval`. It is built
//! on a [`SerializedExecutor`](crate::executor::SerializedExecutor): every
//! public method is an operation on that executor, and the pump itself is an
//! operation that re-submits itself after each tick.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ThrottlingBatcher`] | The batching message pump |
//! | [`ThrottleConfig`] | Burst size and tick interval (serde-loadable) |
//! | [`Dedup`] | In-burst duplicate suppression setting |
//! | [`MessageSink`] | Downstream target trait |
//! | [`CollectingSink`] | In-memory sink for tests |
//! | [`ThrottleSnapshot`] | Counters and configuration taken on the worker |
//!
//! ## Lifecycle
//!
//! - **Idle**: buffering only
//! - **Active**: one burst per tick
//! - **Completing**: draining; completes once a tick finds the queue empty
//! - **Completed**: terminal
//!
//! ## Deduplication
//!
//! With [`Dedup::Enabled`], a dequeued message is dropped when the predicate
//! matches any message already buffered for the current tick. The scan keeps
//! pulling from the queue until the burst is full or the queue is empty, so a
//! run of duplicates can consume many queued messages in a single tick.

mod batcher;
mod config;
pub mod sink;
mod state;

pub use batcher::ThrottlingBatcher;
pub use config::{Dedup, EqualityFn, ThrottleConfig};
pub use sink::{CollectingSink, FnSink, MessageSink};
pub use state::{ThrottleLifecycleState, ThrottleSnapshot};
