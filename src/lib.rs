//! # serial-actor
//!
//! 串行执行器（actor）与构建于其上的限流批处理消息泵。
//!
//! Serialized task executor ("actor") and a throttling, batching, optionally
//! deduplicating message pump built on top of it.
//!
//! ## Overview
//!
//! [`SerializedExecutor`] guarantees exactly-once, in-order, non-overlapping
//! execution of submitted operations no matter how many threads submit them.
//! It owns the state those operations mutate, so no lock guards that state.
//!
//! [`ThrottlingBatcher`] routes every one of its calls through an executor it
//! owns, releasing queued messages to a sink in bounded bursts at a
//! configurable cadence.
//!
//! ## Guarantees
//!
//! - **Ordering**: operations run in the order they were accepted
//! - **Exclusivity**: one operation at a time per executor instance
//! - **Isolation**: `submit` failures only affect their own future
//! - **Cancellation**: a cancelled executor rejects new work and resolves queued work as cancelled
//!
//! ## Quick Start
//!
//! ```rust
//! use serial_actor::{SerializedExecutor, ThrottleConfig, ThrottlingBatcher};
//! use serial_actor::throttle::CollectingSink;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> serial_actor::Result<()> {
//!     let counter = SerializedExecutor::new(0u64);
//!     counter.submit_light(|n, _| {
//!         *n += 1;
//!         Ok(())
//!     })?;
//!     assert_eq!(counter.submit_action(|n, _| *n).await?, 1);
//!
//!     let sink = CollectingSink::new();
//!     let batcher = ThrottlingBatcher::new(
//!         ThrottleConfig::new(10, Duration::from_millis(50)),
//!         sink.clone(),
//!     );
//!     batcher.post("hello");
//!     batcher.start();
//!     batcher.complete();
//!     batcher.completion().await?;
//!     assert_eq!(sink.items(), vec!["hello"]);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`executor`] | Serialized single-worker executor |
//! | [`throttle`] | Burst-paced batching message pump |
//! | [`error`] | Unified error type |

pub mod error;
pub mod executor;
pub mod throttle;

pub use error::{BoxError, Error, ErrorContext};
pub use executor::{
    ExecutorState, OperationContext, SerializedExecutor, Submission, Termination, WeakExecutor,
};
pub use throttle::{
    Dedup, MessageSink, ThrottleConfig, ThrottleLifecycleState, ThrottleSnapshot,
    ThrottlingBatcher,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
