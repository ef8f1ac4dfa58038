//! 串行执行器模块：单工作者、严格 FIFO、互斥执行的操作队列（actor）。
//!
//! # Serialized Executor Module
//!
//! A [`SerializedExecutor`] owns a piece of state and a single logical worker.
//! Operations submitted from any number of threads run on that worker one at a
//! time, in exactly the order they were accepted, each finishing before the
//! next begins.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`SerializedExecutor`] | Cloneable handle used to submit operations |
//! | [`WeakExecutor`] | Non-owning handle for self-resubmitting operations |
//! | [`Submission`] | Future of an operation's result |
//! | [`OperationContext`] | Cancellation checks available inside an operation |
//! | [`ExecutorState`] | `Running` / `Completing` / `Completed` |
//! | [`Termination`] | Why a completed executor stopped |
//!
//! ## Submission Kinds
//!
//! - **`submit`**: fallible body, failures isolated to the returned future
//! - **`submit_action`**: infallible body
//! - **`submit_with_token`**: `submit` with a per-operation cancellation token
//! - **`submit_light`**: fire-and-forget; a failure halts the worker
//!
//! ## Example
//!
//! ```rust
//! use serial_actor::executor::SerializedExecutor;
//!
//! # #[tokio::main]
//! # async fn main() -> serial_actor::Result<()> {
//! let account = SerializedExecutor::new(100i64);
//!
//! account.submit_light(|balance, _| {
//!     *balance += 50;
//!     Ok(())
//! })?;
//! let withdrew = account
//!     .submit(|balance, _| {
//!         if *balance < 120 {
//!             anyhow::bail!("insufficient funds");
//!         }
//!         *balance -= 120;
//!         Ok(true)
//!     })
//!     .await?;
//! assert!(withdrew);
//!
//! account.complete();
//! account.completion().await?;
//! # Ok(())
//! # }
//! ```

mod context;
mod core;
mod state;
mod submission;

pub use self::context::OperationContext;
pub use self::core::{SerializedExecutor, WeakExecutor};
pub use self::state::{ExecutorState, Termination};
pub use self::submission::Submission;
