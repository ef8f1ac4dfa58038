//! Small actors built on `SerializedExecutor`, shared by the integration tests.
#![allow(dead_code)]

use serial_actor::{SerializedExecutor, Submission};

/// Running counter plus a strictly increasing sequence check.
#[derive(Default)]
struct SequenceState {
    counter: i64,
    last: Option<i64>,
}

pub struct SequenceChecker {
    executor: SerializedExecutor<SequenceState>,
}

impl SequenceChecker {
    pub fn new() -> Self {
        Self {
            executor: SerializedExecutor::new(SequenceState::default()),
        }
    }

    pub fn add(&self, amount: i64) -> Submission<()> {
        self.executor
            .submit_action(move |state, _| state.counter += amount)
    }

    pub fn sum(&self, a: i64, b: i64) -> Submission<i64> {
        self.executor.submit_action(move |_, _| a + b)
    }

    /// Fails with "out of sequence" unless `j` is greater than every value verified before.
    pub fn verify(&self, j: i64) -> Submission<()> {
        self.executor.submit(move |state, _| {
            if state.last.is_some_and(|last| j <= last) {
                anyhow::bail!("out of sequence: {j} after {:?}", state.last);
            }
            state.last = Some(j);
            Ok(())
        })
    }

    pub fn counter(&self) -> Submission<i64> {
        self.executor.submit_action(|state, _| state.counter)
    }
}

/// Toy bank account: withdrawals never overdraw.
pub struct BankAccount {
    executor: SerializedExecutor<i64>,
}

impl BankAccount {
    pub fn new() -> Self {
        Self {
            executor: SerializedExecutor::new(0),
        }
    }

    pub fn deposit(&self, amount: i64) -> Submission<()> {
        self.executor
            .submit_action(move |balance, _| *balance += amount)
    }

    pub fn withdraw(&self, amount: i64) -> Submission<bool> {
        self.executor.submit_action(move |balance, _| {
            if *balance >= amount {
                *balance -= amount;
                true
            } else {
                false
            }
        })
    }

    pub fn balance(&self) -> Submission<i64> {
        self.executor.submit_action(|balance, _| *balance)
    }
}

/// Operations that always fail.
pub struct FailingActor {
    executor: SerializedExecutor<()>,
}

impl FailingActor {
    pub fn new() -> Self {
        Self {
            executor: SerializedExecutor::new(()),
        }
    }

    pub fn throw_an_error(&self) -> Submission<()> {
        self.executor
            .submit(|_, _| anyhow::bail!("something went wrong"))
    }

    pub fn failing_with_return(&self) -> Submission<bool> {
        self.executor
            .submit(|_, _| Err(anyhow::anyhow!("something went wrong, part 2")))
    }

    pub fn ping(&self) -> Submission<&'static str> {
        self.executor.submit_action(|_, _| "pong")
    }
}
