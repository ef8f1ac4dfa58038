//! Bank account actor example
//!
//! Many tasks hit one account concurrently. Every operation runs on the
//! account's executor, so the balance check and the debit never interleave
//! and the account cannot go negative.
//!
//! Usage:
//!   RUST_LOG=debug cargo run --example bank_account

use serial_actor::{SerializedExecutor, Submission};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Ledger {
    balance: i64,
    declined: u32,
}

struct BankAccount {
    executor: SerializedExecutor<Ledger>,
}

impl BankAccount {
    fn open(initial: i64) -> Self {
        Self {
            executor: SerializedExecutor::new(Ledger {
                balance: initial,
                ..Ledger::default()
            }),
        }
    }

    fn deposit(&self, amount: i64) -> Submission<()> {
        self.executor
            .submit_action(move |ledger, _| ledger.balance += amount)
    }

    fn withdraw(&self, amount: i64) -> Submission<i64> {
        self.executor.submit(move |ledger, _| {
            if ledger.balance < amount {
                ledger.declined += 1;
                anyhow::bail!("insufficient funds: balance {} < {amount}", ledger.balance);
            }
            ledger.balance -= amount;
            Ok(ledger.balance)
        })
    }

    fn statement(&self) -> Submission<(i64, u32)> {
        self.executor
            .submit_action(|ledger, _| (ledger.balance, ledger.declined))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let account = std::sync::Arc::new(BankAccount::open(100));

    let mut tasks = Vec::new();
    for customer in 0..20 {
        let account = account.clone();
        tasks.push(tokio::spawn(async move {
            if customer % 4 == 0 {
                account.deposit(5).await.map(|_| None)
            } else {
                match account.withdraw(10).await {
                    Ok(left) => Ok(Some(left)),
                    Err(err) => {
                        info!(customer, error = %err, "withdrawal declined");
                        Ok(None)
                    }
                }
            }
        }));
    }
    for task in tasks {
        if let Some(left) = task.await?? {
            info!(left, "withdrawal accepted");
        }
    }

    let (balance, declined) = account.statement().await?;
    println!("final balance: {balance}, declined withdrawals: {declined}");
    assert!(balance >= 0);

    account.executor.complete();
    account.executor.completion().await?;
    Ok(())
}
