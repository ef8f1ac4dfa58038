//! Throttled log forwarding example
//!
//! A noisy producer posts log lines much faster than the downstream consumer
//! wants them. The batcher forwards at most `burst_size` lines per tick into a
//! channel and drops lines repeated within a burst.
//!
//! The pacing can be supplied as YAML through `THROTTLE_CONFIG`:
//!   THROTTLE_CONFIG=$'burst_size: 3\ntick_interval_ms: 50' cargo run --example throttled_log

use serial_actor::{Dedup, ThrottleConfig, ThrottlingBatcher};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn load_config() -> serial_actor::Result<ThrottleConfig> {
    match std::env::var("THROTTLE_CONFIG") {
        Ok(yaml) => ThrottleConfig::from_yaml_str(&yaml),
        Err(_) => Ok(ThrottleConfig::new(4, Duration::from_millis(100))),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    info!(?config, "starting throttled forwarder");

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let batcher = ThrottlingBatcher::new(config, tx);
    batcher.set_dedup(Dedup::by_eq());
    batcher.start();

    let consumer = tokio::spawn(async move {
        let mut received = 0usize;
        while let Some(line) = rx.recv().await {
            received += 1;
            println!("[consumer] {line}");
        }
        received
    });

    for i in 0..30 {
        let line = if i % 3 == 0 {
            "heartbeat".to_string()
        } else {
            format!("event #{i}")
        };
        batcher.post(line);
    }

    let snapshot = batcher.snapshot().await?;
    info!(queued = snapshot.queued, "producer finished");

    batcher.complete();
    batcher.completion().await?;
    // The finished worker drops its state, and with it the channel sender.
    let received = consumer.await?;
    println!("forwarded {received} of 30 lines");
    Ok(())
}
