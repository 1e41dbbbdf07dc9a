//! chord entry point
//!
//! Run with:
//! ```bash
//! CHORD_TOKEN=... cargo run -p chord-client --bin chord
//! ```
//!
//! Connects every shard, logs what arrives and shuts down on Ctrl-C.

use std::collections::HashSet;

use anyhow::Context;
use chord_client::Client;
use chord_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use chord_gateway::ShardEvent;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::from_env()) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = format!("{e:#}"), "Client failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting chord...");

    let config = ClientConfig::from_env().context("failed to load configuration")?;
    info!(shards = %config.shards, intents = config.intents.bits(), "Configuration loaded");

    let client = Client::builder(config)
        .build()
        .await
        .context("failed to build client")?;

    let mut events = client.subscribe();
    let mut rate_limits = client.rate_limits();
    let shard_count = client.gateway().shard_count() as usize;
    let mut terminated = HashSet::new();

    client.start();

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ShardEvent::Terminated { shard_id, error }) => {
                    error!(shard_id, error = %error, "Shard terminated");
                    terminated.insert(shard_id);
                    if terminated.len() == shard_count {
                        break Err(anyhow::anyhow!("every shard terminated, last error: {error}"));
                    }
                }
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event stream lagged"),
                Err(RecvError::Closed) => break Ok(()),
            },
            Ok(limited) = rate_limits.recv() => {
                warn!(
                    bucket = %limited.bucket,
                    route = %limited.route,
                    global = limited.global,
                    retry_after_ms = limited.retry_after.as_millis() as u64,
                    "Rate limited"
                );
            }
            result = &mut interrupt => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Interrupt received");
                break Ok(());
            }
        }
    };

    client.shutdown().await;
    info!(cache = ?client.cache().stats(), "chord stopped");
    outcome
}

fn log_event(event: &ShardEvent) {
    match event {
        ShardEvent::StateChanged { shard_id, state } => {
            info!(shard_id, state = %state, "Shard state changed");
        }
        ShardEvent::Dispatch {
            shard_id,
            sequence,
            event,
            ..
        } => {
            debug!(shard_id, seq = ?sequence, event = event.name(), "Dispatch");
        }
        ShardEvent::Terminated { .. } => {}
    }
}
