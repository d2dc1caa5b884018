//! Standalone reconciler process.
//!
//! Runs the expiry revoker (component J) and the quarantine releaser
//! (component K) as two long-lived loops, each on its own period, with
//! explicit stop signalling on shutdown. `sessiond-api` spawns the same
//! `sessiond_core::revoker`/`releaser` tick functions in-process by
//! default; this binary exists for operators who want reconciliation
//! decoupled from request serving. Running both against the same
//! database is safe — every tick is a row-scoped transaction, and a
//! double execution of either tick is a no-op (spec.md §5).

use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sessiond_core::peer_client::PeerClient;
use sessiond_core::{releaser, revoker};
use sessiond_shared::{create_pool, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sessiond=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting sessiond-worker");

    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    let peer = PeerClient::new(config.wgctl_socket.clone(), config.wgctl_token.clone());

    let (stop_tx, stop_rx) = watch::channel(false);

    let revoker_handle = {
        let pool = pool.clone();
        let peer = peer.clone();
        let quarantine_duration_seconds = config.ip_quarantine_duration_seconds;
        let period = Duration::from_secs(config.revoker_period_seconds);
        let mut stop = stop_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = revoker::tick_once(&pool, &peer, quarantine_duration_seconds).await {
                            tracing::warn!(error = %e, "revoker tick failed");
                        }
                    }
                    _ = stop.changed() => {
                        if *stop.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    };

    let releaser_handle = {
        let pool = pool.clone();
        let period = Duration::from_secs(config.releaser_period_seconds);
        let mut stop = stop_rx;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = releaser::tick_once(&pool).await {
                            tracing::warn!(error = %e, "releaser tick failed");
                        }
                    }
                    _ = stop.changed() => {
                        if *stop.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
    }
    tracing::info!("shutdown signal received, stopping reconcilers");

    let _ = stop_tx.send(true);
    let _ = revoker_handle.await;
    let _ = releaser_handle.await;

    tracing::info!("sessiond-worker stopped");
    Ok(())
}
