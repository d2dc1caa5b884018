//! Session control-plane API server.
//!
//! Boots config, runs migrations, reconciles the IP pool against the
//! configured CIDR (component E), then serves the HTTP surface. By
//! default also spawns the two background reconcilers (J, K) in-process
//! so a single binary is a complete deployment — see DESIGN.md for why
//! `sessiond-worker` exists alongside this.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{header, Method};
use axum::middleware;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sessiond_api::routes::create_router;
use sessiond_api::security::security_headers_middleware;
use sessiond_api::state::AppState;
use sessiond_core::{ip_pool, peer_client::PeerClient, releaser, revoker};
use sessiond_shared::{create_migration_pool, create_pool, run_migrations, Config};

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

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting sessiond-api");

    let config = Config::from_env()?;

    let migration_pool = create_migration_pool(&config.database_url).await?;
    run_migrations(&migration_pool).await?;
    migration_pool.close().await;
    tracing::info!("migrations applied");

    let pool = create_pool(&config.database_url).await?;

    if config.seed_default_user {
        sessiond_core::user::seed_default_user(&pool).await?;
    }

    ip_pool::sync_pool(
        &pool,
        &config.project_name,
        &config.network_cidr,
        &config.reserved_ips,
    )
    .await?;
    tracing::info!(cidr = %config.network_cidr, "ip pool synchronized");

    let peer = PeerClient::new(config.wgctl_socket.clone(), config.wgctl_token.clone());
    let state = AppState::new(pool.clone(), config.clone(), peer.clone());

    let (stop_tx, stop_rx) = watch::channel(false);
    let revoker_handle = spawn_revoker(
        pool.clone(),
        peer.clone(),
        config.ip_quarantine_duration_seconds,
        Duration::from_secs(config.revoker_period_seconds),
        stop_rx.clone(),
    );
    let releaser_handle = spawn_releaser(
        pool.clone(),
        Duration::from_secs(config.releaser_period_seconds),
        stop_rx,
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let app = create_router(state)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down reconcilers");
    let _ = stop_tx.send(true);
    let _ = revoker_handle.await;
    let _ = releaser_handle.await;

    Ok(())
}

fn spawn_revoker(
    pool: sqlx::PgPool,
    peer: PeerClient,
    quarantine_duration_seconds: i64,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
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
}

fn spawn_releaser(
    pool: sqlx::PgPool,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
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
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
