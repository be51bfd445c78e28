//! Signaling Controller
//!
//! Entry point for the call and live-stream signaling service.

use common::secret::ExposeSecret;
use sc_service::config::{Config, StoreBackend};
use sc_service::coordinator::{CoordinatorSettings, SignalingCoordinator};
use sc_service::events::BroadcastPublisher;
use sc_service::media::NoopMediaTransport;
use sc_service::observability::{init_metrics_recorder, HealthState};
use sc_service::routes::{self, AppState};
use sc_service::store::{InMemorySessionStore, RedisSessionStore, SessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sc_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Signaling Controller");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        instance_id = %config.instance_id,
        bind_address = %config.http_bind_address,
        store_backend = ?config.store_backend,
        ring_timeout_seconds = config.ring_timeout_seconds,
        empty_room_grace_seconds = config.empty_room_grace_seconds,
        "Configuration loaded successfully"
    );

    // Must be installed before any metric is recorded.
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let store: Arc<dyn SessionStore> = match config.store_backend {
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_ref()
                .ok_or("REDIS_URL is required for the redis store backend")?;
            info!("Connecting to Redis...");
            let store = RedisSessionStore::new(url.expose_secret())
                .await
                .map_err(|e| {
                    error!("Failed to connect to Redis: {}", e);
                    e
                })?;
            info!("Redis connection established");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory session store; state is lost on restart");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let root_token = CancellationToken::new();
    let coordinator = SignalingCoordinator::new(
        store,
        Arc::new(BroadcastPublisher::new(config.event_buffer)),
        Arc::new(NoopMediaTransport),
        CoordinatorSettings::from(&config),
        root_token.child_token(),
    );

    let health = Arc::new(HealthState::new());
    let bind_address = config.http_bind_address.clone();

    let state = Arc::new(AppState {
        coordinator: coordinator.clone(),
        health: Arc::clone(&health),
        config,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    health.set_ready();
    info!("Signaling Controller listening on {}", addr);

    let shutdown_health = Arc::clone(&health);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        shutdown_health.set_not_ready();
    })
    .await?;

    coordinator.shutdown();
    root_token.cancel();

    info!("Signaling Controller shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a signal is received and the drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("SC_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    }
}
