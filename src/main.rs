//! Cyber Divination - coin-toss I-Ching readings
//!
//! A Rust backend running the six-toss divination session, with the
//! browser supplying accelerometer samples and rendering the result.

mod api;
mod config;
mod divination;
mod motion;
mod runtime;
mod shake;
mod state_machine;

use api::{create_router, AppState};
use config::DivinationConfig;
use divination::{HexagramTable, MotionEntropy};
use motion::MotionClock;
use runtime::{
    BroadcastHaptics, BroadcastNotifier, ChannelMotionSensor, ClientPermission, Collaborators,
    DivinationRuntime, PermissionProvider,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cyber_divination=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = DivinationConfig::from_env();
    tracing::info!(?config, "Configuration loaded");

    let table = match &config.table_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading hexagram table");
            HexagramTable::load(path)?
        }
        None => HexagramTable::builtin()?,
    };
    if table.len() < 64 {
        tracing::warn!(entries = table.len(), "Hexagram table is incomplete");
    }
    let table = Arc::new(table);

    // Browser-facing adapters share one event channel
    let (broadcast_tx, _) = broadcast::channel(256);
    let sensor = Arc::new(ChannelMotionSensor::new());
    let permission = config.require_permission.then(|| {
        Arc::new(ClientPermission::new(
            broadcast_tx.clone(),
            config.permission_timeout,
        ))
    });
    let collaborators = Collaborators {
        sensor: sensor.clone(),
        permission: permission
            .clone()
            .map(|p| p as Arc<dyn PermissionProvider>),
        haptics: Arc::new(BroadcastHaptics::new(broadcast_tx.clone())),
        notifier: Arc::new(BroadcastNotifier::new(broadcast_tx.clone())),
    };

    let clock = MotionClock::new();
    let (runtime, handle) = DivinationRuntime::new(
        table.clone(),
        config.runtime,
        MotionEntropy::from_entropy(),
        collaborators,
        clock,
        broadcast_tx,
    );
    let runtime_task = runtime.spawn();

    let state = AppState {
        runtime: handle.clone(),
        sensor,
        permission,
        table,
        clock,
    };

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Cyber Divination server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    // Releases the motion listener and any pending settle
    handle.shutdown();
    runtime_task.await?;

    Ok(())
}
