//! On-demand HLS transcoding gateway.
//!
//! A client hands over a URL to a remote media container; the gateway
//! probes it, picks a delivery strategy for the requesting device, drives
//! an external transcoder into a session directory, and serves the
//! resulting playlists and segments. Heartbeats keep sessions alive;
//! idle ones are reaped in the background.

mod artifacts;
mod config;
mod error;
mod proxy;
mod routes;
mod state;
mod subtitle;

use std::net::SocketAddr;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hls_session::evict::spawn_eviction_loop;

use crate::config::GatewayConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway=debug,hls_session=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env();

    if let Err(e) = media_probe::check_dependencies(&config.ffprobe).await {
        warn!("ffprobe not usable ({}); probing will fail until it is installed", e);
    }

    let state = AppState::new(config);

    // Sessions never survive a restart: start from an empty HLS root.
    state.store.reset_root().await?;
    spawn_eviction_loop(
        state.store.clone(),
        state.config.eviction_period(),
        state.config.heartbeat_threshold(),
    );

    let app = routes::router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HLS gateway listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
