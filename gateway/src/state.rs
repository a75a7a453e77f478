use std::sync::Arc;

use hls_session::{SessionStore, Supervisor};
use media_probe::Prober;

use crate::config::GatewayConfig;

/// Shared state for all HTTP handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub store: Arc<SessionStore>,
    pub prober: Prober,
    pub supervisor: Supervisor,
    /// Upstream client for the byte-range proxy.
    pub http: reqwest::Client,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: GatewayConfig) -> SharedState {
        let store = Arc::new(SessionStore::new(config.hls_root()));
        Arc::new(Self {
            prober: Prober::new(&config.ffprobe),
            supervisor: Supervisor::with_deadlines(&config.ffmpeg, config.readiness_deadlines()),
            http: reqwest::Client::new(),
            store,
            config,
        })
    }
}
