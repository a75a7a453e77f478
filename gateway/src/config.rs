use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use hls_session::evict;
use hls_session::ReadinessDeadlines;

/// Runtime knobs. Every field carries a serde default, so a partial (or
/// empty) document deserializes to something runnable; the environment
/// overrides individual values on top of that. Durations are plain
/// seconds on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// TCP listen port (`PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Root of the public artifact tree (`PUBLIC_ROOT`); HLS output lives
    /// under `<public_root>/hls`.
    #[serde(default = "default_public_root")]
    pub public_root: PathBuf,
    /// Transcoder executable (`FFMPEG_PATH`).
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    /// Inspector executable (`FFPROBE_PATH`).
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
    /// Response budget for one probe run (`PROBE_TIMEOUT`).
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Readiness deadline for speculative stream-copy modes
    /// (`READINESS_DEADLINE_COPY`).
    #[serde(default = "default_readiness_copy_secs")]
    pub readiness_deadline_copy_secs: u64,
    /// Readiness deadline for full transcodes (`READINESS_DEADLINE_FULL`).
    #[serde(default = "default_readiness_full_secs")]
    pub readiness_deadline_full_secs: u64,
    /// Sessions silent for longer than this are evicted
    /// (`HEARTBEAT_THRESHOLD`).
    #[serde(default = "default_heartbeat_threshold_secs")]
    pub heartbeat_threshold_secs: u64,
    /// How often the eviction loop scans the session table
    /// (`EVICTION_PERIOD`).
    #[serde(default = "default_eviction_period_secs")]
    pub eviction_period_secs: u64,
}

fn default_port() -> u16 {
    3000
}

fn default_public_root() -> PathBuf {
    PathBuf::from("public")
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    20
}

fn default_readiness_copy_secs() -> u64 {
    ReadinessDeadlines::default().speculative.as_secs()
}

fn default_readiness_full_secs() -> u64 {
    ReadinessDeadlines::default().full.as_secs()
}

fn default_heartbeat_threshold_secs() -> u64 {
    evict::MAX_IDLE.as_secs()
}

fn default_eviction_period_secs() -> u64 {
    evict::EVICTION_PERIOD.as_secs()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            public_root: default_public_root(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            probe_timeout_secs: default_probe_timeout_secs(),
            readiness_deadline_copy_secs: default_readiness_copy_secs(),
            readiness_deadline_full_secs: default_readiness_full_secs(),
            heartbeat_threshold_secs: default_heartbeat_threshold_secs(),
            eviction_period_secs: default_eviction_period_secs(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(port) = env_parse("PORT") {
            config.port = port;
        }
        if let Ok(root) = std::env::var("PUBLIC_ROOT") {
            config.public_root = PathBuf::from(root);
        }
        if let Ok(path) = std::env::var("FFMPEG_PATH") {
            config.ffmpeg = path;
        }
        if let Ok(path) = std::env::var("FFPROBE_PATH") {
            config.ffprobe = path;
        }
        if let Some(secs) = env_parse("PROBE_TIMEOUT") {
            config.probe_timeout_secs = secs;
        }
        if let Some(secs) = env_parse("READINESS_DEADLINE_COPY") {
            config.readiness_deadline_copy_secs = secs;
        }
        if let Some(secs) = env_parse("READINESS_DEADLINE_FULL") {
            config.readiness_deadline_full_secs = secs;
        }
        if let Some(secs) = env_parse("HEARTBEAT_THRESHOLD") {
            config.heartbeat_threshold_secs = secs;
        }
        if let Some(secs) = env_parse("EVICTION_PERIOD") {
            config.eviction_period_secs = secs;
        }
        config
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn readiness_deadlines(&self) -> ReadinessDeadlines {
        ReadinessDeadlines {
            speculative: Duration::from_secs(self.readiness_deadline_copy_secs),
            full: Duration::from_secs(self.readiness_deadline_full_secs),
        }
    }

    pub fn heartbeat_threshold(&self) -> Duration {
        Duration::from_secs(self.heartbeat_threshold_secs)
    }

    pub fn eviction_period(&self) -> Duration {
        Duration::from_secs(self.eviction_period_secs)
    }

    /// Session directories live here; wiped on startup.
    pub fn hls_root(&self) -> PathBuf {
        self.public_root.join("hls")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.hls_root(), PathBuf::from("public/hls"));
        assert_eq!(config.probe_timeout(), Duration::from_secs(20));
        assert_eq!(config.heartbeat_threshold(), Duration::from_secs(2 * 60 * 60));
        assert_eq!(config.eviction_period(), Duration::from_secs(5 * 60));

        let deadlines = config.readiness_deadlines();
        assert_eq!(deadlines.speculative, Duration::from_secs(50));
        assert_eq!(deadlines.full, Duration::from_secs(120));
    }

    #[test]
    fn test_empty_document_deserializes_to_defaults() {
        let config: GatewayConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.ffmpeg, "ffmpeg");
        assert_eq!(config.readiness_deadline_copy_secs, 50);
        assert_eq!(config.eviction_period_secs, 300);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config: GatewayConfig = serde_json::from_str(
            r#"{"port": 8080, "heartbeat_threshold_secs": 600}"#,
        )
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.heartbeat_threshold(), Duration::from_secs(600));
        assert_eq!(config.readiness_deadline_full_secs, 120);
        assert_eq!(config.ffprobe, "ffprobe");
    }
}
