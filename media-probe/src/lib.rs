//! Media source inspection for the HLS gateway.
//!
//! This crate wraps the external `ffprobe` inspector. It runs the tool
//! against a remote URL, parses the JSON report, and reduces it to the
//! stream facts the streaming engine cares about:
//!
//! - the primary video track (codec, profile, level)
//! - every audio track, in source order, with stable ordinals
//! - text-based subtitle tracks (image subtitles are dropped; the
//!   downstream VTT extractor cannot render them)
//! - total duration
//!
//! # Usage
//!
//! ```rust,ignore
//! use media_probe::Prober;
//!
//! let prober = Prober::new("ffprobe");
//! let report = prober.probe_url("http://example/movie.mkv").await?;
//! println!("video codec: {}", report.video_codec);
//! ```

pub mod error;
pub mod probe;
pub mod report;

pub use error::ProbeError;
pub use probe::Prober;
pub use report::{AudioTrack, ProbeReport, SubtitleTrack};

/// Check that the ffprobe binary is available.
pub async fn check_dependencies(ffprobe: &str) -> Result<(), ProbeError> {
    probe::check_ffprobe(ffprobe).await
}
