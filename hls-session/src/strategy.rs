//! Transcoding strategy selection.
//!
//! Given the probe report, the device class, and the force flags, decide
//! how the source is delivered. First match wins:
//!
//! 1. any force flag set            -> full transcode
//! 2. TV, whole stream playable     -> native direct (proxy raw bytes)
//! 3. TV, only video playable       -> copy video, transcode audio
//! 4. anything else                 -> full transcode
//!
//! A source with no audio streams transcodes video only. The selector is a
//! pure function: same inputs, same mode.

use media_probe::ProbeReport;

use crate::device::{Capabilities, DeviceClass};

/// Target audio encode settings. Channel count is always six; transcoded
/// output is mixed for a 5.1 layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioPlan {
    pub codec: &'static str,
    /// None keeps the source sample rate.
    pub sample_rate: Option<u32>,
    pub bitrate: &'static str,
    pub channels: u32,
}

impl AudioPlan {
    /// AC-3 at 48 kHz; what the supported TV firmwares decode in hardware.
    pub fn tv() -> AudioPlan {
        AudioPlan {
            codec: "ac3",
            sample_rate: Some(48_000),
            bitrate: "640k",
            channels: 6,
        }
    }

    /// AAC at the source sample rate for browser playback.
    pub fn browser() -> AudioPlan {
        AudioPlan {
            codec: "aac",
            sample_rate: None,
            bitrate: "640k",
            channels: 6,
        }
    }

    pub fn for_device(device: &DeviceClass) -> AudioPlan {
        match device {
            DeviceClass::Tv(_) => AudioPlan::tv(),
            DeviceClass::Browser => AudioPlan::browser(),
        }
    }
}

/// Delivery mode with its codec plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No transcoder; the raw source bytes are proxied to the device.
    NativeDirect,
    /// Copy the video stream, transcode every audio stream.
    AudioOnly {
        /// Annex-B bitstream filter matching the copied video codec.
        /// None for codecs that need no repackaging.
        bsf: Option<&'static str>,
        audio: AudioPlan,
    },
    /// Re-encode video and audio.
    FullTranscode { audio: AudioPlan },
    /// Re-encode video; the source has no audio streams.
    VideoOnly,
}

impl Mode {
    pub fn api_name(&self) -> &'static str {
        match self {
            Mode::NativeDirect => "NATIVE_DIRECT",
            Mode::AudioOnly { .. } => "AUDIO_ONLY",
            Mode::FullTranscode { .. } => "FULL_TRANSCODE",
            Mode::VideoOnly => "VIDEO_ONLY",
        }
    }

    /// Speculative modes gamble that stream copy will work; when they die
    /// on startup the supervisor retries with a full transcode.
    pub fn is_speculative(&self) -> bool {
        matches!(self, Mode::AudioOnly { .. })
    }

    pub fn spawns_transcoder(&self) -> bool {
        !matches!(self, Mode::NativeDirect)
    }
}

/// Annex-B repackaging filter for a copied video codec. Picking the wrong
/// one yields an unplayable stream with no hard error, so this is keyed
/// strictly on the probed codec name.
fn bitstream_filter(codec: &str) -> Option<&'static str> {
    match codec {
        "h264" => Some("h264_mp4toannexb"),
        "hevc" => Some("hevc_mp4toannexb"),
        _ => None,
    }
}

fn video_compatible(report: &ProbeReport, caps: &Capabilities) -> bool {
    if !caps.allowed_video.contains(&report.video_codec.as_str()) {
        return false;
    }

    if let Some(profile) = &report.video_profile {
        let profile = profile.to_ascii_lowercase();
        if !caps.allowed_profiles.iter().any(|p| profile.contains(p)) {
            return false;
        }
    }

    // Level 0 means the container did not say; give it the benefit of
    // the doubt.
    if report.video_level != 0 {
        let max = match report.video_codec.as_str() {
            "h264" => Some(caps.max_h264_level),
            "hevc" => Some(caps.max_hevc_level),
            _ => None,
        };
        if let Some(max) = max {
            if report.video_level > max {
                return false;
            }
        }
    }

    true
}

fn audio_compatible(report: &ProbeReport, caps: &Capabilities) -> bool {
    report
        .audio
        .iter()
        .all(|t| caps.allowed_audio.contains(&t.codec.as_str()))
}

/// Full transcode, degraded to video-only when the source has no audio.
fn full_transcode(report: Option<&ProbeReport>, device: &DeviceClass) -> Mode {
    match report {
        Some(r) if r.audio.is_empty() => Mode::VideoOnly,
        _ => Mode::FullTranscode {
            audio: AudioPlan::for_device(device),
        },
    }
}

/// Pick the delivery mode. `report` is None when the probe failed, which
/// reads as "unknown video codec, assume full transcode".
pub fn select_mode(
    report: Option<&ProbeReport>,
    device: &DeviceClass,
    user_force: bool,
    sticky_force: bool,
) -> Mode {
    if user_force || sticky_force {
        return full_transcode(report, device);
    }

    let brand = match device {
        DeviceClass::Tv(brand) => brand,
        DeviceClass::Browser => return full_transcode(report, device),
    };

    let Some(report) = report else {
        return full_transcode(None, device);
    };

    let caps = brand.capabilities();
    if !video_compatible(report, caps) {
        return full_transcode(Some(report), device);
    }

    if audio_compatible(report, caps) {
        Mode::NativeDirect
    } else {
        Mode::AudioOnly {
            bsf: bitstream_filter(&report.video_codec),
            audio: AudioPlan::tv(),
        }
    }
}
