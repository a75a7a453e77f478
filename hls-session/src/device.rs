//! Device classification and playback capability constants.
//!
//! The capability table is design-time data: it encodes what the supported
//! TV firmwares decode in hardware, not anything configurable at runtime.

/// TV brand, derived from the request User-Agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvBrand {
    Samsung,
    Lg,
    AndroidTv,
    Generic,
}

/// Coarse device class a request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Tv(TvBrand),
    Browser,
}

/// What a device class can play without help.
#[derive(Debug)]
pub struct Capabilities {
    pub allowed_video: &'static [&'static str],
    /// H.264 and HEVC levels use different numeric scales; compare each
    /// codec against its own ceiling.
    pub max_h264_level: i64,
    pub max_hevc_level: i64,
    pub allowed_audio: &'static [&'static str],
    /// Matched by lowercase substring against the reported profile.
    pub allowed_profiles: &'static [&'static str],
}

const SAMSUNG: Capabilities = Capabilities {
    allowed_video: &["h264", "hevc"],
    max_h264_level: 51,
    max_hevc_level: 153,
    allowed_audio: &["aac", "ac3", "eac3", "mp3"],
    allowed_profiles: &["baseline", "main", "high", "main 10"],
};

const LG: Capabilities = Capabilities {
    allowed_video: &["h264", "hevc"],
    max_h264_level: 51,
    max_hevc_level: 153,
    allowed_audio: &["aac", "ac3", "eac3", "mp3"],
    allowed_profiles: &["baseline", "main", "high", "main 10"],
};

const ANDROID_TV: Capabilities = Capabilities {
    allowed_video: &["h264", "hevc", "vp9"],
    max_h264_level: 52,
    max_hevc_level: 156,
    allowed_audio: &["aac", "ac3", "eac3", "opus", "mp3"],
    allowed_profiles: &["baseline", "main", "high", "main 10", "high10"],
};

const GENERIC_TV: Capabilities = Capabilities {
    allowed_video: &["h264", "hevc"],
    max_h264_level: 51,
    max_hevc_level: 153,
    allowed_audio: &["aac", "ac3", "eac3", "mp3"],
    allowed_profiles: &["baseline", "main", "high", "main 10"],
};

/// User-Agent fragments that mark a TV-class client.
const TV_MARKERS: &[&str] = &["smart-tv", "smarttv", "tizen", "webos", "web0s", "android tv", "aft"];

impl TvBrand {
    pub fn capabilities(&self) -> &'static Capabilities {
        match self {
            TvBrand::Samsung => &SAMSUNG,
            TvBrand::Lg => &LG,
            TvBrand::AndroidTv => &ANDROID_TV,
            TvBrand::Generic => &GENERIC_TV,
        }
    }

    fn from_user_agent(ua: &str) -> TvBrand {
        if ua.contains("tizen") || ua.contains("samsung") {
            TvBrand::Samsung
        } else if ua.contains("webos") || ua.contains("web0s") || ua.contains("lg ") {
            TvBrand::Lg
        } else if ua.contains("android") {
            TvBrand::AndroidTv
        } else {
            TvBrand::Generic
        }
    }
}

impl DeviceClass {
    /// Classify a request from its User-Agent, with an explicit override
    /// (`device=tv`) forcing the TV class.
    pub fn from_request(user_agent: &str, force_tv: bool) -> DeviceClass {
        let ua = user_agent.to_ascii_lowercase();
        let is_tv = force_tv || TV_MARKERS.iter().any(|m| ua.contains(m));
        if is_tv {
            DeviceClass::Tv(TvBrand::from_user_agent(&ua))
        } else {
            DeviceClass::Browser
        }
    }
}
