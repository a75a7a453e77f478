use serde::Deserialize;

use crate::error::ProbeError;

/// Subtitle codecs the text-VTT extractor can convert. Anything else
/// (PGS, DVB bitmaps, ...) is dropped from the report.
pub const TEXT_SUBTITLE_CODECS: &[&str] =
    &["subrip", "webvtt", "ass", "ssa", "mov_text", "mpl2", "text"];

/// One audio track of the source, in absolute source-stream terms.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    /// Absolute stream index in the source container.
    pub index: usize,
    /// Position among the audio tracks (0-based, ascending index order).
    pub ordinal: usize,
    /// ISO language tag, `und` when the container carries none.
    pub lang: String,
    /// Title reduced to `[A-Za-z0-9_]`, never empty.
    pub title: String,
    /// Source codec name as reported by the inspector.
    pub codec: String,
}

/// One text subtitle track of the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleTrack {
    /// Absolute stream index in the source container.
    pub index: usize,
    pub lang: String,
    pub title: String,
    pub codec: String,
}

/// Reduced inspector report for one source URL.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub video_codec: String,
    pub video_profile: Option<String>,
    /// Codec level as reported; 0 means unknown.
    pub video_level: i64,
    pub audio: Vec<AudioTrack>,
    pub subtitles: Vec<SubtitleTrack>,
    /// Total duration in seconds, 0.0 when the container does not say.
    pub duration: f64,
}

// Raw ffprobe JSON shapes. Only the fields we read are declared; ffprobe
// emits many more and serde ignores them.

#[derive(Debug, Deserialize)]
pub(crate) struct RawProbe {
    #[serde(default)]
    pub streams: Vec<RawStream>,
    pub format: Option<RawFormat>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStream {
    pub index: usize,
    pub codec_type: String,
    pub codec_name: Option<String>,
    pub profile: Option<String>,
    pub level: Option<i64>,
    #[serde(default)]
    pub tags: RawTags,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTags {
    pub language: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFormat {
    pub duration: Option<String>,
}

/// Reduce a raw title to `[A-Za-z0-9_]` with outer underscores stripped;
/// falls back to `fallback` when nothing survives.
pub fn sanitize_title(raw: Option<&str>, fallback: &str) -> String {
    let cleaned: String = raw
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

impl ProbeReport {
    pub(crate) fn from_raw(raw: RawProbe) -> Result<Self, ProbeError> {
        let video = raw
            .streams
            .iter()
            .filter(|s| s.codec_type == "video")
            .min_by_key(|s| s.index)
            .ok_or(ProbeError::NoVideoStream)?;

        let mut audio_streams: Vec<&RawStream> = raw
            .streams
            .iter()
            .filter(|s| s.codec_type == "audio")
            .collect();
        audio_streams.sort_by_key(|s| s.index);

        let mut audio = Vec::new();
        for stream in audio_streams {
            let ordinal = audio.len();
            audio.push(AudioTrack {
                index: stream.index,
                ordinal,
                lang: stream
                    .tags
                    .language
                    .clone()
                    .unwrap_or_else(|| "und".to_string()),
                title: sanitize_title(
                    stream.tags.title.as_deref(),
                    &format!("Track{}", ordinal + 1),
                ),
                codec: stream.codec_name.clone().unwrap_or_default(),
            });
        }

        let subtitles = raw
            .streams
            .iter()
            .filter(|s| s.codec_type == "subtitle")
            .filter(|s| {
                s.codec_name
                    .as_deref()
                    .is_some_and(|c| TEXT_SUBTITLE_CODECS.contains(&c))
            })
            .map(|s| SubtitleTrack {
                index: s.index,
                lang: s
                    .tags
                    .language
                    .clone()
                    .unwrap_or_else(|| "und".to_string()),
                title: s.tags.title.clone().unwrap_or_default(),
                codec: s.codec_name.clone().unwrap_or_default(),
            })
            .collect();

        let duration = raw
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(ProbeReport {
            video_codec: video.codec_name.clone().unwrap_or_default(),
            video_profile: video.profile.clone(),
            video_level: video.level.unwrap_or(0),
            audio,
            subtitles,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<ProbeReport, ProbeError> {
        let raw: RawProbe = serde_json::from_str(json).unwrap();
        ProbeReport::from_raw(raw)
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title(Some("Director's Cut"), "x"), "Director_s_Cut");
        assert_eq!(sanitize_title(Some("__5.1 Mix__"), "x"), "5_1_Mix");
        assert_eq!(sanitize_title(Some("***"), "Track1"), "Track1");
        assert_eq!(sanitize_title(None, "Track2"), "Track2");
    }

    #[test]
    fn test_full_report() {
        let report = parse(
            r#"{
              "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264",
                 "profile": "High", "level": 40},
                {"index": 1, "codec_type": "audio", "codec_name": "ac3",
                 "tags": {"language": "eng", "title": "Surround 5.1"}},
                {"index": 2, "codec_type": "audio", "codec_name": "dts"},
                {"index": 3, "codec_type": "subtitle", "codec_name": "subrip",
                 "tags": {"language": "eng", "title": "English"}},
                {"index": 4, "codec_type": "subtitle", "codec_name": "hdmv_pgs_subtitle"}
              ],
              "format": {"duration": "5400.25"}
            }"#,
        )
        .unwrap();

        assert_eq!(report.video_codec, "h264");
        assert_eq!(report.video_profile.as_deref(), Some("High"));
        assert_eq!(report.video_level, 40);
        assert_eq!(report.duration, 5400.25);

        assert_eq!(report.audio.len(), 2);
        assert_eq!(report.audio[0].index, 1);
        assert_eq!(report.audio[0].ordinal, 0);
        assert_eq!(report.audio[0].lang, "eng");
        assert_eq!(report.audio[0].title, "Surround_5_1");
        assert_eq!(report.audio[1].index, 2);
        assert_eq!(report.audio[1].ordinal, 1);
        assert_eq!(report.audio[1].lang, "und");
        assert_eq!(report.audio[1].title, "Track2");

        // Image subtitles dropped, text subtitles keep the absolute index.
        assert_eq!(report.subtitles.len(), 1);
        assert_eq!(report.subtitles[0].index, 3);
        assert_eq!(report.subtitles[0].codec, "subrip");
    }

    #[test]
    fn test_no_video_stream_is_an_error() {
        let err = parse(
            r#"{"streams": [{"index": 0, "codec_type": "audio", "codec_name": "aac"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProbeError::NoVideoStream));
    }

    #[test]
    fn test_unknown_level_defaults_to_zero() {
        let report = parse(
            r#"{"streams": [{"index": 0, "codec_type": "video", "codec_name": "vp9"}]}"#,
        )
        .unwrap();
        assert_eq!(report.video_level, 0);
        assert!(report.video_profile.is_none());
        assert_eq!(report.duration, 0.0);
    }
}
