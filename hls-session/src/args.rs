//! Transcoder command-line synthesis.
//!
//! Ordering here is contractual: the transcoder rejects a `-map` that
//! references a filter label before the filter graph is declared, so the
//! blocks are emitted in a fixed sequence: global input flags, input,
//! filter graph, maps, video codec, audio codec, muxer and HLS options.
//! The whole thing is a pure function of its inputs.

use std::path::Path;

use media_probe::{AudioTrack, ProbeReport};

use crate::error::SessionError;
use crate::strategy::{AudioPlan, Mode};

/// Master playlist filename; its appearance is the readiness marker.
pub const MASTER_PLAYLIST: &str = "main.m3u8";

/// One transcoder invocation to be.
#[derive(Debug, Clone, Copy)]
pub struct TranscodeJob<'a> {
    pub url: &'a str,
    /// Forwarded to the input fetch so origin servers see the client UA.
    pub user_agent: &'a str,
    /// None when the probe failed; mapping falls back to the first audio
    /// stream, optionally.
    pub report: Option<&'a ProbeReport>,
    pub mode: &'a Mode,
    pub dir: &'a Path,
}

/// Per-track 5.1 enhancement graph.
///
/// Each track is forced to a 5.1 layout, split into channels, the center
/// and front pair get treble boosts, the boosted center is mixed 70/30
/// into the fronts and scaled 1.5x in place, and the six channels are
/// rejoined under the `[outa<i>]` label. Intermediate labels carry a
/// `_<i>` suffix so multiple tracks can share one graph.
pub fn build_audio_filter(tracks: &[AudioTrack]) -> String {
    let mut graph = String::new();
    for track in tracks {
        let (n, i) = (track.index, track.ordinal);
        graph.push_str(&format!(
            "[0:{n}]aformat=channel_layouts=5.1,channelsplit=channel_layout=5.1\
             [FL_{i}][FR_{i}][FC_{i}][LFE_{i}][BL_{i}][BR_{i}];\
             [FC_{i}]equalizer=f=5000:t=q:w=1:g=4,equalizer=f=8000:t=q:w=1:g=3[FCEQ_{i}];\
             [FL_{i}]equalizer=f=6000:t=q:w=1:g=4[FLEQ_{i}];\
             [FR_{i}]equalizer=f=6000:t=q:w=1:g=4[FREQ_{i}];\
             [FCEQ_{i}]asplit=3[FC1_{i}][FC2_{i}][FC3_{i}];\
             [FLEQ_{i}][FC1_{i}]amix=inputs=2:weights=0.7 0.3[FLOUT_{i}];\
             [FREQ_{i}][FC2_{i}]amix=inputs=2:weights=0.7 0.3[FROUT_{i}];\
             [FC3_{i}]volume=1.5[FCOUT_{i}];\
             [FLOUT_{i}][FROUT_{i}][FCOUT_{i}][LFE_{i}][BL_{i}][BR_{i}]\
             join=inputs=6:channel_layout=5.1[outa{i}];"
        ));
    }
    graph.truncate(graph.trim_end_matches(';').len());
    graph
}

/// Variant stream map: one video variant, one `audio` group, one entry per
/// audio track. With no audio the map is just the video variant.
pub fn build_var_stream_map(tracks: &[AudioTrack]) -> String {
    if tracks.is_empty() {
        return "v:0".to_string();
    }
    let mut map = "v:0,agroup:audio".to_string();
    for track in tracks {
        map.push_str(&format!(
            " a:{},agroup:audio,language:{},name:{}",
            track.ordinal, track.lang, track.title
        ));
    }
    map
}

fn push(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

fn push_audio_codec(args: &mut Vec<String>, plan: &AudioPlan) {
    push(args, &["-c:a", plan.codec]);
    if let Some(rate) = plan.sample_rate {
        args.push("-ar".to_string());
        args.push(rate.to_string());
    }
    push(args, &["-b:a", plan.bitrate]);
    args.push("-ac".to_string());
    args.push(plan.channels.to_string());
}

/// Synthesize the full transcoder argument list for a job.
pub fn build_transcode_args(job: &TranscodeJob<'_>) -> Result<Vec<String>, SessionError> {
    let audio_plan = match job.mode {
        Mode::NativeDirect => {
            return Err(SessionError::NoTranscoderForMode(job.mode.api_name()))
        }
        Mode::AudioOnly { audio, .. } | Mode::FullTranscode { audio } => Some(audio),
        Mode::VideoOnly => None,
    };

    let tracks: &[AudioTrack] = match (audio_plan, job.report) {
        (Some(_), Some(report)) => &report.audio,
        _ => &[],
    };
    let filter_active = !tracks.is_empty();

    let mut args = Vec::new();

    // Global input flags.
    push(&mut args, &["-y", "-user_agent", job.user_agent]);
    push(&mut args, &["-fflags", "+genpts"]);
    push(&mut args, &["-avoid_negative_ts", "make_zero"]);
    push(&mut args, &["-i", job.url]);

    if filter_active {
        args.push("-filter_complex".to_string());
        args.push(build_audio_filter(tracks));
    }

    // One video stream, the first.
    push(&mut args, &["-map", "0:v:0"]);

    if filter_active {
        for track in tracks {
            args.push("-map".to_string());
            args.push(format!("[outa{}]", track.ordinal));
        }
    } else if audio_plan.is_some() {
        // Probe failed: map the first audio stream if the source has one.
        push(&mut args, &["-map", "0:a:0?"]);
    }

    match job.mode {
        Mode::AudioOnly { bsf, .. } => {
            push(&mut args, &["-c:v", "copy"]);
            if let Some(bsf) = bsf {
                push(&mut args, &["-bsf:v", bsf]);
            }
        }
        _ => {
            push(&mut args, &["-c:v", "libx264", "-preset", "ultrafast", "-crf", "23"]);
        }
    }

    if let Some(plan) = audio_plan {
        push_audio_codec(&mut args, plan);
    }

    push(&mut args, &["-max_muxing_queue_size", "1024"]);
    push(&mut args, &["-f", "hls"]);
    push(&mut args, &["-hls_time", "6"]);
    push(&mut args, &["-hls_list_size", "0"]);
    push(&mut args, &["-hls_playlist_type", "event"]);
    push(&mut args, &["-hls_allow_cache", "1"]);
    push(&mut args, &["-start_number", "0"]);
    push(&mut args, &["-master_pl_name", MASTER_PLAYLIST]);

    args.push("-var_stream_map".to_string());
    if filter_active {
        args.push(build_var_stream_map(tracks));
    } else if audio_plan.is_some() {
        args.push("v:0,agroup:audio a:0,agroup:audio,language:und,name:Track1".to_string());
    } else {
        args.push("v:0".to_string());
    }

    args.push("-hls_segment_filename".to_string());
    args.push(job.dir.join("stream_%v_%d.ts").to_string_lossy().into_owned());
    args.push(job.dir.join("stream_%v.m3u8").to_string_lossy().into_owned());

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::AudioPlan;
    use media_probe::SubtitleTrack;
    use std::path::PathBuf;

    fn track(index: usize, ordinal: usize, lang: &str, title: &str, codec: &str) -> AudioTrack {
        AudioTrack {
            index,
            ordinal,
            lang: lang.to_string(),
            title: title.to_string(),
            codec: codec.to_string(),
        }
    }

    fn report(video: &str, audio: Vec<AudioTrack>) -> ProbeReport {
        ProbeReport {
            video_codec: video.to_string(),
            video_profile: None,
            video_level: 0,
            audio,
            subtitles: Vec::<SubtitleTrack>::new(),
            duration: 100.0,
        }
    }

    fn pos(args: &[String], needle: &str) -> usize {
        args.iter()
            .position(|a| a == needle)
            .unwrap_or_else(|| panic!("{needle} not in {args:?}"))
    }

    #[test]
    fn test_audio_only_hevc_plan() {
        let r = report("hevc", vec![track(1, 0, "eng", "Surround_5_1", "dts")]);
        let mode = Mode::AudioOnly {
            bsf: Some("hevc_mp4toannexb"),
            audio: AudioPlan::tv(),
        };
        let dir = PathBuf::from("/tmp/hls/s3");
        let args = build_transcode_args(&TranscodeJob {
            url: "http://src/film.mkv",
            user_agent: "tv-agent",
            report: Some(&r),
            mode: &mode,
            dir: &dir,
        })
        .unwrap();

        // copy + matching annex-B filter
        assert!(args.windows(2).any(|w| w == ["-c:v", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-bsf:v", "hevc_mp4toannexb"]));
        // ac3 48 kHz 640k 6ch
        assert!(args.windows(2).any(|w| w == ["-c:a", "ac3"]));
        assert!(args.windows(2).any(|w| w == ["-ar", "48000"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "640k"]));
        assert!(args.windows(2).any(|w| w == ["-ac", "6"]));
        // variant map grammar
        let map = &args[pos(&args, "-var_stream_map") + 1];
        assert_eq!(
            map,
            "v:0,agroup:audio a:0,agroup:audio,language:eng,name:Surround_5_1"
        );
        // filter declared before any map referencing its labels
        assert!(pos(&args, "-filter_complex") < pos(&args, "-map"));
        assert!(args.iter().any(|a| a == "[outa0]"));
    }

    #[test]
    fn test_full_transcode_browser_plan() {
        let r = report("h264", vec![track(1, 0, "eng", "Track1", "aac")]);
        let mode = Mode::FullTranscode {
            audio: AudioPlan::browser(),
        };
        let dir = PathBuf::from("/tmp/hls/s1");
        let args = build_transcode_args(&TranscodeJob {
            url: "http://src/film.mp4",
            user_agent: "Mozilla/5.0",
            report: Some(&r),
            mode: &mode,
            dir: &dir,
        })
        .unwrap();

        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "ultrafast"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "23"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        // source sample rate kept
        assert!(!args.iter().any(|a| a == "-ar"));
        assert!(!args.iter().any(|a| a == "-bsf:v"));
    }

    #[test]
    fn test_video_only_emits_no_audio_flags() {
        let r = report("mpeg2video", vec![]);
        let dir = PathBuf::from("/tmp/hls/s2");
        let args = build_transcode_args(&TranscodeJob {
            url: "u",
            user_agent: "ua",
            report: Some(&r),
            mode: &Mode::VideoOnly,
            dir: &dir,
        })
        .unwrap();

        assert!(!args.iter().any(|a| a == "-c:a"));
        assert!(!args.iter().any(|a| a == "-filter_complex"));
        let map = &args[pos(&args, "-var_stream_map") + 1];
        assert_eq!(map, "v:0");
    }

    #[test]
    fn test_probe_failure_maps_audio_optionally() {
        let dir = PathBuf::from("/tmp/hls/s4");
        let args = build_transcode_args(&TranscodeJob {
            url: "u",
            user_agent: "ua",
            report: None,
            mode: &Mode::FullTranscode {
                audio: AudioPlan::browser(),
            },
            dir: &dir,
        })
        .unwrap();

        assert!(!args.iter().any(|a| a == "-filter_complex"));
        assert!(args.windows(2).any(|w| w == ["-map", "0:a:0?"]));
        let map = &args[pos(&args, "-var_stream_map") + 1];
        assert_eq!(map, "v:0,agroup:audio a:0,agroup:audio,language:und,name:Track1");
    }

    #[test]
    fn test_native_direct_has_no_args() {
        let dir = PathBuf::from("/tmp/hls/s5");
        let err = build_transcode_args(&TranscodeJob {
            url: "u",
            user_agent: "ua",
            report: None,
            mode: &Mode::NativeDirect,
            dir: &dir,
        })
        .unwrap_err();
        assert!(matches!(err, SessionError::NoTranscoderForMode(_)));
    }

    #[test]
    fn test_stable_ordering_and_single_hls_flags() {
        let r = report("h264", vec![track(1, 0, "eng", "A", "dts")]);
        let mode = Mode::FullTranscode { audio: AudioPlan::tv() };
        let dir = PathBuf::from("/d");
        let args = build_transcode_args(&TranscodeJob {
            url: "u",
            user_agent: "ua",
            report: Some(&r),
            mode: &mode,
            dir: &dir,
        })
        .unwrap();

        assert_eq!(args[0], "-y");
        assert!(pos(&args, "-i") < pos(&args, "-filter_complex"));
        assert!(pos(&args, "-c:v") < pos(&args, "-c:a"));
        assert!(pos(&args, "-max_muxing_queue_size") < pos(&args, "-f"));
        assert_eq!(args.iter().filter(|a| *a == "-hls_time").count(), 1);
        assert_eq!(args.iter().filter(|a| *a == "-hls_list_size").count(), 1);
        // outputs come last: segment template then variant playlist template
        assert_eq!(args[args.len() - 1], "/d/stream_%v.m3u8");
        assert_eq!(args[args.len() - 2], "/d/stream_%v_%d.ts");
    }

    #[test]
    fn test_filter_graph_labels_are_per_track() {
        let tracks = vec![
            track(1, 0, "eng", "A", "dts"),
            track(2, 1, "fre", "B", "truehd"),
        ];
        let graph = build_audio_filter(&tracks);

        assert!(graph.contains("[0:1]aformat=channel_layouts=5.1"));
        assert!(graph.contains("[0:2]aformat=channel_layouts=5.1"));
        assert!(graph.contains("[outa0]"));
        assert!(graph.contains("[outa1]"));
        assert!(graph.contains("equalizer=f=5000:t=q:w=1:g=4"));
        assert!(graph.contains("equalizer=f=8000:t=q:w=1:g=3"));
        assert!(graph.contains("equalizer=f=6000:t=q:w=1:g=4"));
        assert!(graph.contains("amix=inputs=2:weights=0.7 0.3"));
        assert!(graph.contains("volume=1.5"));
        assert!(graph.contains("join=inputs=6:channel_layout=5.1"));
        // no dangling separator
        assert!(!graph.ends_with(';'));
        // labels from different tracks never collide
        assert!(graph.contains("[FC3_0]"));
        assert!(graph.contains("[FC3_1]"));
    }
}
