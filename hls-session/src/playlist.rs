//! Encoded-progress reporting from playlist text.
//!
//! The heartbeat response tells clients how much of the source has been
//! encoded so they can cap seeks. Progress is the sum of `#EXTINF`
//! durations; the live edge keeps an 8 second margin for segments that
//! are declared but not yet fully on disk.

use std::path::Path;

use crate::args::MASTER_PLAYLIST;

/// Seconds between the last declared segment and the last safely
/// seekable position.
pub const LIVE_EDGE_MARGIN_SECS: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub encoded_duration: f64,
    pub live_edge: f64,
}

/// Sum every `#EXTINF:<d>,` directive in a playlist.
pub fn encoded_duration(playlist: &str) -> f64 {
    playlist
        .lines()
        .filter_map(|line| line.strip_prefix("#EXTINF:"))
        .filter_map(|rest| rest.split(',').next())
        .filter_map(|d| d.trim().parse::<f64>().ok())
        .sum()
}

pub fn live_edge(encoded: f64) -> f64 {
    (encoded - LIVE_EDGE_MARGIN_SECS).max(0.0)
}

/// Progress for a session directory. The master playlist is consulted
/// first; when it only enumerates variants (no `#EXTINF` of its own) the
/// first variant playlist is summed instead. Missing files read as zero
/// progress, not as an error.
pub async fn session_progress(dir: &Path) -> Progress {
    let mut encoded = match tokio::fs::read_to_string(dir.join(MASTER_PLAYLIST)).await {
        Ok(text) => encoded_duration(&text),
        Err(_) => 0.0,
    };

    if encoded == 0.0 {
        if let Ok(text) = tokio::fs::read_to_string(dir.join("stream_0.m3u8")).await {
            encoded = encoded_duration(&text);
        }
    }

    Progress {
        encoded_duration: encoded,
        live_edge: live_edge(encoded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VARIANT: &str = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-TARGETDURATION:6\n\
        #EXT-X-PLAYLIST-TYPE:EVENT\n\
        #EXTINF:6.000000,\n\
        stream_0_0.ts\n\
        #EXTINF:6.000000,\n\
        stream_0_1.ts\n\
        #EXTINF:4.500000,\n\
        stream_0_2.ts\n";

    #[test]
    fn test_extinf_sum() {
        assert_eq!(encoded_duration(VARIANT), 16.5);
        assert_eq!(encoded_duration("#EXTM3U\n"), 0.0);
        assert_eq!(encoded_duration(""), 0.0);
    }

    #[test]
    fn test_live_edge_margin() {
        assert_eq!(live_edge(16.5), 8.5);
        assert_eq!(live_edge(12.0), 4.0);
        // never negative while the encoder warms up
        assert_eq!(live_edge(6.0), 0.0);
        assert_eq!(live_edge(0.0), 0.0);
    }

    #[tokio::test]
    async fn test_progress_falls_back_to_variant_playlist() {
        let dir = TempDir::new().unwrap();
        // Master enumerates variants only.
        tokio::fs::write(
            dir.path().join(MASTER_PLAYLIST),
            "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nstream_0.m3u8\n",
        )
        .await
        .unwrap();
        tokio::fs::write(dir.path().join("stream_0.m3u8"), VARIANT)
            .await
            .unwrap();

        let progress = session_progress(dir.path()).await;
        assert_eq!(progress.encoded_duration, 16.5);
        assert_eq!(progress.live_edge, 8.5);
    }

    #[tokio::test]
    async fn test_progress_without_playlists_is_zero() {
        let dir = TempDir::new().unwrap();
        let progress = session_progress(dir.path()).await;
        assert_eq!(progress.encoded_duration, 0.0);
        assert_eq!(progress.live_edge, 0.0);
    }
}
