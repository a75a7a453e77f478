use std::process::Stdio;
use tokio::process::Command;

use crate::error::ProbeError;
use crate::report::{ProbeReport, RawProbe};

/// Runs the external inspector against source URLs.
///
/// The call blocks until the inspector exits; callers are expected to wrap
/// it in their own deadline (`tokio::time::timeout`). No retries happen
/// here.
#[derive(Debug, Clone)]
pub struct Prober {
    ffprobe: String,
}

impl Prober {
    pub fn new(ffprobe: impl Into<String>) -> Self {
        Self { ffprobe: ffprobe.into() }
    }

    /// Probe a source URL and reduce the inspector output to a report.
    pub async fn probe_url(&self, url: &str) -> Result<ProbeReport, ProbeError> {
        tracing::debug!("probing source {}", url);

        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ProbeError::Inspector {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let raw: RawProbe = serde_json::from_slice(&output.stdout)?;
        ProbeReport::from_raw(raw)
    }
}

/// Check that the ffprobe binary is runnable.
pub async fn check_ffprobe(ffprobe: &str) -> Result<(), ProbeError> {
    let output = Command::new(ffprobe)
        .arg("-version")
        .output()
        .await?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ProbeError::Inspector {
            code: output.status.code().unwrap_or(-1),
            stderr: "ffprobe -version returned non-zero".to_string(),
        })
    }
}
