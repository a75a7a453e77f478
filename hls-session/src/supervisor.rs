//! Transcoder process supervision.
//!
//! `start` returns once the transcoder is *ready* (the master playlist
//! exists in the session directory) or has failed, never when it exits;
//! a healthy transcoder keeps running long after this call. Readiness is
//! polled every 500 ms under a mode-dependent deadline while the child is
//! watched for early exit. Speculative modes that die before readiness are
//! retried once as a full transcode.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::Instant;

use crate::args::{build_transcode_args, TranscodeJob, MASTER_PLAYLIST};
use crate::error::SessionError;
use crate::strategy::Mode;

const READINESS_POLL: Duration = Duration::from_millis(500);

/// How long a spawn may take to produce the master playlist, by mode.
/// Speculative copies either work almost immediately or not at all; a
/// cold full transcode of a large source needs the long leash.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessDeadlines {
    pub speculative: Duration,
    pub full: Duration,
}

impl Default for ReadinessDeadlines {
    fn default() -> Self {
        Self {
            speculative: Duration::from_secs(50),
            full: Duration::from_secs(120),
        }
    }
}

impl ReadinessDeadlines {
    pub fn for_mode(&self, mode: &Mode) -> Duration {
        if mode.is_speculative() {
            self.speculative
        } else {
            self.full
        }
    }
}

/// A running transcoder owned by one session.
#[derive(Debug)]
pub struct TranscoderHandle {
    child: Child,
    mode_name: &'static str,
}

impl TranscoderHandle {
    pub fn mode_name(&self) -> &'static str {
        self.mode_name
    }

    /// Whether the process is still alive. A handle that observed its own
    /// exit stays dead.
    pub fn is_running(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(Some(_)) | Err(_))
    }

    pub async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

impl Drop for TranscoderHandle {
    fn drop(&mut self) {
        // Safety net when a session is dropped without an explicit stop.
        let _ = self.child.start_kill();
    }
}

/// Outcome of a successful `start`.
#[derive(Debug)]
pub struct StartOutcome {
    pub handle: TranscoderHandle,
    /// Mode actually running, after any fallback.
    pub mode_name: &'static str,
    /// True when the speculative mode died and the fallback is running;
    /// the caller records this as the session's sticky force flag.
    pub fell_back: bool,
}

/// Spawns and supervises transcoder processes.
#[derive(Debug, Clone)]
pub struct Supervisor {
    ffmpeg: String,
    deadlines: ReadinessDeadlines,
}

/// Startup failures are worth a retry in a safer mode; anything after
/// readiness is not our problem here.
fn should_fall_back(mode: &Mode, err: &SessionError) -> bool {
    mode.is_speculative()
        && matches!(
            err,
            SessionError::StartupExit { .. } | SessionError::ReadinessTimeout { .. }
        )
}

impl Supervisor {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self::with_deadlines(ffmpeg, ReadinessDeadlines::default())
    }

    pub fn with_deadlines(ffmpeg: impl Into<String>, deadlines: ReadinessDeadlines) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            deadlines,
        }
    }

    /// Spawn the transcoder for `job` and wait for readiness. When the
    /// chosen mode is speculative and dies before readiness, retry once
    /// with `fallback`.
    pub async fn start(
        &self,
        job: &TranscodeJob<'_>,
        fallback: Option<Mode>,
    ) -> Result<StartOutcome, SessionError> {
        let args = build_transcode_args(job)?;

        match self
            .attempt(&args, job.dir, self.deadlines.for_mode(job.mode))
            .await
        {
            Ok(child) => Ok(StartOutcome {
                handle: TranscoderHandle {
                    child,
                    mode_name: job.mode.api_name(),
                },
                mode_name: job.mode.api_name(),
                fell_back: false,
            }),
            Err(err) if should_fall_back(job.mode, &err) => {
                let Some(fallback) = fallback else {
                    return Err(err);
                };
                tracing::warn!(
                    "transcoder for {} failed in mode {} ({}), falling back to {}",
                    job.url,
                    job.mode.api_name(),
                    err,
                    fallback.api_name()
                );

                let retry = TranscodeJob { mode: &fallback, ..*job };
                let args = build_transcode_args(&retry)?;
                let child = self
                    .attempt(&args, retry.dir, self.deadlines.for_mode(&fallback))
                    .await?;
                Ok(StartOutcome {
                    handle: TranscoderHandle {
                        child,
                        mode_name: fallback.api_name(),
                    },
                    mode_name: fallback.api_name(),
                    fell_back: true,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// One spawn + readiness wait. Kills the child on timeout.
    async fn attempt(
        &self,
        args: &[String],
        dir: &Path,
        deadline: Duration,
    ) -> Result<Child, SessionError> {
        tracing::debug!("spawning {} {}", self.ffmpeg, args.join(" "));

        let mut child = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(tail_stderr(stderr));
        }

        let marker = dir.join(MASTER_PLAYLIST);
        let give_up = Instant::now() + deadline;

        loop {
            if tokio::fs::try_exists(&marker).await.unwrap_or(false) {
                tracing::info!("master playlist ready in {}", dir.display());
                return Ok(child);
            }

            match child.try_wait() {
                Ok(Some(status)) if !status.success() => {
                    return Err(SessionError::StartupExit {
                        code: status.code().unwrap_or(-1),
                    });
                }
                Ok(Some(_)) => {
                    // Exited cleanly without a playlist: a short source
                    // could legitimately finish between polls, so check
                    // the marker once more before giving up.
                    if tokio::fs::try_exists(&marker).await.unwrap_or(false) {
                        return Ok(child);
                    }
                    return Err(SessionError::StartupExit { code: 0 });
                }
                _ => {}
            }

            if Instant::now() >= give_up {
                let _ = child.kill().await;
                return Err(SessionError::ReadinessTimeout {
                    seconds: deadline.as_secs(),
                });
            }

            tokio::time::sleep(READINESS_POLL).await;
        }
    }
}

/// Forward only lines that look like trouble; the transcoder is chatty
/// and everything else would swamp the log.
async fn tail_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let lower = line.to_ascii_lowercase();
        if lower.contains("error") || lower.contains("fail") {
            tracing::warn!(target: "transcoder", "{}", line);
        }
    }
}
