//! In-memory session table.
//!
//! One mutex guards the id -> session map and is only ever held briefly;
//! each session sits behind its own `Arc<Mutex<_>>` so long operations
//! (probe, spawn, readiness wait) serialize per session without stalling
//! the table. Session ids come from clients and become path components,
//! so they are validated before any path is formed from them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::SessionError;
use crate::supervisor::TranscoderHandle;

/// One streaming session, keyed by a client-chosen id.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    /// Directory owned by this session; exists while the session does.
    pub dir: PathBuf,
    /// Input URL currently being streamed; present whenever a transcoder
    /// handle is.
    pub source_url: Option<String>,
    pub transcoder: Option<TranscoderHandle>,
    pub last_heartbeat: Instant,
    /// Sticky: set when a speculative mode fell back, skips pass-through
    /// for every later start in this session.
    pub force_transcode: bool,
}

impl Session {
    fn new(id: String, dir: PathBuf) -> Self {
        Self {
            id,
            dir,
            source_url: None,
            transcoder: None,
            last_heartbeat: Instant::now(),
            force_transcode: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    /// Whether a transcoder is live right now. A handle whose process has
    /// exited behind our back is cleared here, so the next start respawns.
    pub fn is_transcoding(&mut self) -> bool {
        match self.transcoder.as_mut() {
            Some(handle) => {
                if handle.is_running() {
                    true
                } else {
                    tracing::warn!("transcoder for session {} exited", self.id);
                    self.transcoder = None;
                    false
                }
            }
            None => false,
        }
    }

    pub async fn kill_transcoder(&mut self) {
        if let Some(mut handle) = self.transcoder.take() {
            tracing::info!("killing transcoder for session {}", self.id);
            handle.kill().await;
        }
    }

    /// Drop any artifacts from a previous run and recreate the directory.
    /// A leftover master playlist would satisfy the readiness check for a
    /// transcoder that has not produced anything yet.
    pub async fn clear_dir(&self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        tokio::fs::create_dir_all(&self.dir).await
    }
}

/// Session ids become filesystem path components; accept only short
/// alphanumeric/dash/underscore tokens starting with an alphanumeric.
pub fn is_valid_session_id(id: &str) -> bool {
    if id.is_empty() || id.len() > 64 {
        return false;
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return false;
    }
    id.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
}

/// Table of sessions under one HLS root directory.
pub struct SessionStore {
    root: PathBuf,
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Startup hygiene: sessions do not survive a process restart, so the
    /// whole root is wiped and recreated.
    pub async fn reset_root(&self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Fetch the session for `id`, constructing it (and its directory) on
    /// first sight. Rejects ids that cannot safely name a directory.
    pub async fn get_or_create(&self, id: &str) -> Result<Arc<Mutex<Session>>, SessionError> {
        if !is_valid_session_id(id) {
            return Err(SessionError::InvalidSessionId(id.to_string()));
        }

        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(id) {
            return Ok(session.clone());
        }

        let dir = self.root.join(id);
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!("created session {} at {}", id, dir.display());

        let session = Arc::new(Mutex::new(Session::new(id.to_string(), dir)));
        sessions.insert(id.to_string(), session.clone());
        Ok(session)
    }

    pub async fn lookup(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Lock the session for `id` and guarantee the guard belongs to the
    /// table's *current* entry. Eviction can win the race for the
    /// per-session lock between a lookup and our acquisition; a guard for
    /// an entry that is no longer in the table would mutate an orphan, so
    /// the entry is re-checked after locking and rebuilt if it was torn
    /// down in the meantime.
    pub async fn lock_or_create(&self, id: &str) -> Result<OwnedMutexGuard<Session>, SessionError> {
        loop {
            let session = self.get_or_create(id).await?;
            let guard = session.clone().lock_owned().await;
            if let Some(current) = self.lookup(id).await {
                if Arc::ptr_eq(&current, &session) {
                    return Ok(guard);
                }
            }
            // Evicted while we waited on the lock; start over with a
            // fresh entry.
        }
    }

    /// Like [`lock_or_create`](Self::lock_or_create) but never constructs:
    /// a session evicted while we waited on its lock reads as absent.
    pub async fn lock_current(&self, id: &str) -> Option<OwnedMutexGuard<Session>> {
        loop {
            let session = self.lookup(id).await?;
            let guard = session.clone().lock_owned().await;
            match self.lookup(id).await {
                Some(current) if Arc::ptr_eq(&current, &session) => return Some(guard),
                // A new entry took the id while we waited; lock that one.
                Some(_) => continue,
                None => return None,
            }
        }
    }

    /// Refresh the heartbeat. Reports whether the session exists.
    pub async fn touch(&self, id: &str) -> bool {
        let Some(session) = self.lookup(id).await else {
            return false;
        };
        session.lock().await.touch();
        true
    }

    /// Stable copy of the table for the eviction walk; no lock is held
    /// while the caller processes entries.
    pub async fn snapshot(&self) -> Vec<(String, Arc<Mutex<Session>>)> {
        self.sessions
            .lock()
            .await
            .iter()
            .map(|(id, s)| (id.clone(), s.clone()))
            .collect()
    }

    /// Unconditional teardown: kill the transcoder, delete the directory,
    /// drop the entry.
    pub async fn remove(&self, id: &str) -> bool {
        let Some(session) = self.lookup(id).await else {
            return false;
        };
        let mut locked = session.lock().await;
        locked.kill_transcoder().await;
        let _ = tokio::fs::remove_dir_all(&locked.dir).await;
        drop(locked);

        let mut sessions = self.sessions.lock().await;
        if let Some(current) = sessions.get(id) {
            if Arc::ptr_eq(current, &session) {
                sessions.remove(id);
            }
        }
        true
    }

    /// Eviction-path teardown. The idle check is repeated under the
    /// session lock so a heartbeat that lands between the caller's
    /// snapshot and this call keeps the session alive for the cycle.
    pub async fn remove_if_idle(&self, id: &str, max_idle: Duration) -> bool {
        let Some(session) = self.lookup(id).await else {
            return false;
        };
        let mut locked = session.lock().await;
        if locked.last_heartbeat.elapsed() <= max_idle {
            return false;
        }

        locked.kill_transcoder().await;
        let _ = tokio::fs::remove_dir_all(&locked.dir).await;

        let mut sessions = self.sessions.lock().await;
        if let Some(current) = sessions.get(id) {
            if Arc::ptr_eq(current, &session) {
                sessions.remove(id);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_validation() {
        assert!(is_valid_session_id("abc123"));
        assert!(is_valid_session_id("a-b_c"));
        assert!(is_valid_session_id("X"));

        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("../etc"));
        assert!(!is_valid_session_id("a/b"));
        assert!(!is_valid_session_id("a\\b"));
        assert!(!is_valid_session_id("-leading-dash"));
        assert!(!is_valid_session_id("_leading_underscore"));
        assert!(!is_valid_session_id("has space"));
        assert!(!is_valid_session_id(&"x".repeat(65)));
    }
}
