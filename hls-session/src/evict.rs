//! Background eviction of idle sessions.
//!
//! Clients keep their sessions alive with pings; anything silent for
//! longer than the inactivity threshold is torn down: transcoder killed,
//! directory removed, table entry dropped. The walk snapshots the table
//! first and then processes victims one by one, so the table mutex is
//! never held across a kill or a directory removal. The idle check is
//! repeated per victim under its own lock; a session that was pinged
//! after the snapshot survives the cycle.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::store::SessionStore;

/// Default scan period.
pub const EVICTION_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Default inactivity threshold.
pub const MAX_IDLE: Duration = Duration::from_secs(2 * 60 * 60);

/// One eviction pass. Returns how many sessions were removed. The idle
/// threshold is a parameter so tests can drive the pass directly.
pub async fn evict_idle(store: &SessionStore, max_idle: Duration) -> usize {
    let snapshot = store.snapshot().await;
    let mut evicted = 0;

    for (id, session) in snapshot {
        let idle = { session.lock().await.last_heartbeat.elapsed() };
        if idle <= max_idle {
            continue;
        }
        tracing::info!("evicting session {} after {}s idle", id, idle.as_secs());
        if store.remove_if_idle(&id, max_idle).await {
            evicted += 1;
        }
    }

    evicted
}

/// Spawn the periodic eviction task. `period` and `max_idle` come from
/// the server configuration; [`EVICTION_PERIOD`] and [`MAX_IDLE`] are the
/// stock values.
pub fn spawn_eviction_loop(
    store: Arc<SessionStore>,
    period: Duration,
    max_idle: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately; nothing is idle yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = evict_idle(&store, max_idle).await;
            if evicted > 0 {
                tracing::info!("eviction pass removed {} sessions", evicted);
            }
        }
    })
}
