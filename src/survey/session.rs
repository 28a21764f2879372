//! Per-user session store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::state::Session;

/// A session plus the last time it was touched.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    pub session: Session,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionSlot {
    /// Replace the session and stamp the update time.
    pub fn commit(&mut self, session: Session) {
        self.session = session;
        self.updated_at = Some(Utc::now());
    }
}

/// Sessions keyed by user id.
///
/// The map lock is only held to find or insert a slot. Callers then lock the
/// slot itself, so different users never wait on each other while one user's
/// updates are handled one at a time.
#[derive(Default)]
pub struct SessionStore {
    slots: RwLock<HashMap<i64, Arc<Mutex<SessionSlot>>>>,
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The slot for `user_id`, created empty (Idle) if missing.
    pub async fn slot(&self, user_id: i64) -> Arc<Mutex<SessionSlot>> {
        if let Some(slot) = self.slots.read().await.get(&user_id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(user_id).or_default())
    }

    /// Snapshot of a user's session, if one exists.
    pub async fn get(&self, user_id: i64) -> Option<Session> {
        let slot = self.slots.read().await.get(&user_id).cloned()?;
        let guard = slot.lock().await;
        Some(guard.session.clone())
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop sessions idle for longer than `max_idle`. Returns how many went.
    ///
    /// A slot is only removed when nothing outside the map holds it and its
    /// lock is free, so an update being handled never loses its session.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return 0;
        };
        let mut slots = self.slots.write().await;
        let before = slots.len();

        slots.retain(|user_id, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let Ok(guard) = slot.try_lock() else {
                return true;
            };
            let stale = guard.updated_at.is_none_or(|t| t < cutoff);
            if stale {
                debug!(user_id, state = %guard.session.state, "Pruning idle session");
            }
            !stale
        });

        before - slots.len()
    }
}

/// Spawn a background task that prunes idle sessions every `interval`.
pub fn spawn_prune_task(
    store: Arc<SessionStore>,
    max_idle: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            let pruned = store.prune_idle(max_idle).await;
            if pruned > 0 {
                info!(pruned, "Pruned abandoned sessions");
            }
        }
    })
}
