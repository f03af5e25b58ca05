use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

#[derive(Debug)]
struct Slot<S> {
    session: Arc<Mutex<S>>,
    last_seen: Instant,
}

/// In-memory session table. Each session has its own lock so a request and
/// a timer firing for the same session are serialised.
///
/// The table lock is never held while a session lock is awaited.
#[derive(Debug)]
pub struct SessionRegistry<S> {
    sessions: RwLock<HashMap<String, Slot<S>>>,
}

impl<S> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl<S> SessionRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: String, session: S) -> Arc<Mutex<S>> {
        let entry = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(
            id,
            Slot {
                session: entry.clone(),
                last_seen: Instant::now(),
            },
        );
        entry
    }

    /// Looks the session up and marks it as used
    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<S>>> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(id)?;
        slot.last_seen = Instant::now();
        Some(slot.session.clone())
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<Mutex<S>>> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|slot| slot.session)
    }

    /// Removes and returns every session not looked up for at least `max_idle`
    pub async fn take_idle(&self, max_idle: Duration) -> Vec<(String, Arc<Mutex<S>>)> {
        let mut sessions = self.sessions.write().await;
        let idle: Vec<String> = sessions
            .iter()
            .filter(|(_, slot)| slot.last_seen.elapsed() >= max_idle)
            .map(|(id, _)| id.clone())
            .collect();

        idle.into_iter()
            .filter_map(|id| sessions.remove(&id).map(|slot| (id, slot.session)))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Closed<V> {
    owner: String,
    outcome: V,
    closed_at: Instant,
}

/// Last outcome of sessions that already left the registry, kept so the
/// client can read the final screen. Entries expire on [`ClosedSessions::purge`].
#[derive(Debug)]
pub struct ClosedSessions<V> {
    entries: RwLock<HashMap<String, Closed<V>>>,
}

impl<V> Default for ClosedSessions<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> ClosedSessions<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: String, owner: &str, outcome: V) {
        self.entries.write().await.insert(
            id,
            Closed {
                owner: owner.to_string(),
                outcome,
                closed_at: Instant::now(),
            },
        );
    }

    /// Outcome of `id` if it belongs to `owner`
    pub async fn get(&self, id: &str, owner: &str) -> Option<V> {
        self.entries
            .read()
            .await
            .get(id)
            .filter(|closed| closed.owner == owner)
            .map(|closed| closed.outcome.clone())
    }

    pub async fn remove(&self, id: &str, owner: &str) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(id) {
            Some(closed) if closed.owner == owner => entries.remove(id).is_some(),
            _ => false,
        }
    }

    /// Drops outcomes older than `retention`, returns how many were dropped
    pub async fn purge(&self, retention: Duration) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, closed| closed.closed_at.elapsed() < retention);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
