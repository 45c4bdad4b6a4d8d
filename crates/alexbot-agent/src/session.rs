//! Per-conversation sessions.
//!
//! Each [`ConversationKey`] owns one transcript behind an async mutex, so two
//! messages in the same conversation are processed one after the other while
//! separate conversations run concurrently. Sessions are created on first use
//! and evicted when idle for too long or when the registry is over capacity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::debug;

use alexbot_core::config::BehaviorConfig;
use alexbot_core::ConversationKey;

use crate::transcript::Transcript;

/// One conversation: its transcript plus bookkeeping for eviction.
pub struct Session {
    key: ConversationKey,
    transcript: Arc<Mutex<Transcript>>,
    /// Milliseconds since the registry epoch at last use.
    touched_ms: AtomicU64,
}

impl Session {
    fn new(key: ConversationKey, now_ms: u64) -> Self {
        Self {
            key,
            transcript: Arc::new(Mutex::new(Transcript::new())),
            touched_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Lock the transcript for the duration of a turn.
    pub async fn lock(&self) -> MutexGuard<'_, Transcript> {
        self.transcript.lock().await
    }

    /// Like [`Session::lock`], but the guard can move into a spawned task.
    pub async fn lock_owned(&self) -> OwnedMutexGuard<Transcript> {
        Arc::clone(&self.transcript).lock_owned().await
    }

    fn touch(&self, now_ms: u64) {
        self.touched_ms.fetch_max(now_ms, Ordering::Relaxed);
    }

    fn touched(&self) -> u64 {
        self.touched_ms.load(Ordering::Relaxed)
    }
}

/// Registry of live conversations keyed by [`ConversationKey`].
pub struct SessionRegistry {
    sessions: DashMap<ConversationKey, Arc<Session>>,
    idle_timeout: Duration,
    max_sessions: usize,
    epoch: Instant,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
            max_sessions: max_sessions.max(1),
            epoch: Instant::now(),
        }
    }

    pub fn from_config(config: &BehaviorConfig) -> Self {
        Self::new(
            Duration::from_secs(config.session_idle_secs),
            config.max_sessions,
        )
    }

    /// Return the session for `key`, creating it if needed.
    pub fn get_or_create(&self, key: &ConversationKey) -> Arc<Session> {
        self.get_or_create_at(key, Instant::now())
    }

    pub(crate) fn get_or_create_at(&self, key: &ConversationKey, now: Instant) -> Arc<Session> {
        let now_ms = self.millis(now);

        if let Some(existing) = self.sessions.get(key).map(|r| Arc::clone(r.value())) {
            existing.touch(now_ms);
            return existing;
        }

        self.evict(now_ms);

        let session = Arc::clone(
            self.sessions
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Session::new(key.clone(), now_ms)))
                .value(),
        );
        session.touch(now_ms);
        debug!(session = %key, live = self.sessions.len(), "session created");
        session
    }

    pub fn get(&self, key: &ConversationKey) -> Option<Arc<Session>> {
        self.sessions.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Forget a conversation. Returns true when one existed.
    ///
    /// A turn already holding the session finishes against the detached
    /// transcript; the next message starts fresh.
    pub fn reset(&self, key: &ConversationKey) -> bool {
        self.sessions.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn millis(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_millis() as u64
    }

    /// Drop idle sessions, then least-recently-used ones until a new session fits.
    /// Sessions held by an in-flight turn are never evicted.
    fn evict(&self, now_ms: u64) {
        let idle_ms = self.idle_timeout.as_millis() as u64;
        let expired: Vec<ConversationKey> = self
            .sessions
            .iter()
            .filter(|e| now_ms.saturating_sub(e.value().touched()) > idle_ms)
            .map(|e| e.key().clone())
            .collect();
        for key in expired {
            if self
                .sessions
                .remove_if(&key, |_, s| Arc::strong_count(s) == 1)
                .is_some()
            {
                debug!(session = %key, "session evicted (idle)");
            }
        }

        if self.sessions.len() < self.max_sessions {
            return;
        }

        let mut by_age: Vec<(u64, ConversationKey)> = self
            .sessions
            .iter()
            .map(|e| (e.value().touched(), e.key().clone()))
            .collect();
        by_age.sort_by_key(|(touched, _)| *touched);

        for (_, key) in by_age {
            if self.sessions.len() < self.max_sessions {
                break;
            }
            if self
                .sessions
                .remove_if(&key, |_, s| Arc::strong_count(s) == 1)
                .is_some()
            {
                debug!(session = %key, "session evicted (capacity)");
            }
        }
    }
}
