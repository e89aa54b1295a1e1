//! Bounded in-memory [`SessionStore`] backed by `moka`.
//!
//! Sessions are evicted least-recently-used once `max_sessions` is reached,
//! and optionally expire after a period of inactivity (`idle_ttl`) or a
//! fixed lifetime (`ttl`). Eviction is invisible to callers beyond `get`
//! returning `None`.

use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use crate::models::Context;

use super::SessionStore;

/// Capacity and expiry policy for [`MemorySessionStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStoreSettings {
    /// Maximum number of sessions kept at once.
    pub max_sessions: u64,
    /// Expire a session this long after its last read or write.
    pub idle_ttl: Option<Duration>,
    /// Expire a session this long after it was written.
    pub ttl: Option<Duration>,
}

impl Default for SessionStoreSettings {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            idle_ttl: Some(Duration::from_secs(3600)),
            ttl: Some(Duration::from_secs(86_400)),
        }
    }
}

/// Process-wide session store. Construct once at startup and share via `Arc`.
pub struct MemorySessionStore {
    cache: Cache<String, Context>,
}

impl MemorySessionStore {
    pub fn new(settings: &SessionStoreSettings) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(settings.max_sessions)
            .eviction_policy(EvictionPolicy::lru());
        if let Some(idle) = settings.idle_ttl {
            builder = builder.time_to_idle(idle);
        }
        if let Some(ttl) = settings.ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            cache: builder.build(),
        }
    }

    /// Apply pending evictions now instead of on the next cache operation.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(&SessionStoreSettings::default())
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, session_id: &str, context: Context) {
        tracing::debug!(session_id, documents = context.len(), "session stored");
        self.cache.insert(session_id.to_string(), context);
    }

    fn get(&self, session_id: &str) -> Option<Context> {
        self.cache.get(session_id)
    }

    fn len(&self) -> u64 {
        // entry_count lags until pending writes are applied
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}
