use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Default lifetime of an issued authorization URL.
pub const DEFAULT_PENDING_TTL_SECS: i64 = 600;

/// State nonce correlating an issued authorization URL with its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingAuthorization {
    /// Generates a fresh 32-byte hex nonce valid for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self::with_state(random_hex(32), ttl)
    }

    pub fn with_state(state: impl Into<String>, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            state: state.into(),
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Holds at most one in-flight authorization per session.
pub trait PendingStore: Send + Sync {
    /// Records `pending`, replacing any earlier authorization for the session.
    fn put(&self, session: &str, pending: PendingAuthorization);
    /// Removes and returns the session's pending authorization.
    fn take(&self, session: &str) -> Option<PendingAuthorization>;
}

#[derive(Debug, Default)]
pub struct MemoryPendingStore {
    entries: Mutex<HashMap<String, PendingAuthorization>>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PendingStore for MemoryPendingStore {
    fn put(&self, session: &str, pending: PendingAuthorization) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Utc::now();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        entries.insert(session.to_string(), pending);
    }

    fn take(&self, session: &str) -> Option<PendingAuthorization> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(session)
    }
}

fn random_hex(byte_count: usize) -> String {
    let mut buf = vec![0u8; byte_count];
    for chunk in buf.chunks_mut(16) {
        let id = uuid::Uuid::new_v4();
        let len = chunk.len().min(16);
        chunk[..len].copy_from_slice(&id.as_bytes()[..len]);
    }
    buf.iter().map(|byte| format!("{byte:02x}")).collect()
}
