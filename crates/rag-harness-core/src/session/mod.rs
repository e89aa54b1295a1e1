//! Session storage for retrieved result sets.
//!
//! The [`SessionStore`] trait maps an opaque session id to the [`Context`]
//! produced by the last successful search under that id. It is the only
//! mutable state shared between concurrent tool calls.
//!
//! # Contract
//!
//! | Method | Behavior |
//! |--------|----------|
//! | [`put`](SessionStore::put) | Unconditional overwrite (last write wins, no merge). An empty context is legal. |
//! | [`get`](SessionStore::get) | Pure lookup. `None` covers both "never existed" and "evicted". |
//!
//! Both operations are atomic: a reader sees either the old or the new
//! context, never a mix. Implementations must be `Send + Sync`.

pub mod memory;

use crate::models::Context;

pub use memory::{MemorySessionStore, SessionStoreSettings};

/// Storage backend for session contexts.
pub trait SessionStore: Send + Sync {
    /// Store `context` under `session_id`, replacing any previous context.
    fn put(&self, session_id: &str, context: Context);

    /// Look up the context stored under `session_id`.
    fn get(&self, session_id: &str) -> Option<Context>;

    /// Number of live sessions.
    fn len(&self) -> u64;

    /// Whether the store currently holds no sessions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mint a fresh session id (random UUID v4).
pub fn mint_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
