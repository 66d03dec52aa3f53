//! The session registry: id → running session actor.
//!
//! The registry is the single source of truth for which sessions are
//! live. It is not itself thread-safe — the server wraps it in a lock
//! and holds that lock only long enough to clone a handle out, never
//! across an actor round-trip.

use std::collections::HashMap;
use std::sync::Arc;

use stagedoor_protocol::SessionId;

use crate::{
    LifecycleSink, OrchestratorConfig, SessionError, SessionHandle,
    SessionMetadata, spawn_session,
};

/// Tracks every live session actor and spawns new ones.
pub struct SessionRegistry<S: LifecycleSink> {
    sessions: HashMap<SessionId, SessionHandle>,
    config: OrchestratorConfig,
    sink: Arc<S>,
}

impl<S: LifecycleSink> SessionRegistry<S> {
    /// Creates an empty registry. Every session it spawns shares the
    /// given config and lifecycle sink.
    pub fn new(config: OrchestratorConfig, sink: Arc<S>) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
            sink,
        }
    }

    /// Spawns a session actor for the given metadata and registers it.
    ///
    /// A stale entry (an actor that already evicted itself) is replaced
    /// silently; a live one is an error. Liveness is read off the
    /// handle's command channel, never by an actor round-trip, so this
    /// is safe to call while holding the server's registry lock even
    /// when an actor is suspended or its command buffer is full.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyExists`] if a live actor is
    /// already registered under this id.
    pub fn create(
        &mut self,
        meta: SessionMetadata,
    ) -> Result<SessionHandle, SessionError> {
        if let Some(existing) = self.sessions.get(&meta.id) {
            if existing.is_live() {
                return Err(SessionError::AlreadyExists(meta.id));
            }
        }

        let id = meta.id;
        let handle = spawn_session(meta, self.config.clone(), self.sink.clone());
        self.sessions.insert(id, handle.clone());
        tracing::info!(session_id = %id, total = self.sessions.len(), "session registered");
        Ok(handle)
    }

    /// Returns a handle to a registered session.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if no such session is
    /// registered.
    pub fn get(&self, id: SessionId) -> Result<SessionHandle, SessionError> {
        self.sessions
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    /// Returns `true` if a handle is registered under this id. The
    /// actor behind it may already have stopped — `sweep` reconciles.
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Drops handles whose actors have stopped (terminal linger elapsed
    /// or shut down). Returns how many entries were pruned.
    ///
    /// Never suspends: liveness is read off each handle's command
    /// channel, so a session actor stalled in a slow lifecycle sink
    /// cannot hold up the sweep (or whoever holds the registry lock
    /// around it).
    pub fn sweep(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|id, handle| {
            let live = handle.is_live();
            if !live {
                tracing::info!(session_id = %id, "stale session pruned");
            }
            live
        });
        before - self.sessions.len()
    }

    /// Number of registered sessions (live or awaiting a sweep).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
