//! Error types for the session orchestration layer.
//!
//! Every variant is a recoverable, per-operation rejection reported back
//! to the originating connection. Nothing here crashes the orchestrator.

use stagedoor_protocol::{ParticipantId, SessionId};

use crate::{SessionEvent, SessionState};

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session with this id is known to the registry or directory.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The session is not accepting joins in its current state
    /// (still scheduled, or already terminal).
    #[error("session {0} is not joinable (state: {1})")]
    NotJoinable(SessionId, SessionState),

    /// Every participant slot is taken.
    #[error("session {0} has no free slot")]
    NoCapacity(SessionId),

    /// The participant is not in the waiting room.
    #[error("participant {0} is not queued")]
    NotQueued(ParticipantId),

    /// The participant already holds a slot or a queue entry in this
    /// session on a live connection.
    #[error("participant {0} already joined")]
    AlreadyJoined(ParticipantId),

    /// The requested lifecycle transition is not valid.
    #[error("invalid transition: {event} while {from}")]
    InvalidTransition {
        from: SessionState,
        event: SessionEvent,
    },

    /// A non-host attempted a host-only action.
    #[error("participant {0} may not perform host actions")]
    Unauthorized(ParticipantId),

    /// Signaling was addressed to (or sent by) a participant without an
    /// active slot.
    #[error("participant {0} has no active slot")]
    NotActive(ParticipantId),

    /// The resume token doesn't match, or the slot it referred to has
    /// already been released.
    #[error("invalid resume token")]
    InvalidResumeToken,

    /// A session with this id is already registered.
    #[error("session {0} already registered")]
    AlreadyExists(SessionId),

    /// The session's command channel is closed — the actor has stopped.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),

    /// The presented auth token was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),
}
