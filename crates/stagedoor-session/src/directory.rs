//! Session metadata and the directory it is fetched from.
//!
//! The orchestrator doesn't own the booking schema. It fetches a
//! session's metadata exactly once — at session creation — through the
//! [`SessionDirectory`] trait and treats it as read-only from then on.

use std::future::Future;

use stagedoor_protocol::{ParticipantId, SessionId, SessionKind};
use tokio::time::Instant;

use crate::SessionError;

/// Read-only session facts from the booking subsystem.
///
/// Schedule times are monotonic deadlines; the caller converts the
/// booking's wall-clock schedule into `Instant`s at lookup time. This
/// keeps every timer in the orchestrator on the tokio clock, which tests
/// can pause and advance.
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    /// The booking subsystem's id for this session.
    pub id: SessionId,
    /// One-to-one or one-to-many.
    pub kind: SessionKind,
    /// Total participant slots, host included. Individual sessions
    /// ignore this and hold host + one attendee.
    pub capacity: usize,
    /// The artist hosting the session.
    pub host: ParticipantId,
    /// When the waiting room opens automatically.
    pub open_at: Instant,
    /// When the session auto-completes regardless of activity.
    pub end_at: Instant,
}

/// Looks up session metadata in the booking subsystem.
///
/// Implemented over whatever store the surrounding application uses; the
/// orchestrator only needs this one read.
pub trait SessionDirectory: Send + Sync + 'static {
    /// Fetches metadata for a session.
    ///
    /// The returned future must be `Send`: it is awaited inside
    /// connection handler tasks spawned onto a multithreaded runtime.
    /// Implementors can still write plain `async fn`.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] when no such session is booked.
    fn lookup(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<SessionMetadata, SessionError>> + Send;
}
