//! Core protocol types for Stagedoor's wire format.
//!
//! Everything a client and the orchestrator exchange is one of two tagged
//! enums: [`ClientMessage`] (inbound) or [`ServerMessage`] (outbound).
//! Matching on these enums is exhaustive, so adding a message kind is a
//! compile-time-checked change — there is no stringly-typed event
//! dispatch anywhere in the stack.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a scheduled meet-and-greet session.
///
/// Newtype over `u64` so a `SessionId` can't be confused with a
/// `ParticipantId` even though both are plain numbers underneath.
/// `#[serde(transparent)]` keeps the JSON representation a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A unique identifier for a participant (host or attendee).
///
/// Issued by the booking subsystem; the orchestrator treats it as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Session vocabulary shared across layers
// ---------------------------------------------------------------------------

/// What kind of encounter a session is.
///
/// - `Individual`: one fan at a time with the host. Only a single
///   attendee slot is ever active; everyone else waits in the queue.
/// - `Group`: up to the session's capacity of participants at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Individual,
    Group,
}

/// A participant's role within a session.
///
/// The role is derived server-side from the session's host identity —
/// clients never claim a role on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Attendee,
}

// ---------------------------------------------------------------------------
// Signal routing
// ---------------------------------------------------------------------------

/// Where a signaling message should be delivered.
///
/// On the wire this is either the literal string `"broadcast"` or a bare
/// participant id number, matching the compact form clients send:
///
/// ```json
/// { "type": "Signal", "to": "broadcast", "payload": { ... } }
/// { "type": "Signal", "to": 42, "payload": { ... } }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalTarget {
    /// Every active participant in the session except the sender.
    #[serde(rename = "broadcast")]
    Broadcast,

    /// One specific active participant.
    #[serde(untagged)]
    Participant(ParticipantId),
}

// ---------------------------------------------------------------------------
// Status vocabularies
// ---------------------------------------------------------------------------

/// Outcome of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStatus {
    /// The participant holds an active slot and may signal.
    Admitted,
    /// The participant is waiting in the queue at some position.
    Enqueued,
}

/// Outcome of a signaling send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Ok,
    Rejected,
}

/// Outcome of a host admit override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmitStatus {
    Ok,
    NoCapacity,
    NotQueued,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The host explicitly ended the session.
    HostEnded,
    /// The scheduled end time passed.
    TimeExpired,
    /// The session was cancelled before or during its run.
    Cancelled,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostEnded => write!(f, "host_ended"),
            Self::TimeExpired => write!(f, "time_expired"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientMessage — everything a connection may send
// ---------------------------------------------------------------------------

/// Messages a client sends to the orchestrator.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
/// `{ "type": "Join", "session_id": 7 }`. This matches what browser
/// clients naturally produce and keeps the dispatch a single `match`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// First message on every connection. The token is validated by the
    /// authentication collaborator and yields the participant identity.
    Hello { token: Option<String> },

    /// Join a session's waiting room (or be admitted directly if the
    /// session is running and has capacity).
    Join { session_id: SessionId },

    /// Reclaim an active slot after a transient disconnect, using the
    /// resume token issued at admission. Only valid within the
    /// reconnect grace period.
    Resume {
        session_id: SessionId,
        resume_token: String,
    },

    /// Gracefully leave the current session (slot or queue entry).
    Leave,

    /// Relay a connection-negotiation payload to another participant or
    /// to the whole room. The payload is opaque to the orchestrator.
    Signal {
        to: SignalTarget,
        payload: serde_json::Value,
    },

    /// Host-only: pull a specific queued participant out of FIFO order.
    HostAdmit { participant_id: ParticipantId },

    /// Host-only: open the waiting room ahead of the scheduled time.
    /// Carries the session id because the host sends this before
    /// joining.
    HostOpen { session_id: SessionId },

    /// Host-only: end the session for everyone.
    HostEnd,
}

// ---------------------------------------------------------------------------
// ServerMessage — everything pushed back to a connection
// ---------------------------------------------------------------------------

/// Messages the orchestrator pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Reply to `Hello`: the connection is authenticated.
    Welcome { participant_id: ParticipantId },

    /// Reply to `Join`. `position` is present when enqueued;
    /// `resume_token` is present when admitted.
    JoinAck {
        status: JoinStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        resume_token: Option<String>,
    },

    /// Pushed when a queued participant is promoted to an active slot,
    /// and as the reply to a successful `Resume`.
    Admitted { resume_token: String },

    /// Pushed to queued participants when their position changes.
    QueuePosition { position: u32 },

    /// Pushed to active participants when a peer is admitted.
    ParticipantJoined {
        participant_id: ParticipantId,
        role: Role,
    },

    /// Pushed to active participants when a peer's slot is released.
    ParticipantLeft { participant_id: ParticipantId },

    /// A relayed signaling payload from another participant.
    Signal {
        from: ParticipantId,
        payload: serde_json::Value,
    },

    /// Reply to `Signal`.
    SignalAck {
        status: SignalStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Reply to `HostAdmit`.
    AdmitAck { status: AdmitStatus },

    /// Pushed to every active and queued connection when the session
    /// reaches a terminal state.
    SessionEnded { reason: EndReason },

    /// A structured rejection. `code` follows HTTP-style conventions
    /// (400 bad request, 401 unauthorized, 404 not found, 409 conflict).
    Error { code: u16, message: String },
}

// =========================================================================
// Tests
// =========================================================================
