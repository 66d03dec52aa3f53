//! The session lifecycle state machine.

use stagedoor_protocol::EndReason;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The lifecycle state of a session.
///
/// ```text
/// Scheduled → WaitingRoomOpen → InProgress → Completed
///     └──────────────┴───────────────┴─────→ Cancelled
/// ```
///
/// - **Scheduled**: The session exists but joins are not yet permitted.
/// - **WaitingRoomOpen**: Fans may join and queue; the encounter hasn't
///   started because the host isn't in yet.
/// - **InProgress**: The host holds an active slot; admissions and
///   signaling are live.
/// - **Completed** / **Cancelled**: Terminal. No transition, join,
///   admission, or signal is accepted; the actor lingers briefly for
///   late messages and then evicts itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Scheduled,
    WaitingRoomOpen,
    InProgress,
    Completed,
    Cancelled,
}

impl SessionState {
    /// Returns `true` if the session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns `true` if new participants may join (queue or be admitted).
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::WaitingRoomOpen | Self::InProgress)
    }

    /// Applies a lifecycle event, returning the next state.
    ///
    /// This is the single place transition rules live. Terminal states
    /// accept nothing; everything else follows the diagram above.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] when the event is not
    /// valid in the current state.
    pub fn apply(self, event: SessionEvent) -> Result<Self, SessionError> {
        let next = match (self, event) {
            (Self::Scheduled, SessionEvent::OpenRoom) => Self::WaitingRoomOpen,
            (Self::WaitingRoomOpen, SessionEvent::Start) => Self::InProgress,
            (Self::InProgress, SessionEvent::End(_)) => Self::Completed,
            (state, SessionEvent::Cancel) if !state.is_terminal() => {
                Self::Cancelled
            }
            (from, event) => {
                return Err(SessionError::InvalidTransition { from, event });
            }
        };
        Ok(next)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::WaitingRoomOpen => write!(f, "waiting-room-open"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionEvent
// ---------------------------------------------------------------------------

/// Events that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The scheduled open time arrived, or the host opened the room.
    OpenRoom,
    /// The host was admitted for the first time.
    Start,
    /// The session ran and ended (host action or elapsed duration).
    End(EndReason),
    /// Host or administrative cancellation before or during the run.
    Cancel,
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenRoom => write!(f, "open-room"),
            Self::Start => write!(f, "start"),
            Self::End(reason) => write!(f, "end({reason})"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_happy_path() {
        let s = SessionState::Scheduled;
        let s = s.apply(SessionEvent::OpenRoom).unwrap();
        assert_eq!(s, SessionState::WaitingRoomOpen);
        let s = s.apply(SessionEvent::Start).unwrap();
        assert_eq!(s, SessionState::InProgress);
        let s = s.apply(SessionEvent::End(EndReason::HostEnded)).unwrap();
        assert_eq!(s, SessionState::Completed);
    }

    #[test]
    fn test_cancel_reachable_from_any_non_terminal_state() {
        for state in [
            SessionState::Scheduled,
            SessionState::WaitingRoomOpen,
            SessionState::InProgress,
        ] {
            assert_eq!(
                state.apply(SessionEvent::Cancel).unwrap(),
                SessionState::Cancelled
            );
        }
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for state in [SessionState::Completed, SessionState::Cancelled] {
            for event in [
                SessionEvent::OpenRoom,
                SessionEvent::Start,
                SessionEvent::End(EndReason::HostEnded),
                SessionEvent::Cancel,
            ] {
                assert!(matches!(
                    state.apply(event),
                    Err(SessionError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn test_no_skipping_states() {
        // Scheduled can't start or end without opening first.
        assert!(SessionState::Scheduled.apply(SessionEvent::Start).is_err());
        assert!(
            SessionState::Scheduled
                .apply(SessionEvent::End(EndReason::TimeExpired))
                .is_err()
        );
        // An open waiting room can't complete without the host starting it.
        assert!(
            SessionState::WaitingRoomOpen
                .apply(SessionEvent::End(EndReason::TimeExpired))
                .is_err()
        );
    }

    #[test]
    fn test_joinable_and_terminal_predicates() {
        assert!(!SessionState::Scheduled.is_joinable());
        assert!(SessionState::WaitingRoomOpen.is_joinable());
        assert!(SessionState::InProgress.is_joinable());
        assert!(!SessionState::Completed.is_joinable());
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
        assert!(!SessionState::InProgress.is_terminal());
    }
}
