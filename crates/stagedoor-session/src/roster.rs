//! The roster: active participant slots and capacity enforcement.
//!
//! Admission decisions live here so the capacity check and the slot
//! reservation are a single synchronous step — the actor calls into the
//! roster while holding the session's serialized execution context, so
//! two admissions can never both see the last free slot.

use std::collections::HashMap;
use std::time::Instant;

use rand::Rng;
use stagedoor_protocol::{ParticipantId, Role, SessionId, SessionKind};
use stagedoor_transport::ConnectionId;

use crate::SessionError;

/// A session's claim on one unit of capacity.
#[derive(Debug, Clone)]
pub struct ParticipantSlot {
    /// Who holds the slot.
    pub participant: ParticipantId,
    /// Host or attendee, derived from the session's host identity.
    pub role: Role,
    /// When the slot was granted.
    pub admitted_at: Instant,
    /// The connection currently bound to the slot. `None` while the
    /// holder is inside the reconnect grace window.
    pub connection: Option<ConnectionId>,
    /// Secret the holder presents to reclaim the slot after a drop.
    pub resume_token: String,
}

/// Active participant slots for one session.
pub struct Roster {
    session_id: SessionId,
    kind: SessionKind,
    capacity: usize,
    slots: HashMap<ParticipantId, ParticipantSlot>,
}

impl Roster {
    /// Creates an empty roster for a session of the given kind.
    ///
    /// `capacity` is the configured total including the host's slot.
    pub fn new(session_id: SessionId, kind: SessionKind, capacity: usize) -> Self {
        Self {
            session_id,
            kind,
            capacity: capacity.max(1),
            slots: HashMap::new(),
        }
    }

    /// The number of slots this session may have active at once.
    ///
    /// `Individual` sessions hold the host plus exactly one attendee no
    /// matter what capacity the booking recorded; `Group` sessions hold
    /// up to the configured capacity, host included.
    pub fn effective_capacity(&self) -> usize {
        match self.kind {
            SessionKind::Individual => 2,
            SessionKind::Group => self.capacity,
        }
    }

    /// Returns `true` if at least one slot is free.
    pub fn has_capacity(&self) -> bool {
        self.slots.len() < self.effective_capacity()
    }

    /// Reserves a slot for a participant.
    ///
    /// Uniqueness and capacity are checked here, atomically with the
    /// insertion. The generated resume token is returned for the caller
    /// to hand to the client.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyJoined`] — one active slot per
    ///   participant id per session.
    /// - [`SessionError::NoCapacity`] — all slots taken. The roster is
    ///   left untouched; there is no partial admission.
    pub fn admit(
        &mut self,
        participant: ParticipantId,
        role: Role,
        connection: ConnectionId,
    ) -> Result<String, SessionError> {
        if self.slots.contains_key(&participant) {
            return Err(SessionError::AlreadyJoined(participant));
        }
        if !self.has_capacity() {
            return Err(SessionError::NoCapacity(self.session_id));
        }

        let token = generate_resume_token();
        self.slots.insert(
            participant,
            ParticipantSlot {
                participant,
                role,
                admitted_at: Instant::now(),
                connection: Some(connection),
                resume_token: token.clone(),
            },
        );
        Ok(token)
    }

    /// Releases a participant's slot. Idempotent — returns the slot if
    /// one was held, `None` if there was nothing to release.
    pub fn release(&mut self, participant: ParticipantId) -> Option<ParticipantSlot> {
        self.slots.remove(&participant)
    }

    /// Returns the slot for a participant, if active.
    pub fn get(&self, participant: ParticipantId) -> Option<&ParticipantSlot> {
        self.slots.get(&participant)
    }

    /// Mutable access to a participant's slot.
    pub fn get_mut(
        &mut self,
        participant: ParticipantId,
    ) -> Option<&mut ParticipantSlot> {
        self.slots.get_mut(&participant)
    }

    /// Returns `true` if the participant holds an active slot.
    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.slots.contains_key(&participant)
    }

    /// Returns `true` if any slot holds the host role.
    pub fn host_active(&self) -> bool {
        self.slots.values().any(|s| s.role == Role::Host)
    }

    /// Iterates the current active participant ids.
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.slots.keys().copied()
    }

    /// Empties the roster, returning the released slots.
    pub fn drain(&mut self) -> Vec<ParticipantSlot> {
        self.slots.drain().map(|(_, slot)| slot).collect()
    }

    /// Number of active slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no slots are active.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
///
/// Guessing a valid token is computationally infeasible, so presenting
/// one is sufficient proof of slot ownership on reconnect.
fn generate_resume_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: u64) -> ParticipantId {
        ParticipantId(id)
    }

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn group_roster(capacity: usize) -> Roster {
        Roster::new(SessionId(1), SessionKind::Group, capacity)
    }

    #[test]
    fn test_admit_reserves_slot_and_returns_token() {
        let mut roster = group_roster(3);

        let token = roster.admit(pid(1), Role::Host, cid(1)).unwrap();

        assert_eq!(token.len(), 32);
        assert!(roster.contains(pid(1)));
        assert!(roster.host_active());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_admit_rejects_duplicate_participant() {
        let mut roster = group_roster(3);
        roster.admit(pid(1), Role::Host, cid(1)).unwrap();

        let result = roster.admit(pid(1), Role::Host, cid(2));

        assert!(
            matches!(result, Err(SessionError::AlreadyJoined(p)) if p == pid(1))
        );
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_admit_rejects_when_full_and_leaves_state_unchanged() {
        let mut roster = group_roster(2);
        roster.admit(pid(1), Role::Host, cid(1)).unwrap();
        roster.admit(pid(2), Role::Attendee, cid(2)).unwrap();

        let result = roster.admit(pid(3), Role::Attendee, cid(3));

        assert!(matches!(result, Err(SessionError::NoCapacity(_))));
        assert_eq!(roster.len(), 2);
        assert!(!roster.contains(pid(3)));
    }

    #[test]
    fn test_individual_kind_caps_at_host_plus_one() {
        // Booking capacity is ignored for individual sessions.
        let mut roster = Roster::new(SessionId(1), SessionKind::Individual, 50);
        assert_eq!(roster.effective_capacity(), 2);

        roster.admit(pid(1), Role::Host, cid(1)).unwrap();
        roster.admit(pid(2), Role::Attendee, cid(2)).unwrap();

        assert!(matches!(
            roster.admit(pid(3), Role::Attendee, cid(3)),
            Err(SessionError::NoCapacity(_))
        ));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut roster = group_roster(3);
        roster.admit(pid(1), Role::Host, cid(1)).unwrap();

        assert!(roster.release(pid(1)).is_some());
        assert!(roster.release(pid(1)).is_none());
        assert!(roster.is_empty());
    }

    #[test]
    fn test_release_frees_capacity() {
        let mut roster = group_roster(2);
        roster.admit(pid(1), Role::Host, cid(1)).unwrap();
        roster.admit(pid(2), Role::Attendee, cid(2)).unwrap();
        assert!(!roster.has_capacity());

        roster.release(pid(2));

        assert!(roster.has_capacity());
        roster.admit(pid(3), Role::Attendee, cid(3)).unwrap();
    }

    #[test]
    fn test_tokens_are_unique_per_slot() {
        let mut roster = group_roster(3);
        let t1 = roster.admit(pid(1), Role::Host, cid(1)).unwrap();
        let t2 = roster.admit(pid(2), Role::Attendee, cid(2)).unwrap();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_capacity_floor_is_one() {
        let roster = group_roster(0);
        assert_eq!(roster.effective_capacity(), 1);
    }
}
