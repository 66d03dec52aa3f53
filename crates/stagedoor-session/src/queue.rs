//! The waiting room: a per-session FIFO admission queue.

use std::collections::VecDeque;
use std::time::Instant;

use stagedoor_protocol::ParticipantId;
use stagedoor_transport::ConnectionId;

/// A queued, not-yet-admitted participant.
#[derive(Debug, Clone)]
pub struct WaitingEntry {
    /// Who is waiting.
    pub participant: ParticipantId,
    /// The connection that joined. A reconnect produces a fresh entry
    /// with a fresh connection id — queue position is not preserved
    /// across disconnects.
    pub connection: ConnectionId,
    /// When the entry was enqueued.
    pub enqueued_at: Instant,
}

/// Strict-FIFO waiting room for one session.
///
/// Ordering is by enqueue time with ties broken by insertion order,
/// which is exactly what `VecDeque` push/pop order gives us. Positions
/// reported to clients are 1-based.
///
/// The queue does no capacity or state checking — that's the actor's
/// job, done atomically with the queue mutation.
#[derive(Debug, Default)]
pub struct WaitingRoom {
    entries: VecDeque<WaitingEntry>,
}

impl WaitingRoom {
    /// Creates an empty waiting room.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a participant and returns their 1-based position.
    pub fn enqueue(
        &mut self,
        participant: ParticipantId,
        connection: ConnectionId,
    ) -> u32 {
        self.entries.push_back(WaitingEntry {
            participant,
            connection,
            enqueued_at: Instant::now(),
        });
        self.entries.len() as u32
    }

    /// Removes and returns the longest-waiting entry.
    pub fn dequeue_next(&mut self) -> Option<WaitingEntry> {
        self.entries.pop_front()
    }

    /// Removes a participant's entry wherever it sits. Idempotent —
    /// returns the entry if one was removed.
    pub fn remove(&mut self, participant: ParticipantId) -> Option<WaitingEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.participant == participant)?;
        self.entries.remove(idx)
    }

    /// Returns a participant's 1-based position, if queued.
    pub fn position_of(&self, participant: ParticipantId) -> Option<u32> {
        self.entries
            .iter()
            .position(|e| e.participant == participant)
            .map(|idx| idx as u32 + 1)
    }

    /// Returns `true` if the participant has an entry.
    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.position_of(participant).is_some()
    }

    /// Returns the entry for a participant, if queued.
    pub fn get(&self, participant: ParticipantId) -> Option<&WaitingEntry> {
        self.entries.iter().find(|e| e.participant == participant)
    }

    /// Iterates entries in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &WaitingEntry> {
        self.entries.iter()
    }

    /// Empties the queue, returning the entries in order.
    pub fn drain(&mut self) -> Vec<WaitingEntry> {
        self.entries.drain(..).collect()
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
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

    #[test]
    fn test_enqueue_returns_one_based_positions() {
        let mut queue = WaitingRoom::new();
        assert_eq!(queue.enqueue(pid(1), cid(1)), 1);
        assert_eq!(queue.enqueue(pid(2), cid(2)), 2);
        assert_eq!(queue.enqueue(pid(3), cid(3)), 3);
    }

    #[test]
    fn test_dequeue_follows_enqueue_order() {
        // FIFO law: without intervening admissions, dequeue order is
        // enqueue order regardless of churn around the head.
        let mut queue = WaitingRoom::new();
        queue.enqueue(pid(1), cid(1));
        queue.enqueue(pid(2), cid(2));
        queue.enqueue(pid(3), cid(3));

        assert_eq!(queue.dequeue_next().unwrap().participant, pid(1));
        assert_eq!(queue.dequeue_next().unwrap().participant, pid(2));
        assert_eq!(queue.dequeue_next().unwrap().participant, pid(3));
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn test_fifo_preserved_across_mid_queue_removal() {
        let mut queue = WaitingRoom::new();
        queue.enqueue(pid(1), cid(1));
        queue.enqueue(pid(2), cid(2));
        queue.enqueue(pid(3), cid(3));

        queue.remove(pid(2));

        assert_eq!(queue.position_of(pid(1)), Some(1));
        assert_eq!(queue.position_of(pid(3)), Some(2));
        assert_eq!(queue.dequeue_next().unwrap().participant, pid(1));
        assert_eq!(queue.dequeue_next().unwrap().participant, pid(3));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut queue = WaitingRoom::new();
        queue.enqueue(pid(1), cid(1));

        assert!(queue.remove(pid(1)).is_some());
        assert!(queue.remove(pid(1)).is_none());
        assert!(queue.remove(pid(99)).is_none());
    }

    #[test]
    fn test_reenqueue_goes_to_the_back() {
        // A participant who drops and rejoins loses their old position.
        let mut queue = WaitingRoom::new();
        queue.enqueue(pid(1), cid(1));
        queue.enqueue(pid(2), cid(2));

        queue.remove(pid(1));
        let position = queue.enqueue(pid(1), cid(3));

        assert_eq!(position, 2);
        assert_eq!(queue.dequeue_next().unwrap().participant, pid(2));
    }

    #[test]
    fn test_drain_empties_in_order() {
        let mut queue = WaitingRoom::new();
        queue.enqueue(pid(1), cid(1));
        queue.enqueue(pid(2), cid(2));

        let drained = queue.drain();

        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].participant, pid(1));
        assert_eq!(drained[1].participant, pid(2));
        assert!(queue.is_empty());
    }
}
