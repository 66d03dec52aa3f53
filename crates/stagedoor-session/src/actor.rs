//! Session actor: an isolated Tokio task that owns one live session.
//!
//! Each session runs in its own task, communicating with the outside
//! world through an mpsc command channel. That channel *is* the
//! per-session execution context the concurrency model requires: every
//! mutation of a session — transition, enqueue, admission, release,
//! signal fan-out — is applied by this one task in command order, so no
//! two operations on the same session ever interleave. Operations on
//! different sessions run fully in parallel.
//!
//! Timer-driven behavior (auto-open, auto-complete at the scheduled end,
//! reconnect-grace expiry, terminal linger) comes from a single
//! `sleep_until` arm over the earliest pending deadline.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use stagedoor_protocol::{
    EndReason, ParticipantId, Role, ServerMessage, SessionId, SessionKind,
    SignalTarget,
};
use stagedoor_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::{
    LifecycleEvent, LifecycleSink, OrchestratorConfig, Roster, SessionError,
    SessionEvent, SessionMetadata, SessionState, WaitingRoom,
};

/// Channel sender for pushing outbound messages to one connection.
///
/// Unbounded and ordered: together with actor serialization this gives
/// per-sender delivery ordering for relayed signals. Delivery is
/// best-effort — if the receiver is gone the message is dropped.
pub type ParticipantSender = mpsc::UnboundedSender<ServerMessage>;

/// What happened to a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The participant holds an active slot.
    Admitted { resume_token: String },
    /// The participant is queued at the given 1-based position.
    Enqueued { position: u32 },
}

/// A snapshot of session membership and state.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// The session's id.
    pub session_id: SessionId,
    /// One-to-one or one-to-many.
    pub kind: SessionKind,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Slots the session may hold at once (host included).
    pub capacity: usize,
    /// Participants holding active slots.
    pub active: Vec<ParticipantId>,
    /// Participants waiting in the queue, in queue order.
    pub queued: Vec<ParticipantId>,
}

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    Join {
        participant: ParticipantId,
        connection: ConnectionId,
        sender: ParticipantSender,
        reply: oneshot::Sender<Result<JoinOutcome, SessionError>>,
    },
    Resume {
        participant: ParticipantId,
        connection: ConnectionId,
        resume_token: String,
        sender: ParticipantSender,
        reply: oneshot::Sender<Result<String, SessionError>>,
    },
    Leave {
        participant: ParticipantId,
        reply: oneshot::Sender<()>,
    },
    Disconnected {
        participant: ParticipantId,
        connection: ConnectionId,
        reply: oneshot::Sender<()>,
    },
    Signal {
        from: ParticipantId,
        target: SignalTarget,
        payload: Value,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    HostAdmit {
        requester: ParticipantId,
        participant: ParticipantId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    OpenRoom {
        requester: Option<ParticipantId>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    End {
        requester: ParticipantId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Info {
        reply: oneshot::Sender<SessionInfo>,
    },
    Shutdown,
}

/// Handle to a running session actor. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Returns the session's id.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns `true` while the actor behind this handle is running.
    ///
    /// Checks the command channel without suspending, so callers may
    /// hold locks across it. A stopped actor has dropped its receiver.
    pub fn is_live(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        cmd: SessionCommand,
        reply_rx: oneshot::Receiver<T>,
    ) -> Result<T, SessionError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| SessionError::Unavailable(self.session_id))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable(self.session_id))
    }

    /// Joins a participant (admitted directly or enqueued).
    pub async fn join(
        &self,
        participant: ParticipantId,
        connection: ConnectionId,
        sender: ParticipantSender,
    ) -> Result<JoinOutcome, SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(
            SessionCommand::Join {
                participant,
                connection,
                sender,
                reply,
            },
            reply_rx,
        )
        .await?
    }

    /// Reclaims an active slot within the reconnect grace window.
    /// Returns the (unchanged) resume token on success.
    pub async fn resume(
        &self,
        participant: ParticipantId,
        connection: ConnectionId,
        resume_token: String,
        sender: ParticipantSender,
    ) -> Result<String, SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(
            SessionCommand::Resume {
                participant,
                connection,
                resume_token,
                sender,
                reply,
            },
            reply_rx,
        )
        .await?
    }

    /// Gracefully leaves — releases the slot or removes the queue entry.
    /// Idempotent.
    pub async fn leave(
        &self,
        participant: ParticipantId,
    ) -> Result<(), SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(SessionCommand::Leave { participant, reply }, reply_rx)
            .await
    }

    /// Reports that a participant's connection dropped. Starts the
    /// deferred release for active slots; removes queue entries.
    pub async fn disconnected(
        &self,
        participant: ParticipantId,
        connection: ConnectionId,
    ) -> Result<(), SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(
            SessionCommand::Disconnected {
                participant,
                connection,
                reply,
            },
            reply_rx,
        )
        .await
    }

    /// Relays a signaling payload.
    pub async fn signal(
        &self,
        from: ParticipantId,
        target: SignalTarget,
        payload: Value,
    ) -> Result<(), SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(
            SessionCommand::Signal {
                from,
                target,
                payload,
                reply,
            },
            reply_rx,
        )
        .await?
    }

    /// Host override: admits a specific queued participant.
    pub async fn host_admit(
        &self,
        requester: ParticipantId,
        participant: ParticipantId,
    ) -> Result<(), SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(
            SessionCommand::HostAdmit {
                requester,
                participant,
                reply,
            },
            reply_rx,
        )
        .await?
    }

    /// Opens the waiting room. `requester` is `None` for administrative
    /// opens; hosts may open their own room early.
    pub async fn open_room(
        &self,
        requester: Option<ParticipantId>,
    ) -> Result<(), SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(SessionCommand::OpenRoom { requester, reply }, reply_rx)
            .await?
    }

    /// Host-only: ends the session for everyone.
    pub async fn end(
        &self,
        requester: ParticipantId,
    ) -> Result<(), SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(SessionCommand::End { requester, reply }, reply_rx)
            .await?
    }

    /// Administrative cancellation.
    pub async fn cancel(&self) -> Result<(), SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(SessionCommand::Cancel { reply }, reply_rx).await?
    }

    /// Requests a membership/state snapshot.
    pub async fn info(&self) -> Result<SessionInfo, SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(SessionCommand::Info { reply }, reply_rx).await
    }

    /// Tells the actor to stop immediately.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| SessionError::Unavailable(self.session_id))
    }
}

/// The internal session actor state. Runs inside a Tokio task.
struct SessionActor<S: LifecycleSink> {
    meta: SessionMetadata,
    config: OrchestratorConfig,
    state: SessionState,
    roster: Roster,
    queue: WaitingRoom,
    /// Outbound channels for every connected participant — active slots
    /// and queued entries alike.
    senders: HashMap<ParticipantId, ParticipantSender>,
    /// Deferred releases keyed by participant: the deadline at which a
    /// disconnected slot-holder's release finalizes. Canceled by a
    /// successful resume before it fires.
    pending_releases: HashMap<ParticipantId, Instant>,
    /// Set when the session reaches a terminal state; the actor evicts
    /// itself `terminal_linger` after this.
    ended_at: Option<Instant>,
    sink: Arc<S>,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl<S: LifecycleSink> SessionActor<S> {
    async fn run(mut self) {
        tracing::info!(
            session_id = %self.meta.id,
            kind = ?self.meta.kind,
            capacity = self.roster.effective_capacity(),
            "session actor started"
        );

        // Catch up deadlines that already passed at spawn — a session
        // created mid-window opens (or completes) before the first
        // command is processed.
        let _ = self.handle_deadline().await;

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd).await {
                            break;
                        }
                    }
                    None => break,
                },
                _ = time::sleep_until(deadline) => {
                    if self.handle_deadline().await {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            session_id = %self.meta.id,
            state = %self.state,
            "session actor stopped"
        );
    }

    /// Processes one command. Returns `true` when the actor should stop.
    async fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Join {
                participant,
                connection,
                sender,
                reply,
            } => {
                let result =
                    self.handle_join(participant, connection, sender).await;
                let _ = reply.send(result);
            }
            SessionCommand::Resume {
                participant,
                connection,
                resume_token,
                sender,
                reply,
            } => {
                let result = self.handle_resume(
                    participant,
                    connection,
                    resume_token,
                    sender,
                );
                let _ = reply.send(result);
            }
            SessionCommand::Leave { participant, reply } => {
                self.handle_leave(participant).await;
                let _ = reply.send(());
            }
            SessionCommand::Disconnected {
                participant,
                connection,
                reply,
            } => {
                self.handle_disconnected(participant, connection);
                let _ = reply.send(());
            }
            SessionCommand::Signal {
                from,
                target,
                payload,
                reply,
            } => {
                let result = self.handle_signal(from, target, payload);
                let _ = reply.send(result);
            }
            SessionCommand::HostAdmit {
                requester,
                participant,
                reply,
            } => {
                let result = self.handle_host_admit(requester, participant);
                let _ = reply.send(result);
            }
            SessionCommand::OpenRoom { requester, reply } => {
                let result = self.handle_open(requester).await;
                let _ = reply.send(result);
            }
            SessionCommand::End { requester, reply } => {
                let result = self.handle_end(requester).await;
                let _ = reply.send(result);
            }
            SessionCommand::Cancel { reply } => {
                let result = self.handle_cancel().await;
                let _ = reply.send(result);
            }
            SessionCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            SessionCommand::Shutdown => {
                tracing::info!(session_id = %self.meta.id, "session shutting down");
                return true;
            }
        }
        false
    }

    // -- Join / resume -----------------------------------------------------

    async fn handle_join(
        &mut self,
        participant: ParticipantId,
        connection: ConnectionId,
        sender: ParticipantSender,
    ) -> Result<JoinOutcome, SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::NotJoinable(self.meta.id, self.state));
        }

        // A slot-holder rejoining inside the grace window gets their
        // slot back — same token, canceled deferred release.
        if let Some(slot) = self.roster.get_mut(participant) {
            if slot.connection.is_some() {
                return Err(SessionError::AlreadyJoined(participant));
            }
            slot.connection = Some(connection);
            let resume_token = slot.resume_token.clone();
            self.pending_releases.remove(&participant);
            self.senders.insert(participant, sender);
            tracing::info!(
                session_id = %self.meta.id,
                participant_id = %participant,
                %connection,
                "slot reclaimed on rejoin"
            );
            return Ok(JoinOutcome::Admitted { resume_token });
        }
        if self.queue.contains(participant) {
            return Err(SessionError::AlreadyJoined(participant));
        }

        if participant == self.meta.host {
            return self.admit_host(connection, sender).await;
        }

        // Attendees can't enter a room that hasn't opened.
        if self.state == SessionState::Scheduled {
            return Err(SessionError::NotJoinable(self.meta.id, self.state));
        }

        // Direct admission only while the encounter is live and a slot
        // is free; otherwise the waiting room.
        if self.state == SessionState::InProgress && self.roster.has_capacity()
        {
            let resume_token =
                self.admit(participant, Role::Attendee, connection, sender)?;
            return Ok(JoinOutcome::Admitted { resume_token });
        }

        let position = self.queue.enqueue(participant, connection);
        self.senders.insert(participant, sender);
        tracing::info!(
            session_id = %self.meta.id,
            participant_id = %participant,
            position,
            "participant enqueued"
        );
        Ok(JoinOutcome::Enqueued { position })
    }

    /// The host's arrival opens a scheduled room, takes the host slot,
    /// and starts the encounter.
    async fn admit_host(
        &mut self,
        connection: ConnectionId,
        sender: ParticipantSender,
    ) -> Result<JoinOutcome, SessionError> {
        if self.state == SessionState::Scheduled {
            self.open_room().await?;
        }

        let resume_token =
            self.admit(self.meta.host, Role::Host, connection, sender)?;

        if self.state == SessionState::WaitingRoomOpen {
            self.state = self.state.apply(SessionEvent::Start)?;
            tracing::info!(session_id = %self.meta.id, "session in progress");
            self.publish(LifecycleEvent::Started).await;
            self.admit_from_queue();
        }

        Ok(JoinOutcome::Admitted { resume_token })
    }

    /// Reserves a slot, registers the sender, and announces the arrival
    /// to the other active participants.
    fn admit(
        &mut self,
        participant: ParticipantId,
        role: Role,
        connection: ConnectionId,
        sender: ParticipantSender,
    ) -> Result<String, SessionError> {
        let resume_token = self.roster.admit(participant, role, connection)?;
        self.senders.insert(participant, sender);
        tracing::info!(
            session_id = %self.meta.id,
            participant_id = %participant,
            ?role,
            active = self.roster.len(),
            "participant admitted"
        );
        self.notify_active_except(
            participant,
            ServerMessage::ParticipantJoined {
                participant_id: participant,
                role,
            },
        );
        Ok(resume_token)
    }

    fn handle_resume(
        &mut self,
        participant: ParticipantId,
        connection: ConnectionId,
        resume_token: String,
        sender: ParticipantSender,
    ) -> Result<String, SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::NotJoinable(self.meta.id, self.state));
        }
        let Some(slot) = self.roster.get_mut(participant) else {
            // Slot already released — the token refers to nothing now.
            return Err(SessionError::InvalidResumeToken);
        };
        if slot.resume_token != resume_token {
            return Err(SessionError::InvalidResumeToken);
        }
        if slot.connection.is_some() {
            return Err(SessionError::AlreadyJoined(participant));
        }

        slot.connection = Some(connection);
        self.pending_releases.remove(&participant);
        self.senders.insert(participant, sender);
        tracing::info!(
            session_id = %self.meta.id,
            participant_id = %participant,
            %connection,
            "slot reclaimed via resume token"
        );
        Ok(resume_token)
    }

    // -- Leave / disconnect / deferred release -----------------------------

    async fn handle_leave(&mut self, participant: ParticipantId) {
        if self.state.is_terminal() {
            return;
        }
        if self.roster.contains(participant) {
            if participant == self.meta.host {
                // The encounter can't continue without its host.
                self.terminate(EndReason::HostEnded).await;
                return;
            }
            self.release_slot(participant);
            return;
        }
        if self.queue.remove(participant).is_some() {
            self.senders.remove(&participant);
            tracing::info!(
                session_id = %self.meta.id,
                participant_id = %participant,
                "queue entry removed"
            );
            self.notify_queue_positions();
        }
    }

    fn handle_disconnected(
        &mut self,
        participant: ParticipantId,
        connection: ConnectionId,
    ) {
        if self.state.is_terminal() {
            return;
        }

        if let Some(slot) = self.roster.get_mut(participant) {
            // A stale disconnect for a connection the participant has
            // already replaced must not disturb the reclaimed slot.
            if slot.connection == Some(connection) {
                slot.connection = None;
                self.senders.remove(&participant);
                let deadline = Instant::now() + self.config.reconnect_grace;
                self.pending_releases.insert(participant, deadline);
                tracing::info!(
                    session_id = %self.meta.id,
                    participant_id = %participant,
                    grace_secs = self.config.reconnect_grace.as_secs(),
                    "slot holder disconnected, deferred release armed"
                );
            }
            return;
        }

        if let Some(entry) = self.queue.get(participant) {
            if entry.connection == connection {
                self.queue.remove(participant);
                self.senders.remove(&participant);
                self.notify_queue_positions();
            }
        }
    }

    /// Releases an attendee's slot and promotes from the queue.
    fn release_slot(&mut self, participant: ParticipantId) {
        if self.roster.release(participant).is_none() {
            return; // idempotent
        }
        self.pending_releases.remove(&participant);
        self.senders.remove(&participant);
        tracing::info!(
            session_id = %self.meta.id,
            participant_id = %participant,
            active = self.roster.len(),
            "slot released"
        );
        self.notify_active(ServerMessage::ParticipantLeft {
            participant_id: participant,
        });
        self.admit_from_queue();
    }

    // -- Admission ---------------------------------------------------------

    /// Promotes queued participants while capacity remains. Admission and
    /// queue removal happen in this one serialized step, so concurrent
    /// join/leave traffic can never oversubscribe the roster.
    fn admit_from_queue(&mut self) {
        let mut promoted = false;
        while self.state == SessionState::InProgress && self.roster.has_capacity()
        {
            let Some(entry) = self.queue.dequeue_next() else {
                break;
            };
            match self.roster.admit(
                entry.participant,
                Role::Attendee,
                entry.connection,
            ) {
                Ok(resume_token) => {
                    self.send_to(
                        entry.participant,
                        ServerMessage::Admitted { resume_token },
                    );
                    self.notify_active_except(
                        entry.participant,
                        ServerMessage::ParticipantJoined {
                            participant_id: entry.participant,
                            role: Role::Attendee,
                        },
                    );
                    tracing::info!(
                        session_id = %self.meta.id,
                        participant_id = %entry.participant,
                        "promoted from waiting room"
                    );
                    promoted = true;
                }
                Err(e) => {
                    // Capacity was checked above and queue/roster
                    // disjointness rules out AlreadyJoined; reaching
                    // this is a logic fault. Reject, keep state.
                    tracing::warn!(
                        session_id = %self.meta.id,
                        participant_id = %entry.participant,
                        error = %e,
                        "promotion rejected"
                    );
                }
            }
        }
        if promoted {
            self.notify_queue_positions();
        }
    }

    fn handle_host_admit(
        &mut self,
        requester: ParticipantId,
        participant: ParticipantId,
    ) -> Result<(), SessionError> {
        if requester != self.meta.host {
            return Err(SessionError::Unauthorized(requester));
        }
        if self.state != SessionState::InProgress {
            return Err(SessionError::NotJoinable(self.meta.id, self.state));
        }
        if !self.queue.contains(participant) {
            return Err(SessionError::NotQueued(participant));
        }
        // The override picks out of FIFO order but never out of
        // capacity.
        if !self.roster.has_capacity() {
            return Err(SessionError::NoCapacity(self.meta.id));
        }

        let Some(entry) = self.queue.remove(participant) else {
            return Err(SessionError::NotQueued(participant));
        };
        let resume_token = self.roster.admit(
            entry.participant,
            Role::Attendee,
            entry.connection,
        )?;
        self.send_to(
            entry.participant,
            ServerMessage::Admitted { resume_token },
        );
        self.notify_active_except(
            entry.participant,
            ServerMessage::ParticipantJoined {
                participant_id: entry.participant,
                role: Role::Attendee,
            },
        );
        tracing::info!(
            session_id = %self.meta.id,
            participant_id = %participant,
            "host admitted participant out of order"
        );
        self.notify_queue_positions();
        Ok(())
    }

    // -- Signaling relay ---------------------------------------------------

    fn handle_signal(
        &mut self,
        from: ParticipantId,
        target: SignalTarget,
        payload: Value,
    ) -> Result<(), SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::NotJoinable(self.meta.id, self.state));
        }
        if !self.roster.contains(from) {
            return Err(SessionError::NotActive(from));
        }

        match target {
            SignalTarget::Participant(to) => {
                if !self.roster.contains(to) {
                    return Err(SessionError::NotActive(to));
                }
                self.send_to(to, ServerMessage::Signal { from, payload });
            }
            SignalTarget::Broadcast => {
                // Fan-out over the active set computed fresh at send
                // time — a peer that left a moment ago is not in it.
                let peers: Vec<ParticipantId> = self
                    .roster
                    .participants()
                    .filter(|p| *p != from)
                    .collect();
                for peer in peers {
                    self.send_to(
                        peer,
                        ServerMessage::Signal {
                            from,
                            payload: payload.clone(),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    // -- Lifecycle ---------------------------------------------------------

    async fn handle_open(
        &mut self,
        requester: Option<ParticipantId>,
    ) -> Result<(), SessionError> {
        if let Some(requester) = requester {
            if requester != self.meta.host {
                return Err(SessionError::Unauthorized(requester));
            }
        }
        match self.state {
            SessionState::Scheduled => self.open_room().await,
            // Opening is a trigger, not a transition the caller owns: a
            // retried open for an already-open room succeeds quietly.
            SessionState::WaitingRoomOpen | SessionState::InProgress => Ok(()),
            _ => Err(SessionError::NotJoinable(self.meta.id, self.state)),
        }
    }

    async fn open_room(&mut self) -> Result<(), SessionError> {
        self.state = self.state.apply(SessionEvent::OpenRoom)?;
        tracing::info!(session_id = %self.meta.id, "waiting room open");
        self.publish(LifecycleEvent::RoomOpened).await;
        Ok(())
    }

    async fn handle_end(
        &mut self,
        requester: ParticipantId,
    ) -> Result<(), SessionError> {
        if requester != self.meta.host {
            return Err(SessionError::Unauthorized(requester));
        }
        if self.state.is_terminal() {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                event: SessionEvent::End(EndReason::HostEnded),
            });
        }
        self.terminate(EndReason::HostEnded).await;
        Ok(())
    }

    async fn handle_cancel(&mut self) -> Result<(), SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                event: SessionEvent::Cancel,
            });
        }
        self.terminate(EndReason::Cancelled).await;
        Ok(())
    }

    /// Moves to a terminal state and releases everything: remaining
    /// slots, queue entries, pending deferred releases. Everyone still
    /// connected hears `SessionEnded` with the reason.
    async fn terminate(&mut self, reason: EndReason) {
        let event = match (self.state, reason) {
            (SessionState::InProgress, r) if r != EndReason::Cancelled => {
                SessionEvent::End(r)
            }
            _ => SessionEvent::Cancel,
        };
        let Ok(next) = self.state.apply(event) else {
            return; // already terminal
        };
        self.state = next;

        let connected: Vec<ParticipantId> =
            self.senders.keys().copied().collect();
        for participant in connected {
            self.send_to(participant, ServerMessage::SessionEnded { reason });
        }

        self.roster.drain();
        self.queue.drain();
        self.senders.clear();
        self.pending_releases.clear();
        self.ended_at = Some(Instant::now());

        tracing::info!(
            session_id = %self.meta.id,
            state = %self.state,
            %reason,
            "session ended"
        );
        self.publish(LifecycleEvent::Ended { reason }).await;
    }

    // -- Deadlines ---------------------------------------------------------

    /// The earliest instant at which timer-driven work is due.
    fn next_deadline(&self) -> Instant {
        if let Some(ended_at) = self.ended_at {
            return ended_at + self.config.terminal_linger;
        }
        let mut deadline = self.meta.end_at;
        if self.state == SessionState::Scheduled && self.meta.open_at < deadline
        {
            deadline = self.meta.open_at;
        }
        if let Some(grace) = self.pending_releases.values().min() {
            if *grace < deadline {
                deadline = *grace;
            }
        }
        deadline
    }

    /// Fires whatever deadlines have passed. Returns `true` when the
    /// terminal linger elapsed and the actor should stop.
    async fn handle_deadline(&mut self) -> bool {
        let now = Instant::now();

        if let Some(ended_at) = self.ended_at {
            return now >= ended_at + self.config.terminal_linger;
        }

        if self.state == SessionState::Scheduled && now >= self.meta.open_at {
            let _ = self.open_room().await;
        }

        if !self.state.is_terminal() && now >= self.meta.end_at {
            self.terminate(EndReason::TimeExpired).await;
            return false;
        }

        let expired: Vec<ParticipantId> = self
            .pending_releases
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(participant, _)| *participant)
            .collect();
        for participant in expired {
            self.pending_releases.remove(&participant);
            tracing::info!(
                session_id = %self.meta.id,
                participant_id = %participant,
                "grace period elapsed"
            );
            if participant == self.meta.host {
                self.terminate(EndReason::HostEnded).await;
                return false;
            }
            self.release_slot(participant);
        }

        false
    }

    // -- Outbound fan-out --------------------------------------------------

    /// Sends to a single participant. Silently drops if the receiver is
    /// gone — delivery is best-effort, at-most-once.
    fn send_to(&self, participant: ParticipantId, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(&participant) {
            let _ = sender.send(msg);
        }
    }

    fn notify_active(&self, msg: ServerMessage) {
        let active: Vec<ParticipantId> = self.roster.participants().collect();
        for participant in active {
            self.send_to(participant, msg.clone());
        }
    }

    fn notify_active_except(&self, exclude: ParticipantId, msg: ServerMessage) {
        let active: Vec<ParticipantId> = self
            .roster
            .participants()
            .filter(|p| *p != exclude)
            .collect();
        for participant in active {
            self.send_to(participant, msg.clone());
        }
    }

    /// Pushes fresh positions to everyone still queued.
    fn notify_queue_positions(&self) {
        for (idx, entry) in self.queue.iter().enumerate() {
            self.send_to(
                entry.participant,
                ServerMessage::QueuePosition {
                    position: idx as u32 + 1,
                },
            );
        }
    }

    async fn publish(&self, event: LifecycleEvent) {
        self.sink.publish(self.meta.id, event).await;
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.meta.id,
            kind: self.meta.kind,
            state: self.state,
            capacity: self.roster.effective_capacity(),
            active: self.roster.participants().collect(),
            queued: self.queue.iter().map(|e| e.participant).collect(),
        }
    }
}

/// Spawns a session actor task and returns a handle to it.
pub fn spawn_session<S: LifecycleSink>(
    meta: SessionMetadata,
    config: OrchestratorConfig,
    sink: Arc<S>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer);
    let session_id = meta.id;

    let actor = SessionActor {
        roster: Roster::new(meta.id, meta.kind, meta.capacity),
        meta,
        config,
        state: SessionState::Scheduled,
        queue: WaitingRoom::new(),
        senders: HashMap::new(),
        pending_releases: HashMap::new(),
        ended_at: None,
        sink,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    SessionHandle {
        session_id,
        sender: tx,
    }
}
