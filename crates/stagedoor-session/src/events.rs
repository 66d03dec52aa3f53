//! Lifecycle events and the sink they're published through.
//!
//! Only session-lifecycle transitions are durable-worthy; individual
//! signaling messages are never published or persisted.

use std::future::Future;

use stagedoor_protocol::{EndReason, SessionId};

/// A durable-worthy session lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The waiting room opened — joins are now permitted.
    RoomOpened,
    /// The host was admitted; the encounter is live.
    Started,
    /// The session reached a terminal state.
    Ended { reason: EndReason },
}

/// Consumer of lifecycle events — typically a notification service or a
/// persistence layer in the booking subsystem.
///
/// `publish` is awaited inside the session actor, so it is one of the
/// actor's few suspension points. Implementations that might be slow
/// should hand off internally (e.g. to a channel) rather than block the
/// session's command processing.
pub trait LifecycleSink: Send + Sync + 'static {
    /// Publishes one lifecycle event for one session.
    ///
    /// The returned future must be `Send`: it is awaited inside session
    /// actor tasks spawned onto a multithreaded runtime. Implementors
    /// can still write plain `async fn`.
    fn publish(
        &self,
        session: SessionId,
        event: LifecycleEvent,
    ) -> impl Future<Output = ()> + Send;
}

/// A sink that drops every event. Useful for tests and deployments
/// without a notification collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl LifecycleSink for NoopSink {
    async fn publish(&self, _session: SessionId, _event: LifecycleEvent) {}
}
