//! Session orchestration for Stagedoor.
//!
//! Each live session runs as an isolated Tokio task (actor model) that
//! owns the session's state machine, waiting-room queue, participant
//! roster, and signaling fan-out. All mutations to one session are
//! serialized through the actor's command channel; different sessions
//! run fully in parallel.
//!
//! # Key types
//!
//! - [`SessionRegistry`] — creates/tracks sessions, evicts terminal ones
//! - [`SessionHandle`] — send commands to a running session actor
//! - [`SessionState`] — lifecycle state machine
//! - [`WaitingRoom`] — per-session FIFO admission queue
//! - [`Roster`] — active participant slots and capacity enforcement
//! - [`SessionDirectory`] — trait for fetching session metadata from the
//!   booking subsystem
//! - [`LifecycleSink`] — trait for publishing lifecycle events to a
//!   notification collaborator
//!
//! The collaborator traits ([`SessionDirectory`], [`Authenticator`],
//! [`LifecycleSink`]) declare their async methods as
//! `fn ... -> impl Future + Send` because their futures are awaited
//! inside spawned tasks; implementors can still write plain `async fn`.

mod actor;
mod auth;
mod config;
mod directory;
mod error;
mod events;
mod queue;
mod registry;
mod roster;
mod state;

pub use actor::{
    JoinOutcome, ParticipantSender, SessionHandle, SessionInfo, spawn_session,
};
pub use auth::Authenticator;
pub use config::OrchestratorConfig;
pub use directory::{SessionDirectory, SessionMetadata};
pub use error::SessionError;
pub use events::{LifecycleEvent, LifecycleSink, NoopSink};
pub use queue::{WaitingEntry, WaitingRoom};
pub use registry::SessionRegistry;
pub use roster::{ParticipantSlot, Roster};
pub use state::{SessionEvent, SessionState};
