//! # Stagedoor
//!
//! Real-time orchestration for virtual meet-and-greet sessions: waiting
//! rooms, capacity-bounded admission, host controls, and signaling relay
//! between admitted peers.
//!
//! The stack, bottom up:
//!
//! - [`stagedoor_transport`] — WebSocket listener and connections
//! - [`stagedoor_protocol`] — the tagged-JSON wire format
//! - [`stagedoor_session`] — per-session actors, queue, roster, registry
//! - this crate — the server loop and per-connection handlers gluing
//!   them together
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use stagedoor::StagedoorServer;
//!
//! let server = StagedoorServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(my_directory, my_auth, my_sink)
//!     .await?;
//! server.run().await
//! ```
//!
//! The three collaborators are traits you implement against your own
//! platform: [`SessionDirectory`] reads booked-session metadata,
//! [`Authenticator`] validates connection tokens, and [`LifecycleSink`]
//! receives session lifecycle events.

mod error;
mod handler;
mod server;

pub use error::StagedoorError;
pub use server::{StagedoorServer, StagedoorServerBuilder};

pub use stagedoor_protocol as protocol;
pub use stagedoor_session as session;
pub use stagedoor_transport as transport;

pub use stagedoor_session::{
    Authenticator, LifecycleEvent, LifecycleSink, NoopSink,
    OrchestratorConfig, SessionDirectory, SessionMetadata,
};
