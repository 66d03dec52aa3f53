//! Wire protocol for Stagedoor.
//!
//! This crate defines the "language" that clients and the orchestrator
//! speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`SignalTarget`],
//!   etc.) — the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the session
//! orchestrator (participant context). It doesn't know about connections
//! or sessions — it only knows how to serialize and deserialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (messages) → Session (orchestration)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    AdmitStatus, ClientMessage, EndReason, JoinStatus, ParticipantId, Role,
    ServerMessage, SessionId, SessionKind, SignalStatus, SignalTarget,
};
