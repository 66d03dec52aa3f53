//! Per-connection handler: handshake, auth, and message dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `Hello` → authenticate token → `ParticipantId`
//!   2. Send `Welcome` → connection is live
//!   3. Loop: receive client messages → dispatch to the bound session
//!
//! All outbound traffic — acks and actor pushes alike — flows through a
//! single writer task per connection, so the client sees one totally
//! ordered stream.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use stagedoor_protocol::{
    AdmitStatus, ClientMessage, Codec, JoinStatus, ParticipantId,
    ProtocolError, ServerMessage, SessionId, SignalStatus,
};
use stagedoor_session::{
    Authenticator, JoinOutcome, LifecycleSink, SessionDirectory, SessionError,
    SessionHandle,
};
use stagedoor_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::StagedoorError;
use crate::server::ServerState;

const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

/// The connection's current session binding: at most one
/// (session, participant) pair per physical connection.
///
/// Shared with the drop guard so disconnect cleanup sees the binding as
/// it stood when the handler exited, however it exited.
type Binding = Arc<StdMutex<Option<SessionHandle>>>;

/// Drop guard that reports the disconnect to the bound session when the
/// handler exits. `Drop` is synchronous, so the async notification is a
/// fire-and-forget task; the actor treats stale duplicates as no-ops.
struct DisconnectGuard {
    participant: ParticipantId,
    connection: ConnectionId,
    binding: Binding,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let handle = self.binding.lock().ok().and_then(|mut b| b.take());
        if let Some(handle) = handle {
            let participant = self.participant;
            let connection = self.connection;
            tokio::spawn(async move {
                let _ = handle.disconnected(participant, connection).await;
            });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<D, A, L, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<D, A, L, C>>,
) -> Result<(), StagedoorError>
where
    D: SessionDirectory,
    A: Authenticator,
    L: LifecycleSink,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let participant_id = perform_hello(&conn, &state).await?;
    tracing::info!(%conn_id, participant_id = %participant_id, "participant authenticated");

    // One writer task per connection. The same sender is handed to the
    // session actor on join, so pushes and acks share one ordered queue.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerMessage>();
    let writer_conn = conn.clone();
    let writer_state = Arc::clone(&state);
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let bytes = match writer_state.codec.encode(&msg) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode outbound message");
                    continue;
                }
            };
            if writer_conn.send(&bytes).await.is_err() {
                break;
            }
        }
    });

    let _ = tx.send(ServerMessage::Welcome { participant_id });

    let binding: Binding = Arc::new(StdMutex::new(None));
    let _guard = DisconnectGuard {
        participant: participant_id,
        connection: conn_id,
        binding: Arc::clone(&binding),
    };

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(participant_id = %participant_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(participant_id = %participant_id, error = %e, "recv error");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(
                    participant_id = %participant_id, error = %e,
                    "failed to decode client message"
                );
                let _ = tx.send(ServerMessage::Error {
                    code: 400,
                    message: "malformed message".into(),
                });
                continue;
            }
        };

        dispatch(&state, &binding, &tx, participant_id, conn_id, msg).await;
    }

    // _guard drops here → disconnect notification fires for the session
    // the connection was bound to, if any.
    Ok(())
}

/// Receives and validates the `Hello`, authenticates, and returns the
/// participant identity. Errors here terminate the connection.
async fn perform_hello<D, A, L, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<D, A, L, C>>,
) -> Result<ParticipantId, StagedoorError>
where
    D: SessionDirectory,
    A: Authenticator,
    L: LifecycleSink,
    C: Codec,
{
    let data = match tokio::time::timeout(HELLO_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before hello".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(
                ProtocolError::InvalidMessage("hello timed out".into()).into()
            );
        }
    };

    let msg: ClientMessage = state.codec.decode(&data)?;
    let token = match msg {
        ClientMessage::Hello { token } => token,
        _ => {
            send_direct(
                conn,
                &state.codec,
                &ServerMessage::Error {
                    code: 400,
                    message: "expected Hello".into(),
                },
            )
            .await?;
            return Err(ProtocolError::InvalidMessage(
                "first message must be Hello".into(),
            )
            .into());
        }
    };

    match state.auth.authenticate(token.as_deref().unwrap_or("")).await {
        Ok(participant_id) => Ok(participant_id),
        Err(e) => {
            send_direct(
                conn,
                &state.codec,
                &ServerMessage::Error {
                    code: 401,
                    message: "unauthorized".into(),
                },
            )
            .await?;
            Err(e.into())
        }
    }
}

/// Routes one client message. Replies go through the writer channel;
/// failures are reported to the client, never propagated.
async fn dispatch<D, A, L, C>(
    state: &Arc<ServerState<D, A, L, C>>,
    binding: &Binding,
    tx: &stagedoor_session::ParticipantSender,
    participant_id: ParticipantId,
    conn_id: ConnectionId,
    msg: ClientMessage,
) where
    D: SessionDirectory,
    A: Authenticator,
    L: LifecycleSink,
    C: Codec,
{
    match msg {
        ClientMessage::Hello { .. } => {
            let _ = tx.send(ServerMessage::Error {
                code: 400,
                message: "already authenticated".into(),
            });
        }

        ClientMessage::Join { session_id } => {
            if bound_handle(binding).is_some() {
                let _ = tx.send(ServerMessage::Error {
                    code: 409,
                    message: "already joined a session".into(),
                });
                return;
            }
            let handle = match get_or_create_session(state, session_id).await {
                Ok(handle) => handle,
                Err(e) => {
                    let _ = tx.send(error_reply(&e));
                    return;
                }
            };
            match handle.join(participant_id, conn_id, tx.clone()).await {
                Ok(JoinOutcome::Admitted { resume_token }) => {
                    bind(binding, handle);
                    let _ = tx.send(ServerMessage::JoinAck {
                        status: JoinStatus::Admitted,
                        position: None,
                        resume_token: Some(resume_token),
                    });
                }
                Ok(JoinOutcome::Enqueued { position }) => {
                    bind(binding, handle);
                    let _ = tx.send(ServerMessage::JoinAck {
                        status: JoinStatus::Enqueued,
                        position: Some(position),
                        resume_token: None,
                    });
                }
                Err(e) => {
                    let _ = tx.send(error_reply(&e));
                }
            }
        }

        ClientMessage::Resume {
            session_id,
            resume_token,
        } => {
            if bound_handle(binding).is_some() {
                let _ = tx.send(ServerMessage::Error {
                    code: 409,
                    message: "already joined a session".into(),
                });
                return;
            }
            let handle = match get_or_create_session(state, session_id).await {
                Ok(handle) => handle,
                Err(e) => {
                    let _ = tx.send(error_reply(&e));
                    return;
                }
            };
            match handle
                .resume(participant_id, conn_id, resume_token, tx.clone())
                .await
            {
                Ok(resume_token) => {
                    bind(binding, handle);
                    let _ = tx.send(ServerMessage::Admitted { resume_token });
                }
                Err(e) => {
                    let _ = tx.send(error_reply(&e));
                }
            }
        }

        ClientMessage::Leave => {
            let handle = binding.lock().ok().and_then(|mut b| b.take());
            if let Some(handle) = handle {
                let _ = handle.leave(participant_id).await;
            }
        }

        ClientMessage::Signal { to, payload } => {
            let Some(handle) = bound_handle(binding) else {
                let _ = tx.send(ServerMessage::SignalAck {
                    status: SignalStatus::Rejected,
                    reason: Some("not_in_session".into()),
                });
                return;
            };
            match handle.signal(participant_id, to, payload).await {
                Ok(()) => {
                    let _ = tx.send(ServerMessage::SignalAck {
                        status: SignalStatus::Ok,
                        reason: None,
                    });
                }
                Err(e) => {
                    let _ = tx.send(ServerMessage::SignalAck {
                        status: SignalStatus::Rejected,
                        reason: Some(reject_reason(&e).into()),
                    });
                }
            }
        }

        ClientMessage::HostAdmit {
            participant_id: target,
        } => {
            let Some(handle) = bound_handle(binding) else {
                let _ = tx.send(ServerMessage::Error {
                    code: 409,
                    message: "not in a session".into(),
                });
                return;
            };
            match handle.host_admit(participant_id, target).await {
                Ok(()) => {
                    let _ = tx.send(ServerMessage::AdmitAck {
                        status: AdmitStatus::Ok,
                    });
                }
                Err(SessionError::NoCapacity(_)) => {
                    let _ = tx.send(ServerMessage::AdmitAck {
                        status: AdmitStatus::NoCapacity,
                    });
                }
                Err(SessionError::NotQueued(_)) => {
                    let _ = tx.send(ServerMessage::AdmitAck {
                        status: AdmitStatus::NotQueued,
                    });
                }
                Err(e) => {
                    let _ = tx.send(error_reply(&e));
                }
            }
        }

        ClientMessage::HostOpen { session_id } => {
            let result = match get_or_create_session(state, session_id).await {
                Ok(handle) => handle.open_room(Some(participant_id)).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                let _ = tx.send(error_reply(&e));
            }
        }

        ClientMessage::HostEnd => {
            let Some(handle) = bound_handle(binding) else {
                let _ = tx.send(ServerMessage::Error {
                    code: 409,
                    message: "not in a session".into(),
                });
                return;
            };
            if let Err(e) = handle.end(participant_id).await {
                let _ = tx.send(error_reply(&e));
            }
        }
    }
}

/// Returns the session handle for a registered session, spawning its
/// actor from booking metadata on first use.
pub(crate) async fn get_or_create_session<D, A, L, C>(
    state: &Arc<ServerState<D, A, L, C>>,
    session_id: SessionId,
) -> Result<SessionHandle, SessionError>
where
    D: SessionDirectory,
    A: Authenticator,
    L: LifecycleSink,
    C: Codec,
{
    {
        let registry = state.registry.lock().await;
        if let Ok(handle) = registry.get(session_id) {
            return Ok(handle);
        }
    }

    // Metadata is fetched exactly once per session lifetime, outside the
    // registry lock.
    let meta = state.directory.lookup(session_id).await?;

    let mut registry = state.registry.lock().await;
    match registry.create(meta) {
        Ok(handle) => Ok(handle),
        // Another connection spawned it between our lookup and the lock.
        Err(SessionError::AlreadyExists(_)) => registry.get(session_id),
        Err(e) => Err(e),
    }
}

fn bound_handle(binding: &Binding) -> Option<SessionHandle> {
    binding.lock().ok().and_then(|b| b.clone())
}

fn bind(binding: &Binding, handle: SessionHandle) {
    if let Ok(mut b) = binding.lock() {
        *b = Some(handle);
    }
}

/// Maps a session error to a structured client error.
fn error_reply(e: &SessionError) -> ServerMessage {
    ServerMessage::Error {
        code: error_code(e),
        message: e.to_string(),
    }
}

/// HTTP-style error codes for session rejections.
fn error_code(e: &SessionError) -> u16 {
    match e {
        SessionError::NotFound(_) | SessionError::Unavailable(_) => 404,
        SessionError::Unauthorized(_)
        | SessionError::InvalidResumeToken
        | SessionError::AuthFailed(_) => 401,
        _ => 409,
    }
}

/// Short machine-readable reason for a rejected signal.
fn reject_reason(e: &SessionError) -> &'static str {
    match e {
        SessionError::NotActive(_) => "not_active",
        SessionError::NotJoinable(_, _) | SessionError::Unavailable(_) => {
            "session_ended"
        }
        _ => "rejected",
    }
}

/// Sends a message directly on the connection, bypassing the writer.
/// Only used before the writer task exists.
async fn send_direct<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    msg: &ServerMessage,
) -> Result<(), StagedoorError> {
    let bytes = codec.encode(msg)?;
    conn.send(&bytes).await?;
    Ok(())
}
