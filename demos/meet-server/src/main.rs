//! A runnable Stagedoor demo: a meet-and-greet server with an in-memory
//! session directory and a numeric-token dev authenticator.
//!
//! Start it, then connect with any WebSocket client:
//!
//! ```text
//! cargo run -p meet-server -- 127.0.0.1:8080
//!
//! > {"type":"Hello","token":"1"}
//! > {"type":"Join","session_id":1}
//! ```
//!
//! Session 1 is a group session (capacity 4) hosted by participant 1;
//! session 2 is an individual session hosted by participant 2. Both are
//! open from startup for two hours.

use std::collections::HashMap;
use std::time::Duration;

use stagedoor::protocol::{ParticipantId, SessionId, SessionKind};
use stagedoor::session::SessionError;
use stagedoor::{
    Authenticator, LifecycleEvent, LifecycleSink, SessionDirectory,
    SessionMetadata, StagedoorError, StagedoorServerBuilder,
};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// A fixed set of "booked" sessions, materialized at startup.
struct InMemoryDirectory {
    sessions: HashMap<SessionId, SessionMetadata>,
}

impl InMemoryDirectory {
    fn demo() -> Self {
        let now = Instant::now();
        let end_at = now + Duration::from_secs(2 * 3600);
        let sessions = [
            SessionMetadata {
                id: SessionId(1),
                kind: SessionKind::Group,
                capacity: 4,
                host: ParticipantId(1),
                open_at: now,
                end_at,
            },
            SessionMetadata {
                id: SessionId(2),
                kind: SessionKind::Individual,
                capacity: 1,
                host: ParticipantId(2),
                open_at: now,
                end_at,
            },
        ];
        Self {
            sessions: sessions.into_iter().map(|m| (m.id, m)).collect(),
        }
    }
}

impl SessionDirectory for InMemoryDirectory {
    async fn lookup(
        &self,
        id: SessionId,
    ) -> Result<SessionMetadata, SessionError> {
        self.sessions
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }
}

/// Accepts any numeric token and uses it as the participant id.
/// Development only.
struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    async fn authenticate(
        &self,
        token: &str,
    ) -> Result<ParticipantId, SessionError> {
        let id: u64 = token.parse().map_err(|_| {
            SessionError::AuthFailed("token must be a number".into())
        })?;
        Ok(ParticipantId(id))
    }
}

/// Logs lifecycle events instead of publishing to a notification
/// service.
struct LoggingSink;

impl LifecycleSink for LoggingSink {
    async fn publish(&self, session: SessionId, event: LifecycleEvent) {
        match event {
            LifecycleEvent::RoomOpened => {
                tracing::info!(session_id = %session, "lifecycle: waiting room opened");
            }
            LifecycleEvent::Started => {
                tracing::info!(session_id = %session, "lifecycle: session started");
            }
            LifecycleEvent::Ended { reason } => {
                tracing::info!(session_id = %session, %reason, "lifecycle: session ended");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), StagedoorError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    let server = StagedoorServerBuilder::new()
        .bind(&addr)
        .build(InMemoryDirectory::demo(), DevAuthenticator, LoggingSink)
        .await?;

    tracing::info!(
        addr = %server.local_addr().map(|a| a.to_string()).unwrap_or_default(),
        "meet-server listening"
    );
    server.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_lookup_known_and_unknown() {
        let dir = InMemoryDirectory::demo();

        let meta = dir.lookup(SessionId(1)).await.unwrap();
        assert_eq!(meta.kind, SessionKind::Group);
        assert_eq!(meta.host, ParticipantId(1));

        assert!(matches!(
            dir.lookup(SessionId(99)).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dev_authenticator_parses_numeric_tokens() {
        let auth = DevAuthenticator;
        assert_eq!(auth.authenticate("7").await.unwrap(), ParticipantId(7));
        assert!(matches!(
            auth.authenticate("abc").await,
            Err(SessionError::AuthFailed(_))
        ));
    }
}
