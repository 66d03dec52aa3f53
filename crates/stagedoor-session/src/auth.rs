//! Authentication hook for validating participant identity.
//!
//! Stagedoor doesn't implement authentication itself — tokens come from
//! whatever the surrounding platform issues (ticketing JWT, magic link,
//! API key). The orchestrator only needs one thing from them: a
//! participant identity. The [`Authenticator`] trait is that seam; the
//! server calls it once per connection during the `Hello` handshake.

use std::future::Future;

use stagedoor_protocol::ParticipantId;

use crate::SessionError;

/// Validates a client's auth token and returns their identity.
///
/// `Send + Sync + 'static` because the authenticator is shared across
/// connection handler tasks for the life of the server.
///
/// # Example
///
/// ```rust
/// use stagedoor_session::{Authenticator, SessionError};
/// use stagedoor_protocol::ParticipantId;
///
/// /// Accepts any numeric token and uses it as the participant id.
/// /// Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(
///         &self,
///         token: &str,
///     ) -> Result<ParticipantId, SessionError> {
///         let id: u64 = token.parse().map_err(|_| {
///             SessionError::AuthFailed("token must be a number".into())
///         })?;
///         Ok(ParticipantId(id))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the participant's identity.
    ///
    /// The returned future must be `Send`: it is awaited inside
    /// connection handler tasks spawned onto a multithreaded runtime.
    /// Implementors can still write plain `async fn`.
    ///
    /// # Errors
    /// Returns [`SessionError::AuthFailed`] when the token is invalid or
    /// expired.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<ParticipantId, SessionError>> + Send;
}
