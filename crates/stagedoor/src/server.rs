//! `StagedoorServer` builder and server loop.
//!
//! This is the entry point for running a Stagedoor orchestrator. It ties
//! together all the layers: transport → protocol → session.

use std::sync::Arc;
use std::time::Duration;

use stagedoor_protocol::{Codec, JsonCodec};
use stagedoor_session::{
    Authenticator, LifecycleSink, OrchestratorConfig, SessionDirectory,
    SessionRegistry,
};
use stagedoor_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::StagedoorError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry sits behind a `Mutex` held only long enough to clone a
/// session handle out — never across a session actor round-trip.
pub(crate) struct ServerState<D, A, L, C>
where
    D: SessionDirectory,
    A: Authenticator,
    L: LifecycleSink,
    C: Codec,
{
    pub(crate) registry: Mutex<SessionRegistry<L>>,
    pub(crate) directory: D,
    pub(crate) auth: A,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Stagedoor server.
///
/// # Example
///
/// ```rust,ignore
/// let server = StagedoorServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(directory, auth, sink)
///     .await?;
/// server.run().await
/// ```
pub struct StagedoorServerBuilder {
    bind_addr: String,
    config: OrchestratorConfig,
    sweep_interval: Duration,
}

impl StagedoorServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: OrchestratorConfig::default(),
            sweep_interval: Duration::from_secs(60),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the orchestrator configuration.
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets how often stale registry entries are pruned.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Builds and starts the server against a session directory,
    /// authenticator, and lifecycle sink.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<D, A, L>(
        self,
        directory: D,
        auth: A,
        sink: L,
    ) -> Result<StagedoorServer<D, A, L, JsonCodec>, StagedoorError>
    where
        D: SessionDirectory,
        A: Authenticator,
        L: LifecycleSink,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(SessionRegistry::new(
                self.config,
                Arc::new(sink),
            )),
            directory,
            auth,
            codec: JsonCodec,
        });

        Ok(StagedoorServer {
            transport,
            state,
            sweep_interval: self.sweep_interval,
        })
    }
}

impl Default for StagedoorServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Stagedoor orchestration server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct StagedoorServer<D, A, L, C>
where
    D: SessionDirectory,
    A: Authenticator,
    L: LifecycleSink,
    C: Codec,
{
    transport: WebSocketTransport,
    state: Arc<ServerState<D, A, L, C>>,
    sweep_interval: Duration,
}

impl<D, A, L, C> StagedoorServer<D, A, L, C>
where
    D: SessionDirectory,
    A: Authenticator,
    L: LifecycleSink,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> StagedoorServerBuilder {
        StagedoorServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// A background task prunes registry entries for sessions whose
    /// actors have evicted themselves. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), StagedoorError> {
        tracing::info!("Stagedoor server running");

        let sweeper_state = Arc::clone(&self.state);
        let sweep_interval = self.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            interval.tick().await; // first tick is immediate
            loop {
                interval.tick().await;
                let pruned = sweeper_state.registry.lock().await.sweep();
                if pruned > 0 {
                    tracing::debug!(pruned, "registry sweep");
                }
            }
        });

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
