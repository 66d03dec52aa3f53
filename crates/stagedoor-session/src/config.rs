//! Orchestrator configuration.

use std::time::Duration;

/// Tunables shared by every session actor.
///
/// Session-specific values (capacity, kind, schedule, host) come from the
/// booking subsystem as [`SessionMetadata`](crate::SessionMetadata); this
/// struct holds only deployment-level knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long a disconnected active participant may reclaim their slot
    /// before the deferred release finalizes.
    pub reconnect_grace: Duration,

    /// How long a terminal session's actor lingers (rejecting late
    /// traffic with structured errors) before evicting itself.
    pub terminal_linger: Duration,

    /// Bound of each session actor's command channel. When full, senders
    /// wait — backpressure, not message loss.
    pub command_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(30),
            terminal_linger: Duration::from_secs(60),
            command_buffer: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.reconnect_grace, Duration::from_secs(30));
        assert_eq!(config.terminal_linger, Duration::from_secs(60));
        assert_eq!(config.command_buffer, 64);
    }
}
