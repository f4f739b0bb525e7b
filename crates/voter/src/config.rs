//! Voter configuration.

use std::time::Duration;

/// Configuration for the voter client.
#[derive(Debug, Clone)]
pub struct VoterConfig {
    /// Deadline for reaching the ready state after dialing.
    ///
    /// Covers both the transport connect and the wait for the host's
    /// initial snapshot, so a voter never hangs in `Connecting` forever.
    pub connect_timeout: Duration,
}

impl Default for VoterConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl VoterConfig {
    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}
