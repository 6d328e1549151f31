//! Broker configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default number of undelivered events a session may buffer.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Default number of encoded messages queued towards a connection's writer.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Default maximum number of concurrent sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// What to do when a session's mailbox is full and another event arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Discard the oldest queued event and keep the connection.
    #[default]
    DropOldest,
    /// Close the lagging connection.
    Disconnect,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropOldest => f.write_str("drop-oldest"),
            OverflowPolicy::Disconnect => f.write_str("disconnect"),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop-oldest" | "drop_oldest" => Ok(OverflowPolicy::DropOldest),
            "disconnect" => Ok(OverflowPolicy::Disconnect),
            other => Err(format!(
                "unknown overflow policy `{}` (expected drop-oldest or disconnect)",
                other
            )),
        }
    }
}

/// Tuning knobs for the broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Capacity of each session's mailbox.
    pub mailbox_capacity: usize,
    /// Policy applied when a mailbox is full.
    pub overflow_policy: OverflowPolicy,
    /// Capacity of each connection's outbound queue.
    pub outbound_capacity: usize,
    /// Maximum concurrent sessions.
    pub max_sessions: usize,
}

impl BrokerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Set the mailbox capacity (at least 1).
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    /// Set the overflow policy.
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Set the outbound queue capacity (at least 1).
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set the session limit.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new()
    }
}
