//! Persisted gate state and runtime counters

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::message::Message;
use crate::mode::Mode;

/// Mode and queue as written to the context store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GateSnapshot {
    pub state: Mode,
    #[serde(default)]
    pub queue: Vec<Message>,
}

/// Gate statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GateStats {
    /// Messages handled (control and data)
    pub received: u64,
    /// Data messages passed straight through
    pub passed: u64,
    /// Data messages dropped while closed
    pub dropped: u64,
    /// Data messages buffered
    pub enqueued: u64,
    /// Messages released from the queue, singly or in batches
    pub drained: u64,
    /// Control messages with an unknown token
    pub ignored_commands: u64,
    /// Current queue length
    pub queue_len: usize,
}
