//! Status display collaborators

use flowgate_types::Status;
use parking_lot::Mutex;
use tracing::trace;

/// Receives status updates from a gate; purely observational
pub trait StatusSink: Send + Sync {
    fn update(&self, status: &Status);
}

/// Keeps the most recent status so it can be read back at any time
#[derive(Debug, Default)]
pub struct StatusBoard {
    current: Mutex<Option<Status>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest status, `None` before the gate has reported
    pub fn current(&self) -> Option<Status> {
        self.current.lock().clone()
    }
}

impl StatusSink for StatusBoard {
    fn update(&self, status: &Status) {
        trace!(text = %status.text, "Status updated");
        *self.current.lock() = Some(status.clone());
    }
}
