//! Control commands and the token table that recognizes them

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Logical control command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Open,
    Close,
    Queue,
    Trigger,
    Flush,
    Reset,
    Default,
    Status,
}

/// Tokens recognized on the control topic, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CommandTable {
    pub open: String,
    pub close: String,
    pub queue: String,
    pub trigger: String,
    pub flush: String,
    pub reset: String,
    pub default: String,
    pub status: String,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self {
            open: "open".to_string(),
            close: "close".to_string(),
            queue: "queue".to_string(),
            trigger: "trigger".to_string(),
            flush: "flush".to_string(),
            reset: "reset".to_string(),
            default: "default".to_string(),
            status: "status".to_string(),
        }
    }
}

impl CommandTable {
    /// Entries in lookup order
    fn entries(&self) -> [(Command, &str); 8] {
        [
            (Command::Open, self.open.as_str()),
            (Command::Close, self.close.as_str()),
            (Command::Queue, self.queue.as_str()),
            (Command::Trigger, self.trigger.as_str()),
            (Command::Status, self.status.as_str()),
            (Command::Flush, self.flush.as_str()),
            (Command::Reset, self.reset.as_str()),
            (Command::Default, self.default.as_str()),
        ]
    }

    /// Resolve a lowercased token to its command
    pub fn lookup(&self, token: &str) -> Option<Command> {
        self.entries()
            .into_iter()
            .find(|(_, t)| t.to_lowercase() == token)
            .map(|(cmd, _)| cmd)
    }

    /// Reject empty or repeated tokens
    pub fn validate(&self) -> Result<()> {
        let entries = self.entries();
        for (i, (cmd, token)) in entries.iter().enumerate() {
            let token = token.to_lowercase();
            if token.is_empty() {
                return Err(Error::InvalidConfig(format!("empty token for {:?}", cmd)));
            }
            if entries[..i].iter().any(|(_, t)| t.to_lowercase() == token) {
                return Err(Error::DuplicateCommand { token });
            }
        }
        Ok(())
    }
}
