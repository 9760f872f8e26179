//! Gate configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::command::CommandTable;
use crate::error::{Error, Result};
use crate::mode::Mode;

/// Configuration snapshot a gate is created with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GateConfig {
    /// Topic that marks a message as a control message
    #[serde(default = "default_control_topic")]
    pub control_topic: String,

    /// Control command tokens
    #[serde(default)]
    pub commands: CommandTable,

    /// Mode at startup and after the Default command
    #[serde(default)]
    pub default_mode: Mode,

    /// Drain period in milliseconds (0 = no automatic draining)
    #[serde(default)]
    pub interval_ms: u64,

    /// Restore mode and queue from the store on startup
    #[serde(default)]
    pub persist: bool,

    /// Store namespace used for persisted state
    #[serde(default = "default_store_name")]
    pub store_name: String,

    /// Maximum queued messages (0 = unlimited)
    #[serde(default)]
    pub max_queue: usize,

    /// Emissions kept for the host before the oldest are discarded
    #[serde(default = "default_max_output")]
    pub max_output: usize,
}

fn default_control_topic() -> String {
    "control".to_string()
}

fn default_store_name() -> String {
    "default".to_string()
}

fn default_max_output() -> usize {
    1000
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            control_topic: default_control_topic(),
            commands: CommandTable::default(),
            default_mode: Mode::default(),
            interval_ms: 0,
            persist: false,
            store_name: default_store_name(),
            max_queue: 0,
            max_output: default_max_output(),
        }
    }
}

impl GateConfig {
    /// Drain period, `None` when automatic draining is disabled
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms > 0).then(|| Duration::from_millis(self.interval_ms))
    }

    /// Check the configuration before a gate is built from it
    pub fn validate(&self) -> Result<()> {
        if self.control_topic.trim().is_empty() {
            return Err(Error::InvalidConfig("control topic is empty".to_string()));
        }
        if self.store_name.trim().is_empty() {
            return Err(Error::InvalidConfig("store name is empty".to_string()));
        }
        if self.max_output == 0 {
            return Err(Error::InvalidConfig("max_output must be at least 1".to_string()));
        }
        self.commands.validate()
    }
}
