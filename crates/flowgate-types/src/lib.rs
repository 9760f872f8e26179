//! FlowGate Types - Core domain types for the message gate
//!
//! This crate contains all shared types used across FlowGate components.

pub mod command;
pub mod config;
pub mod error;
pub mod message;
pub mod mode;
pub mod state;

// Re-export commonly used types
pub use command::{Command, CommandTable};
pub use config::GateConfig;
pub use error::{Error, Result};
pub use message::{Emission, Message, MessageId};
pub use mode::{Fill, Mode, Shape, Status};
pub use state::{GateSnapshot, GateStats};
