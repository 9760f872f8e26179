//! FlowGate Core - Gate logic and runtime
//!
//! This crate contains:
//! - GateStateMachine: mode, FIFO queue and command handling
//! - DrainTimer: periodic release of queued messages
//! - GateNode: the task that serializes all work for one gate
//! - OutputBuffer: bounded hand-off of emissions to the host
//! - GateManager: registry of named gates

pub mod gate;
pub mod manager;
pub mod node;
pub mod output;
pub mod status;
pub mod timer;

// Re-exports
pub use gate::{GateStateMachine, Reaction};
pub use manager::{GateInfo, GateManager};
pub use node::{GateHandle, GateNode, GateView};
pub use output::OutputBuffer;
pub use status::{StatusBoard, StatusSink};
pub use timer::DrainTimer;
