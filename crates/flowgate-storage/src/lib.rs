//! FlowGate Storage - Context store backends for gate state
//!
//! This crate provides pluggable key-value stores gates persist their mode
//! and queue into.
//! Currently supports:
//! - In-memory storage (default, for development/testing)
//! - JSON files on local disk

pub mod traits;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "file")]
pub mod file;

// Re-exports
pub use traits::ContextStore;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "file")]
pub use file::FileStore;
