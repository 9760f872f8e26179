//! Context store trait definition
//!
//! Defines the keyed get/set interface gates use to persist their state.

use async_trait::async_trait;
use flowgate_types::Result;
use serde_json::Value;

/// Keyed value store - all backends implement this
///
/// `store` selects a namespace; a value stays retrievable until it is
/// overwritten.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str, store: &str) -> Result<Option<Value>>;

    /// Write `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: Value, store: &str) -> Result<()>;
}
