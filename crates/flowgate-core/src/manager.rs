//! Gate manager - hosts named gate instances
//!
//! The manager is the host-side registry: it creates gates, routes messages
//! to them, collects their output and tears them down.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use flowgate_storage::ContextStore;
use flowgate_types::{Emission, Error, GateConfig, Message, Result, Status};
use tracing::{error, info};

use crate::node::{GateHandle, GateNode, GateView};
use crate::output::OutputBuffer;
use crate::status::StatusBoard;

/// Gate details returned to callers
#[derive(Debug, Clone)]
pub struct GateInfo {
    pub name: String,
    pub config: GateConfig,
    pub view: GateView,
}

struct GateEntry {
    handle: GateHandle,
    config: GateConfig,
    board: Arc<StatusBoard>,
    outputs: Arc<OutputBuffer>,
}

/// Registry of running gates
pub struct GateManager {
    /// Context store shared by all persistent gates
    store: Arc<dyn ContextStore>,
    gates: DashMap<String, Arc<GateEntry>>,
}

impl GateManager {
    /// Create a new manager with the given context store
    pub fn new(store: impl ContextStore + 'static) -> Self {
        Self::with_store(Arc::new(store))
    }

    /// Create a new manager with an Arc store
    pub fn with_store(store: Arc<dyn ContextStore>) -> Self {
        info!("Initializing FlowGate manager");
        Self {
            store,
            gates: DashMap::new(),
        }
    }

    fn entry(&self, name: &str) -> Result<Arc<GateEntry>> {
        self.gates
            .get(name)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| Error::GateNotFound(name.to_string()))
    }

    async fn info_for(name: &str, entry: &GateEntry) -> Result<GateInfo> {
        Ok(GateInfo {
            name: name.to_string(),
            config: entry.config.clone(),
            view: entry.handle.inspect().await?,
        })
    }

    // ==================== Gate Operations ====================

    /// Start a new gate
    pub async fn create_gate(&self, name: impl Into<String>, config: GateConfig) -> Result<GateInfo> {
        let name = name.into();
        if self.gates.contains_key(&name) {
            return Err(Error::GateAlreadyExists(name));
        }

        let board = Arc::new(StatusBoard::new());
        let (handle, outputs) = GateNode::spawn(
            name.clone(),
            config.clone(),
            Some(Arc::clone(&self.store)),
            board.clone(),
        )
        .await?;

        let entry = Arc::new(GateEntry {
            handle,
            config,
            board,
            outputs,
        });

        let inserted = match self.gates.entry(name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&entry));
                true
            }
        };
        if !inserted {
            // Lost a race with a concurrent create
            entry.handle.shutdown().await?;
            return Err(Error::GateAlreadyExists(name));
        }

        info!(gate = %name, "Gate created");
        Self::info_for(&name, &entry).await
    }

    /// Get gate details
    pub async fn get_gate(&self, name: &str) -> Result<GateInfo> {
        let entry = self.entry(name)?;
        Self::info_for(name, &entry).await
    }

    /// List all gates
    pub async fn list_gates(&self) -> Result<Vec<GateInfo>> {
        let entries: Vec<(String, Arc<GateEntry>)> = self
            .gates
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let mut gates = Vec::with_capacity(entries.len());
        for (name, entry) in entries {
            gates.push(Self::info_for(&name, &entry).await?);
        }
        gates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(gates)
    }

    /// Stop a gate and forget it
    pub async fn remove_gate(&self, name: &str) -> Result<()> {
        let (_, entry) = self
            .gates
            .remove(name)
            .ok_or_else(|| Error::GateNotFound(name.to_string()))?;
        entry.handle.shutdown().await?;
        info!(gate = %name, "Gate removed");
        Ok(())
    }

    /// Latest status board reading of a gate
    pub fn status(&self, name: &str) -> Result<Option<Status>> {
        Ok(self.entry(name)?.board.current())
    }

    // ==================== Message Operations ====================

    /// Deliver a message to a gate and wait until it has been handled
    pub async fn publish(&self, name: &str, msg: Message) -> Result<()> {
        let entry = self.entry(name)?;
        entry.handle.send(msg).await
    }

    /// Take up to `max` pending emissions, oldest first
    pub fn take_output(&self, name: &str, max: usize) -> Result<Vec<Emission>> {
        Ok(self.entry(name)?.outputs.take(max))
    }

    // ==================== Lifecycle ====================

    /// Stop every gate
    pub async fn shutdown(&self) {
        let names: Vec<String> = self.gates.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Err(e) = self.remove_gate(&name).await {
                error!(gate = %name, error = %e, "Failed to stop gate");
            }
        }
        info!("All gates stopped");
    }
}
