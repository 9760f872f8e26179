//! Gate node - the single execution context of one gate
//!
//! A node is one tokio task owning a [`GateStateMachine`]. Inbound messages,
//! inspection requests, drain-timer ticks and deferred state writes are all
//! awaited in the same `select!` loop, so at most one of them touches the
//! mode or the queue at a time. Emissions go to a bounded [`OutputBuffer`]
//! and the node never waits on its consumer.

use std::sync::Arc;
use std::time::Duration;

use flowgate_storage::ContextStore;
use flowgate_types::{
    Error, GateConfig, GateSnapshot, GateStats, Message, Mode, Result, Status,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::gate::GateStateMachine;
use crate::output::OutputBuffer;
use crate::status::StatusSink;

/// Inbox capacity per gate
const INBOX_CAPACITY: usize = 1024;

/// How long queue writes caused by data messages are held back and merged
const PERSIST_DELAY: Duration = Duration::from_millis(100);

/// Point-in-time view of a running gate
#[derive(Debug, Clone)]
pub struct GateView {
    pub mode: Mode,
    pub queue_len: usize,
    pub status: Status,
    pub stats: GateStats,
    pub timer_armed: bool,
    /// Emissions waiting in the output buffer
    pub output_len: usize,
    /// Emissions discarded because nobody collected them in time
    pub output_evicted: u64,
}

enum Request {
    Input(Message, oneshot::Sender<Result<()>>),
    Inspect(oneshot::Sender<GateView>),
    Shutdown,
}

/// Handle used by the host to talk to a running gate
///
/// Dropping the handle also stops the gate.
pub struct GateHandle {
    name: String,
    inbox: mpsc::Sender<Request>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl GateHandle {
    fn stopped(&self) -> Error {
        Error::GateStopped(self.name.clone())
    }

    /// Deliver a message and wait until the gate has handled it.
    ///
    /// Fails with `QueueFull` when the gate is queueing at its bound.
    pub async fn send(&self, msg: Message) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.inbox
            .send(Request::Input(msg, tx))
            .await
            .map_err(|_| self.stopped())?;
        rx.await.map_err(|_| self.stopped())?
    }

    /// Read mode, queue length, status and counters.
    ///
    /// Answered after every message sent before it has been handled.
    pub async fn inspect(&self) -> Result<GateView> {
        let (tx, rx) = oneshot::channel();
        self.inbox
            .send(Request::Inspect(tx))
            .await
            .map_err(|_| self.stopped())?;
        rx.await.map_err(|_| self.stopped())
    }

    /// Stop the gate and wait for its task to finish. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        // The task may already be gone; joining below still succeeds
        let _ = self.inbox.send(Request::Shutdown).await;
        let task = self.task.lock().take();
        match task {
            Some(task) => task
                .await
                .map_err(|e| Error::Internal(format!("gate task failed: {}", e))),
            None => Ok(()),
        }
    }
}

/// A running gate
pub struct GateNode {
    name: String,
    machine: GateStateMachine,
    /// Present only for gates created with `persist`
    store: Option<Arc<dyn ContextStore>>,
    status: Arc<dyn StatusSink>,
    outputs: Arc<OutputBuffer>,
    /// Deadline of a pending deferred state write
    persist_at: Option<Instant>,
}

impl GateNode {
    /// Build a gate and start its task.
    ///
    /// The store is only used when `persist` is set: mode and queue are
    /// resumed from it on start and written back as they change. Returns the
    /// handle and the buffer the gate's emissions collect in.
    pub async fn spawn(
        name: impl Into<String>,
        config: GateConfig,
        store: Option<Arc<dyn ContextStore>>,
        status: Arc<dyn StatusSink>,
    ) -> Result<(GateHandle, Arc<OutputBuffer>)> {
        let name = name.into();
        let store = store.filter(|_| config.persist);

        let restored = match &store {
            Some(store) => load_snapshot(store.as_ref(), &name, &config.store_name).await?,
            None => None,
        };
        let outputs = Arc::new(OutputBuffer::new(config.max_output));
        let machine = GateStateMachine::new(config, restored).map_err(|e| {
            error!(gate = %name, error = %e, "Gate initialization failed");
            e
        })?;

        let (inbox, inbox_rx) = mpsc::channel(INBOX_CAPACITY);

        let mut node = Self {
            name: name.clone(),
            machine,
            store,
            status,
            outputs: Arc::clone(&outputs),
            persist_at: None,
        };
        node.status.update(&node.machine.status());
        node.save_state().await;
        info!(gate = %name, mode = %node.machine.mode(), "Gate started");

        let task = tokio::spawn(node.run(inbox_rx));
        let handle = GateHandle {
            name,
            inbox,
            task: Mutex::new(Some(task)),
        };
        Ok((handle, outputs))
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<Request>) {
        loop {
            tokio::select! {
                request = inbox.recv() => match request {
                    Some(Request::Input(msg, reply)) => {
                        let result = self.on_input(msg).await;
                        let _ = reply.send(result);
                    }
                    Some(Request::Inspect(reply)) => {
                        let _ = reply.send(self.view());
                    }
                    Some(Request::Shutdown) | None => break,
                },
                _ = self.machine.next_tick() => self.on_tick().await,
                _ = persist_due(self.persist_at) => self.save_state().await,
            }
        }

        self.machine.shutdown();
        if self.persist_at.is_some() {
            self.save_state().await;
        }
        info!(gate = %self.name, "Gate stopped");
    }

    async fn on_input(&mut self, msg: Message) -> Result<()> {
        let control = self.machine.is_control(&msg);
        let reaction = self.machine.handle(msg).map_err(|e| {
            warn!(gate = %self.name, error = %e, "Message rejected");
            e
        })?;

        for emission in reaction.emissions {
            self.outputs.push(emission);
        }
        if reaction.state_changed {
            self.status.update(&self.machine.status());
            // Bursts of data only grow the queue; merge their writes
            if control {
                self.save_state().await;
            } else {
                self.schedule_save();
            }
        }
        Ok(())
    }

    async fn on_tick(&mut self) {
        if let Some(emission) = self.machine.on_tick() {
            debug!(gate = %self.name, queue_len = self.machine.queue_len(), "Drained on tick");
            self.outputs.push(emission);
            self.status.update(&self.machine.status());
            self.save_state().await;
        }
    }

    fn schedule_save(&mut self) {
        if self.store.is_some() && self.persist_at.is_none() {
            self.persist_at = Some(Instant::now() + PERSIST_DELAY);
        }
    }

    /// Write mode and queue back to the store, if the gate persists
    async fn save_state(&mut self) {
        self.persist_at = None;
        let Some(store) = &self.store else {
            return;
        };

        let snapshot = self.machine.snapshot();
        let store_name = &self.machine.config().store_name;
        if let Err(e) = save_snapshot(store.as_ref(), &self.name, store_name, &snapshot).await {
            error!(gate = %self.name, error = %e, "Failed to save gate state");
        }
    }

    fn view(&self) -> GateView {
        GateView {
            mode: self.machine.mode(),
            queue_len: self.machine.queue_len(),
            status: self.machine.status(),
            stats: self.machine.stats(),
            timer_armed: self.machine.timer_armed(),
            output_len: self.outputs.len(),
            output_evicted: self.outputs.evicted(),
        }
    }
}

async fn persist_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn state_key(gate: &str) -> String {
    format!("{}/state", gate)
}

fn queue_key(gate: &str) -> String {
    format!("{}/queue", gate)
}

async fn load_snapshot(
    store: &dyn ContextStore,
    gate: &str,
    store_name: &str,
) -> Result<Option<GateSnapshot>> {
    let state = match store.get(&state_key(gate), store_name).await? {
        Some(Value::String(s)) => s.parse::<Mode>().map_err(|e| {
            error!(gate = %gate, state = %s, "Invalid state");
            e
        })?,
        Some(other) => return Err(Error::InvalidMode(other.to_string())),
        None => return Ok(None),
    };
    let queue: Vec<Message> = match store.get(&queue_key(gate), store_name).await? {
        Some(value) => serde_json::from_value(value)?,
        None => Vec::new(),
    };

    debug!(gate = %gate, mode = %state, queue_len = queue.len(), "Restored gate state");
    Ok(Some(GateSnapshot { state, queue }))
}

async fn save_snapshot(
    store: &dyn ContextStore,
    gate: &str,
    store_name: &str,
    snapshot: &GateSnapshot,
) -> Result<()> {
    store
        .set(
            &state_key(gate),
            Value::String(snapshot.state.as_str().to_string()),
            store_name,
        )
        .await?;
    store
        .set(
            &queue_key(gate),
            serde_json::to_value(&snapshot.queue)?,
            store_name,
        )
        .await
}
