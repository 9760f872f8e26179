//! Gate state machine
//!
//! Owns the current mode, the FIFO buffer and the drain timer, and applies
//! control commands and data messages to them. Everything here is
//! synchronous; the owning [`GateNode`](crate::node::GateNode) decides when to
//! call in and what to do with the resulting emissions.

use std::collections::VecDeque;

use flowgate_types::{
    Command, Emission, Error, GateConfig, GateSnapshot, GateStats, Message, Mode, Result, Status,
};
use tracing::{debug, warn};

use crate::timer::DrainTimer;

/// What handling one message produced
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reaction {
    /// Emissions in the order they must be sent
    pub emissions: Vec<Emission>,
    /// Status must be refreshed and state written back
    pub state_changed: bool,
}

impl Reaction {
    fn emit(emission: Emission) -> Self {
        Self {
            emissions: vec![emission],
            state_changed: false,
        }
    }

    fn changed(emissions: Vec<Emission>) -> Self {
        Self {
            emissions,
            state_changed: true,
        }
    }
}

/// Single-channel message gate
#[derive(Debug)]
pub struct GateStateMachine {
    config: GateConfig,
    control_topic: String,
    mode: Mode,
    queue: VecDeque<Message>,
    timer: DrainTimer,
    stats: GateStats,
}

impl GateStateMachine {
    /// Build a gate from its configuration, optionally resuming `restored` state
    pub fn new(config: GateConfig, restored: Option<GateSnapshot>) -> Result<Self> {
        config.validate()?;

        let (mode, queue) = match restored {
            Some(snapshot) => (snapshot.state, VecDeque::from(snapshot.queue)),
            None => (config.default_mode, VecDeque::new()),
        };
        let timer = match config.interval() {
            Some(period) => DrainTimer::new(period),
            None => DrainTimer::disabled(),
        };

        let mut gate = Self {
            control_topic: config.control_topic.to_lowercase(),
            config,
            mode,
            queue,
            timer,
            stats: GateStats::default(),
        };
        gate.sync_timer();
        Ok(gate)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn status(&self) -> Status {
        self.mode.status(self.queue.len())
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            queue_len: self.queue.len(),
            ..self.stats.clone()
        }
    }

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            state: self.mode,
            queue: self.queue.iter().cloned().collect(),
        }
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Whether `msg` is addressed to the control topic
    pub fn is_control(&self, msg: &Message) -> bool {
        msg.topic_matches(&self.control_topic)
    }

    /// Handle one inbound message
    pub fn handle(&mut self, msg: Message) -> Result<Reaction> {
        self.stats.received += 1;
        if self.is_control(&msg) {
            Ok(self.apply_control(&msg.command_token()))
        } else {
            self.apply_data(msg)
        }
    }

    fn apply_control(&mut self, token: &str) -> Reaction {
        let mut emissions = Vec::new();

        match self.config.commands.lookup(token) {
            Some(Command::Open) => {
                emissions.push(self.take_batch());
                self.mode = Mode::Open;
            }
            Some(Command::Close) => {
                self.queue.clear();
                self.mode = Mode::Closed;
            }
            Some(Command::Queue) => {
                self.mode = Mode::Queueing;
            }
            Some(Command::Trigger) => {
                if self.mode == Mode::Queueing {
                    if let Some(msg) = self.queue.pop_front() {
                        self.stats.drained += 1;
                        self.timer.reset(None);
                        emissions.push(Emission::Single(msg));
                    }
                }
            }
            Some(Command::Flush) => {
                emissions.push(self.take_batch());
            }
            Some(Command::Reset) => {
                self.queue.clear();
            }
            Some(Command::Default) => {
                self.queue.clear();
                self.mode = self.config.default_mode;
            }
            Some(Command::Status) => {}
            None => {
                self.stats.ignored_commands += 1;
                warn!(token = %token, "Invalid command ignored");
            }
        }

        self.sync_timer();
        debug!(mode = %self.mode, queue_len = self.queue.len(), "Control message applied");

        emissions.push(Emission::Null);
        Reaction::changed(emissions)
    }

    fn apply_data(&mut self, msg: Message) -> Result<Reaction> {
        match self.mode {
            Mode::Open => {
                self.stats.passed += 1;
                Ok(Reaction::emit(Emission::Single(msg)))
            }
            Mode::Closed => {
                self.stats.dropped += 1;
                Ok(Reaction::emit(Emission::Null))
            }
            Mode::Queueing => {
                let limit = self.config.max_queue;
                if limit > 0 && self.queue.len() >= limit {
                    return Err(Error::QueueFull(limit));
                }
                self.queue.push_back(msg);
                self.stats.enqueued += 1;
                Ok(Reaction::changed(Vec::new()))
            }
        }
    }

    /// Drain the whole queue into one batch
    fn take_batch(&mut self) -> Emission {
        let batch: Vec<Message> = self.queue.drain(..).collect();
        self.stats.drained += batch.len() as u64;
        Emission::Batch(batch)
    }

    /// Arm the timer only while queueing with a drain interval configured
    fn sync_timer(&mut self) {
        if self.mode == Mode::Queueing && self.config.interval().is_some() {
            self.timer.start();
        } else {
            self.timer.stop();
        }
    }

    /// Wait until the drain timer fires
    pub async fn next_tick(&mut self) {
        self.timer.tick().await
    }

    /// Timer callback: release the oldest buffered message, if any
    pub fn on_tick(&mut self) -> Option<Emission> {
        if self.mode != Mode::Queueing {
            return None;
        }
        let msg = self.queue.pop_front()?;
        self.stats.drained += 1;
        Some(Emission::Single(msg))
    }

    /// Stop the drain timer for good
    pub fn shutdown(&mut self) {
        self.timer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_types::{CommandTable, Fill};
    use serde_json::json;

    fn config(default_mode: Mode) -> GateConfig {
        GateConfig {
            control_topic: "cmd".to_string(),
            default_mode,
            ..Default::default()
        }
    }

    fn gate(default_mode: Mode) -> GateStateMachine {
        GateStateMachine::new(config(default_mode), None).unwrap()
    }

    fn cmd(token: &str) -> Message {
        Message::new("cmd", token)
    }

    fn data(n: i64) -> Message {
        Message::new("x", n)
    }

    fn payloads(emission: &Emission) -> Vec<serde_json::Value> {
        match emission {
            Emission::Single(m) => vec![m.payload.clone().unwrap()],
            Emission::Batch(ms) => ms.iter().map(|m| m.payload.clone().unwrap()).collect(),
            Emission::Null => vec![],
        }
    }

    #[test]
    fn test_open_passes_in_order() {
        let mut gate = gate(Mode::Open);
        for n in 1..=3 {
            let reaction = gate.handle(data(n)).unwrap();
            assert_eq!(reaction.emissions.len(), 1);
            assert!(matches!(reaction.emissions[0], Emission::Single(_)));
            assert_eq!(payloads(&reaction.emissions[0]), vec![json!(n)]);
            assert!(!reaction.state_changed);
        }
        assert_eq!(gate.queue_len(), 0);
        assert_eq!(gate.stats().passed, 3);
    }

    #[test]
    fn test_closed_drops() {
        let mut gate = gate(Mode::Closed);
        for n in 1..=3 {
            let reaction = gate.handle(data(n)).unwrap();
            assert_eq!(reaction.emissions, vec![Emission::Null]);
        }
        assert_eq!(gate.queue_len(), 0);
        assert_eq!(gate.stats().dropped, 3);
    }

    #[test]
    fn test_worked_example() {
        let mut gate = gate(Mode::Open);

        let reaction = gate.handle(cmd("queue")).unwrap();
        assert_eq!(reaction.emissions, vec![Emission::Null]);
        assert_eq!(gate.mode(), Mode::Queueing);

        for n in 1..=3 {
            let reaction = gate.handle(data(n)).unwrap();
            assert!(reaction.emissions.is_empty());
            assert!(reaction.state_changed);
            assert_eq!(gate.status().text, format!("queuing: {}", n));
        }

        let reaction = gate.handle(cmd("trigger")).unwrap();
        assert_eq!(reaction.emissions.len(), 2);
        assert!(matches!(reaction.emissions[0], Emission::Single(_)));
        assert_eq!(payloads(&reaction.emissions[0]), vec![json!(1)]);
        assert_eq!(reaction.emissions[1], Emission::Null);
        assert_eq!(gate.queue_len(), 2);

        let reaction = gate.handle(cmd("open")).unwrap();
        assert!(matches!(reaction.emissions[0], Emission::Batch(_)));
        assert_eq!(payloads(&reaction.emissions[0]), vec![json!(2), json!(3)]);
        assert_eq!(gate.queue_len(), 0);
        assert_eq!(gate.mode(), Mode::Open);
    }

    #[test]
    fn test_open_emits_empty_batch() {
        let mut gate = gate(Mode::Closed);
        let reaction = gate.handle(cmd("open")).unwrap();
        assert_eq!(
            reaction.emissions,
            vec![Emission::Batch(vec![]), Emission::Null]
        );
    }

    #[test]
    fn test_close_clears_queue() {
        let mut gate = gate(Mode::Queueing);
        gate.handle(data(1)).unwrap();
        gate.handle(cmd("close")).unwrap();
        assert_eq!(gate.mode(), Mode::Closed);
        assert_eq!(gate.queue_len(), 0);
        assert_eq!(gate.status().fill, Fill::Red);
    }

    #[test]
    fn test_queue_keeps_contents() {
        let snapshot = GateSnapshot {
            state: Mode::Closed,
            queue: vec![data(7)],
        };
        let mut gate = GateStateMachine::new(config(Mode::Open), Some(snapshot)).unwrap();
        gate.handle(cmd("queue")).unwrap();
        assert_eq!(gate.mode(), Mode::Queueing);
        assert_eq!(gate.queue_len(), 1);
    }

    #[test]
    fn test_trigger_outside_queueing_is_noop() {
        let snapshot = GateSnapshot {
            state: Mode::Open,
            queue: vec![data(1)],
        };
        let mut gate = GateStateMachine::new(config(Mode::Open), Some(snapshot)).unwrap();
        let reaction = gate.handle(cmd("trigger")).unwrap();
        assert_eq!(reaction.emissions, vec![Emission::Null]);
        assert_eq!(gate.queue_len(), 1);
    }

    #[test]
    fn test_trigger_on_empty_queue() {
        let mut gate = gate(Mode::Queueing);
        let reaction = gate.handle(cmd("trigger")).unwrap();
        assert_eq!(reaction.emissions, vec![Emission::Null]);
    }

    #[test]
    fn test_flush_emits_then_clears() {
        let mut gate = gate(Mode::Queueing);
        gate.handle(data(1)).unwrap();
        gate.handle(data(2)).unwrap();

        let reaction = gate.handle(cmd("flush")).unwrap();
        assert_eq!(payloads(&reaction.emissions[0]), vec![json!(1), json!(2)]);
        assert_eq!(reaction.emissions[1], Emission::Null);
        assert_eq!(gate.queue_len(), 0);
        assert_eq!(gate.mode(), Mode::Queueing);
        assert_eq!(gate.stats().drained, 2);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut gate = gate(Mode::Queueing);
        gate.handle(data(1)).unwrap();
        for _ in 0..3 {
            let reaction = gate.handle(cmd("reset")).unwrap();
            assert_eq!(reaction.emissions, vec![Emission::Null]);
            assert_eq!(gate.queue_len(), 0);
            assert_eq!(gate.mode(), Mode::Queueing);
        }
    }

    #[test]
    fn test_status_changes_nothing() {
        let mut gate = gate(Mode::Queueing);
        gate.handle(data(1)).unwrap();
        for _ in 0..3 {
            let reaction = gate.handle(cmd("STATUS")).unwrap();
            assert_eq!(reaction.emissions, vec![Emission::Null]);
            assert!(reaction.state_changed);
        }
        assert_eq!(gate.queue_len(), 1);
        assert_eq!(gate.mode(), Mode::Queueing);
    }

    #[test]
    fn test_default_restores_configured_mode() {
        let mut gate = gate(Mode::Closed);
        gate.handle(cmd("queue")).unwrap();
        gate.handle(data(1)).unwrap();
        gate.handle(cmd("default")).unwrap();
        assert_eq!(gate.mode(), Mode::Closed);
        assert_eq!(gate.queue_len(), 0);
    }

    #[test]
    fn test_unknown_command_ignored() {
        let mut gate = gate(Mode::Queueing);
        gate.handle(data(1)).unwrap();

        let reaction = gate.handle(cmd("explode")).unwrap();
        assert_eq!(reaction.emissions, vec![Emission::Null]);
        assert_eq!(gate.mode(), Mode::Queueing);
        assert_eq!(gate.queue_len(), 1);
        assert_eq!(gate.stats().ignored_commands, 1);
    }

    #[test]
    fn test_missing_payload_on_control_topic() {
        let mut gate = gate(Mode::Open);
        let mut msg = cmd("");
        msg.payload = None;
        let reaction = gate.handle(msg).unwrap();
        assert_eq!(reaction.emissions, vec![Emission::Null]);
        assert_eq!(gate.stats().ignored_commands, 1);
    }

    #[test]
    fn test_control_topic_is_case_insensitive() {
        let mut gate = gate(Mode::Open);
        gate.handle(Message::new("CMD", "Close")).unwrap();
        assert_eq!(gate.mode(), Mode::Closed);
    }

    #[test]
    fn test_custom_tokens() {
        let config = GateConfig {
            commands: CommandTable {
                queue: "hold".to_string(),
                trigger: "next".to_string(),
                ..Default::default()
            },
            ..config(Mode::Open)
        };
        let mut gate = GateStateMachine::new(config, None).unwrap();
        gate.handle(cmd("hold")).unwrap();
        gate.handle(data(1)).unwrap();
        let reaction = gate.handle(cmd("next")).unwrap();
        assert_eq!(payloads(&reaction.emissions[0]), vec![json!(1)]);
    }

    #[test]
    fn test_fifo_across_drain_mechanisms() {
        let mut gate = gate(Mode::Queueing);
        for n in 1..=5 {
            gate.handle(data(n)).unwrap();
        }

        let mut drained = Vec::new();
        drained.extend(payloads(&gate.handle(cmd("trigger")).unwrap().emissions[0]));
        drained.extend(payloads(&gate.on_tick().unwrap()));
        gate.handle(data(6)).unwrap();
        drained.extend(payloads(&gate.handle(cmd("trigger")).unwrap().emissions[0]));
        drained.extend(payloads(&gate.handle(cmd("flush")).unwrap().emissions[0]));

        let expected: Vec<_> = (1..=6).map(|n| json!(n)).collect();
        assert_eq!(drained, expected);
    }

    #[test]
    fn test_queue_bound() {
        let config = GateConfig {
            max_queue: 2,
            ..config(Mode::Queueing)
        };
        let mut gate = GateStateMachine::new(config, None).unwrap();
        gate.handle(data(1)).unwrap();
        gate.handle(data(2)).unwrap();
        assert!(matches!(gate.handle(data(3)), Err(Error::QueueFull(2))));
        assert_eq!(gate.queue_len(), 2);
    }

    #[test]
    fn test_on_tick_only_while_queueing() {
        let snapshot = GateSnapshot {
            state: Mode::Closed,
            queue: vec![data(1)],
        };
        let mut gate = GateStateMachine::new(config(Mode::Open), Some(snapshot)).unwrap();
        assert_eq!(gate.on_tick(), None);

        let mut gate = gate_with_interval(50);
        assert_eq!(gate.on_tick(), None);
    }

    fn gate_with_interval(interval_ms: u64) -> GateStateMachine {
        let config = GateConfig {
            interval_ms,
            ..config(Mode::Queueing)
        };
        GateStateMachine::new(config, None).unwrap()
    }

    #[test]
    fn test_timer_follows_mode() {
        let mut gate = gate_with_interval(50);
        assert!(gate.timer_armed());

        gate.handle(cmd("open")).unwrap();
        assert!(!gate.timer_armed());

        gate.handle(cmd("queue")).unwrap();
        assert!(gate.timer_armed());

        gate.handle(cmd("close")).unwrap();
        assert!(!gate.timer_armed());

        gate.handle(cmd("queue")).unwrap();
        gate.shutdown();
        assert!(!gate.timer_armed());
    }

    #[test]
    fn test_default_command_rearms_timer() {
        let mut gate = gate_with_interval(50);
        gate.handle(cmd("close")).unwrap();
        assert!(!gate.timer_armed());

        gate.handle(cmd("default")).unwrap();
        assert_eq!(gate.mode(), Mode::Queueing);
        assert!(gate.timer_armed());
    }

    #[test]
    fn test_no_interval_never_arms() {
        let gate = gate(Mode::Queueing);
        assert!(!gate.timer_armed());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GateConfig {
            commands: CommandTable {
                close: "open".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            GateStateMachine::new(config, None),
            Err(Error::DuplicateCommand { .. })
        ));
    }
}
