//! Output buffer between a gate and its host
//!
//! Holds the emissions a host has not collected yet. The buffer has a fixed
//! capacity; once full, every new emission evicts the oldest one so a gate
//! nobody reads from keeps a constant footprint.

use std::collections::VecDeque;

use flowgate_types::Emission;
use parking_lot::Mutex;
use tracing::warn;

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<Emission>,
    evicted: u64,
}

/// Bounded, drop-oldest queue of emissions
#[derive(Debug)]
pub struct OutputBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl OutputBuffer {
    /// Create a buffer holding at most `capacity` emissions (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Append an emission, evicting the oldest one when full.
    ///
    /// `Null` carries nothing for a host and is not buffered.
    pub fn push(&self, emission: Emission) {
        if emission == Emission::Null {
            return;
        }

        let mut inner = self.inner.lock();
        if inner.items.len() >= self.capacity {
            inner.items.pop_front();
            inner.evicted += 1;
            if inner.evicted == 1 || inner.evicted % 1000 == 0 {
                warn!(
                    capacity = self.capacity,
                    evicted = inner.evicted,
                    "Output buffer full, discarding oldest emissions"
                );
            }
        }
        inner.items.push_back(emission);
    }

    /// Remove and return up to `max` emissions, oldest first
    pub fn take(&self, max: usize) -> Vec<Emission> {
        let mut inner = self.inner.lock();
        let n = max.min(inner.items.len());
        inner.items.drain(..n).collect()
    }

    /// Emissions waiting to be taken
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Emissions discarded because the buffer was full
    pub fn evicted(&self) -> u64 {
        self.inner.lock().evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_types::Message;
    use serde_json::{json, Value};

    fn single(n: i64) -> Emission {
        Emission::Single(Message::payload(n))
    }

    fn payloads(emissions: Vec<Emission>) -> Vec<Value> {
        emissions
            .into_iter()
            .map(|e| match e {
                Emission::Single(m) => m.payload.unwrap(),
                other => panic!("unexpected emission: {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_null_not_buffered() {
        let buffer = OutputBuffer::new(10);
        buffer.push(Emission::Null);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_in_order() {
        let buffer = OutputBuffer::new(10);
        for n in 0..5 {
            buffer.push(single(n));
        }

        assert_eq!(payloads(buffer.take(3)), vec![json!(0), json!(1), json!(2)]);
        assert_eq!(payloads(buffer.take(10)), vec![json!(3), json!(4)]);
        assert!(buffer.take(10).is_empty());
    }

    #[test]
    fn test_full_buffer_drops_oldest() {
        let buffer = OutputBuffer::new(3);
        for n in 0..10 {
            buffer.push(single(n));
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.evicted(), 7);
        assert_eq!(payloads(buffer.take(10)), vec![json!(7), json!(8), json!(9)]);
    }
}
