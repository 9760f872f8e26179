//! Drain timer
//!
//! A periodic ticker owned by the gate. It keeps at most one armed deadline
//! and never spawns a task of its own: the gate task awaits [`DrainTimer::tick`]
//! next to its inbox, so ticks and message handling never overlap.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Periodic ticker with stop/start/reset control
#[derive(Debug)]
pub struct DrainTimer {
    period: Duration,
    next: Option<Instant>,
}

impl DrainTimer {
    /// Create a timer, armed immediately when `period` is non-zero
    pub fn new(period: Duration) -> Self {
        let mut timer = Self { period, next: None };
        timer.start();
        timer
    }

    /// Create a timer that will never fire
    pub fn disabled() -> Self {
        Self {
            period: Duration::ZERO,
            next: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.next.is_some()
    }

    /// Cancel the pending tick, if any
    pub fn stop(&mut self) {
        self.next = None;
    }

    /// Arm the timer one period from now unless it is already armed
    pub fn start(&mut self) {
        if self.next.is_none() && !self.period.is_zero() {
            self.next = Some(Instant::now() + self.period);
        }
    }

    /// Stop and re-arm, optionally switching to a new period
    pub fn reset(&mut self, period: Option<Duration>) {
        if let Some(period) = period {
            self.period = period;
        }
        self.stop();
        self.start();
    }

    /// Wait for the next tick and re-arm for the following one.
    ///
    /// Pends forever while stopped. Cancel-safe: dropping the future before
    /// it completes leaves the deadline untouched.
    pub async fn tick(&mut self) {
        match self.next {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.next = Some(Instant::now() + self.period);
            }
            None => std::future::pending().await,
        }
    }
}
