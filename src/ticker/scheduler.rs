//! Cancellable scheduled ticks for the reasoning ticker
//!
//! A `TickScheduler` turns "advance after `delay`" into a `Tick` delivered
//! later to the run loop. Every schedule returns a `TimerHandle`; cancelling
//! or dropping the handle guarantees the tick is never delivered by the
//! scheduler.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// A scheduled advance for one ticker instance
///
/// `epoch` identifies the ticker, `seq` the individual schedule. A ticker
/// only accepts the tick it is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tick {
    pub epoch: u64,
    pub seq: u64,
}

/// Ownership of a pending tick
pub struct TimerHandle {
    tick: Tick,
    cancel_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    /// Create a handle with a cancel callback
    pub fn new(tick: Tick, cancel_fn: impl FnOnce() + Send + 'static) -> Self {
        Self {
            tick,
            cancel_fn: Some(Box::new(cancel_fn)),
        }
    }

    /// The tick this handle will deliver
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Cancel the pending tick
    pub fn cancel(mut self) {
        if let Some(cancel_fn) = self.cancel_fn.take() {
            cancel_fn();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(cancel_fn) = self.cancel_fn.take() {
            cancel_fn();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

/// Schedules ticks for delivery after a delay
pub trait TickScheduler: Send + Sync {
    /// Schedule `tick` to fire after `delay`
    fn schedule(&self, delay: Duration, tick: Tick) -> TimerHandle;
}

/// Tokio-backed scheduler
///
/// Each schedule spawns a sleeping task that sends the tick into an mpsc
/// channel drained by the run loop. Cancelling aborts the task.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<Tick>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver its ticks arrive on
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TickScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, tick: Tick) -> TimerHandle {
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(tick);
        });
        TimerHandle::new(tick, move || task.abort())
    }
}

#[derive(Debug, Default)]
struct ManualClock {
    now: Duration,
    next_order: u64,
    pending: BTreeMap<(Duration, u64), Tick>,
}

/// Deterministic virtual-clock scheduler
///
/// Nothing fires on its own; the owner moves time forward with
/// [`fire_next`](Self::fire_next) or [`advance`](Self::advance) and feeds
/// the returned ticks to the session.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    clock: Arc<Mutex<ManualClock>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since creation
    pub fn now(&self) -> Duration {
        self.clock.lock().map(|c| c.now).unwrap_or_default()
    }

    /// Number of scheduled, not yet fired ticks
    pub fn pending(&self) -> usize {
        self.clock.lock().map(|c| c.pending.len()).unwrap_or(0)
    }

    /// Delay until the earliest pending tick, relative to now
    pub fn next_delay(&self) -> Option<Duration> {
        let clock = self.clock.lock().ok()?;
        clock
            .pending
            .keys()
            .next()
            .map(|(due, _)| due.saturating_sub(clock.now))
    }

    /// Jump to the earliest pending tick and return it
    pub fn fire_next(&self) -> Option<Tick> {
        let mut clock = self.clock.lock().ok()?;
        let key = *clock.pending.keys().next()?;
        let tick = clock.pending.remove(&key)?;
        clock.now = clock.now.max(key.0);
        Some(tick)
    }

    /// Move time forward and return every tick that became due, in order
    ///
    /// Ticks scheduled while the caller processes the result are not
    /// included, even if they would fall inside the window.
    pub fn advance(&self, by: Duration) -> Vec<Tick> {
        let Ok(mut clock) = self.clock.lock() else {
            return Vec::new();
        };
        let until = clock.now + by;
        let due: Vec<(Duration, u64)> = clock
            .pending
            .range(..=(until, u64::MAX))
            .map(|(key, _)| *key)
            .collect();
        let ticks = due
            .iter()
            .filter_map(|key| clock.pending.remove(key))
            .collect();
        clock.now = until;
        ticks
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, tick: Tick) -> TimerHandle {
        let key = match self.clock.lock() {
            Ok(mut clock) => {
                let key = (clock.now + delay, clock.next_order);
                clock.next_order += 1;
                clock.pending.insert(key, tick);
                Some(key)
            }
            Err(_) => None,
        };
        let shared = Arc::clone(&self.clock);
        TimerHandle::new(tick, move || {
            if let (Some(key), Ok(mut clock)) = (key, shared.lock()) {
                clock.pending.remove(&key);
            }
        })
    }
}
