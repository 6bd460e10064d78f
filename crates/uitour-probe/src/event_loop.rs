//! Deterministic Event Loop
//!
//! A single cooperative timeline with a virtual clock. Every suspension point
//! in the harness (poll ticks, panel-event timeouts, page loads, the one-turn
//! deferrals around teardown) is a timer on this loop, so tests drive time
//! explicitly instead of sleeping.
//!
//! ## Re-entrancy
//!
//! Callbacks run with no internal borrow held. A callback may schedule or
//! cancel timers, including timers on the same loop.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// Upper bound on steps taken by [`EventLoop::run_until_idle`]
pub const DEFAULT_MAX_STEPS: usize = 100_000;

/// Identifier returned by [`EventLoop::set_timeout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

type Callback = Box<dyn FnOnce()>;

#[derive(Default)]
struct LoopInner {
    now_ms: u64,
    next_seq: u64,
    /// Keyed by (due time, insertion sequence) so equal deadlines run FIFO
    timers: BTreeMap<(u64, u64), Callback>,
    /// Timer id -> due time, for cancellation
    due_by_id: HashMap<u64, u64>,
    executed: usize,
}

/// Virtual-time event loop
///
/// Cloning yields another handle onto the same timeline.
#[derive(Clone, Default)]
pub struct EventLoop {
    inner: Rc<RefCell<LoopInner>>,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventLoop")
            .field("now_ms", &inner.now_ms)
            .field("pending", &inner.timers.len())
            .field("executed", &inner.executed)
            .finish()
    }
}

impl EventLoop {
    /// Create a new loop with the clock at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.inner.borrow().now_ms
    }

    /// Schedule `callback` to run `delay_ms` after the current time
    pub fn set_timeout<F>(&self, delay_ms: u64, callback: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let due = inner.now_ms.saturating_add(delay_ms);
        inner.timers.insert((due, seq), Box::new(callback));
        inner.due_by_id.insert(seq, due);
        TimerId(seq)
    }

    /// Cancel a pending timer
    ///
    /// Returns `false` if the timer already ran or was already cancelled.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.due_by_id.remove(&id.0) {
            Some(due) => inner.timers.remove(&(due, id.0)).is_some(),
            None => false,
        }
    }

    /// Run `callback` on the next scheduling turn
    pub fn execute_soon<F>(&self, callback: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        self.set_timeout(0, callback)
    }

    /// Number of timers waiting to run
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// Whether nothing is scheduled
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending_count() == 0
    }

    /// Total callbacks executed so far
    #[must_use]
    pub fn executed_count(&self) -> usize {
        self.inner.borrow().executed
    }

    /// Run the earliest timer, advancing the clock to its due time
    ///
    /// Returns `false` when no timer is pending.
    pub fn tick(&self) -> bool {
        self.run_next(None)
    }

    /// Run timers until none remain
    ///
    /// Bounded by [`DEFAULT_MAX_STEPS`] so that a self-rescheduling callback
    /// cannot spin forever.
    pub fn run_until_idle(&self) -> usize {
        self.run_until_idle_bounded(DEFAULT_MAX_STEPS)
    }

    /// Run at most `max_steps` timers
    ///
    /// Returns the number of timers executed.
    pub fn run_until_idle_bounded(&self, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps && self.tick() {
            steps += 1;
        }
        steps
    }

    /// Run every timer due within the next `ms` milliseconds
    ///
    /// The clock ends at exactly `now + ms` even if the last timer fired earlier.
    pub fn advance(&self, ms: u64) -> usize {
        let deadline = self.now_ms().saturating_add(ms);
        let mut steps = 0;
        while steps < DEFAULT_MAX_STEPS && self.run_next(Some(deadline)) {
            steps += 1;
        }
        let mut inner = self.inner.borrow_mut();
        if inner.now_ms < deadline {
            inner.now_ms = deadline;
        }
        steps
    }

    fn run_next(&self, deadline: Option<u64>) -> bool {
        // Pop under borrow, run with the borrow released
        let callback = {
            let mut inner = self.inner.borrow_mut();
            let Some((&(due, seq), _)) = inner.timers.iter().next() else {
                return false;
            };
            if deadline.is_some_and(|limit| due > limit) {
                return false;
            }
            let callback = inner.timers.remove(&(due, seq));
            inner.due_by_id.remove(&seq);
            if due > inner.now_ms {
                inner.now_ms = due;
            }
            inner.executed += 1;
            callback
        };

        if let Some(callback) = callback {
            callback();
        }
        true
    }
}
