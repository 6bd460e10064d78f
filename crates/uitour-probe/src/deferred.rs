//! Deferred results with a single resolve-or-reject transition.
//!
//! A [`Deferred`] is the producer half and a [`Promise`] the consumer half of
//! one shared slot. The first settlement wins; every later `resolve` or
//! `reject` is a no-op returning `false`. Observers run synchronously at
//! settlement, after the new state is committed and with no borrow held, so
//! an observer that tries to settle the same slot again cannot change it.

use crate::result::{ProbeError, ProbeResult};
use std::cell::RefCell;
use std::rc::Rc;

/// Settlement state of a deferred result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromiseState<T> {
    /// Not yet settled
    Pending,
    /// Settled successfully
    Resolved(T),
    /// Settled with an error
    Rejected(ProbeError),
}

impl<T> PromiseState<T> {
    /// Whether the slot is still pending
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

type Observer<T> = Box<dyn FnOnce(ProbeResult<T>)>;

struct Slot<T> {
    state: PromiseState<T>,
    observers: Vec<Observer<T>>,
}

/// Producer side of a deferred result
pub struct Deferred<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

/// Consumer side of a deferred result
pub struct Promise<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("Deferred")
            .field("state", &slot.state)
            .field("observers", &slot.observers.len())
            .finish()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("Promise")
            .field("state", &slot.state)
            .field("observers", &slot.observers.len())
            .finish()
    }
}

impl<T: Clone + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Create a pending deferred
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                state: PromiseState::Pending,
                observers: Vec::new(),
            })),
        }
    }

    /// Consumer handle onto the same slot
    #[must_use]
    pub fn promise(&self) -> Promise<T> {
        Promise {
            slot: Rc::clone(&self.slot),
        }
    }

    /// Resolve with `value`
    ///
    /// Returns `false` if the slot was already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(PromiseState::Resolved(value))
    }

    /// Reject with `error`
    ///
    /// Returns `false` if the slot was already settled.
    pub fn reject(&self, error: ProbeError) -> bool {
        self.settle(PromiseState::Rejected(error))
    }

    /// Whether the slot is still pending
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.borrow().state.is_pending()
    }

    fn settle(&self, next: PromiseState<T>) -> bool {
        let (observers, outcome) = {
            let mut slot = self.slot.borrow_mut();
            if !slot.state.is_pending() {
                return false;
            }
            let outcome = match &next {
                PromiseState::Resolved(value) => Ok(value.clone()),
                PromiseState::Rejected(err) => Err(err.clone()),
                PromiseState::Pending => return false,
            };
            slot.state = next;
            (std::mem::take(&mut slot.observers), outcome)
        };

        for observer in observers {
            observer(outcome.clone());
        }
        true
    }
}

impl<T: Clone + 'static> Promise<T> {
    /// A promise that is already resolved
    #[must_use]
    pub fn resolved(value: T) -> Self {
        let deferred = Deferred::new();
        deferred.resolve(value);
        deferred.promise()
    }

    /// A promise that is already rejected
    #[must_use]
    pub fn rejected(error: ProbeError) -> Self {
        let deferred = Deferred::new();
        deferred.reject(error);
        deferred.promise()
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn state(&self) -> PromiseState<T> {
        self.slot.borrow().state.clone()
    }

    /// Whether the promise is still pending
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.borrow().state.is_pending()
    }

    /// Settled outcome, or `None` while pending
    #[must_use]
    pub fn outcome(&self) -> Option<ProbeResult<T>> {
        match &self.slot.borrow().state {
            PromiseState::Pending => None,
            PromiseState::Resolved(value) => Some(Ok(value.clone())),
            PromiseState::Rejected(err) => Some(Err(err.clone())),
        }
    }

    /// Observe the outcome
    ///
    /// Runs immediately if the promise is already settled.
    pub fn on_settled<F>(&self, observer: F)
    where
        F: FnOnce(ProbeResult<T>) + 'static,
    {
        let settled = {
            let mut guard = self.slot.borrow_mut();
            let slot = &mut *guard;
            match &slot.state {
                PromiseState::Pending => {
                    slot.observers.push(Box::new(observer));
                    return;
                }
                PromiseState::Resolved(value) => Ok(value.clone()),
                PromiseState::Rejected(err) => Err(err.clone()),
            }
        };
        observer(settled);
    }

    /// Observe success and failure separately
    pub fn then<S, E>(&self, on_resolved: S, on_rejected: E)
    where
        S: FnOnce(T) + 'static,
        E: FnOnce(ProbeError) + 'static,
    {
        self.on_settled(move |outcome| match outcome {
            Ok(value) => on_resolved(value),
            Err(err) => on_rejected(err),
        });
    }

    /// Chain a follow-up promise produced from the resolved value
    ///
    /// Rejections pass through untouched.
    #[must_use]
    pub fn and_then<U, F>(&self, next: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Promise<U> + 'static,
    {
        let chained = Deferred::new();
        let out = chained.promise();
        self.on_settled(move |outcome| match outcome {
            Ok(value) => {
                let forward = chained.clone();
                next(value).on_settled(move |inner| match inner {
                    Ok(v) => {
                        forward.resolve(v);
                    }
                    Err(e) => {
                        forward.reject(e);
                    }
                });
            }
            Err(err) => {
                chained.reject(err);
            }
        });
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_first_settlement_wins() {
        let deferred = Deferred::<u32>::new();
        assert!(deferred.resolve(1));
        assert!(!deferred.resolve(2));
        assert!(!deferred.reject(ProbeError::fault("late")));
        assert_eq!(deferred.promise().state(), PromiseState::Resolved(1));
    }

    #[test]
    fn test_reject_then_resolve_is_noop() {
        let deferred = Deferred::<()>::new();
        assert!(deferred.reject(ProbeError::timeout("too slow")));
        assert!(!deferred.resolve(()));
        assert_eq!(
            deferred.promise().outcome(),
            Some(Err(ProbeError::timeout("too slow")))
        );
    }

    #[test]
    fn test_observers_run_once_at_settlement() {
        let deferred = Deferred::<u32>::new();
        let promise = deferred.promise();
        let calls = Rc::new(Cell::new(0));

        for _ in 0..3 {
            let calls = Rc::clone(&calls);
            promise.on_settled(move |outcome| {
                assert_eq!(outcome, Ok(7));
                calls.set(calls.get() + 1);
            });
        }

        assert_eq!(calls.get(), 0);
        deferred.resolve(7);
        assert_eq!(calls.get(), 3);
        deferred.resolve(8);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_late_observer_runs_immediately() {
        let promise = Promise::resolved("done".to_string());
        let seen = Rc::new(RefCell::new(None));
        let seen_clone = Rc::clone(&seen);
        promise.on_settled(move |outcome| *seen_clone.borrow_mut() = Some(outcome));
        assert_eq!(*seen.borrow(), Some(Ok("done".to_string())));
    }

    #[test]
    fn test_reentrant_settle_from_observer_is_noop() {
        let deferred = Deferred::<u32>::new();
        let inner = deferred.clone();
        let reentered = Rc::new(Cell::new(None));
        let reentered_clone = Rc::clone(&reentered);

        deferred.promise().on_settled(move |_| {
            reentered_clone.set(Some(inner.reject(ProbeError::fault("again"))));
        });

        assert!(deferred.resolve(3));
        assert_eq!(reentered.get(), Some(false));
        assert_eq!(deferred.promise().state(), PromiseState::Resolved(3));
    }

    #[test]
    fn test_then_routes_rejection() {
        let promise = Promise::<()>::rejected(ProbeError::timeout("nope"));
        let message = Rc::new(RefCell::new(String::new()));
        let message_clone = Rc::clone(&message);
        promise.then(
            |()| panic!("should not resolve"),
            move |err| *message_clone.borrow_mut() = err.to_string(),
        );
        assert_eq!(*message.borrow(), "nope");
    }

    #[test]
    fn test_and_then_chains_and_passes_rejections() {
        let first = Deferred::<u32>::new();
        let chained = first.promise().and_then(|v| Promise::resolved(v * 2));
        assert!(chained.is_pending());
        first.resolve(21);
        assert_eq!(chained.outcome(), Some(Ok(42)));

        let failing = Promise::<u32>::rejected(ProbeError::fault("x"));
        let never = failing.and_then(|v| Promise::resolved(v + 1));
        assert_eq!(never.outcome(), Some(Err(ProbeError::fault("x"))));
    }
}
