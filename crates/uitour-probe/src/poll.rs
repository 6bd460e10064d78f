//! Condition Poller
//!
//! Evaluates a predicate every `interval_ms` until it holds, faults, or the
//! retry bound is reached.
//!
//! ## Bound policy
//!
//! The bound check happens *before* the condition is evaluated on a tick.
//! With `max_tries = n`, ticks `1..=n` evaluate the condition; tick `n + 1`
//! commits the timeout rejection, then evaluates the condition one final time
//! (its result can no longer change the outcome) and stops. A never-true
//! condition is therefore evaluated exactly `n + 1` times and the failure is
//! observed at `(n + 1) * interval_ms`.
//!
//! There is no cancellation: once started, a poll runs until it settles.

use crate::config::{PollConfig, NUMBER_OF_TRIES, SINGLE_TRY_TIMEOUT_MS};
use crate::deferred::{Deferred, Promise};
use crate::dom::NodeId;
use crate::event_loop::EventLoop;
use crate::result::{ProbeError, ProbeResult};
use crate::session::TestContext;
use crate::visibility::{element_is_hidden, element_is_visible, is_element_visible};
use std::cell::RefCell;
use std::rc::Rc;

struct PollState<F> {
    condition: F,
    tries: u32,
    config: PollConfig,
    timeout_msg: String,
    deferred: Deferred<()>,
}

/// Poll `condition` every 100ms, at most `max_tries` times
///
/// An `Err` from `condition` rejects immediately with that error.
pub fn wait_for_condition_promise<F>(
    event_loop: &EventLoop,
    condition: F,
    timeout_msg: impl Into<String>,
    max_tries: u32,
) -> Promise<()>
where
    F: FnMut() -> ProbeResult<bool> + 'static,
{
    wait_for_condition_promise_with(
        event_loop,
        condition,
        timeout_msg,
        PollConfig {
            interval_ms: SINGLE_TRY_TIMEOUT_MS,
            max_tries,
        },
    )
}

/// Poll with the default bound of [`NUMBER_OF_TRIES`]
pub fn wait_for_condition_default<F>(
    event_loop: &EventLoop,
    condition: F,
    timeout_msg: impl Into<String>,
) -> Promise<()>
where
    F: FnMut() -> ProbeResult<bool> + 'static,
{
    wait_for_condition_promise(event_loop, condition, timeout_msg, NUMBER_OF_TRIES)
}

/// Poll with an explicit cadence
pub fn wait_for_condition_promise_with<F>(
    event_loop: &EventLoop,
    condition: F,
    timeout_msg: impl Into<String>,
    config: PollConfig,
) -> Promise<()>
where
    F: FnMut() -> ProbeResult<bool> + 'static,
{
    let deferred = Deferred::new();
    let promise = deferred.promise();
    let state = Rc::new(RefCell::new(PollState {
        condition,
        tries: 0,
        config,
        timeout_msg: timeout_msg.into(),
        deferred,
    }));
    schedule_check(event_loop, state);
    promise
}

fn schedule_check<F>(event_loop: &EventLoop, state: Rc<RefCell<PollState<F>>>)
where
    F: FnMut() -> ProbeResult<bool> + 'static,
{
    let interval = state.borrow().config.interval_ms;
    let next_loop = event_loop.clone();
    event_loop.set_timeout(interval, move || check_condition(&next_loop, state));
}

fn check_condition<F>(event_loop: &EventLoop, state: Rc<RefCell<PollState<F>>>)
where
    F: FnMut() -> ProbeResult<bool> + 'static,
{
    let (deferred, bound_reached, timeout_msg) = {
        let s = state.borrow();
        (
            s.deferred.clone(),
            s.tries >= s.config.max_tries,
            s.timeout_msg.clone(),
        )
    };

    if bound_reached {
        tracing::debug!(tries = state.borrow().tries, "poll bound reached: {timeout_msg}");
        deferred.reject(ProbeError::timeout(timeout_msg));
    }

    let outcome = {
        let mut guard = state.borrow_mut();
        let s = &mut *guard;
        (s.condition)()
    };

    match outcome {
        Err(fault) => {
            tracing::debug!(%fault, "poll condition faulted");
            deferred.reject(fault);
            return;
        }
        Ok(true) => {
            deferred.resolve(());
            return;
        }
        Ok(false) => {}
    }

    if bound_reached {
        return;
    }
    state.borrow_mut().tries += 1;
    schedule_check(event_loop, state);
}

/// Callback form: run `next` once `condition` holds, report a failure otherwise
pub fn wait_for_condition<C, N>(ctx: &TestContext, condition: C, next: N, error_msg: &str)
where
    C: FnMut() -> ProbeResult<bool> + 'static,
    N: FnOnce() + 'static,
{
    let reporter = ctx.reporter().clone();
    wait_for_condition_promise_with(ctx.event_loop(), condition, error_msg, ctx.config().poll)
        .then(
            move |()| next(),
            move |reason| reporter.ok(false, &reason.to_string()),
        );
}

/// Resolve once `node` is visible
pub fn element_visible_promise(ctx: &TestContext, node: NodeId, msg: &str) -> Promise<()> {
    let doc = ctx.chrome_document();
    wait_for_condition_promise_with(
        ctx.event_loop(),
        move || Ok(element_is_visible(&doc, node)),
        format!("Timeout waiting for visibility: {msg}"),
        ctx.config().poll,
    )
}

/// Resolve once `node` is hidden
pub fn element_hidden_promise(ctx: &TestContext, node: NodeId, msg: &str) -> Promise<()> {
    let doc = ctx.chrome_document();
    wait_for_condition_promise_with(
        ctx.event_loop(),
        move || Ok(element_is_hidden(&doc, node)),
        format!("Timeout waiting for invisibility: {msg}"),
        ctx.config().poll,
    )
}

/// Callback form of [`element_visible_promise`]
pub fn wait_for_element_to_be_visible<N>(ctx: &TestContext, node: NodeId, next: N, msg: &str)
where
    N: FnOnce() + 'static,
{
    let doc = ctx.chrome_document();
    let reporter = ctx.reporter().clone();
    let msg_owned = msg.to_string();
    wait_for_condition(
        ctx,
        move || Ok(element_is_visible(&doc, node)),
        move || {
            reporter.ok(true, &msg_owned);
            next();
        },
        &format!("Timeout waiting for visibility: {msg}"),
    );
}

/// Callback form of [`element_hidden_promise`]
pub fn wait_for_element_to_be_hidden<N>(ctx: &TestContext, node: NodeId, next: N, msg: &str)
where
    N: FnOnce() + 'static,
{
    let doc = ctx.chrome_document();
    let reporter = ctx.reporter().clone();
    let msg_owned = msg.to_string();
    wait_for_condition(
        ctx,
        move || Ok(element_is_hidden(&doc, node)),
        move || {
            reporter.ok(true, &msg_owned);
            next();
        },
        &format!("Timeout waiting for invisibility: {msg}"),
    );
}

/// Run `next` once `popup` is visible and anchored at `anchor`
pub fn wait_for_popup_at_anchor<N>(
    ctx: &TestContext,
    popup: NodeId,
    anchor: NodeId,
    next: N,
    msg: &str,
) where
    N: FnOnce() + 'static,
{
    let doc = ctx.chrome_document();
    let check_doc = doc.clone();
    let reporter = ctx.reporter().clone();
    let msg_owned = msg.to_string();
    wait_for_condition(
        ctx,
        move || {
            Ok(element_is_visible(&check_doc, popup)
                && check_doc.anchor_node(popup) == Some(anchor))
        },
        move || {
            reporter.ok(true, &msg_owned);
            is_element_visible(&reporter, &doc, Some(popup), "Popup should be visible");
            next();
        },
        &format!("Timeout waiting for popup at anchor: {msg}"),
    );
}

/// Resolve once the page has stored a truthy callback result
pub fn wait_for_callback_result_promise(ctx: &TestContext) -> Promise<()> {
    let probe = ctx.clone();
    wait_for_condition_promise_with(
        ctx.event_loop(),
        move || {
            probe
                .content_window()
                .map(|window| window.has_callback_result())
                .ok_or_else(|| ProbeError::fault("no content window is loaded"))
        },
        "callback should be called",
        ctx.config().poll,
    )
}
