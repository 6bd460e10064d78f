//! Panel event waits
//!
//! A one-shot wait for a named event on a panel element, bounded by a fixed
//! timeout. Whichever side fires first settles the promise and tears down the
//! other: the event cancels the timer, and the timer detaches the listener.

use crate::config::PANEL_EVENT_TIMEOUT_MS;
use crate::deferred::{Deferred, Promise};
use crate::dom::{Document, ListenerId, NodeId};
use crate::event_loop::{EventLoop, TimerId};
use crate::result::ProbeError;
use crate::session::TestContext;
use std::cell::Cell;
use std::rc::Rc;

/// Rejection message when the event never fires
pub const PANEL_EVENT_TIMEOUT_MESSAGE: &str = "Panel did not show within 5 seconds.";

/// Event fired once a popup has finished opening
pub const POPUP_SHOWN: &str = "popupshown";

/// Event fired once a popup has finished closing
pub const POPUP_HIDDEN: &str = "popuphidden";

/// Wait up to 5 seconds for `event` on `panel`
pub fn wait_for_panel_event(
    event_loop: &EventLoop,
    doc: &Document,
    panel: NodeId,
    event: &str,
) -> Promise<()> {
    wait_for_panel_event_with_timeout(event_loop, doc, panel, event, PANEL_EVENT_TIMEOUT_MS)
}

/// Wait up to `timeout_ms` for `event` on `panel`
pub fn wait_for_panel_event_with_timeout(
    event_loop: &EventLoop,
    doc: &Document,
    panel: NodeId,
    event: &str,
    timeout_ms: u64,
) -> Promise<()> {
    let deferred = Deferred::new();
    let promise = deferred.promise();
    let listener_slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
    let timer_slot: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));

    let listener_id = {
        let deferred = deferred.clone();
        let doc = doc.clone();
        let event_loop = event_loop.clone();
        let listener_slot = Rc::clone(&listener_slot);
        let timer_slot = Rc::clone(&timer_slot);
        doc.clone().add_event_listener(panel, event, move |_| {
            if let Some(id) = listener_slot.take() {
                doc.remove_event_listener(id);
            }
            if let Some(timer) = timer_slot.take() {
                event_loop.clear_timeout(timer);
            }
            deferred.resolve(());
        })
    };
    listener_slot.set(Some(listener_id));

    let timer = {
        let doc = doc.clone();
        let event = event.to_string();
        let listener_slot = Rc::clone(&listener_slot);
        event_loop.set_timeout(timeout_ms, move || {
            if let Some(id) = listener_slot.take() {
                doc.remove_event_listener(id);
            }
            tracing::debug!(event = %event, "panel event timed out");
            deferred.reject(ProbeError::PanelEventTimeout {
                event,
                message: PANEL_EVENT_TIMEOUT_MESSAGE.to_string(),
            });
        })
    };
    timer_slot.set(Some(timer));

    promise
}

/// Resolve when `panel` fires `popupshown`
pub fn promise_panel_element_shown(ctx: &TestContext, panel: NodeId) -> Promise<()> {
    wait_for_panel_event_with_timeout(
        ctx.event_loop(),
        &ctx.chrome_document(),
        panel,
        POPUP_SHOWN,
        ctx.config().panel_event_timeout_ms,
    )
}

/// Resolve when `panel` fires `popuphidden`
pub fn promise_panel_element_hidden(ctx: &TestContext, panel: NodeId) -> Promise<()> {
    wait_for_panel_event_with_timeout(
        ctx.event_loop(),
        &ctx.chrome_document(),
        panel,
        POPUP_HIDDEN,
        ctx.config().panel_event_timeout_ms,
    )
}

/// Resolve when the main menu panel is shown
pub fn promise_panel_shown(ctx: &TestContext) -> Promise<()> {
    match ctx.element(&ctx.config().elements.menu_panel) {
        Some(panel) => promise_panel_element_shown(ctx, panel),
        None => Promise::rejected(missing_element(&ctx.config().elements.menu_panel)),
    }
}

/// Ask the page to show the info tooltip and wait for it to open
pub fn show_info_promise(ctx: &TestContext, target: &str, title: &str, text: &str) -> Promise<()> {
    let tooltip_id = &ctx.config().elements.tooltip;
    let Some(tooltip) = ctx.element(tooltip_id) else {
        return Promise::rejected(missing_element(tooltip_id));
    };
    let Some(api) = ctx.content_api() else {
        return Promise::rejected(no_content_api());
    };
    api.show_info(target, title, text);
    promise_panel_element_shown(ctx, tooltip)
}

/// Ask the page to hide the info tooltip and wait for it to close
pub fn hide_info_promise(ctx: &TestContext) -> Promise<()> {
    let tooltip_id = &ctx.config().elements.tooltip;
    let Some(tooltip) = ctx.element(tooltip_id) else {
        return Promise::rejected(missing_element(tooltip_id));
    };
    let Some(api) = ctx.content_api() else {
        return Promise::rejected(no_content_api());
    };
    api.hide_info();
    promise_panel_element_hidden(ctx, tooltip)
}

/// Ask the page to open menu `name`; resolves from the page's callback
pub fn show_menu_promise(ctx: &TestContext, name: &str) -> Promise<()> {
    let Some(api) = ctx.content_api() else {
        return Promise::rejected(no_content_api());
    };
    let deferred = Deferred::new();
    let promise = deferred.promise();
    api.show_menu(
        name,
        Box::new(move || {
            deferred.resolve(());
        }),
    );
    promise
}

fn missing_element(id: &str) -> ProbeError {
    ProbeError::InvalidState {
        message: format!("chrome element '{id}' not found"),
    }
}

fn no_content_api() -> ProbeError {
    ProbeError::InvalidState {
        message: "no test page is loaded".to_string(),
    }
}
