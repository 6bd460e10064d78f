//! uitour-probe: Deterministic Harness for UI Tour Tests
//!
//! Drives tests of an in-browser "UI tour" feature, where a web page asks the
//! browser chrome to highlight controls, show info tooltips and open menus.
//! The harness loads the tour page, waits for tour UI to become visible or
//! hidden, runs tests one after another, and checks after every test that no
//! tour UI leaked.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    UITOUR-PROBE Architecture                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ UiTourTest │    │ loader /   │    │ BrowserHost│            │
//! │   │ sequencer  │───►│ poll /     │───►│ (simulated │            │
//! │   │            │    │ panel_event│    │  or real)  │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │          │                 │                 │                   │
//! │          └─────────────────┴──── EventLoop ──┘                   │
//! │                         (virtual clock)                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one thread. Waits are timers on a shared
//! [`EventLoop`], so tests advance time explicitly and never sleep.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use uitour_probe::{
//!     show_info_promise, EventLoop, HarnessConfig, SimulatedBrowser, TourTest, UiTourTest,
//! };
//!
//! let event_loop = EventLoop::new();
//! let config = HarnessConfig::default();
//! let browser = SimulatedBrowser::new(&event_loop, &config);
//!
//! let sequence = UiTourTest::new(&event_loop, Rc::new(browser), config).with_tests(vec![
//!     TourTest::task("test_info_on_urlbar", |ctx| {
//!         show_info_promise(&ctx, "urlbar", "Title", "Text")
//!     }),
//! ]);
//!
//! let report = sequence.start();
//! event_loop.run_until_idle();
//! assert!(report.outcome().unwrap().unwrap().all_passed());
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod config;
pub mod deferred;
pub mod dom;
pub mod event_loop;
pub mod host;
pub mod loader;
pub mod logging;
pub mod panel_event;
pub mod poll;
pub mod reporter;
pub mod result;
pub mod sequencer;
pub mod session;
pub mod visibility;

pub use config::{
    ChromeElementIds, HarnessConfig, PollConfig, NUMBER_OF_TRIES, PANEL_EVENT_TIMEOUT_MS,
    SINGLE_TRY_TIMEOUT_MS,
};
pub use deferred::{Deferred, Promise, PromiseState};
pub use dom::{
    ComputedStyle, Display, Document, ElementTree, ListenerId, NodeId, PopupState, Visibility,
};
pub use event_loop::{EventLoop, TimerId};
pub use host::{
    BrowserHost, ContentWindow, HostCall, PermissionAction, SimulatedBrowser, SimulatedTiming,
    TabId, TourApi,
};
pub use loader::load_test_page;
pub use logging::{init_logging, init_test_logging, LogFormat};
pub use panel_event::{
    hide_info_promise, promise_panel_element_hidden, promise_panel_element_shown,
    promise_panel_shown, show_info_promise, show_menu_promise, wait_for_panel_event,
    wait_for_panel_event_with_timeout, PANEL_EVENT_TIMEOUT_MESSAGE,
};
pub use poll::{
    element_hidden_promise, element_visible_promise, wait_for_callback_result_promise,
    wait_for_condition, wait_for_condition_default, wait_for_condition_promise,
    wait_for_condition_promise_with, wait_for_element_to_be_hidden,
    wait_for_element_to_be_visible, wait_for_popup_at_anchor,
};
pub use reporter::{AssertionRecord, TestReporter};
pub use result::{ProbeError, ProbeResult};
pub use sequencer::{Done, SequenceReport, SequencerState, TourTest, UiTourTest};
pub use session::{TestContext, TourSession};
pub use visibility::{
    element_is_hidden, element_is_visible, is_element_hidden, is_element_visible, is_hidden,
    is_visible,
};
