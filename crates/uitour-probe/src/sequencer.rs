//! Tour Test Sequencer
//!
//! Runs an ordered list of tour tests, one at a time. Each test gets a fresh
//! test page and signals completion through [`Done`]; the sequencer then
//! closes the page, asserts that no tour UI leaked out of the test, and moves
//! on to the next test.
//!
//! ## Lifecycle
//!
//! ```text
//! start() ──► setup (pref + permissions)
//!             │
//!             ▼
//!   ┌──► Idle ──► Running ──► Teardown ──┐
//!   └────────────────────────────────────┘
//!             │ queue empty / abort()
//!             ▼
//!          Finished (cleanup, exactly once)
//! ```
//!
//! A test that never calls [`Done::done`] stalls the sequence; there is no
//! watchdog.

use crate::config::HarnessConfig;
use crate::deferred::{Deferred, Promise};
use crate::dom::PopupState;
use crate::event_loop::EventLoop;
use crate::host::{BrowserHost, PermissionAction};
use crate::loader::load_test_page;
use crate::reporter::{AssertionRecord, TestReporter};
use crate::result::{ProbeError, ProbeResult};
use crate::session::TestContext;
use crate::visibility::is_element_hidden;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type TestBody = Box<dyn FnOnce(TestContext, Done)>;

/// A named tour test
pub struct TourTest {
    name: String,
    body: TestBody,
}

impl std::fmt::Debug for TourTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TourTest")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl TourTest {
    /// Create a test whose body signals completion through [`Done`]
    #[must_use]
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(TestContext, Done) + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    /// Create a test from a promise-returning body
    ///
    /// A rejection is reported as a failed assertion; completion is signalled
    /// either way.
    #[must_use]
    pub fn task<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(TestContext) -> Promise<()> + 'static,
    {
        Self::new(name, move |ctx: TestContext, done: Done| {
            let reporter = ctx.reporter().clone();
            body(ctx).on_settled(move |outcome| {
                if let Err(reason) = outcome {
                    reporter.ok(false, &reason.to_string());
                }
                done.done();
            });
        })
    }

    /// Test name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Sequencer phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SequencerState {
    /// Between tests, or not yet started
    #[default]
    Idle,
    /// A test body is executing
    Running,
    /// A test signalled completion; teardown is pending
    Teardown,
    /// All tests ran, or the sequence was aborted
    Finished,
}

/// Outcome of a finished sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Tests that were started, in order
    pub tests_run: Vec<String>,
    /// Every assertion reported during the sequence
    pub assertions: Vec<AssertionRecord>,
}

impl SequenceReport {
    /// Whether every assertion held
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.assertions.iter().all(|a| a.passed)
    }

    /// Failed assertions
    #[must_use]
    pub fn failures(&self) -> Vec<&AssertionRecord> {
        self.assertions.iter().filter(|a| !a.passed).collect()
    }

    /// Assertions attributed to `test`
    #[must_use]
    pub fn assertions_for(&self, test: &str) -> Vec<&AssertionRecord> {
        self.assertions
            .iter()
            .filter(|a| a.test.as_deref() == Some(test))
            .collect()
    }

    /// `Err` summarizing every failed assertion, if any
    pub fn into_result(self) -> ProbeResult<Self> {
        if self.all_passed() {
            return Ok(self);
        }
        let message = self
            .failures()
            .iter()
            .map(|a| match &a.test {
                Some(test) => format!("[{test}] {}", a.message),
                None => a.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");
        Err(ProbeError::AssertionFailed { message })
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> ProbeResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ProbeError::InvalidState {
            message: format!("report serialization failed: {e}"),
        })
    }
}

#[derive(Default)]
struct SequencerInner {
    queue: VecDeque<TourTest>,
    state: SequencerState,
    tests_run: Vec<String>,
    started: bool,
    cleaned_up: bool,
}

struct SequencerShared {
    ctx: TestContext,
    inner: RefCell<SequencerInner>,
    finished: Deferred<SequenceReport>,
}

impl Drop for SequencerShared {
    fn drop(&mut self) {
        cleanup(self);
    }
}

/// Completion signal handed to a test body
///
/// Consumed by [`Done::done`], so a test can signal at most once.
pub struct Done {
    shared: Option<Rc<SequencerShared>>,
    test: String,
}

impl std::fmt::Debug for Done {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Done")
            .field("test", &self.test)
            .field("pending", &self.shared.is_some())
            .finish()
    }
}

impl Done {
    fn new(shared: Rc<SequencerShared>, test: String) -> Self {
        Self {
            shared: Some(shared),
            test,
        }
    }

    /// Name of the test this signal belongs to
    #[must_use]
    pub fn test_name(&self) -> &str {
        &self.test
    }

    /// Signal that the test is complete
    ///
    /// Teardown runs on the next scheduling turn.
    pub fn done(mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        {
            let mut inner = shared.inner.borrow_mut();
            if inner.state == SequencerState::Finished {
                return;
            }
            inner.state = SequencerState::Teardown;
        }
        tracing::debug!(test = %self.test, "test signalled done");

        let event_loop = shared.ctx.event_loop().clone();
        let next_loop = event_loop.clone();
        event_loop.execute_soon(move || {
            teardown(&shared);
            next_loop.execute_soon(move || next_test(&shared));
        });
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if self.shared.is_some() {
            tracing::warn!(
                test = %self.test,
                "done signal dropped without being called; the sequence will not advance"
            );
        }
    }
}

/// Sequential runner for tour tests
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use uitour_probe::{EventLoop, HarnessConfig, SimulatedBrowser, TourTest, UiTourTest};
///
/// let event_loop = EventLoop::new();
/// let config = HarnessConfig::default();
/// let browser = SimulatedBrowser::new(&event_loop, &config);
///
/// let sequence = UiTourTest::new(&event_loop, Rc::new(browser), config)
///     .with_tests(vec![TourTest::new("test_noop", |_ctx, done| done.done())]);
/// let report = sequence.start();
/// event_loop.run_until_idle();
///
/// let report = report.outcome().unwrap().unwrap();
/// assert_eq!(report.tests_run, vec!["test_noop".to_string()]);
/// assert!(report.all_passed());
/// ```
pub struct UiTourTest {
    shared: Rc<SequencerShared>,
}

impl std::fmt::Debug for UiTourTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.borrow();
        f.debug_struct("UiTourTest")
            .field("state", &inner.state)
            .field("pending", &inner.queue.len())
            .field("tests_run", &inner.tests_run)
            .finish()
    }
}

impl UiTourTest {
    /// Create a sequencer with an empty queue
    #[must_use]
    pub fn new(event_loop: &EventLoop, host: Rc<dyn BrowserHost>, config: HarnessConfig) -> Self {
        let ctx = TestContext::new(event_loop.clone(), host, config, TestReporter::new());
        Self {
            shared: Rc::new(SequencerShared {
                ctx,
                inner: RefCell::new(SequencerInner::default()),
                finished: Deferred::new(),
            }),
        }
    }

    /// Append a test
    pub fn add_test(&mut self, test: TourTest) {
        self.shared.inner.borrow_mut().queue.push_back(test);
    }

    /// Append tests
    #[must_use]
    pub fn with_tests(self, tests: Vec<TourTest>) -> Self {
        self.shared.inner.borrow_mut().queue.extend(tests);
        self
    }

    /// Context shared with the test bodies
    #[must_use]
    pub fn context(&self) -> &TestContext {
        &self.shared.ctx
    }

    /// Current phase
    #[must_use]
    pub fn state(&self) -> SequencerState {
        self.shared.inner.borrow().state
    }

    /// Tests not yet started
    #[must_use]
    pub fn pending_tests(&self) -> Vec<String> {
        self.shared
            .inner
            .borrow()
            .queue
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    /// Whether cleanup has run
    #[must_use]
    pub fn is_cleaned_up(&self) -> bool {
        self.shared.inner.borrow().cleaned_up
    }

    /// Run global setup and start the first test
    ///
    /// Calling `start` again returns the same report promise.
    pub fn start(&self) -> Promise<SequenceReport> {
        let promise = self.shared.finished.promise();
        {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.started {
                tracing::debug!("sequence already started");
                return promise;
            }
            inner.started = true;
        }

        let ctx = &self.shared.ctx;
        let config = ctx.config();
        let host = ctx.host();
        host.set_bool_pref(&config.enable_pref, true);
        for origin in &config.permission_origins {
            host.add_permission(origin, &config.permission_type, PermissionAction::Allow);
        }
        tracing::info!(
            tests = self.shared.inner.borrow().queue.len(),
            "starting tour test sequence"
        );

        next_test(&self.shared);
        promise
    }

    /// Stop the sequence and run cleanup now
    ///
    /// Pending tests are discarded and the report promise is rejected. A test
    /// still in flight may keep running, but its completion is ignored.
    pub fn abort(&self) {
        let discarded = {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.state == SequencerState::Finished {
                return;
            }
            inner.state = SequencerState::Finished;
            std::mem::take(&mut inner.queue)
        };
        tracing::warn!(discarded = discarded.len(), "tour test sequence aborted");
        drop(discarded);

        cleanup(&self.shared);
        self.shared.ctx.reporter().end_test();
        self.shared.finished.reject(ProbeError::InvalidState {
            message: "sequence aborted".to_string(),
        });
    }
}

fn next_test(shared: &Rc<SequencerShared>) {
    let next = {
        let mut inner = shared.inner.borrow_mut();
        if inner.state == SequencerState::Finished {
            return;
        }
        let next = inner.queue.pop_front();
        if let Some(test) = &next {
            inner.state = SequencerState::Running;
            inner.tests_run.push(test.name.clone());
        }
        next
    };
    let Some(test) = next else {
        finish(shared);
        return;
    };

    let ctx = &shared.ctx;
    ctx.reporter().begin_test(&test.name);
    ctx.info(&format!("Starting {}", test.name));

    let runner = Rc::clone(shared);
    ctx.host()
        .wait_for_focus(None, Box::new(move || run_test(&runner, test)));
}

fn run_test(shared: &Rc<SequencerShared>, test: TourTest) {
    if shared.inner.borrow().state == SequencerState::Finished {
        return;
    }
    let TourTest { name, body } = test;
    let ctx = shared.ctx.clone();

    let body_ctx = ctx.clone();
    let runner = Rc::clone(shared);
    let test_name = name.clone();
    let loaded = load_test_page(
        &ctx,
        move || body(body_ctx, Done::new(runner, test_name)),
        None,
    );

    if let Err(err) = loaded {
        ctx.ok(false, &format!("Could not open the test page for {name}: {err}"));
        Done::new(Rc::clone(shared), name).done();
    }
}

fn teardown(shared: &SequencerShared) {
    let ctx = &shared.ctx;
    let host = ctx.host();
    if let Some(tab) = ctx.take_test_tab() {
        host.remove_tab(tab);
    }
    ctx.clear_session();

    let doc = host.chrome_document();
    let ids = &ctx.config().elements;
    let reporter = ctx.reporter();

    is_element_hidden(
        reporter,
        &doc,
        doc.get_element_by_id(&ids.highlight),
        "Highlight should be closed/hidden after UITour tab is closed",
    );
    is_element_hidden(
        reporter,
        &doc,
        doc.get_element_by_id(&ids.tooltip),
        "Tooltip should be closed/hidden after UITour tab is closed",
    );

    let panel = doc.get_element_by_id(&ids.menu_panel);
    ctx.ok(
        !panel.is_some_and(|p| doc.has_attribute(p, "noautohide")),
        "@noautohide on the menu panel should have been cleaned up",
    );
    ctx.ok(
        !panel.is_some_and(|p| doc.has_attribute(p, "panelopen")),
        "The panel shouldn't have @panelopen",
    );
    ctx.isnot(
        &panel.and_then(|p| doc.popup_state(p)),
        &Some(PopupState::Open),
        "The panel shouldn't be open",
    );
    let button = doc.get_element_by_id(&ids.menu_button);
    ctx.is(
        &button.is_some_and(|b| doc.has_attribute(b, "open")),
        &false,
        "Menu button should know that the menu is closed",
    );
    reporter.end_test();
    tracing::debug!("teardown complete");

    let mut inner = shared.inner.borrow_mut();
    if inner.state == SequencerState::Teardown {
        inner.state = SequencerState::Idle;
    }
}

fn finish(shared: &SequencerShared) {
    let tests_run = {
        let mut inner = shared.inner.borrow_mut();
        inner.state = SequencerState::Finished;
        inner.tests_run.clone()
    };
    cleanup(shared);

    let report = SequenceReport {
        tests_run,
        assertions: shared.ctx.reporter().records(),
    };
    tracing::info!(
        tests = report.tests_run.len(),
        failures = report.failures().len(),
        "tour test sequence finished"
    );
    shared.finished.resolve(report);
}

/// Undo global setup; runs at most once
fn cleanup(shared: &SequencerShared) {
    {
        let mut inner = shared.inner.borrow_mut();
        if inner.cleaned_up || !inner.started {
            return;
        }
        inner.cleaned_up = true;
    }

    let ctx = &shared.ctx;
    let lingering = ctx.test_tab();
    ctx.clear_session();

    let host = ctx.host();
    if let Some(tab) = lingering {
        host.remove_tab(tab);
    }
    let config = ctx.config();
    host.clear_user_pref(&config.enable_pref);
    for origin in &config.permission_origins {
        host.remove_permission(origin, &config.permission_type);
    }
    tracing::debug!("tour harness cleanup complete");
}
