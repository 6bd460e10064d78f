//! Content bridge and per-test context.
//!
//! [`TourSession`] holds the references connecting the harness to the
//! currently loaded test page. [`TestContext`] bundles it with the loop, host,
//! config and reporter and is handed to every test body, so nothing lives in
//! ambient globals.

use crate::config::HarnessConfig;
use crate::dom::{Document, NodeId};
use crate::event_loop::EventLoop;
use crate::host::{BrowserHost, ContentWindow, TabId, TourApi};
use crate::reporter::TestReporter;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

/// References to the currently loaded test page
#[derive(Clone, Default)]
pub struct TourSession {
    /// Tab hosting the test page
    pub test_tab: Option<TabId>,
    /// The page's content window
    pub content_window: Option<ContentWindow>,
    /// The page's tour API object
    pub content_api: Option<Rc<dyn TourApi>>,
}

impl std::fmt::Debug for TourSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TourSession")
            .field("test_tab", &self.test_tab)
            .field("content_window", &self.content_window)
            .field("content_api", &self.content_api.is_some())
            .finish()
    }
}

impl TourSession {
    /// Drop every reference
    pub fn clear(&mut self) {
        self.test_tab = None;
        self.content_window = None;
        self.content_api = None;
    }

    /// Whether no reference is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.test_tab.is_none() && self.content_window.is_none() && self.content_api.is_none()
    }
}

struct ContextInner {
    event_loop: EventLoop,
    host: Rc<dyn BrowserHost>,
    config: HarnessConfig,
    reporter: TestReporter,
    session: RefCell<TourSession>,
}

/// Everything a tour test needs
///
/// Cloning yields another handle onto the same context.
#[derive(Clone)]
pub struct TestContext {
    inner: Rc<ContextInner>,
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("event_loop", &self.inner.event_loop)
            .field("session", &self.inner.session.borrow())
            .field("reporter", &self.inner.reporter)
            .finish_non_exhaustive()
    }
}

impl TestContext {
    /// Create a context with an empty session
    #[must_use]
    pub fn new(
        event_loop: EventLoop,
        host: Rc<dyn BrowserHost>,
        config: HarnessConfig,
        reporter: TestReporter,
    ) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                event_loop,
                host,
                config,
                reporter,
                session: RefCell::new(TourSession::default()),
            }),
        }
    }

    /// The shared event loop
    #[must_use]
    pub fn event_loop(&self) -> &EventLoop {
        &self.inner.event_loop
    }

    /// The host collaborator
    #[must_use]
    pub fn host(&self) -> Rc<dyn BrowserHost> {
        Rc::clone(&self.inner.host)
    }

    /// Harness configuration
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.inner.config
    }

    /// Assertion reporter
    #[must_use]
    pub fn reporter(&self) -> &TestReporter {
        &self.inner.reporter
    }

    /// Snapshot of the content bridge
    #[must_use]
    pub fn session(&self) -> TourSession {
        self.inner.session.borrow().clone()
    }

    /// Tab hosting the current test page
    #[must_use]
    pub fn test_tab(&self) -> Option<TabId> {
        self.inner.session.borrow().test_tab
    }

    /// Content window of the current test page
    #[must_use]
    pub fn content_window(&self) -> Option<ContentWindow> {
        self.inner.session.borrow().content_window.clone()
    }

    /// Tour API of the current test page
    #[must_use]
    pub fn content_api(&self) -> Option<Rc<dyn TourApi>> {
        self.inner.session.borrow().content_api.clone()
    }

    /// The host's chrome document
    #[must_use]
    pub fn chrome_document(&self) -> Document {
        self.inner.host.chrome_document()
    }

    /// Look up a chrome element by id
    #[must_use]
    pub fn element(&self, id: &str) -> Option<NodeId> {
        self.chrome_document().get_element_by_id(id)
    }

    pub(crate) fn set_test_tab(&self, tab: Option<TabId>) {
        self.inner.session.borrow_mut().test_tab = tab;
    }

    pub(crate) fn take_test_tab(&self) -> Option<TabId> {
        self.inner.session.borrow_mut().test_tab.take()
    }

    pub(crate) fn attach_content(&self, window: ContentWindow) {
        let mut session = self.inner.session.borrow_mut();
        session.content_api = Some(window.tour_api());
        session.content_window = Some(window);
    }

    pub(crate) fn clear_session(&self) {
        self.inner.session.borrow_mut().clear();
    }

    // -------------------------------------------------------------------------
    // Assertion shortcuts
    // -------------------------------------------------------------------------

    /// Report `condition`
    pub fn ok(&self, condition: bool, message: &str) {
        self.inner.reporter.ok(condition, message);
    }

    /// Report `actual == expected`
    pub fn is<T: PartialEq + Debug>(&self, actual: &T, expected: &T, message: &str) {
        self.inner.reporter.is(actual, expected, message);
    }

    /// Report `actual != unexpected`
    pub fn isnot<T: PartialEq + Debug>(&self, actual: &T, unexpected: &T, message: &str) {
        self.inner.reporter.isnot(actual, unexpected, message);
    }

    /// Informational log line
    pub fn info(&self, message: &str) {
        self.inner.reporter.info(message);
    }
}
