//! Assertion reporting
//!
//! Assertions are recorded, never thrown. A failing assertion inside a tour
//! test does not unwind the sequencer; it is logged and collected so the
//! sequence can proceed to teardown.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

/// A single reported assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionRecord {
    /// Test that was running, if any
    pub test: Option<String>,
    /// Whether the assertion held
    pub passed: bool,
    /// Assertion message
    pub message: String,
}

#[derive(Debug, Default)]
struct ReporterInner {
    current_test: Option<String>,
    records: Vec<AssertionRecord>,
}

/// Shared assertion collector
///
/// Cloning yields another handle onto the same record list.
#[derive(Debug, Clone, Default)]
pub struct TestReporter {
    inner: Rc<RefCell<ReporterInner>>,
}

impl TestReporter {
    /// Create an empty reporter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute subsequent assertions to `name`
    pub fn begin_test(&self, name: &str) {
        self.inner.borrow_mut().current_test = Some(name.to_string());
    }

    /// Stop attributing assertions to a test
    pub fn end_test(&self) {
        self.inner.borrow_mut().current_test = None;
    }

    /// Name of the test currently being attributed
    #[must_use]
    pub fn current_test(&self) -> Option<String> {
        self.inner.borrow().current_test.clone()
    }

    /// Report `condition`
    pub fn ok(&self, condition: bool, message: &str) {
        let mut inner = self.inner.borrow_mut();
        let test = inner.current_test.clone();
        if condition {
            tracing::debug!(test = test.as_deref(), "PASS {message}");
        } else {
            tracing::warn!(test = test.as_deref(), "FAIL {message}");
        }
        inner.records.push(AssertionRecord {
            test,
            passed: condition,
            message: message.to_string(),
        });
    }

    /// Report that `actual == expected`
    pub fn is<T: PartialEq + Debug>(&self, actual: &T, expected: &T, message: &str) {
        if actual == expected {
            self.ok(true, message);
        } else {
            self.ok(
                false,
                &format!("{message} - got {actual:?}, expected {expected:?}"),
            );
        }
    }

    /// Report that `actual != unexpected`
    pub fn isnot<T: PartialEq + Debug>(&self, actual: &T, unexpected: &T, message: &str) {
        if actual == unexpected {
            self.ok(
                false,
                &format!("{message} - didn't expect {unexpected:?}, but got it"),
            );
        } else {
            self.ok(true, message);
        }
    }

    /// Informational log line; not an assertion
    pub fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    /// Snapshot of every record
    #[must_use]
    pub fn records(&self) -> Vec<AssertionRecord> {
        self.inner.borrow().records.clone()
    }

    /// Failed records only
    #[must_use]
    pub fn failures(&self) -> Vec<AssertionRecord> {
        self.inner
            .borrow()
            .records
            .iter()
            .filter(|r| !r.passed)
            .cloned()
            .collect()
    }

    /// Count passed assertions
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.inner.borrow().records.iter().filter(|r| r.passed).count()
    }

    /// Count failed assertions
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.inner.borrow().records.iter().filter(|r| !r.passed).count()
    }

    /// Whether no assertion has failed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }
}
