//! Host Browser Collaborator
//!
//! The harness never talks to browser chrome directly. Tab management, prefs,
//! permissions and focus are reached through [`BrowserHost`], and the test
//! page's tour API through [`TourApi`]. [`SimulatedBrowser`] implements both
//! deterministically on an [`EventLoop`](crate::EventLoop).
//!
//! All methods take `&self`; implementations use interior mutability so a
//! host callback may call back into the host.

pub mod simulated;

pub use simulated::{HostCall, SimulatedBrowser, SimulatedTiming};

use crate::dom::Document;
use crate::result::ProbeResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Handle to a browser tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/// Permission decision for an origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionAction {
    /// Allow the capability
    Allow,
    /// Deny the capability
    Deny,
}

/// Browser chrome operations the harness depends on
pub trait BrowserHost {
    /// The chrome document holding tour UI elements
    fn chrome_document(&self) -> Document;

    /// Open a background tab at `url`
    fn add_tab(&self, url: &str) -> ProbeResult<TabId>;

    /// Make `tab` the selected tab
    fn select_tab(&self, tab: TabId);

    /// Close `tab`
    fn remove_tab(&self, tab: TabId);

    /// Whether `tab` is still open
    fn has_tab(&self, tab: TabId) -> bool;

    /// Invoke `callback` once, when `tab` finishes loading
    fn on_tab_load(&self, tab: TabId, callback: Box<dyn FnOnce(ContentWindow)>);

    /// Invoke `callback` once `window` (or the chrome window, for `None`) has focus
    fn wait_for_focus(&self, window: Option<&ContentWindow>, callback: Box<dyn FnOnce()>);

    /// Set a boolean pref
    fn set_bool_pref(&self, name: &str, value: bool);

    /// Reset a pref to its default
    fn clear_user_pref(&self, name: &str);

    /// Current value of a boolean user pref
    fn bool_pref(&self, name: &str) -> Option<bool>;

    /// Add a permission rule for `origin`
    fn add_permission(&self, origin: &str, kind: &str, action: PermissionAction);

    /// Remove the permission rule for `origin`
    fn remove_permission(&self, origin: &str, kind: &str);
}

/// Tour API exposed to the test page
pub trait TourApi {
    /// Highlight a chrome target
    fn show_highlight(&self, target: &str);

    /// Remove the highlight
    fn hide_highlight(&self);

    /// Show the info tooltip anchored at `target`
    fn show_info(&self, target: &str, title: &str, text: &str);

    /// Hide the info tooltip
    fn hide_info(&self);

    /// Open a chrome menu; `callback` runs once it is shown
    fn show_menu(&self, name: &str, callback: Box<dyn FnOnce()>);

    /// Close a chrome menu
    fn hide_menu(&self, name: &str);
}

struct ContentWindowInner {
    tab: TabId,
    url: String,
    api: Rc<dyn TourApi>,
    callback_result: RefCell<Option<Value>>,
}

/// Content window of a loaded test page
///
/// Cloning yields another handle onto the same window.
#[derive(Clone)]
pub struct ContentWindow {
    inner: Rc<ContentWindowInner>,
}

impl std::fmt::Debug for ContentWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentWindow")
            .field("tab", &self.inner.tab)
            .field("url", &self.inner.url)
            .field("callback_result", &self.inner.callback_result.borrow())
            .finish_non_exhaustive()
    }
}

impl ContentWindow {
    /// Create a window for `tab`
    #[must_use]
    pub fn new(tab: TabId, url: impl Into<String>, api: Rc<dyn TourApi>) -> Self {
        Self {
            inner: Rc::new(ContentWindowInner {
                tab,
                url: url.into(),
                api,
                callback_result: RefCell::new(None),
            }),
        }
    }

    /// Tab hosting this window
    #[must_use]
    pub fn tab(&self) -> TabId {
        self.inner.tab
    }

    /// Loaded URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// The page's tour API object
    #[must_use]
    pub fn tour_api(&self) -> Rc<dyn TourApi> {
        Rc::clone(&self.inner.api)
    }

    /// Value the page stored from its last API callback
    #[must_use]
    pub fn callback_result(&self) -> Option<Value> {
        self.inner.callback_result.borrow().clone()
    }

    /// Store a callback result, as the page's script would
    pub fn set_callback_result(&self, value: Value) {
        *self.inner.callback_result.borrow_mut() = Some(value);
    }

    /// Forget the stored callback result
    pub fn clear_callback_result(&self) {
        *self.inner.callback_result.borrow_mut() = None;
    }

    /// Whether the stored callback result is truthy
    #[must_use]
    pub fn has_callback_result(&self) -> bool {
        self.inner
            .callback_result
            .borrow()
            .as_ref()
            .is_some_and(is_truthy)
    }

    /// Whether two handles refer to the same window
    #[must_use]
    pub fn same_window(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Script-style truthiness of a JSON value
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
