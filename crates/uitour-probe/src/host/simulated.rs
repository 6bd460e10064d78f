//! Simulated Browser Host
//!
//! A deterministic stand-in for browser chrome, driven by an [`EventLoop`].
//!
//! - Tabs finish loading `load_delay_ms` after they are added.
//! - Focus is granted on the next scheduling turn.
//! - Popups pass through `Showing`/`Hiding` and fire `popupshown` /
//!   `popuphidden` after `popup_transition_ms`.
//! - The tour API acts only while the enable pref is set and the page origin
//!   holds an `Allow` rule for the configured permission type.
//! - Closing the tab that owns the tour UI hides that UI and strips the menu
//!   panel's open markers.

use super::{BrowserHost, ContentWindow, PermissionAction, TabId, TourApi};
use crate::config::{origin_of, HarnessConfig};
use crate::dom::{ComputedStyle, Document, NodeId, PopupState};
use crate::event_loop::EventLoop;
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

/// Timing knobs for the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedTiming {
    /// Delay between `add_tab` and the load event
    pub load_delay_ms: u64,
    /// Delay between opening/closing a popup and its event
    pub popup_transition_ms: u64,
}

impl Default for SimulatedTiming {
    fn default() -> Self {
        Self {
            load_delay_ms: 20,
            popup_transition_ms: 10,
        }
    }
}

/// Record of a side effect requested from the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostCall {
    /// `add_tab`
    AddTab {
        /// New tab
        tab: TabId,
        /// Requested URL
        url: String,
    },
    /// `select_tab`
    SelectTab(TabId),
    /// `remove_tab`
    RemoveTab(TabId),
    /// `wait_for_focus`
    WaitForFocus(Option<TabId>),
    /// `set_bool_pref`
    SetBoolPref {
        /// Pref name
        name: String,
        /// Value
        value: bool,
    },
    /// `clear_user_pref`
    ClearUserPref(String),
    /// `add_permission`
    AddPermission {
        /// Origin
        origin: String,
        /// Permission type
        kind: String,
        /// Decision
        action: PermissionAction,
    },
    /// `remove_permission`
    RemovePermission {
        /// Origin
        origin: String,
        /// Permission type
        kind: String,
    },
}

/// Chrome nodes created at startup
#[derive(Debug, Clone)]
struct ChromeNodes {
    highlight: NodeId,
    tooltip: NodeId,
    menu_panel: NodeId,
    menu_button: NodeId,
    targets: HashMap<String, NodeId>,
}

struct TabState {
    url: String,
    window: Option<ContentWindow>,
}

#[derive(Default)]
struct BrowserState {
    next_tab: u32,
    tabs: BTreeMap<TabId, TabState>,
    selected: Option<TabId>,
    prefs: HashMap<String, bool>,
    permissions: HashMap<(String, String), PermissionAction>,
    load_listeners: HashMap<TabId, Vec<Box<dyn FnOnce(ContentWindow)>>>,
    pending_shown: HashMap<NodeId, Vec<Box<dyn FnOnce()>>>,
    tour_owner: Option<TabId>,
    calls: Vec<HostCall>,
    add_tab_failure: Option<String>,
}

struct BrowserShared {
    event_loop: EventLoop,
    document: Document,
    nodes: ChromeNodes,
    timing: SimulatedTiming,
    enable_pref: String,
    permission_type: String,
    state: RefCell<BrowserState>,
}

/// Deterministic [`BrowserHost`] implementation
///
/// Cloning yields another handle onto the same browser.
#[derive(Clone)]
pub struct SimulatedBrowser {
    shared: Rc<BrowserShared>,
}

impl std::fmt::Debug for SimulatedBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("SimulatedBrowser")
            .field("tabs", &state.tabs.len())
            .field("selected", &state.selected)
            .field("prefs", &state.prefs)
            .field("calls", &state.calls.len())
            .finish_non_exhaustive()
    }
}

impl SimulatedBrowser {
    /// Create a browser with default timing
    #[must_use]
    pub fn new(event_loop: &EventLoop, config: &HarnessConfig) -> Self {
        Self::with_timing(event_loop, config, SimulatedTiming::default())
    }

    /// Create a browser with explicit timing
    #[must_use]
    pub fn with_timing(
        event_loop: &EventLoop,
        config: &HarnessConfig,
        timing: SimulatedTiming,
    ) -> Self {
        let document = Document::new();
        let nodes = build_chrome(&document, config);
        Self {
            shared: Rc::new(BrowserShared {
                event_loop: event_loop.clone(),
                document,
                nodes,
                timing,
                enable_pref: config.enable_pref.clone(),
                permission_type: config.permission_type.clone(),
                state: RefCell::new(BrowserState::default()),
            }),
        }
    }

    /// Every host call so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.shared.state.borrow().calls.clone()
    }

    /// Host calls matching `filter`
    #[must_use]
    pub fn calls_matching(&self, filter: impl Fn(&HostCall) -> bool) -> Vec<HostCall> {
        self.shared
            .state
            .borrow()
            .calls
            .iter()
            .filter(|call| filter(*call))
            .cloned()
            .collect()
    }

    /// Currently open tabs
    #[must_use]
    pub fn open_tabs(&self) -> Vec<TabId> {
        self.shared.state.borrow().tabs.keys().copied().collect()
    }

    /// Selected tab
    #[must_use]
    pub fn selected_tab(&self) -> Option<TabId> {
        self.shared.state.borrow().selected
    }

    /// URL a tab was opened with
    #[must_use]
    pub fn tab_url(&self, tab: TabId) -> Option<String> {
        self.shared
            .state
            .borrow()
            .tabs
            .get(&tab)
            .map(|t| t.url.clone())
    }

    /// Content window of a loaded tab
    #[must_use]
    pub fn window_for(&self, tab: TabId) -> Option<ContentWindow> {
        self.shared
            .state
            .borrow()
            .tabs
            .get(&tab)
            .and_then(|t| t.window.clone())
    }

    /// Current permission rule
    #[must_use]
    pub fn permission(&self, origin: &str, kind: &str) -> Option<PermissionAction> {
        self.shared
            .state
            .borrow()
            .permissions
            .get(&(origin.to_string(), kind.to_string()))
            .copied()
    }

    /// Number of permission rules held
    #[must_use]
    pub fn permission_count(&self) -> usize {
        self.shared.state.borrow().permissions.len()
    }

    /// Make the next `add_tab` fail with `message`
    pub fn fail_next_add_tab(&self, message: impl Into<String>) {
        self.shared.state.borrow_mut().add_tab_failure = Some(message.into());
    }

    /// Chrome node registered as a tour target
    #[must_use]
    pub fn target_node(&self, target: &str) -> Option<NodeId> {
        self.shared.nodes.targets.get(target).copied()
    }

    fn record(&self, call: HostCall) {
        self.shared.state.borrow_mut().calls.push(call);
    }
}

impl BrowserHost for SimulatedBrowser {
    fn chrome_document(&self) -> Document {
        self.shared.document.clone()
    }

    fn add_tab(&self, url: &str) -> ProbeResult<TabId> {
        let tab = {
            let mut state = self.shared.state.borrow_mut();
            if let Some(message) = state.add_tab_failure.take() {
                return Err(ProbeError::host(message));
            }
            state.next_tab += 1;
            let tab = TabId(state.next_tab);
            state.tabs.insert(
                tab,
                TabState {
                    url: url.to_string(),
                    window: None,
                },
            );
            state.calls.push(HostCall::AddTab {
                tab,
                url: url.to_string(),
            });
            tab
        };
        tracing::debug!(%tab, url, "simulated tab added");

        let shared = Rc::clone(&self.shared);
        self.shared
            .event_loop
            .set_timeout(self.shared.timing.load_delay_ms, move || {
                finish_load(&shared, tab);
            });
        Ok(tab)
    }

    fn select_tab(&self, tab: TabId) {
        let mut state = self.shared.state.borrow_mut();
        if state.tabs.contains_key(&tab) {
            state.selected = Some(tab);
        }
        state.calls.push(HostCall::SelectTab(tab));
    }

    fn remove_tab(&self, tab: TabId) {
        let owned_tour = {
            let mut state = self.shared.state.borrow_mut();
            state.calls.push(HostCall::RemoveTab(tab));
            if state.tabs.remove(&tab).is_none() {
                return;
            }
            state.load_listeners.remove(&tab);
            if state.selected == Some(tab) {
                state.selected = state.tabs.keys().next_back().copied();
            }
            if state.tour_owner == Some(tab) {
                state.tour_owner = None;
                true
            } else {
                false
            }
        };
        tracing::debug!(%tab, owned_tour, "simulated tab removed");

        if owned_tour {
            teardown_tour_ui(&self.shared);
        }
    }

    fn has_tab(&self, tab: TabId) -> bool {
        self.shared.state.borrow().tabs.contains_key(&tab)
    }

    fn on_tab_load(&self, tab: TabId, callback: Box<dyn FnOnce(ContentWindow)>) {
        self.shared
            .state
            .borrow_mut()
            .load_listeners
            .entry(tab)
            .or_default()
            .push(callback);
    }

    fn wait_for_focus(&self, window: Option<&ContentWindow>, callback: Box<dyn FnOnce()>) {
        self.record(HostCall::WaitForFocus(window.map(ContentWindow::tab)));
        self.shared.event_loop.execute_soon(callback);
    }

    fn set_bool_pref(&self, name: &str, value: bool) {
        let mut state = self.shared.state.borrow_mut();
        state.prefs.insert(name.to_string(), value);
        state.calls.push(HostCall::SetBoolPref {
            name: name.to_string(),
            value,
        });
    }

    fn clear_user_pref(&self, name: &str) {
        let mut state = self.shared.state.borrow_mut();
        state.prefs.remove(name);
        state.calls.push(HostCall::ClearUserPref(name.to_string()));
    }

    fn bool_pref(&self, name: &str) -> Option<bool> {
        self.shared.state.borrow().prefs.get(name).copied()
    }

    fn add_permission(&self, origin: &str, kind: &str, action: PermissionAction) {
        let mut state = self.shared.state.borrow_mut();
        state
            .permissions
            .insert((origin.to_string(), kind.to_string()), action);
        state.calls.push(HostCall::AddPermission {
            origin: origin.to_string(),
            kind: kind.to_string(),
            action,
        });
    }

    fn remove_permission(&self, origin: &str, kind: &str) {
        let mut state = self.shared.state.borrow_mut();
        state
            .permissions
            .remove(&(origin.to_string(), kind.to_string()));
        state.calls.push(HostCall::RemovePermission {
            origin: origin.to_string(),
            kind: kind.to_string(),
        });
    }
}

fn build_chrome(doc: &Document, config: &HarnessConfig) -> ChromeNodes {
    let ids = &config.elements;
    let window = doc.create_element(
        "window",
        Some("main-window"),
        None,
        ComputedStyle::visible(),
    );
    let toolbox = doc.create_element(
        "toolbox",
        Some("navigator-toolbox"),
        Some(window),
        ComputedStyle::visible(),
    );
    let urlbar = doc.create_element(
        "textbox",
        Some("urlbar"),
        Some(toolbox),
        ComputedStyle::visible(),
    );
    let search = doc.create_element(
        "searchbar",
        Some("searchbar"),
        Some(toolbox),
        ComputedStyle::visible(),
    );
    let menu_button = doc.create_element(
        "toolbarbutton",
        Some(ids.menu_button.as_str()),
        Some(toolbox),
        ComputedStyle::visible(),
    );
    let highlight = doc.create_element(
        "panel",
        Some(ids.highlight.as_str()),
        Some(window),
        ComputedStyle::popup(),
    );
    let tooltip = doc.create_element(
        "panel",
        Some(ids.tooltip.as_str()),
        Some(window),
        ComputedStyle::popup(),
    );
    let menu_panel = doc.create_element(
        "panel",
        Some(ids.menu_panel.as_str()),
        Some(window),
        ComputedStyle::popup(),
    );

    let targets = HashMap::from([
        ("urlbar".to_string(), urlbar),
        ("search".to_string(), search),
        ("appMenu".to_string(), menu_button),
    ]);

    ChromeNodes {
        highlight,
        tooltip,
        menu_panel,
        menu_button,
        targets,
    }
}

fn finish_load(shared: &Rc<BrowserShared>, tab: TabId) {
    let (window, listeners) = {
        let mut state = shared.state.borrow_mut();
        let Some(tab_state) = state.tabs.get_mut(&tab) else {
            // Closed before it finished loading
            return;
        };
        let url = tab_state.url.clone();
        let api: Rc<dyn TourApi> = Rc::new(SimulatedTourApi {
            browser: Rc::downgrade(shared),
            tab,
            origin: origin_of(&url),
        });
        let window = ContentWindow::new(tab, url, api);
        tab_state.window = Some(window.clone());
        let listeners = state.load_listeners.remove(&tab).unwrap_or_default();
        (window, listeners)
    };
    tracing::debug!(%tab, listeners = listeners.len(), "simulated tab loaded");

    for listener in listeners {
        listener(window.clone());
    }
}

fn open_popup(shared: &Rc<BrowserShared>, node: NodeId, on_shown: Option<Box<dyn FnOnce()>>) {
    let doc = &shared.document;
    let current = doc.popup_state(node);
    if current == Some(PopupState::Open) {
        if let Some(callback) = on_shown {
            callback();
        }
        return;
    }
    if let Some(callback) = on_shown {
        shared
            .state
            .borrow_mut()
            .pending_shown
            .entry(node)
            .or_default()
            .push(callback);
    }
    // Callers during a transition wait for that transition
    if current == Some(PopupState::Showing) {
        return;
    }
    doc.set_popup_state(node, Some(PopupState::Showing));

    let transition = Rc::clone(shared);
    shared
        .event_loop
        .set_timeout(shared.timing.popup_transition_ms, move || {
            let doc = &transition.document;
            let queued = transition
                .state
                .borrow_mut()
                .pending_shown
                .remove(&node)
                .unwrap_or_default();
            if doc.popup_state(node) != Some(PopupState::Showing) {
                return;
            }
            doc.set_popup_state(node, Some(PopupState::Open));
            doc.dispatch_event(node, "popupshown");
            for callback in queued {
                callback();
            }
        });
}

fn close_popup(shared: &Rc<BrowserShared>, node: NodeId) {
    let doc = &shared.document;
    if matches!(
        doc.popup_state(node),
        None | Some(PopupState::Closed | PopupState::Hiding)
    ) {
        return;
    }
    doc.set_popup_state(node, Some(PopupState::Hiding));

    let doc = doc.clone();
    shared
        .event_loop
        .set_timeout(shared.timing.popup_transition_ms, move || {
            if doc.popup_state(node) != Some(PopupState::Hiding) {
                return;
            }
            doc.set_popup_state(node, Some(PopupState::Closed));
            doc.dispatch_event(node, "popuphidden");
        });
}

fn close_menu(shared: &Rc<BrowserShared>) {
    let doc = &shared.document;
    let nodes = &shared.nodes;
    doc.remove_attribute(nodes.menu_panel, "noautohide");
    doc.remove_attribute(nodes.menu_panel, "panelopen");
    doc.remove_attribute(nodes.menu_button, "open");
    close_popup(shared, nodes.menu_panel);
}

fn teardown_tour_ui(shared: &Rc<BrowserShared>) {
    close_popup(shared, shared.nodes.highlight);
    close_popup(shared, shared.nodes.tooltip);
    close_menu(shared);
}

/// Tour API bound to one simulated tab
struct SimulatedTourApi {
    browser: Weak<BrowserShared>,
    tab: TabId,
    origin: String,
}

impl SimulatedTourApi {
    /// The browser, if the call is permitted for this page
    fn permitted(&self, operation: &str) -> Option<Rc<BrowserShared>> {
        let shared = self.browser.upgrade()?;
        let allowed = {
            let state = shared.state.borrow();
            state.tabs.contains_key(&self.tab)
                && state.prefs.get(&shared.enable_pref) == Some(&true)
                && state
                    .permissions
                    .get(&(self.origin.clone(), shared.permission_type.clone()))
                    == Some(&PermissionAction::Allow)
        };
        if !allowed {
            tracing::debug!(tab = %self.tab, origin = %self.origin, operation, "tour call ignored");
            return None;
        }
        shared.state.borrow_mut().tour_owner = Some(self.tab);
        Some(shared)
    }
}

impl TourApi for SimulatedTourApi {
    fn show_highlight(&self, target: &str) {
        let Some(shared) = self.permitted("showHighlight") else {
            return;
        };
        let Some(&node) = shared.nodes.targets.get(target) else {
            return;
        };
        shared
            .document
            .set_anchor_node(shared.nodes.highlight, Some(node));
        open_popup(&shared, shared.nodes.highlight, None);
    }

    fn hide_highlight(&self) {
        if let Some(shared) = self.permitted("hideHighlight") {
            close_popup(&shared, shared.nodes.highlight);
        }
    }

    fn show_info(&self, target: &str, title: &str, text: &str) {
        let Some(shared) = self.permitted("showInfo") else {
            return;
        };
        let Some(&node) = shared.nodes.targets.get(target) else {
            return;
        };
        let doc = &shared.document;
        let tooltip = shared.nodes.tooltip;
        doc.set_anchor_node(tooltip, Some(node));
        doc.set_attribute(tooltip, "title", title);
        doc.set_attribute(tooltip, "text", text);
        open_popup(&shared, tooltip, None);
    }

    fn hide_info(&self) {
        if let Some(shared) = self.permitted("hideInfo") {
            close_popup(&shared, shared.nodes.tooltip);
        }
    }

    fn show_menu(&self, name: &str, callback: Box<dyn FnOnce()>) {
        let Some(shared) = self.permitted("showMenu") else {
            return;
        };
        if name != "appMenu" {
            return;
        }
        let doc = &shared.document;
        let nodes = &shared.nodes;
        doc.set_attribute(nodes.menu_panel, "noautohide", "true");
        doc.set_attribute(nodes.menu_panel, "panelopen", "true");
        doc.set_attribute(nodes.menu_button, "open", "true");
        doc.set_anchor_node(nodes.menu_panel, Some(nodes.menu_button));
        open_popup(&shared, nodes.menu_panel, Some(callback));
    }

    fn hide_menu(&self, name: &str) {
        let Some(shared) = self.permitted("hideMenu") else {
            return;
        };
        if name == "appMenu" {
            close_menu(&shared);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::visibility::{element_is_hidden, element_is_visible};
    use std::cell::Cell;

    fn browser() -> (EventLoop, HarnessConfig, SimulatedBrowser) {
        let event_loop = EventLoop::new();
        let config = HarnessConfig::default();
        let browser = SimulatedBrowser::new(&event_loop, &config);
        (event_loop, config, browser)
    }

    fn grant(browser: &SimulatedBrowser, config: &HarnessConfig) {
        browser.set_bool_pref(&config.enable_pref, true);
        for origin in &config.permission_origins {
            browser.add_permission(origin, &config.permission_type, PermissionAction::Allow);
        }
    }

    fn loaded_window(
        event_loop: &EventLoop,
        browser: &SimulatedBrowser,
        url: &str,
    ) -> ContentWindow {
        let tab = browser.add_tab(url).unwrap();
        event_loop.run_until_idle();
        browser.window_for(tab).unwrap()
    }

    mod tab_tests {
        use super::*;

        #[test]
        fn test_load_fires_after_delay() {
            let (event_loop, _, browser) = browser();
            let tab = browser.add_tab("https://example.com/uitour.html").unwrap();
            let loaded = Rc::new(Cell::new(false));
            let loaded_clone = Rc::clone(&loaded);
            browser.on_tab_load(
                tab,
                Box::new(move |window| {
                    assert_eq!(window.url(), "https://example.com/uitour.html");
                    loaded_clone.set(true);
                }),
            );

            event_loop.advance(19);
            assert!(!loaded.get());
            event_loop.advance(1);
            assert!(loaded.get());
        }

        #[test]
        fn test_tab_closed_before_load_never_loads() {
            let (event_loop, _, browser) = browser();
            let tab = browser.add_tab("https://example.com/").unwrap();
            let loaded = Rc::new(Cell::new(false));
            let loaded_clone = Rc::clone(&loaded);
            browser.on_tab_load(tab, Box::new(move |_| loaded_clone.set(true)));

            browser.remove_tab(tab);
            event_loop.run_until_idle();
            assert!(!loaded.get());
            assert!(!browser.has_tab(tab));
        }

        #[test]
        fn test_select_and_remove_updates_selection() {
            let (_, _, browser) = browser();
            let first = browser.add_tab("https://example.com/a").unwrap();
            let second = browser.add_tab("https://example.com/b").unwrap();
            browser.select_tab(second);
            assert_eq!(browser.selected_tab(), Some(second));

            browser.remove_tab(second);
            assert_eq!(browser.selected_tab(), Some(first));
            assert_eq!(browser.open_tabs(), vec![first]);
        }

        #[test]
        fn test_injected_add_tab_failure() {
            let (_, _, browser) = browser();
            browser.fail_next_add_tab("tab strip full");
            let err = browser.add_tab("https://example.com/").unwrap_err();
            assert_eq!(err, ProbeError::host("tab strip full"));
            assert!(browser.add_tab("https://example.com/").is_ok());
        }

        #[test]
        fn test_prefs_and_permissions_are_logged() {
            let (_, config, browser) = browser();
            grant(&browser, &config);
            assert_eq!(browser.bool_pref("browser.uitour.enabled"), Some(true));
            assert_eq!(browser.permission_count(), 2);

            browser.clear_user_pref("browser.uitour.enabled");
            browser.remove_permission("https://example.com", "uitour");
            assert_eq!(browser.bool_pref("browser.uitour.enabled"), None);
            assert_eq!(browser.permission("https://example.com", "uitour"), None);
            assert_eq!(
                browser.permission("http://example.com", "uitour"),
                Some(PermissionAction::Allow)
            );
            assert_eq!(
                browser
                    .calls_matching(|c| matches!(c, HostCall::AddPermission { .. }))
                    .len(),
                2
            );
        }
    }

    mod tour_api_tests {
        use super::*;

        #[test]
        fn test_show_info_requires_pref_and_permission() {
            let (event_loop, config, browser) = browser();
            let window = loaded_window(&event_loop, &browser, "https://example.com/uitour.html");
            let doc = browser.chrome_document();
            let tooltip = doc.get_element_by_id(&config.elements.tooltip).unwrap();

            window.tour_api().show_info("urlbar", "title", "text");
            event_loop.run_until_idle();
            assert!(element_is_hidden(&doc, tooltip));

            grant(&browser, &config);
            window.tour_api().show_info("urlbar", "title", "text");
            assert_eq!(doc.popup_state(tooltip), Some(PopupState::Showing));
            event_loop.run_until_idle();
            assert!(element_is_visible(&doc, tooltip));
            assert_eq!(doc.anchor_node(tooltip), browser.target_node("urlbar"));
        }

        #[test]
        fn test_untrusted_origin_is_ignored() {
            let (event_loop, config, browser) = browser();
            grant(&browser, &config);
            let window =
                loaded_window(&event_loop, &browser, "https://evil.example.org/uitour.html");
            let doc = browser.chrome_document();
            let highlight = doc.get_element_by_id(&config.elements.highlight).unwrap();

            window.tour_api().show_highlight("urlbar");
            event_loop.run_until_idle();
            assert!(element_is_hidden(&doc, highlight));
        }

        #[test]
        fn test_show_menu_marks_panel_and_runs_callback() {
            let (event_loop, config, browser) = browser();
            grant(&browser, &config);
            let window = loaded_window(&event_loop, &browser, "https://example.com/uitour.html");
            let doc = browser.chrome_document();
            let panel = doc.get_element_by_id(&config.elements.menu_panel).unwrap();
            let button = doc.get_element_by_id(&config.elements.menu_button).unwrap();

            let shown = Rc::new(Cell::new(false));
            let shown_clone = Rc::clone(&shown);
            window
                .tour_api()
                .show_menu("appMenu", Box::new(move || shown_clone.set(true)));
            event_loop.run_until_idle();

            assert!(shown.get());
            assert_eq!(doc.popup_state(panel), Some(PopupState::Open));
            assert!(doc.has_attribute(panel, "noautohide"));
            assert!(doc.has_attribute(button, "open"));

            window.tour_api().hide_menu("appMenu");
            assert!(!doc.has_attribute(panel, "panelopen"));
            event_loop.run_until_idle();
            assert_eq!(doc.popup_state(panel), Some(PopupState::Closed));
        }

        #[test]
        fn test_show_menu_during_transition_runs_both_callbacks() {
            let (event_loop, config, browser) = browser();
            grant(&browser, &config);
            let window = loaded_window(&event_loop, &browser, "https://example.com/uitour.html");
            let doc = browser.chrome_document();
            let panel = doc.get_element_by_id(&config.elements.menu_panel).unwrap();

            let shown = Rc::new(Cell::new(0u32));
            let first = Rc::clone(&shown);
            let second = Rc::clone(&shown);
            let api = window.tour_api();
            api.show_menu("appMenu", Box::new(move || first.set(first.get() + 1)));
            assert_eq!(doc.popup_state(panel), Some(PopupState::Showing));
            api.show_menu("appMenu", Box::new(move || second.set(second.get() + 1)));
            assert_eq!(shown.get(), 0);

            event_loop.run_until_idle();
            assert_eq!(shown.get(), 2);
            assert_eq!(doc.popup_state(panel), Some(PopupState::Open));
        }

        #[test]
        fn test_show_menu_callback_dropped_when_closed_mid_transition() {
            let (event_loop, config, browser) = browser();
            grant(&browser, &config);
            let window = loaded_window(&event_loop, &browser, "https://example.com/uitour.html");
            let doc = browser.chrome_document();
            let panel = doc.get_element_by_id(&config.elements.menu_panel).unwrap();

            let shown = Rc::new(Cell::new(false));
            let shown_clone = Rc::clone(&shown);
            let api = window.tour_api();
            api.show_menu("appMenu", Box::new(move || shown_clone.set(true)));
            api.hide_menu("appMenu");
            event_loop.run_until_idle();

            assert!(!shown.get());
            assert_eq!(doc.popup_state(panel), Some(PopupState::Closed));
        }

        #[test]
        fn test_closing_owner_tab_tears_down_ui() {
            let (event_loop, config, browser) = browser();
            grant(&browser, &config);
            let window = loaded_window(&event_loop, &browser, "https://example.com/uitour.html");
            let doc = browser.chrome_document();
            let tooltip = doc.get_element_by_id(&config.elements.tooltip).unwrap();
            let panel = doc.get_element_by_id(&config.elements.menu_panel).unwrap();

            let api = window.tour_api();
            api.show_info("search", "t", "x");
            api.show_menu("appMenu", Box::new(|| {}));
            event_loop.run_until_idle();
            assert!(element_is_visible(&doc, tooltip));

            browser.remove_tab(window.tab());
            // Hiding is already "hidden" before the transition completes
            assert!(element_is_hidden(&doc, tooltip));
            assert!(!doc.has_attribute(panel, "noautohide"));
            assert_ne!(doc.popup_state(panel), Some(PopupState::Open));

            event_loop.run_until_idle();
            assert_eq!(doc.popup_state(tooltip), Some(PopupState::Closed));

            // The closed tab's API no longer acts
            api.show_info("search", "t", "x");
            event_loop.run_until_idle();
            assert!(element_is_hidden(&doc, tooltip));
        }
    }
}
