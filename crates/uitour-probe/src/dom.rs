//! Element model for host UI inspection.
//!
//! [`ElementTree`] is the minimal interface the visibility predicates need:
//! computed style, popup state and a non-owning parent relation. [`Document`]
//! is an in-memory implementation with attributes and event listeners, used
//! by the simulated browser and by tests.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::str::FromStr;

use crate::result::ProbeError;

// =============================================================================
// STYLE
// =============================================================================

/// Computed `display` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Display {
    /// `display: none`
    None,
    /// `display: block`
    #[default]
    Block,
    /// `display: inline`
    Inline,
    /// `display: flex`
    Flex,
    /// Popup-type display (`-moz-popup`)
    Popup,
}

impl FromStr for Display {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Self::None),
            "block" => Ok(Self::Block),
            "inline" => Ok(Self::Inline),
            "flex" | "-moz-box" => Ok(Self::Flex),
            "-moz-popup" | "popup" => Ok(Self::Popup),
            other => Err(ProbeError::InvalidState {
                message: format!("unknown display value '{other}'"),
            }),
        }
    }
}

/// Computed `visibility` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    /// `visibility: visible`
    #[default]
    Visible,
    /// `visibility: hidden`
    Hidden,
    /// `visibility: collapse`
    Collapse,
}

impl FromStr for Visibility {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "visible" => Ok(Self::Visible),
            "hidden" => Ok(Self::Hidden),
            "collapse" => Ok(Self::Collapse),
            other => Err(ProbeError::InvalidState {
                message: format!("unknown visibility value '{other}'"),
            }),
        }
    }
}

/// The two computed style properties the predicates consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComputedStyle {
    /// Display value
    pub display: Display,
    /// Visibility value
    pub visibility: Visibility,
}

impl ComputedStyle {
    /// Create a style
    #[must_use]
    pub const fn new(display: Display, visibility: Visibility) -> Self {
        Self {
            display,
            visibility,
        }
    }

    /// Block, visible
    #[must_use]
    pub const fn visible() -> Self {
        Self::new(Display::Block, Visibility::Visible)
    }

    /// Popup display, visible
    #[must_use]
    pub const fn popup() -> Self {
        Self::new(Display::Popup, Visibility::Visible)
    }
}

/// Popup lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PopupState {
    /// Not shown
    Closed,
    /// Opening, `popupshown` not yet fired
    Showing,
    /// Fully open
    Open,
    /// Closing, `popuphidden` not yet fired
    Hiding,
}

impl PopupState {
    /// Attribute-style name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Showing => "showing",
            Self::Open => "open",
            Self::Hiding => "hiding",
        }
    }
}

impl std::fmt::Display for PopupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// TREE INTERFACE
// =============================================================================

/// Read-only view of a UI tree
pub trait ElementTree {
    /// Node handle
    type Node: Copy;

    /// Computed style of `node`
    fn computed_style(&self, node: Self::Node) -> ComputedStyle;

    /// Popup state, `None` for elements that have none
    fn popup_state(&self, node: Self::Node) -> Option<PopupState>;

    /// Parent element, or `None` when the parent is the document root
    fn parent_element(&self, node: Self::Node) -> Option<Self::Node>;
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// Handle to an element in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Handle to a registered event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Element stored in a [`Document`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Element identifier, if any
    pub id: Option<String>,
    /// Tag name
    pub tag: String,
    /// Parent element; `None` for children of the document root
    pub parent: Option<NodeId>,
    /// Computed style
    pub style: ComputedStyle,
    /// Popup state for popup-type elements
    pub popup_state: Option<PopupState>,
    /// Node the popup is anchored to
    pub anchor: Option<NodeId>,
    /// Attributes
    pub attributes: BTreeMap<String, String>,
}

type Listener = Box<dyn FnMut(&str)>;

struct ListenerEntry {
    node: NodeId,
    event: String,
    /// `None` while the listener is executing
    callback: Option<Listener>,
}

#[derive(Default)]
struct DocumentInner {
    elements: Vec<ElementData>,
    by_id: HashMap<String, NodeId>,
    listeners: BTreeMap<u64, ListenerEntry>,
    next_listener: u64,
}

impl ElementTree for DocumentInner {
    type Node = NodeId;

    fn computed_style(&self, node: NodeId) -> ComputedStyle {
        self.elements[node.0].style
    }

    fn popup_state(&self, node: NodeId) -> Option<PopupState> {
        self.elements[node.0].popup_state
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.elements[node.0].parent
    }
}

/// In-memory element tree
///
/// Cloning yields another handle onto the same document. Node ids are only
/// meaningful for the document that created them.
#[derive(Clone, Default)]
pub struct Document {
    inner: Rc<RefCell<DocumentInner>>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Document")
            .field("elements", &inner.elements.len())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl Document {
    /// Create an empty document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element under `parent` (`None` appends to the document root)
    pub fn create_element(
        &self,
        tag: impl Into<String>,
        id: Option<&str>,
        parent: Option<NodeId>,
        style: ComputedStyle,
    ) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        let node = NodeId(inner.elements.len());
        let popup_state = (style.display == Display::Popup).then_some(PopupState::Closed);
        inner.elements.push(ElementData {
            id: id.map(str::to_string),
            tag: tag.into(),
            parent,
            style,
            popup_state,
            anchor: None,
            attributes: BTreeMap::new(),
        });
        if let Some(id) = id {
            inner.by_id.insert(id.to_string(), node);
        }
        node
    }

    /// Look up an element by identifier
    #[must_use]
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.inner.borrow().by_id.get(id).copied()
    }

    /// Snapshot of an element's data
    #[must_use]
    pub fn element(&self, node: NodeId) -> ElementData {
        self.inner.borrow().elements[node.0].clone()
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().elements.len()
    }

    /// Whether the document has no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the computed style
    pub fn set_style(&self, node: NodeId, style: ComputedStyle) {
        self.inner.borrow_mut().elements[node.0].style = style;
    }

    /// Current computed style
    #[must_use]
    pub fn style(&self, node: NodeId) -> ComputedStyle {
        self.inner.borrow().elements[node.0].style
    }

    /// Set or clear the popup state
    pub fn set_popup_state(&self, node: NodeId, state: Option<PopupState>) {
        self.inner.borrow_mut().elements[node.0].popup_state = state;
    }

    /// Current popup state
    #[must_use]
    pub fn popup_state(&self, node: NodeId) -> Option<PopupState> {
        self.inner.borrow().elements[node.0].popup_state
    }

    /// Node a popup is anchored to
    #[must_use]
    pub fn anchor_node(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().elements[node.0].anchor
    }

    /// Anchor a popup to another node
    pub fn set_anchor_node(&self, node: NodeId, anchor: Option<NodeId>) {
        self.inner.borrow_mut().elements[node.0].anchor = anchor;
    }

    /// Parent element of `node`
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().elements[node.0].parent
    }

    /// Whether `node` carries attribute `name`
    #[must_use]
    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.inner.borrow().elements[node.0]
            .attributes
            .contains_key(name)
    }

    /// Attribute value
    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner.borrow().elements[node.0]
            .attributes
            .get(name)
            .cloned()
    }

    /// Set an attribute
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        self.inner.borrow_mut().elements[node.0]
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    /// Remove an attribute, returning whether it was present
    pub fn remove_attribute(&self, node: NodeId, name: &str) -> bool {
        self.inner.borrow_mut().elements[node.0]
            .attributes
            .remove(name)
            .is_some()
    }

    /// Run `f` against the tree view of this document
    ///
    /// The document is borrowed for the duration of `f`; `f` must not mutate it.
    pub fn with_tree<R>(&self, f: impl FnOnce(&dyn ElementTree<Node = NodeId>) -> R) -> R {
        let inner = self.inner.borrow();
        f(&*inner)
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Register `listener` for `event` on `node`
    pub fn add_event_listener<F>(&self, node: NodeId, event: &str, listener: F) -> ListenerId
    where
        F: FnMut(&str) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.insert(
            id,
            ListenerEntry {
                node,
                event: event.to_string(),
                callback: Some(Box::new(listener)),
            },
        );
        ListenerId(id)
    }

    /// Deregister a listener; safe to call from inside the listener itself
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().listeners.remove(&id.0).is_some()
    }

    /// Number of listeners registered for `event` on `node`
    #[must_use]
    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .values()
            .filter(|entry| entry.node == node && entry.event == event)
            .count()
    }

    /// Fire `event` at `node`
    ///
    /// Listeners registered during dispatch are not invoked for this event.
    /// Returns the number of listeners invoked.
    pub fn dispatch_event(&self, node: NodeId, event: &str) -> usize {
        let targets: Vec<u64> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .filter(|(_, entry)| entry.node == node && entry.event == event)
            .map(|(id, _)| *id)
            .collect();

        let mut invoked = 0;
        for id in targets {
            // Take the callback out so it runs with no borrow held
            let callback = self
                .inner
                .borrow_mut()
                .listeners
                .get_mut(&id)
                .and_then(|entry| entry.callback.take());
            let Some(mut callback) = callback else {
                continue;
            };
            callback(event);
            invoked += 1;

            // Put it back unless it was removed while running
            if let Some(entry) = self.inner.borrow_mut().listeners.get_mut(&id) {
                entry.callback = Some(callback);
            }
        }
        invoked
    }
}
