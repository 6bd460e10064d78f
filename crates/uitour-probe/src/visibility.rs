//! Visibility predicates over an [`ElementTree`].
//!
//! `is_visible` and `is_hidden` are deliberately not complements. A popup that
//! is `Showing` (or has no state) is neither visible nor hidden, and
//! `is_hidden` stops at the first popup it meets without consulting its
//! ancestors.

use crate::dom::{Display, Document, ElementTree, NodeId, PopupState, Visibility};
use crate::reporter::TestReporter;

/// Whether `node` and every ancestor up to the document root are shown
pub fn is_visible<T>(tree: &T, node: T::Node) -> bool
where
    T: ElementTree + ?Sized,
{
    let style = tree.computed_style(node);
    if style.display == Display::None {
        return false;
    }
    if style.visibility != Visibility::Visible {
        return false;
    }
    if style.display == Display::Popup && tree.popup_state(node) != Some(PopupState::Open) {
        return false;
    }

    // Hiding a parent element hides all its children
    match tree.parent_element(node) {
        Some(parent) => is_visible(tree, parent),
        None => true,
    }
}

/// Whether `node` is hidden, either itself or through an ancestor
pub fn is_hidden<T>(tree: &T, node: T::Node) -> bool
where
    T: ElementTree + ?Sized,
{
    let style = tree.computed_style(node);
    if style.display == Display::None {
        return true;
    }
    if style.visibility != Visibility::Visible {
        return true;
    }
    if style.display == Display::Popup {
        return matches!(
            tree.popup_state(node),
            Some(PopupState::Hiding | PopupState::Closed)
        );
    }

    match tree.parent_element(node) {
        Some(parent) => is_hidden(tree, parent),
        None => false,
    }
}

/// [`is_visible`] against a [`Document`]
#[must_use]
pub fn element_is_visible(doc: &Document, node: NodeId) -> bool {
    doc.with_tree(|tree| is_visible(tree, node))
}

/// [`is_hidden`] against a [`Document`]
#[must_use]
pub fn element_is_hidden(doc: &Document, node: NodeId) -> bool {
    doc.with_tree(|tree| is_hidden(tree, node))
}

/// Report that `node` exists and is visible
pub fn is_element_visible(
    reporter: &TestReporter,
    doc: &Document,
    node: Option<NodeId>,
    msg: &str,
) {
    reporter.isnot(
        &node,
        &None,
        "Element should not be null, when checking visibility",
    );
    reporter.ok(node.is_some_and(|n| element_is_visible(doc, n)), msg);
}

/// Report that `node` exists and is hidden
pub fn is_element_hidden(
    reporter: &TestReporter,
    doc: &Document,
    node: Option<NodeId>,
    msg: &str,
) {
    reporter.isnot(
        &node,
        &None,
        "Element should not be null, when checking visibility",
    );
    reporter.ok(node.is_some_and(|n| element_is_hidden(doc, n)), msg);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dom::ComputedStyle;
    use proptest::prelude::*;

    /// Root -> container -> leaf chain
    fn chain(container: ComputedStyle, leaf: ComputedStyle) -> (Document, NodeId, NodeId) {
        let doc = Document::new();
        let root = doc.create_element("window", None, None, ComputedStyle::visible());
        let mid = doc.create_element("box", None, Some(root), container);
        let leaf_node = doc.create_element("item", None, Some(mid), leaf);
        (doc, mid, leaf_node)
    }

    mod predicate_tests {
        use super::*;

        #[test]
        fn test_plain_visible_chain() {
            let (doc, _, leaf) = chain(ComputedStyle::visible(), ComputedStyle::visible());
            assert!(element_is_visible(&doc, leaf));
            assert!(!element_is_hidden(&doc, leaf));
        }

        #[test]
        fn test_display_none_ancestor_hides_leaf() {
            let (doc, _, leaf) = chain(
                ComputedStyle::new(Display::None, Visibility::Visible),
                ComputedStyle::visible(),
            );
            assert!(element_is_hidden(&doc, leaf));
            assert!(!element_is_visible(&doc, leaf));
        }

        #[test]
        fn test_visibility_hidden_self() {
            let (doc, _, leaf) = chain(
                ComputedStyle::visible(),
                ComputedStyle::new(Display::Block, Visibility::Collapse),
            );
            assert!(element_is_hidden(&doc, leaf));
            assert!(!element_is_visible(&doc, leaf));
        }

        #[test]
        fn test_open_popup_is_visible() {
            let (doc, _, leaf) = chain(ComputedStyle::visible(), ComputedStyle::popup());
            doc.set_popup_state(leaf, Some(PopupState::Open));
            assert!(element_is_visible(&doc, leaf));
            assert!(!element_is_hidden(&doc, leaf));
        }

        #[test]
        fn test_closed_and_hiding_popups_are_hidden() {
            let (doc, _, leaf) = chain(ComputedStyle::visible(), ComputedStyle::popup());
            for state in [PopupState::Closed, PopupState::Hiding] {
                doc.set_popup_state(leaf, Some(state));
                assert!(element_is_hidden(&doc, leaf), "{state} should be hidden");
                assert!(!element_is_visible(&doc, leaf), "{state} should not be visible");
            }
        }

        #[test]
        fn test_showing_popup_is_neither() {
            let (doc, _, leaf) = chain(ComputedStyle::visible(), ComputedStyle::popup());
            doc.set_popup_state(leaf, Some(PopupState::Showing));
            assert!(!element_is_visible(&doc, leaf));
            assert!(!element_is_hidden(&doc, leaf));

            doc.set_popup_state(leaf, None);
            assert!(!element_is_visible(&doc, leaf));
            assert!(!element_is_hidden(&doc, leaf));
        }

        #[test]
        fn test_hidden_check_stops_at_popup() {
            // An open popup under a display:none container
            let (doc, _, leaf) = chain(
                ComputedStyle::new(Display::None, Visibility::Visible),
                ComputedStyle::popup(),
            );
            doc.set_popup_state(leaf, Some(PopupState::Open));
            assert!(!element_is_visible(&doc, leaf));
            assert!(!element_is_hidden(&doc, leaf));
        }

        #[test]
        fn test_element_assertions_report_missing_node() {
            let doc = Document::new();
            let reporter = TestReporter::new();
            is_element_hidden(&reporter, &doc, None, "missing element hidden");
            assert_eq!(reporter.failed_count(), 2);
        }

        #[test]
        fn test_element_assertions_pass() {
            let (doc, _, leaf) = chain(ComputedStyle::visible(), ComputedStyle::visible());
            let reporter = TestReporter::new();
            is_element_visible(&reporter, &doc, Some(leaf), "leaf visible");
            assert!(reporter.all_passed());
            assert_eq!(reporter.passed_count(), 2);
        }
    }

    mod property_tests {
        use super::*;

        fn shown_display() -> impl Strategy<Value = Display> {
            prop_oneof![
                Just(Display::Block),
                Just(Display::Inline),
                Just(Display::Flex),
            ]
        }

        fn any_style() -> impl Strategy<Value = ComputedStyle> {
            (
                prop_oneof![
                    Just(Display::None),
                    Just(Display::Block),
                    Just(Display::Inline),
                    Just(Display::Flex),
                ],
                prop_oneof![
                    Just(Visibility::Visible),
                    Just(Visibility::Hidden),
                    Just(Visibility::Collapse),
                ],
            )
                .prop_map(|(display, visibility)| ComputedStyle::new(display, visibility))
        }

        fn build_chain(styles: &[ComputedStyle]) -> (Document, NodeId) {
            let doc = Document::new();
            let mut parent = None;
            let mut last = None;
            for (i, style) in styles.iter().enumerate() {
                let node = doc.create_element(format!("n{i}"), None, parent, *style);
                parent = Some(node);
                last = Some(node);
            }
            (doc, last.expect("non-empty chain"))
        }

        proptest! {
            #[test]
            fn prop_visible_chain_is_visible_not_hidden(
                displays in prop::collection::vec(shown_display(), 1..8)
            ) {
                let styles: Vec<_> = displays
                    .into_iter()
                    .map(|d| ComputedStyle::new(d, Visibility::Visible))
                    .collect();
                let (doc, leaf) = build_chain(&styles);
                prop_assert!(element_is_visible(&doc, leaf));
                prop_assert!(!element_is_hidden(&doc, leaf));
            }

            #[test]
            fn prop_display_none_anywhere_hides(
                mut styles in prop::collection::vec(any_style(), 1..8),
                pick in any::<prop::sample::Index>(),
            ) {
                let at = pick.index(styles.len());
                styles[at].display = Display::None;
                let (doc, leaf) = build_chain(&styles);
                prop_assert!(element_is_hidden(&doc, leaf));
                prop_assert!(!element_is_visible(&doc, leaf));
            }
        }
    }
}
