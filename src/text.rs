//! Text extraction and normalisation shared by the indexer and the matcher.

use crate::classify::InteractionType;
use crate::dom::{DomTree, NodeId};

/// Attributes consulted, in order, when an element has no text of its own.
const LABEL_ATTRS: &[&str] = &["placeholder", "name", "aria-label", "title"];

/// Attribute chain for the scoring search, after rendered text.
const MATCH_ATTRS: &[&str] = &[
    "aria-label",
    "placeholder",
    "value",
    "title",
    "name",
    "alt",
    "id",
];

/// Collapse runs of whitespace to one space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Matching form: lower-case, collapsed whitespace, `a / b` → `a/b`.
pub fn normalize(s: &str) -> String {
    collapse_whitespace(&s.to_lowercase())
        .split('/')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("/")
}

/// Keep only alphanumeric characters (Unicode-aware).
pub fn alphanumeric(s: &str) -> String {
    s.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Text from the node's direct text children only.
pub fn own_text(tree: &DomTree, id: NodeId) -> String {
    collapse_whitespace(&tree.node(id).text)
}

/// Index display text: own text, then label-ish attributes, then alt text,
/// then (for kinds whose mere presence is informative) the kind name.
/// Returns `None` when the element should be suppressed from the index.
pub fn display_text(tree: &DomTree, id: NodeId, kind: InteractionType) -> Option<String> {
    let node = tree.node(id);
    let own = own_text(tree, id);
    if !own.is_empty() {
        return Some(own);
    }
    let from_attrs = LABEL_ATTRS
        .iter()
        .chain(std::iter::once(&"alt"))
        .find_map(|a| node.attr_non_empty(a))
        .map(collapse_whitespace);
    if from_attrs.is_some() {
        return from_attrs;
    }
    kind.emits_without_text()
        .then(|| kind.as_str().to_string())
}

/// Scoring-search text: rendered inner text, else the attribute chain.
/// Labels also carry the value of the control they point at. Normalised.
pub fn match_text(tree: &DomTree, id: NodeId) -> String {
    let node = tree.node(id);
    let mut text = normalize(&tree.inner_text(id));

    if node.tag == "label" {
        if let Some(target) = node.attr_non_empty("for") {
            let value = tree
                .by_dom_id(target)
                .map(|n| tree.node(n))
                .and_then(|n| n.value.clone().or_else(|| n.attr("value").map(String::from)))
                .filter(|v| !v.is_empty());
            if let Some(value) = value {
                text = normalize(&format!("{} {}", text, value));
            }
        }
    }

    if text.is_empty() {
        if let Some(v) = MATCH_ATTRS.iter().find_map(|a| node.attr_non_empty(a)) {
            text = normalize(v);
        } else if let Some(v) = node.value.as_deref().filter(|v| !v.trim().is_empty()) {
            text = normalize(v);
        }
    }
    text
}

/// Relaxed-mode fallback: text of the first descendant whose own or rendered
/// text contains `target` (already normalised).
pub fn descendant_text_containing(tree: &DomTree, id: NodeId, target: &str) -> Option<String> {
    if target.is_empty() {
        return None;
    }
    tree.descendants(id).into_iter().find_map(|d| {
        let own = normalize(&tree.node(d).text);
        if own.contains(target) {
            return Some(own);
        }
        let inner = normalize(&tree.inner_text(d));
        inner.contains(target).then_some(inner)
    })
}

/// Truncate to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomNode, Viewport};

    fn tree() -> DomTree {
        DomTree::new(Viewport::default(), DomNode::element("body"))
    }

    #[test]
    fn normalize_collapses_and_joins_slashes() {
        assert_eq!(
            normalize("  Cash on Delivery /  Pay on Delivery "),
            "cash on delivery/pay on delivery"
        );
        assert_eq!(normalize("Add\n\tto   Cart"), "add to cart");
    }

    #[test]
    fn alphanumeric_keeps_unicode_letters() {
        assert_eq!(alphanumeric("sign-in!"), "signin");
        assert_eq!(alphanumeric("登录"), "登录");
    }

    #[test]
    fn display_text_chain() {
        let mut t = tree();
        let own = t.append(t.root(), DomNode::element("button").with_text(" Save "));
        let placeholder = t.append(
            t.root(),
            DomNode::element("input")
                .with_attr("name", "q")
                .with_attr("placeholder", "Search"),
        );
        let img = t.append(t.root(), DomNode::element("img").with_attr("alt", "Logo"));
        let bare_img = t.append(t.root(), DomNode::element("img"));
        let bare_box = t.append(t.root(), DomNode::element("input"));
        let bare_label = t.append(t.root(), DomNode::element("label"));

        assert_eq!(display_text(&t, own, InteractionType::Button).as_deref(), Some("Save"));
        assert_eq!(
            display_text(&t, placeholder, InteractionType::Input).as_deref(),
            Some("Search")
        );
        assert_eq!(display_text(&t, img, InteractionType::Image).as_deref(), Some("Logo"));
        assert_eq!(display_text(&t, bare_img, InteractionType::Image).as_deref(), Some("image"));
        assert_eq!(display_text(&t, bare_box, InteractionType::Input).as_deref(), Some("input"));
        assert_eq!(display_text(&t, bare_label, InteractionType::Label), None);
    }

    #[test]
    fn match_text_uses_descendants_then_attributes() {
        let mut t = tree();
        let button = t.append(t.root(), DomNode::element("button"));
        t.append(button, DomNode::element("span").with_text("Add to  Cart"));
        let icon = t.append(t.root(), DomNode::element("a").with_attr("aria-label", "Close Dialog"));
        let input = t.append(t.root(), DomNode::element("input").with_value("hello"));

        assert_eq!(match_text(&t, button), "add to cart");
        assert_eq!(match_text(&t, icon), "close dialog");
        assert_eq!(match_text(&t, input), "hello");
    }

    #[test]
    fn label_carries_target_value() {
        let mut t = tree();
        t.append(
            t.root(),
            DomNode::element("input").with_attr("id", "cod").with_value("COD"),
        );
        let label = t.append(
            t.root(),
            DomNode::element("label").with_attr("for", "cod").with_text("Cash on delivery"),
        );
        assert_eq!(match_text(&t, label), "cash on delivery cod");
    }

    #[test]
    fn label_sees_controls_added_after_lookup() {
        let mut t = tree();
        let label = t.append(
            t.root(),
            DomNode::element("label").with_attr("for", "qty").with_text("Quantity"),
        );
        assert_eq!(match_text(&t, label), "quantity");
        t.append(t.root(), DomNode::element("input").with_attr("id", "qty").with_value("2"));
        assert_eq!(match_text(&t, label), "quantity 2");
    }

    #[test]
    fn descendant_fallback_finds_nested_text() {
        let mut t = tree();
        let outer = t.append(t.root(), DomNode::element("div"));
        let inner = t.append(outer, DomNode::element("div"));
        t.append(inner, DomNode::element("span").with_text("Proceed to Checkout"));
        assert_eq!(
            descendant_text_containing(&t, outer, "checkout").as_deref(),
            Some("proceed to checkout")
        );
        assert_eq!(descendant_text_containing(&t, outer, "refund"), None);
    }
}
