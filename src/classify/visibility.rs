use crate::dom::DomNode;

/// Opacity at or below which a node counts as invisible.
const MIN_OPACITY: f64 = 0.1;

/// A node is visible iff it has a non-empty box and its computed style does
/// not hide it.
pub fn is_visible(node: &DomNode) -> bool {
    !node.rect.is_empty()
        && !node.style.hides_subtree()
        && !node.style.hides_self()
        && node.style.opacity > MIN_OPACITY
}
