//! Captured DOM tree - the page as the host measured it at one instant.
//!
//! Nodes live in an arena indexed by [`NodeId`]. The host fills in raw facts
//! (tag, attributes, direct text, bounding box, computed style); everything
//! derived from them (types, display text, scores) is computed in Rust.

mod selector;

pub use selector::{css_escape, generate_selector, generate_xpath};

use std::cell::OnceCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::classify::is_visible;
use crate::text::collapse_whitespace;

/// Handle to a node inside one [`DomTree`]. Meaningless across captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Bounding box relative to the viewport (as `getBoundingClientRect` reports it).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive point containment.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// The subset of computed style the classifiers look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub cursor: String,
    pub z_index: i32,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".into(),
            visibility: "visible".into(),
            opacity: 1.0,
            cursor: "auto".into(),
            z_index: 0,
        }
    }
}

impl ComputedStyle {
    /// `display: none` removes the node and its whole subtree from rendering.
    pub fn hides_subtree(&self) -> bool {
        self.display == "none"
    }

    pub fn hides_self(&self) -> bool {
        self.visibility == "hidden" || self.visibility == "collapse"
    }

    pub fn is_pointer(&self) -> bool {
        self.cursor == "pointer"
    }
}

/// Scroll offset and size of the visible viewport, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(scroll_x: f64, scroll_y: f64, width: f64, height: f64) -> Self {
        Self {
            scroll_x,
            scroll_y,
            width,
            height,
        }
    }

    /// Whether an absolute page point lies inside the visible area.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.scroll_x
            && x <= self.scroll_x + self.width
            && y >= self.scroll_y
            && y <= self.scroll_y + self.height
    }

    /// Whether a viewport-relative rect is fully enclosed by the viewport.
    pub fn encloses(&self, rect: &Rect) -> bool {
        rect.x >= 0.0 && rect.y >= 0.0 && rect.right() <= self.width && rect.bottom() <= self.height
    }

    /// Absolute page point → viewport-relative point.
    pub fn to_viewport(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.scroll_x, y - self.scroll_y)
    }

    /// Viewport-relative point → absolute page point.
    pub fn to_page(&self, x: f64, y: f64) -> (f64, f64) {
        (x + self.scroll_x, y + self.scroll_y)
    }
}

/// One element as captured from the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomNode {
    /// Lower-case tag name.
    pub tag: String,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text-node children, unnormalised.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub style: ComputedStyle,
    /// `onclick` attribute or a scripted click listener property.
    #[serde(default)]
    pub click_handler: bool,
    #[serde(default)]
    pub disabled: bool,
    /// Live `.value` of form controls.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(skip)]
    parent: Option<NodeId>,
    #[serde(skip)]
    children: Vec<NodeId>,
}

impl DomNode {
    pub fn element(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(x, y, width, height);
        self
    }

    pub fn with_style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_cursor(mut self, cursor: &str) -> Self {
        self.style.cursor = cursor.to_string();
        self
    }

    pub fn with_display(mut self, display: &str) -> Self {
        self.style.display = display.to_string();
        self
    }

    pub fn with_visibility(mut self, visibility: &str) -> Self {
        self.style.visibility = visibility.to_string();
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.style.opacity = opacity;
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.style.z_index = z_index;
        self
    }

    pub fn with_click_handler(mut self) -> Self {
        self.click_handler = true;
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Attribute lookup, case-insensitive on the name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Attribute lookup that treats empty values as absent.
    pub fn attr_non_empty(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|v| !v.trim().is_empty())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn dom_id(&self) -> Option<&str> {
        self.attr_non_empty("id")
    }
}

/// A node as emitted by a capture script: the node plus its parent's position
/// in the same document-ordered list.
#[derive(Debug, Clone, Deserialize)]
pub struct CapturedNode {
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(flatten)]
    pub node: DomNode,
}

/// Raw capture payload: viewport plus nodes in document order, root first.
#[derive(Debug, Clone, Deserialize)]
pub struct Capture {
    pub viewport: Viewport,
    pub nodes: Vec<CapturedNode>,
}

/// Arena of captured nodes rooted at `<body>`.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<DomNode>,
    viewport: Viewport,
    /// Built on first use, dropped on any mutation.
    lookup: OnceCell<Lookup>,
}

/// Whole-tree tables that would otherwise cost a walk per query.
#[derive(Debug, Clone, Default)]
struct Lookup {
    /// Pre-order position of each node.
    pos: Vec<usize>,
    /// One past the pre-order position of each node's last descendant.
    end: Vec<usize>,
    /// Ascending pre-order positions per tag.
    tags: HashMap<String, Vec<usize>>,
    /// First node in document order carrying each `id` attribute.
    ids: HashMap<String, NodeId>,
}

impl Lookup {
    fn build(tree: &DomTree) -> Self {
        let order = tree.document_order();
        let mut lookup = Lookup {
            pos: vec![0; tree.nodes.len()],
            end: vec![0; tree.nodes.len()],
            ..Lookup::default()
        };
        for (i, &id) in order.iter().enumerate() {
            lookup.pos[id.0] = i;
            let node = tree.node(id);
            lookup.tags.entry(node.tag.clone()).or_default().push(i);
            if let Some(dom_id) = node.attr_non_empty("id") {
                lookup.ids.entry(dom_id.to_string()).or_insert(id);
            }
        }
        // Children come after their parent in pre-order, so walking it
        // backwards sees every subtree size before it is needed.
        let mut size = vec![1usize; tree.nodes.len()];
        for &id in order.iter().rev() {
            let below: usize = tree.children(id).iter().map(|c| size[c.0]).sum();
            size[id.0] += below;
            lookup.end[id.0] = lookup.pos[id.0] + size[id.0];
        }
        lookup
    }
}

impl DomTree {
    /// Create a tree holding only `root`.
    pub fn new(viewport: Viewport, root: DomNode) -> Self {
        Self {
            nodes: vec![root],
            viewport,
            lookup: OnceCell::new(),
        }
    }

    /// Build a tree from a capture. Every node except the first must name a
    /// parent that appears before it.
    pub fn from_capture(capture: Capture) -> crate::Result<Self> {
        let mut nodes = capture.nodes.into_iter();
        let root = nodes
            .next()
            .ok_or_else(|| crate::Error::Script("capture returned no root node".into()))?;
        let mut tree = DomTree::new(capture.viewport, root.node);
        for (i, captured) in nodes.enumerate() {
            let own = i + 1;
            let parent = captured
                .parent
                .filter(|&p| p < own)
                .ok_or_else(|| {
                    crate::Error::Script(format!(
                        "capture node {} has invalid parent {:?}",
                        own, captured.parent
                    ))
                })?;
            tree.append(NodeId(parent), captured.node);
        }
        Ok(tree)
    }

    /// Append `node` as the last child of `parent`.
    ///
    /// # Panics
    /// If `parent` does not belong to this tree.
    pub fn append(&mut self, parent: NodeId, mut node: DomNode) -> NodeId {
        assert!(parent.0 < self.nodes.len(), "parent {:?} out of range", parent);
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        self.lookup.take();
        id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn node(&self, id: NodeId) -> &DomNode {
        &self.nodes[id.0]
    }

    /// Mutable access for hosts that patch a capture (layout shifts in tests).
    pub fn node_mut(&mut self, id: NodeId) -> &mut DomNode {
        self.lookup.take();
        &mut self.nodes[id.0]
    }

    fn lookup(&self) -> &Lookup {
        self.lookup.get_or_init(|| Lookup::build(self))
    }

    /// First node in document order whose `id` attribute is `dom_id`.
    pub fn by_dom_id(&self, dom_id: &str) -> Option<NodeId> {
        self.lookup().ids.get(dom_id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// All nodes, depth-first in document order.
    pub fn document_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        out.push(self.root());
        out.extend(self.descendants(self.root()));
        out
    }

    /// Descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Rendered text of `id` and its descendants, whitespace collapsed.
    /// Subtrees with `display: none` and `visibility: hidden` nodes contribute nothing.
    pub fn inner_text(&self, id: NodeId) -> String {
        let mut parts: Vec<&str> = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let node = self.node(n);
            if node.style.hides_subtree() {
                continue;
            }
            if !node.style.hides_self() && !node.text.trim().is_empty() {
                parts.push(&node.text);
            }
            stack.extend(self.children(n).iter().rev().copied());
        }
        collapse_whitespace(&parts.join(" "))
    }

    /// Whether any descendant has one of `tags`.
    pub fn has_descendant_tag(&self, id: NodeId, tags: &[&str]) -> bool {
        let lookup = self.lookup();
        let (start, end) = (lookup.pos[id.0] + 1, lookup.end[id.0]);
        tags.iter().any(|tag| {
            lookup.tags.get(*tag).is_some_and(|positions| {
                let first = positions.partition_point(|&p| p < start);
                positions.get(first).is_some_and(|&p| p < end)
            })
        })
    }

    /// Topmost visible node under a viewport-relative point: highest z-index,
    /// ties to the node painted last in document order.
    pub fn element_at_point(&self, vx: f64, vy: f64) -> Option<NodeId> {
        let mut best: Option<(i32, NodeId)> = None;
        for id in self.document_order() {
            let node = self.node(id);
            if !is_visible(node) || !node.rect.contains(vx, vy) {
                continue;
            }
            match best {
                Some((z, _)) if node.style.z_index < z => {}
                _ => best = Some((node.style.z_index, id)),
            }
        }
        best.map(|(_, id)| id)
    }

    /// Visible node of `tag` whose text (or value/placeholder) equals `text`,
    /// ignoring case and whitespace runs. Without an exact match, the first
    /// one in document order that contains it.
    pub fn find_by_tag_text(&self, tag: &str, text: &str) -> Option<NodeId> {
        let needle = fold(text);
        if needle.is_empty() {
            return None;
        }
        let mut containing = None;
        for id in self.document_order() {
            let node = self.node(id);
            if !node.tag.eq_ignore_ascii_case(tag) || !is_visible(node) {
                continue;
            }
            let inner = self.inner_text(id);
            let content = if !inner.is_empty() {
                fold(&inner)
            } else {
                node.value
                    .as_deref()
                    .or_else(|| node.attr("value"))
                    .or_else(|| node.attr("placeholder"))
                    .map(fold)
                    .unwrap_or_default()
            };
            if content == needle {
                return Some(id);
            }
            if containing.is_none() && content.contains(&needle) {
                containing = Some(id);
            }
        }
        containing
    }
}

fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
