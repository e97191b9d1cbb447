//! Page indexer - walks a captured tree and produces the numbered element
//! list plus a text outline.
//!
//! Element ids are positions in traversal order. They are only meaningful
//! for the [`PageIndex`] that produced them; any new capture invalidates them.

mod report;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::classify::{classify, is_visible, InteractionType};
use crate::config::ReportConfig;
use crate::dom::{generate_selector, generate_xpath, DomNode, DomTree, NodeId, Rect, Viewport};
use crate::text::{collapse_whitespace, display_text, own_text, truncate_chars};

/// Attributes copied onto [`PageElement::attributes`]; `data-*` are always kept.
const ATTRIBUTE_ALLOW_LIST: &[&str] = &[
    "id",
    "class",
    "name",
    "type",
    "role",
    "aria-label",
    "href",
    "value",
    "placeholder",
    "for",
    "title",
    "alt",
];

/// Disabled by property, attribute or `aria-disabled`.
pub(crate) fn is_disabled(node: &DomNode) -> bool {
    node.disabled
        || node.has_attr("disabled")
        || node
            .attr("aria-disabled")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Absolute geometry of an element at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub center_x: f64,
    pub center_y: f64,
    /// Fully enclosed by the viewport at capture time.
    pub in_viewport: bool,
}

impl Geometry {
    /// Convert a viewport-relative box into page coordinates.
    pub fn measure(rect: &Rect, viewport: &Viewport) -> Self {
        let (x, y) = viewport.to_page(rect.x, rect.y);
        Self {
            x,
            y,
            width: rect.width,
            height: rect.height,
            center_x: x + rect.width / 2.0,
            center_y: y + rect.height / 2.0,
            in_viewport: viewport.encloses(rect),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center_x, self.center_y)
    }
}

/// Summary of an element's parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParentSummary {
    pub tag: String,
    pub id: String,
    pub class: String,
    /// First 50 characters of the parent's rendered text.
    pub text: String,
}

/// Where the element sits in the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralContext {
    pub tag: String,
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    pub parent: Option<ParentSummary>,
    pub child_count: usize,
    pub disabled: bool,
    pub z_index: i32,
}

/// One indexed element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageElement {
    /// Position in the snapshot, starting at 0.
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    pub text: String,
    pub geometry: Geometry,
    pub attributes: BTreeMap<String, String>,
    pub context: StructuralContext,
}

impl PageElement {
    /// Build the element record for a node.
    pub fn from_node(
        tree: &DomTree,
        node_id: NodeId,
        id: usize,
        kind: InteractionType,
        text: String,
        with_xpath: bool,
    ) -> Self {
        let node = tree.node(node_id);
        let attributes = node
            .attributes
            .iter()
            .filter(|(k, _)| ATTRIBUTE_ALLOW_LIST.contains(&k.as_str()) || k.starts_with("data-"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let parent = tree.parent(node_id).map(|p| {
            let pn = tree.node(p);
            ParentSummary {
                tag: pn.tag.clone(),
                id: pn.attr("id").unwrap_or_default().to_string(),
                class: pn.attr("class").unwrap_or_default().to_string(),
                text: truncate_chars(&tree.inner_text(p), 50),
            }
        });
        Self {
            id,
            kind,
            text,
            geometry: Geometry::measure(&node.rect, tree.viewport()),
            attributes,
            context: StructuralContext {
                tag: node.tag.clone(),
                selector: generate_selector(node),
                xpath: with_xpath.then(|| generate_xpath(tree, node_id)),
                parent,
                child_count: tree.children(node_id).len(),
                disabled: is_disabled(node),
                z_index: node.style.z_index,
            },
        }
    }

    /// Index marker: `[id][type]text`.
    pub fn marker(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PageElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]{}", self.id, self.kind, self.text)
    }
}

/// One entry of the page outline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlineItem {
    /// Plain text from an untyped node.
    Text(String),
    /// Reference into [`PageIndex::elements`].
    Element(usize),
}

/// Result of one indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageIndex {
    pub elements: Vec<PageElement>,
    pub outline: Vec<OutlineItem>,
}

impl PageIndex {
    /// Walk `tree` depth-first in document order. Invisible nodes are skipped
    /// together with their subtree.
    pub fn build(tree: &DomTree) -> Self {
        let mut index = PageIndex::default();
        let mut stack = vec![tree.root()];
        while let Some(id) = stack.pop() {
            if !is_visible(tree.node(id)) {
                continue;
            }
            match classify(tree, id) {
                Some(kind) => {
                    if let Some(text) = display_text(tree, id, kind) {
                        let el_id = index.elements.len();
                        index
                            .elements
                            .push(PageElement::from_node(tree, id, el_id, kind, text, false));
                        index.outline.push(OutlineItem::Element(el_id));
                    }
                }
                None => {
                    let own = own_text(tree, id);
                    if own.chars().count() > 1 {
                        index.outline.push(OutlineItem::Text(own));
                    }
                }
            }
            stack.extend(tree.children(id).iter().rev().copied());
        }
        index
    }

    pub fn get(&self, id: usize) -> Option<&PageElement> {
        self.elements.get(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Linearised outline with element markers, short fragments coalesced.
    pub fn report(&self, config: &ReportConfig) -> String {
        report::render(self, config)
    }

    /// One marker per line, no outline text.
    pub fn element_list(&self) -> String {
        let mut out = String::with_capacity(self.elements.len() * 32);
        for el in &self.elements {
            out.push_str(&collapse_whitespace(&el.marker()));
            out.push('\n');
        }
        out
    }
}
