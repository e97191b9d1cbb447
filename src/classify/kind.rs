use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dom::{DomNode, DomTree, NodeId};
use crate::text::own_text;

/// Semantic interaction type assigned to an indexed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Link,
    Button,
    Input,
    Checkbox,
    Radio,
    Dropdown,
    Textarea,
    Tab,
    Label,
    Listitem,
    Image,
    Header,
    Interactive,
    Container,
    Content,
}

impl InteractionType {
    pub const ALL: [InteractionType; 15] = [
        InteractionType::Link,
        InteractionType::Button,
        InteractionType::Input,
        InteractionType::Checkbox,
        InteractionType::Radio,
        InteractionType::Dropdown,
        InteractionType::Textarea,
        InteractionType::Tab,
        InteractionType::Label,
        InteractionType::Listitem,
        InteractionType::Image,
        InteractionType::Header,
        InteractionType::Interactive,
        InteractionType::Container,
        InteractionType::Content,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Link => "link",
            InteractionType::Button => "button",
            InteractionType::Input => "input",
            InteractionType::Checkbox => "checkbox",
            InteractionType::Radio => "radio",
            InteractionType::Dropdown => "dropdown",
            InteractionType::Textarea => "textarea",
            InteractionType::Tab => "tab",
            InteractionType::Label => "label",
            InteractionType::Listitem => "listitem",
            InteractionType::Image => "image",
            InteractionType::Header => "header",
            InteractionType::Interactive => "interactive",
            InteractionType::Container => "container",
            InteractionType::Content => "content",
        }
    }

    /// Kinds indexed even without any text: an unlabeled button or input is
    /// still worth reporting. Their kind name stands in for the text.
    pub fn emits_without_text(&self) -> bool {
        matches!(
            self,
            InteractionType::Button
                | InteractionType::Input
                | InteractionType::Checkbox
                | InteractionType::Radio
                | InteractionType::Image
        )
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        InteractionType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown interaction type '{}'", s))
    }
}

/// Facts about one node that the rules look at.
struct NodeView<'a> {
    tree: &'a DomTree,
    id: NodeId,
    node: &'a DomNode,
    /// Click handler (attribute or scripted).
    handler: bool,
    pointer: bool,
}

impl<'a> NodeView<'a> {
    fn new(tree: &'a DomTree, id: NodeId) -> Self {
        let node = tree.node(id);
        Self {
            tree,
            id,
            node,
            handler: node.click_handler || node.has_attr("onclick"),
            pointer: node.style.is_pointer(),
        }
    }

    fn tag(&self) -> &str {
        &self.node.tag
    }

    fn lower_attr(&self, name: &str) -> Option<String> {
        self.node.attr(name).map(|v| v.trim().to_ascii_lowercase())
    }

    fn clickable(&self) -> bool {
        self.handler || self.pointer
    }
}

/// One classification rule. Rules are tried in [`RULES`] order; the first one
/// returning a type wins.
pub struct Rule {
    pub name: &'static str,
    check: fn(&NodeView<'_>) -> Option<InteractionType>,
}

impl Rule {
    pub fn apply(&self, tree: &DomTree, id: NodeId) -> Option<InteractionType> {
        (self.check)(&NodeView::new(tree, id))
    }
}

pub const RULES: &[Rule] = &[
    Rule { name: "native-tag", check: native_tag },
    Rule { name: "input-type", check: input_type },
    Rule { name: "form-control", check: form_control },
    Rule { name: "aria-role", check: aria_role },
    Rule { name: "clickable-container", check: clickable_container },
    Rule { name: "scripted", check: scripted },
    Rule { name: "label", check: label },
    Rule { name: "list-item", check: list_item },
    Rule { name: "image", check: image },
    Rule { name: "header", check: header },
    Rule { name: "container", check: container },
    Rule { name: "content", check: content },
];

/// Classify a node; `None` means it is not an element for indexing purposes.
pub fn classify(tree: &DomTree, id: NodeId) -> Option<InteractionType> {
    let view = NodeView::new(tree, id);
    RULES.iter().find_map(|r| (r.check)(&view))
}

/// Name of the first rule that fires, for diagnostics.
pub fn matching_rule(tree: &DomTree, id: NodeId) -> Option<&'static str> {
    let view = NodeView::new(tree, id);
    RULES
        .iter()
        .find(|r| (r.check)(&view).is_some())
        .map(|r| r.name)
}

fn native_tag(v: &NodeView<'_>) -> Option<InteractionType> {
    match v.tag() {
        "a" => Some(InteractionType::Link),
        "button" => Some(InteractionType::Button),
        _ => None,
    }
}

fn input_type(v: &NodeView<'_>) -> Option<InteractionType> {
    if v.tag() != "input" {
        return None;
    }
    let kind = match v.lower_attr("type").as_deref() {
        Some("submit" | "button" | "reset") => InteractionType::Button,
        Some("checkbox") => InteractionType::Checkbox,
        Some("radio") => InteractionType::Radio,
        // text/email/password/search/tel/url and anything unrecognised
        _ => InteractionType::Input,
    };
    Some(kind)
}

fn form_control(v: &NodeView<'_>) -> Option<InteractionType> {
    match v.tag() {
        "select" => Some(InteractionType::Dropdown),
        "textarea" => Some(InteractionType::Textarea),
        _ => None,
    }
}

fn aria_role(v: &NodeView<'_>) -> Option<InteractionType> {
    match v.lower_attr("role")?.as_str() {
        "button" => Some(InteractionType::Button),
        "link" => Some(InteractionType::Link),
        "checkbox" => Some(InteractionType::Checkbox),
        "radio" => Some(InteractionType::Radio),
        "textbox" | "searchbox" => Some(InteractionType::Input),
        "combobox" | "listbox" => Some(InteractionType::Dropdown),
        "tab" => Some(InteractionType::Tab),
        _ => None,
    }
}

/// Styled `div`/`span` widgets: sites build buttons out of these constantly.
fn clickable_container(v: &NodeView<'_>) -> Option<InteractionType> {
    if !matches!(v.tag(), "div" | "span") || !v.clickable() {
        return None;
    }
    if v.lower_attr("aria-haspopup").as_deref() == Some("true") {
        return Some(InteractionType::Dropdown);
    }
    if v.node.has_class("btn") || v.node.has_class("button") {
        return Some(InteractionType::Button);
    }
    if v.node.has_attr("href") || v.node.has_attr("url") {
        return Some(InteractionType::Link);
    }
    Some(InteractionType::Button)
}

fn scripted(v: &NodeView<'_>) -> Option<InteractionType> {
    let tab_order = v
        .node
        .attr("tabindex")
        .and_then(|t| t.trim().parse::<i32>().ok())
        .is_some_and(|t| t >= 0);
    (v.handler || tab_order).then_some(InteractionType::Interactive)
}

fn label(v: &NodeView<'_>) -> Option<InteractionType> {
    (v.tag() == "label").then_some(InteractionType::Label)
}

fn list_item(v: &NodeView<'_>) -> Option<InteractionType> {
    (v.tag() == "li" && v.clickable()).then_some(InteractionType::Listitem)
}

fn image(v: &NodeView<'_>) -> Option<InteractionType> {
    if v.tag() != "img" {
        return None;
    }
    let in_anchor = v
        .tree
        .parent(v.id)
        .is_some_and(|p| v.tree.node(p).tag == "a");
    (v.clickable() || in_anchor).then_some(InteractionType::Image)
}

fn header(v: &NodeView<'_>) -> Option<InteractionType> {
    let heading = matches!(v.tag(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6");
    (heading && v.clickable()).then_some(InteractionType::Header)
}

fn container(v: &NodeView<'_>) -> Option<InteractionType> {
    v.tree
        .has_descendant_tag(v.id, &["a", "button", "input", "select", "textarea"])
        .then_some(InteractionType::Container)
}

fn content(v: &NodeView<'_>) -> Option<InteractionType> {
    if !matches!(v.tag(), "div" | "span" | "p" | "section" | "article") {
        return None;
    }
    (own_text(v.tree, v.id).chars().count() > 1).then_some(InteractionType::Content)
}
