//! CSS selector / XPath generation, and matching for the selector dialect we
//! generate ourselves (`#id` or `tag.class.class[attr="value"]`).

use super::{DomNode, DomTree, NodeId};

/// Attributes appended to tag selectors to narrow them down.
const SELECTOR_ATTRS: &[&str] = &["type", "name", "placeholder", "role"];

/// Max XPath segments before the path is elided with `...`.
const XPATH_MAX_DEPTH: usize = 8;

/// Escape an identifier the way `CSS.escape` does.
pub fn css_escape(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        if c == '\0' {
            out.push('\u{FFFD}');
        } else if (0x01..=0x1f).contains(&code)
            || code == 0x7f
            || (i == 0 && c.is_ascii_digit())
            || (i == 1 && c.is_ascii_digit() && chars[0] == '-')
        {
            out.push_str(&format!("\\{:x} ", code));
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// `#id` when available, else tag + up to two classes + identifying attributes.
pub fn generate_selector(node: &DomNode) -> String {
    if let Some(id) = node.dom_id() {
        return format!("#{}", css_escape(id));
    }
    let mut selector = node.tag.clone();
    for class in node.classes().take(2) {
        selector.push('.');
        selector.push_str(&css_escape(class));
    }
    for attr in SELECTOR_ATTRS {
        if let Some(value) = node.attr(attr) {
            selector.push_str(&format!("[{}=\"{}\"]", attr, css_escape(value)));
        }
    }
    selector
}

/// Indexed XPath from the document root, elided past eight segments.
pub fn generate_xpath(tree: &DomTree, id: NodeId) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(id);
    let mut truncated = false;
    while let Some(n) = current {
        let tag = &tree.node(n).tag;
        let segment = match tree.parent(n) {
            Some(parent) => {
                let same: Vec<NodeId> = tree
                    .children(parent)
                    .iter()
                    .copied()
                    .filter(|&s| &tree.node(s).tag == tag)
                    .collect();
                if same.len() > 1 {
                    let pos = same.iter().position(|&s| s == n).unwrap_or(0);
                    format!("{}[{}]", tag, pos + 1)
                } else {
                    tag.clone()
                }
            }
            None => tag.clone(),
        };
        parts.push(segment);
        current = tree.parent(n);
        if parts.len() >= XPATH_MAX_DEPTH && current.is_some() {
            truncated = true;
            break;
        }
    }
    if truncated {
        parts.push("...".into());
    } else {
        parts.push("html".into());
    }
    parts.reverse();
    format!("/{}", parts.join("/"))
}

/// Parsed compound selector.
#[derive(Debug, PartialEq)]
enum Compound {
    Id(String),
    Parts {
        tag: Option<String>,
        classes: Vec<String>,
        attrs: Vec<(String, String)>,
    },
}

impl Compound {
    fn matches(&self, node: &DomNode) -> bool {
        match self {
            Compound::Id(id) => node.dom_id() == Some(id.as_str()),
            Compound::Parts {
                tag,
                classes,
                attrs,
            } => {
                tag.as_ref().map_or(true, |t| node.tag.eq_ignore_ascii_case(t))
                    && classes.iter().all(|c| node.has_class(c))
                    && attrs.iter().all(|(k, v)| node.attr(k) == Some(v.as_str()))
            }
        }
    }
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.chars().peekable(),
        }
    }

    /// Consume one escape sequence after a backslash.
    fn escape(&mut self) -> Option<char> {
        let mut hex = String::new();
        while hex.len() < 6 {
            match self.chars.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    hex.push(*c);
                    self.chars.next();
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            return self.chars.next();
        }
        if self.chars.peek() == Some(&' ') {
            self.chars.next();
        }
        u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
    }

    fn ident(&mut self) -> Option<String> {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                '.' | '#' | '[' | ']' | '=' | '"' => break,
                '\\' => {
                    self.chars.next();
                    out.push(self.escape()?);
                }
                _ => {
                    out.push(c);
                    self.chars.next();
                }
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    fn quoted(&mut self) -> Option<String> {
        if self.chars.next()? != '"' {
            return None;
        }
        let mut out = String::new();
        loop {
            match self.chars.next()? {
                '"' => return Some(out),
                '\\' => out.push(self.escape()?),
                c => out.push(c),
            }
        }
    }

    fn expect(&mut self, want: char) -> Option<()> {
        (self.chars.next()? == want).then_some(())
    }
}

fn parse(selector: &str) -> Option<Compound> {
    let selector = selector.trim();
    let mut cur = Cursor::new(selector);
    if cur.chars.peek() == Some(&'#') {
        cur.chars.next();
        let id = cur.ident()?;
        return cur.chars.peek().is_none().then_some(Compound::Id(id));
    }

    let tag = match cur.chars.peek() {
        Some('.') | Some('[') => None,
        Some(_) => Some(cur.ident()?),
        None => return None,
    };
    let mut classes = Vec::new();
    let mut attrs = Vec::new();
    while let Some(c) = cur.chars.next() {
        match c {
            '.' => classes.push(cur.ident()?),
            '[' => {
                let name = cur.ident()?;
                cur.expect('=')?;
                let value = cur.quoted()?;
                cur.expect(']')?;
                attrs.push((name, value));
            }
            _ => return None,
        }
    }
    Some(Compound::Parts {
        tag,
        classes,
        attrs,
    })
}

impl DomTree {
    /// First node in document order matching a generated selector. Selectors
    /// outside the supported dialect match nothing.
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        let compound = parse(selector)?;
        self.document_order()
            .into_iter()
            .find(|&id| compound.matches(self.node(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Viewport;

    #[test]
    fn escape_matches_css_escape() {
        assert_eq!(css_escape("main-nav"), "main-nav");
        assert_eq!(css_escape("1st"), "\\31 st");
        assert_eq!(css_escape("-2x"), "-\\32 x");
        assert_eq!(css_escape("-"), "\\-");
        assert_eq!(css_escape("w-1/2"), "w-1\\/2");
        assert_eq!(css_escape("a b"), "a\\ b");
    }

    #[test]
    fn selector_prefers_id() {
        let node = DomNode::element("button")
            .with_attr("id", "buy-now")
            .with_attr("class", "btn primary");
        assert_eq!(generate_selector(&node), "#buy-now");
    }

    #[test]
    fn selector_uses_classes_and_attrs() {
        let node = DomNode::element("input")
            .with_attr("class", "field large extra")
            .with_attr("type", "email")
            .with_attr("name", "user email");
        assert_eq!(
            generate_selector(&node),
            "input.field.large[type=\"email\"][name=\"user\\ email\"]"
        );
    }

    #[test]
    fn generated_selectors_round_trip_through_query() {
        let mut tree = DomTree::new(Viewport::default(), DomNode::element("body"));
        let first = tree.append(
            tree.root(),
            DomNode::element("a").with_attr("class", "nav link"),
        );
        let weird = tree.append(
            tree.root(),
            DomNode::element("div").with_attr("class", "w-1/2 card"),
        );
        let by_id = tree.append(tree.root(), DomNode::element("span").with_attr("id", "9lives"));
        let input = tree.append(
            tree.root(),
            DomNode::element("input").with_attr("placeholder", "Search \"all\""),
        );

        for id in [first, weird, by_id, input] {
            let selector = generate_selector(tree.node(id));
            assert_eq!(tree.query_selector(&selector), Some(id), "selector {}", selector);
        }
    }

    #[test]
    fn unsupported_selectors_match_nothing() {
        let tree = DomTree::new(Viewport::default(), DomNode::element("body"));
        assert_eq!(tree.query_selector("div > a"), None);
        assert_eq!(tree.query_selector(""), None);
        assert_eq!(tree.query_selector("a[href]"), None);
    }

    #[test]
    fn xpath_indexes_repeated_siblings() {
        let mut tree = DomTree::new(Viewport::default(), DomNode::element("body"));
        let list = tree.append(tree.root(), DomNode::element("ul"));
        tree.append(list, DomNode::element("li"));
        let second = tree.append(list, DomNode::element("li"));
        assert_eq!(generate_xpath(&tree, second), "/html/body/ul/li[2]");
    }

    #[test]
    fn xpath_elides_deep_paths() {
        let mut tree = DomTree::new(Viewport::default(), DomNode::element("body"));
        let mut parent = tree.root();
        for _ in 0..10 {
            parent = tree.append(parent, DomNode::element("div"));
        }
        let xpath = generate_xpath(&tree, parent);
        assert!(xpath.starts_with("/.../"), "{}", xpath);
        assert_eq!(xpath.matches("div").count(), 8);
    }
}
