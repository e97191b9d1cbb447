use crate::config::ReportConfig;

use super::{OutlineItem, PageIndex};

/// Render the outline. Every element marker, and any text that could be
/// read as one (leading `[`), starts a fresh line; a short text fragment
/// joins the current line when the result stays under `line_max`.
pub(super) fn render(index: &PageIndex, config: &ReportConfig) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for item in &index.outline {
        let (piece, breaks) = match item {
            OutlineItem::Element(id) => match index.get(*id) {
                Some(el) => (el.marker(), true),
                None => continue,
            },
            OutlineItem::Text(t) => (t.clone(), t.starts_with('[')),
        };

        if current.is_empty() {
            current = piece;
            continue;
        }

        let fits = !breaks
            && piece.chars().count() < config.fragment_max
            && current.chars().count() + 1 + piece.chars().count() < config.line_max;
        if fits {
            current.push(' ');
            current.push_str(&piece);
        } else {
            lines.push(std::mem::replace(&mut current, piece));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n").trim().to_string()
}
