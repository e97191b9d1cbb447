//! Scored fuzzy search over a captured tree.
//!
//! Every visible, classifiable node is scored against the target. The score
//! is additive: a type term, a text term, then position adjustments. Only a
//! strict type mismatch or missing text disqualifies outright; scores of zero
//! or below exclude the node. Ranking is stable, so equal scores go
//! to the node that comes first in document order.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{classify, is_visible, InteractionType};
use crate::dom::{generate_selector, DomTree, NodeId};
use crate::index::{is_disabled, PageElement};
use crate::target::TargetSpec;
use crate::text::{alphanumeric, descendant_text_containing, match_text, normalize, truncate_chars};

/// Longest candidate text carried into results.
const CANDIDATE_TEXT_MAX: usize = 100;

/// Runners-up reported next to the winner.
const ALTERNATIVES: usize = 3;

/// Strict mode treats the type as a hard filter and only scores direct text.
/// Relaxed mode (the retry pass) accepts related types, falls back to
/// descendant text and always scores word overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Strict,
    Relaxed,
}

impl MatchMode {
    pub fn is_relaxed(self) -> bool {
        self == MatchMode::Relaxed
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Strict => f.write_str("strict"),
            MatchMode::Relaxed => f.write_str("relaxed"),
        }
    }
}

/// Scoring constants. Empirically tuned; override them in the `scoring`
/// config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringWeights {
    pub type_exact: i64,
    pub type_partial: i64,
    pub text_exact: i64,
    pub text_alnum: i64,
    /// Scaled by target length / element length.
    pub text_contains: i64,
    /// Per `/`-separated target segment, scaled like `text_contains`.
    pub text_composite: i64,
    /// Scaled by element length / target length.
    pub text_covered: i64,
    pub word_strict: i64,
    pub word_relaxed: i64,
    /// Strict mode scores word overlap only for targets longer than this.
    pub long_target_chars: usize,
    pub in_viewport: i64,
    pub corner_penalty: i64,
    /// Side of the top-left viewport square that draws `corner_penalty`.
    pub corner_size: f64,
    pub empty_text_penalty: i64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            type_exact: 150,
            type_partial: 40,
            text_exact: 450,
            text_alnum: 400,
            text_contains: 300,
            text_composite: 200,
            text_covered: 100,
            word_strict: 25,
            word_relaxed: 15,
            long_target_chars: 15,
            in_viewport: 25,
            corner_penalty: 50,
            corner_size: 50.0,
            empty_text_penalty: 100,
        }
    }
}

/// A runner-up, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternative {
    pub score: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    pub selector: String,
}

/// Best match of a search.
///
/// `element.id` is the node's position in the capture, not a snapshot id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub element: PageElement,
    pub score: i64,
    pub alternatives: Vec<Alternative>,
}

struct Scored {
    node: NodeId,
    kind: InteractionType,
    score: i64,
    text: String,
}

/// Target reduced to what scoring needs.
struct Scorer<'a> {
    weights: &'a ScoringWeights,
    mode: MatchMode,
    kind: Option<&'a str>,
    text: String,
    structured: bool,
}

impl<'a> Scorer<'a> {
    fn new(spec: &'a TargetSpec, mode: MatchMode, weights: &'a ScoringWeights) -> Self {
        Self {
            weights,
            mode,
            kind: spec.kind.as_deref().filter(|k| !k.is_empty()),
            text: spec.text.as_deref().map(normalize).unwrap_or_default(),
            structured: spec.structured,
        }
    }

    fn has_target(&self) -> bool {
        self.kind.is_some() || !self.text.is_empty()
    }

    /// Score one node; `None` if excluded.
    fn score(&self, tree: &DomTree, id: NodeId, kind: InteractionType) -> Option<(i64, String)> {
        let w = self.weights;
        let relaxed = self.mode.is_relaxed();
        let mut score = 0;

        if let Some(target_kind) = self.kind {
            let kind_name = kind.as_str();
            if kind_name == target_kind {
                score += w.type_exact;
            } else if relaxed && (kind_name.contains(target_kind) || target_kind.contains(kind_name)) {
                score += w.type_partial;
            } else if !relaxed {
                return None;
            }
        }

        let mut text = match_text(tree, id);
        if !self.text.is_empty() {
            if text.is_empty() {
                if !relaxed {
                    return None;
                }
                text = descendant_text_containing(tree, id, &self.text)?;
            }
            let term = if self.structured {
                self.text_term(&text)
            } else {
                self.holistic_term(&text, kind)
            };
            score += term;
        }

        let node = tree.node(id);
        if tree.viewport().encloses(&node.rect) {
            score += w.in_viewport;
        }
        if node.rect.y < w.corner_size && node.rect.x < w.corner_size {
            score -= w.corner_penalty;
        }
        if text.is_empty() {
            score -= w.empty_text_penalty;
        }

        (score > 0).then_some((score, text))
    }

    /// Free text may name the type too ("submit button").
    fn holistic_term(&self, text: &str, kind: InteractionType) -> i64 {
        let with_kind = format!("{} {}", text, kind);
        let kind_first = format!("{} {}", kind, text);
        [text, with_kind.as_str(), kind_first.as_str()]
            .into_iter()
            .map(|t| self.text_term(t))
            .max()
            .unwrap_or(0)
    }

    fn text_term(&self, element: &str) -> i64 {
        let w = self.weights;
        let target = self.text.as_str();
        let element_len = element.chars().count();
        let target_len = target.chars().count();

        if element == target {
            return w.text_exact;
        }
        let element_alnum = alphanumeric(element);
        if !element_alnum.is_empty() && element_alnum == alphanumeric(target) {
            return w.text_alnum;
        }
        if element.contains(target) {
            return scaled(w.text_contains, target_len, element_len);
        }
        if target.contains('/') {
            return target
                .split('/')
                .map(str::trim)
                .filter(|part| part.chars().count() > 3 && element.contains(part))
                .map(|part| scaled(w.text_composite, part.chars().count(), element_len))
                .max()
                .unwrap_or(0);
        }
        if element_len > 3 && target.contains(element) {
            return scaled(w.text_covered, element_len, target_len);
        }
        if self.mode.is_relaxed() || target_len > w.long_target_chars {
            let per_word = if self.mode.is_relaxed() {
                w.word_relaxed
            } else {
                w.word_strict
            };
            return word_overlap(target, element) as i64 * per_word;
        }
        0
    }
}

/// `round(base * num / den)`.
fn scaled(base: i64, num: usize, den: usize) -> i64 {
    if den == 0 {
        return 0;
    }
    (base as f64 * num as f64 / den as f64).round() as i64
}

/// Target words (3+ chars) that share a substring relation with some
/// element word (3+ chars).
fn word_overlap(target: &str, element: &str) -> usize {
    let element_words: Vec<&str> = element
        .split_whitespace()
        .filter(|w| w.chars().count() >= 3)
        .collect();
    target
        .split_whitespace()
        .filter(|w| w.chars().count() >= 3)
        .filter(|w| element_words.iter().any(|e| e.contains(*w) || w.contains(*e)))
        .count()
}

/// Score a single node against `spec`. Returns `None` when the node is
/// excluded (invisible, untyped, disqualified or scoring zero).
pub fn score_node(
    tree: &DomTree,
    id: NodeId,
    spec: &TargetSpec,
    mode: MatchMode,
    weights: &ScoringWeights,
) -> Option<i64> {
    let scorer = Scorer::new(spec, mode, weights);
    if !scorer.has_target() || !is_visible(tree.node(id)) {
        return None;
    }
    let kind = classify(tree, id)?;
    scorer.score(tree, id, kind).map(|(score, _)| score)
}

/// Search the whole tree for the best match of `spec`.
pub fn search(
    tree: &DomTree,
    spec: &TargetSpec,
    mode: MatchMode,
    weights: &ScoringWeights,
) -> Option<Candidate> {
    let scorer = Scorer::new(spec, mode, weights);
    if !scorer.has_target() {
        return None;
    }
    let allow_disabled = spec
        .text
        .as_deref()
        .is_some_and(|t| t.contains("disabled"));

    let mut scored = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        if node.style.hides_subtree() {
            continue;
        }
        stack.extend(tree.children(id).iter().rev().copied());

        if !is_visible(node) || (is_disabled(node) && !allow_disabled) {
            continue;
        }
        let Some(kind) = classify(tree, id) else {
            continue;
        };
        if let Some((score, text)) = scorer.score(tree, id, kind) {
            scored.push(Scored {
                node: id,
                kind,
                score,
                text,
            });
        }
    }

    // Stable: equal scores keep document order.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    debug!(mode = %mode, candidates = scored.len(), "scored search");

    let mut ranked = scored.into_iter();
    let best = ranked.next()?;
    let alternatives = ranked
        .take(ALTERNATIVES)
        .map(|s| Alternative {
            score: s.score,
            text: truncate_chars(&s.text, CANDIDATE_TEXT_MAX),
            kind: s.kind,
            selector: generate_selector(tree.node(s.node)),
        })
        .collect();

    let element = PageElement::from_node(
        tree,
        best.node,
        best.node.index(),
        best.kind,
        truncate_chars(&best.text, CANDIDATE_TEXT_MAX),
        true,
    );
    Some(Candidate {
        element,
        score: best.score,
        alternatives,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomNode, Viewport};

    fn page() -> DomTree {
        DomTree::new(
            Viewport::new(0.0, 0.0, 1024.0, 768.0),
            DomNode::element("body"),
        )
    }

    fn strict(tree: &DomTree, raw: &str) -> Option<Candidate> {
        search(tree, &TargetSpec::parse(raw), MatchMode::Strict, &ScoringWeights::default())
    }

    fn relaxed(tree: &DomTree, raw: &str) -> Option<Candidate> {
        search(tree, &TargetSpec::parse(raw), MatchMode::Relaxed, &ScoringWeights::default())
    }

    #[test]
    fn exact_beats_containment() {
        let mut t = page();
        let root = t.root();
        t.append(root, DomNode::element("button").with_text("Submit Order").with_rect(100.0, 100.0, 120.0, 30.0));
        t.append(root, DomNode::element("button").with_text("Submit").with_rect(100.0, 200.0, 120.0, 30.0));

        let best = strict(&t, r#"{"text": "Submit"}"#).unwrap();
        assert_eq!(best.element.text, "submit");
        assert_eq!(best.score, 450 + 25);
        assert_eq!(best.alternatives.len(), 1);
        // 300 * 6/12
        assert_eq!(best.alternatives[0].score, 150 + 25);
    }

    #[test]
    fn strict_type_disqualifies() {
        let mut t = page();
        let root = t.root();
        t.append(root, DomNode::element("a").with_attr("href", "/s").with_text("Search").with_rect(100.0, 100.0, 60.0, 20.0));
        let spec = TargetSpec::parse(r#"{"type": "button", "text": "Search"}"#);
        assert!(search(&t, &spec, MatchMode::Strict, &ScoringWeights::default()).is_none());

        t.append(root, DomNode::element("button").with_rect(300.0, 100.0, 30.0, 30.0));
        assert!(search(&t, &spec, MatchMode::Strict, &ScoringWeights::default()).is_none());

        // A button with unrelated text still beats a link with the exact text.
        t.append(root, DomNode::element("button").with_text("Go").with_rect(400.0, 100.0, 30.0, 30.0));
        let best = search(&t, &spec, MatchMode::Strict, &ScoringWeights::default()).unwrap();
        assert_eq!(best.element.kind, InteractionType::Button);
        assert_eq!(best.element.text, "go");
        assert_eq!(best.score, 150 + 25);
        assert!(best.alternatives.is_empty());
    }

    #[test]
    fn type_only_query_ranks_by_position() {
        let mut t = page();
        let root = t.root();
        t.append(root, DomNode::element("button").with_text("Below").with_rect(100.0, 900.0, 60.0, 20.0));
        t.append(root, DomNode::element("button").with_text("Visible").with_rect(100.0, 100.0, 60.0, 20.0));

        let best = strict(&t, r#"{"type": "button"}"#).unwrap();
        assert_eq!(best.element.text, "visible");
        assert_eq!(best.score, 175);
    }

    #[test]
    fn alphanumeric_equality() {
        let mut t = page();
        t.append(t.root(), DomNode::element("button").with_text("Sign-In!").with_rect(100.0, 100.0, 60.0, 20.0));
        let best = strict(&t, r#"{"text": "sign in"}"#).unwrap();
        assert_eq!(best.score, 400 + 25);
    }

    #[test]
    fn composite_target_takes_best_segment() {
        let mut t = page();
        t.append(
            t.root(),
            DomNode::element("label").with_text("Pay on Delivery").with_rect(100.0, 100.0, 200.0, 20.0),
        );
        let best = strict(&t, r#"{"text": "Cash on Delivery / Pay on Delivery"}"#).unwrap();
        assert_eq!(best.element.kind, InteractionType::Label);
        // Equal lengths: 200 * 15/15
        assert_eq!(best.score, 200 + 25);
    }

    #[test]
    fn covered_element_text() {
        let mut t = page();
        t.append(t.root(), DomNode::element("a").with_text("Checkout").with_rect(100.0, 100.0, 60.0, 20.0));
        let best = strict(&t, r#"{"text": "checkout now"}"#).unwrap();
        // 100 * 8/12
        assert_eq!(best.score, 67 + 25);
    }

    #[test]
    fn word_overlap_needs_long_target_or_relaxed() {
        let mut t = page();
        t.append(
            t.root(),
            DomNode::element("button").with_text("Continue to payment").with_rect(100.0, 100.0, 140.0, 20.0),
        );
        // Short strict targets get no word credit: position only.
        assert_eq!(strict(&t, r#"{"text": "payment page"}"#).unwrap().score, 25);
        assert_eq!(relaxed(&t, r#"{"text": "payment page"}"#).unwrap().score, 15 + 25);
        assert_eq!(
            strict(&t, r#"{"text": "go to the payment step"}"#).unwrap().score,
            25 + 25
        );
    }

    #[test]
    fn relaxed_accepts_related_type() {
        let mut t = page();
        let outer = t.append(
            t.root(),
            DomNode::element("div")
                .with_click_handler()
                .with_attr("class", "card")
                .with_rect(10.0, 10.0, 30.0, 30.0),
        );
        let inner = t.append(outer, DomNode::element("div").with_rect(10.0, 10.0, 30.0, 30.0));
        t.append(inner, DomNode::element("b").with_text("Open").with_rect(12.0, 12.0, 20.0, 10.0));

        let spec = TargetSpec::parse(r#"{"type": "buttons", "text": "open"}"#);
        assert!(search(&t, &spec, MatchMode::Strict, &ScoringWeights::default()).is_none());
        let best = search(&t, &spec, MatchMode::Relaxed, &ScoringWeights::default()).unwrap();
        assert_eq!(best.element.kind, InteractionType::Button);
        // 40 partial type + 450 exact + 25 viewport - 50 corner
        assert_eq!(best.score, 465);
    }

    #[test]
    fn relaxed_falls_back_to_descendant_text() {
        let mut t = page();
        let button = t.append(t.root(), DomNode::element("button").with_rect(100.0, 100.0, 40.0, 40.0));
        t.append(
            button,
            DomNode::element("span")
                .with_text("Menu")
                .with_visibility("hidden")
                .with_rect(100.0, 100.0, 40.0, 40.0),
        );

        assert!(strict(&t, r#"{"text": "menu"}"#).is_none());
        let best = relaxed(&t, r#"{"text": "menu"}"#).unwrap();
        assert_eq!(best.element.text, "menu");
        assert_eq!(best.score, 450 + 25);
    }

    #[test]
    fn unrelated_text_scores_position_only() {
        let mut t = page();
        let root = t.root();
        let go = t.append(root, DomNode::element("button").with_text("Go").with_rect(100.0, 100.0, 60.0, 20.0));
        let spec = TargetSpec::parse(r#"{"text": "search"}"#);
        let weights = ScoringWeights::default();
        assert_eq!(score_node(&t, go, &spec, MatchMode::Strict, &weights), Some(25));
        assert_eq!(score_node(&t, go, &spec, MatchMode::Relaxed, &weights), Some(25));

        // Off screen, nothing is left to make it positive.
        let far = t.append(root, DomNode::element("button").with_text("Go").with_rect(100.0, 2000.0, 60.0, 20.0));
        assert_eq!(score_node(&t, far, &spec, MatchMode::Strict, &weights), None);

        t.append(root, DomNode::element("button").with_text("Search").with_rect(100.0, 300.0, 60.0, 20.0));
        let best = strict(&t, r#"{"text": "search"}"#).unwrap();
        assert_eq!(best.element.text, "search");
        assert_eq!(best.alternatives.len(), 1);
        assert_eq!(best.alternatives[0].score, 25);
    }

    #[test]
    fn corner_and_empty_penalties() {
        let mut t = page();
        let button = t.append(t.root(), DomNode::element("button").with_rect(0.0, 0.0, 40.0, 40.0));
        let spec = TargetSpec::parse(r#"{"type": "button"}"#);
        // 150 + 25 - 50 - 100
        assert_eq!(
            score_node(&t, button, &spec, MatchMode::Strict, &ScoringWeights::default()),
            Some(25)
        );
        let mut weights = ScoringWeights::default();
        weights.corner_size = 0.0;
        assert_eq!(score_node(&t, button, &spec, MatchMode::Strict, &weights), Some(75));
    }

    #[test]
    fn disabled_skipped_unless_asked() {
        let mut t = page();
        t.append(
            t.root(),
            DomNode::element("button").with_text("Pay disabled").disabled().with_rect(100.0, 100.0, 60.0, 20.0),
        );
        assert!(strict(&t, r#"{"text": "pay"}"#).is_none());
        assert!(strict(&t, r#"{"text": "pay disabled"}"#).is_some());
    }

    #[test]
    fn hidden_subtrees_are_not_scored() {
        let mut t = page();
        let hidden = t.append(t.root(), DomNode::element("div").with_display("none").with_rect(0.0, 0.0, 100.0, 100.0));
        t.append(hidden, DomNode::element("button").with_text("Ghost").with_rect(100.0, 100.0, 60.0, 20.0));
        assert!(strict(&t, r#"{"text": "ghost"}"#).is_none());
    }

    #[test]
    fn free_text_matches_type_and_text() {
        let mut t = page();
        let root = t.root();
        t.append(root, DomNode::element("a").with_attr("href", "/login").with_text("Login").with_rect(100.0, 100.0, 60.0, 20.0));
        t.append(root, DomNode::element("button").with_text("Login").with_rect(100.0, 200.0, 60.0, 20.0));

        let best = strict(&t, "login button").unwrap();
        assert_eq!(best.element.kind, InteractionType::Button);
        assert_eq!(best.score, 450 + 25);
    }

    #[test]
    fn alternatives_capped_at_three() {
        let mut t = page();
        let root = t.root();
        for i in 0..6 {
            t.append(
                root,
                DomNode::element("button")
                    .with_text(&format!("Item {}", i))
                    .with_rect(100.0, 100.0 + 40.0 * i as f64, 60.0, 20.0),
            );
        }
        let best = strict(&t, r#"{"type": "button", "text": "item"}"#).unwrap();
        assert_eq!(best.element.text, "item 0");
        assert_eq!(best.alternatives.len(), 3);
        assert_eq!(best.alternatives[0].text, "item 1");
        assert_eq!(best.alternatives[0].selector, "button");
        assert!(best.element.context.xpath.is_some());
    }

    #[test]
    fn no_criteria_no_match() {
        let mut t = page();
        t.append(t.root(), DomNode::element("button").with_text("Go").with_rect(100.0, 100.0, 60.0, 20.0));
        assert!(search(&t, &TargetSpec::default(), MatchMode::Relaxed, &ScoringWeights::default()).is_none());
    }
}
