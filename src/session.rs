//! Page session - owns the host and the last snapshot.
//!
//! The core loop is: [`PageSession::analyze_page`] → read the `[id][type]text`
//! report → [`PageSession::resolve_and_act`] with an id, a type/text query or
//! free text. Ids refer to the most recent snapshot only; navigating drops it.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::{classify, is_visible, InteractionType};
use crate::config::LocatorConfig;
use crate::dom::{DomTree, NodeId};
use crate::host::PageHost;
use crate::index::{is_disabled, PageElement, PageIndex};
use crate::keyboard::{parse_keys, KeyAction};
use crate::matcher::{search, Alternative, Candidate, MatchMode};
use crate::target::TargetSpec;
use crate::text::{display_text, match_text};
use crate::viewport::{ActionPoint, Relocation, ViewportCoordinator};
use crate::{Error, Result};

/// Where a page's search box usually is, most specific first.
const SEARCH_BOX_SELECTORS: &[&str] = &[
    r#"input[type="search"]"#,
    r#"input[name="q"]"#,
    r#"textarea[name="q"]"#,
    r#"[role="searchbox"]"#,
    r#"[aria-label="Search"]"#,
];

/// Where a resolved element came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum MatchSource {
    /// Looked up by id in snapshot `generation`.
    Direct { generation: u64 },
    /// Scored search over a fresh capture.
    Search {
        mode: MatchMode,
        score: i64,
        alternatives: Vec<Alternative>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedElement {
    pub element: PageElement,
    pub source: MatchSource,
    /// A page scroll happened before the match (relaxed retry).
    pub scrolled: bool,
}

impl ResolvedElement {
    fn from_candidate(candidate: Candidate, mode: MatchMode, scrolled: bool) -> Self {
        Self {
            element: candidate.element,
            source: MatchSource::Search {
                mode,
                score: candidate.score,
                alternatives: candidate.alternatives,
            },
            scrolled,
        }
    }

    pub fn score(&self) -> Option<i64> {
        match &self.source {
            MatchSource::Direct { .. } => None,
            MatchSource::Search { score, .. } => Some(*score),
        }
    }
}

/// Result of resolving a target without acting on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Found(ResolvedElement),
    NotFound {
        spec: TargetSpec,
        raw: String,
        scrolled: bool,
    },
}

impl Resolution {
    pub fn found(&self) -> Option<&ResolvedElement> {
        match self {
            Resolution::Found(r) => Some(r),
            Resolution::NotFound { .. } => None,
        }
    }
}

/// Result of [`PageSession::resolve_and_act`]. Its `Display` is the message
/// handed back to the calling agent.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Acted {
        element: PageElement,
        point: ActionPoint,
    },
    NotFound {
        spec: TargetSpec,
        raw: String,
    },
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Acted { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Acted { element, .. } => write!(
                f,
                "Clicked on element: {} with text '{}'",
                element.kind, element.text
            ),
            Outcome::NotFound { spec, raw } => {
                if spec.structured {
                    write!(
                        f,
                        "No elements matching {} found, even after scrolling.",
                        spec.criteria()
                    )
                } else {
                    write!(f, "No elements matching '{}' found, even after scrolling.", raw)
                }
            }
            Outcome::Failed(e) => write!(f, "Error clicking on element: {}", e),
        }
    }
}

/// Page scroll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

impl ScrollDirection {
    /// Lenient parse: quotes and case are ignored, anything unknown scrolls down.
    pub fn parse(s: &str) -> Self {
        match s.trim().trim_matches(|c| c == '\'' || c == '"').trim().to_lowercase().as_str() {
            "up" => ScrollDirection::Up,
            "top" => ScrollDirection::Top,
            "bottom" => ScrollDirection::Bottom,
            _ => ScrollDirection::Down,
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Top => "top",
            ScrollDirection::Bottom => "bottom",
        })
    }
}

/// One page's worth of state: the host plus the last snapshot.
pub struct PageSession<H: PageHost> {
    host: H,
    index: Option<PageIndex>,
    generation: u64,
    config: LocatorConfig,
}

impl<H: PageHost> PageSession<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, LocatorConfig::default())
    }

    pub fn with_config(host: H, config: LocatorConfig) -> Self {
        Self {
            host,
            index: None,
            generation: 0,
            config,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// The last snapshot, if any.
    pub fn index(&self) -> Option<&PageIndex> {
        self.index.as_ref()
    }

    /// Number of snapshots taken so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop the snapshot. Call after navigating.
    pub fn invalidate(&mut self) {
        if self.index.take().is_some() {
            debug!("snapshot {} invalidated", self.generation);
        }
    }

    /// Capture and index the page, replacing the previous snapshot. On error
    /// the previous snapshot is left untouched.
    pub async fn snapshot(&mut self) -> Result<&PageIndex> {
        let tree = self.host.capture().await?;
        let index = PageIndex::build(&tree);
        self.generation += 1;
        info!(
            "snapshot {}: {} elements, {} outline items",
            self.generation,
            index.len(),
            index.outline.len()
        );
        Ok(self.index.insert(index))
    }

    /// Take a snapshot and render the report. Never fails: errors come back
    /// as the message text.
    pub async fn analyze_page(&mut self) -> String {
        let report = self.config.report.clone();
        match self.snapshot().await {
            Ok(index) => index.report(&report),
            Err(e) => {
                warn!("analyze_page failed: {}", e);
                format!("Error analyzing page: {}", e)
            }
        }
    }

    /// Resolve a target without acting on it.
    ///
    /// Direct id lookup against the snapshot first, then a strict search of a
    /// fresh capture, then one page scroll and a relaxed search.
    pub async fn resolve(&self, raw: &str) -> Result<Resolution> {
        let spec = TargetSpec::parse(raw);
        debug!("resolving {}", spec);

        if let Some(id) = &spec.id {
            let len = self.index.as_ref().map_or(0, PageIndex::len);
            match (self.index.as_ref(), spec.index(len)) {
                (Some(index), Some(i)) => {
                    if let Some(element) = index.get(i) {
                        info!("direct hit: {}", element);
                        return Ok(Resolution::Found(ResolvedElement {
                            element: element.clone(),
                            source: MatchSource::Direct {
                                generation: self.generation,
                            },
                            scrolled: false,
                        }));
                    }
                }
                _ => warn!(
                    "id {} not in snapshot {} ({} elements), searching instead",
                    id, self.generation, len
                ),
            }
        }

        let weights = &self.config.scoring;
        let tree = self.host.capture().await?;
        if let Some(candidate) = search(&tree, &spec, MatchMode::Strict, weights) {
            info!(
                "matched {} '{}' (score {})",
                candidate.element.kind, candidate.element.text, candidate.score
            );
            return Ok(Resolution::Found(ResolvedElement::from_candidate(
                candidate,
                MatchMode::Strict,
                false,
            )));
        }

        info!("no match for {}, scrolling and retrying relaxed", spec);
        self.scroll(ScrollDirection::Down).await?;
        self.host.wait_until_stable(&self.config.settle).await?;

        let tree = self.host.capture().await?;
        if let Some(candidate) = search(&tree, &spec, MatchMode::Relaxed, weights) {
            info!(
                "relaxed match {} '{}' (score {})",
                candidate.element.kind, candidate.element.text, candidate.score
            );
            return Ok(Resolution::Found(ResolvedElement::from_candidate(
                candidate,
                MatchMode::Relaxed,
                true,
            )));
        }

        info!("nothing matches {}", spec);
        Ok(Resolution::NotFound {
            spec,
            raw: raw.to_string(),
            scrolled: true,
        })
    }

    /// Resolve a target and click it. Never fails: errors come back as
    /// [`Outcome::Failed`].
    pub async fn resolve_and_act(&self, raw: &str) -> Outcome {
        let resolved = match self.resolve(raw).await {
            Ok(Resolution::Found(resolved)) => resolved,
            Ok(Resolution::NotFound { spec, raw, .. }) => return Outcome::NotFound { spec, raw },
            Err(e) => {
                warn!("resolution failed: {}", e);
                return Outcome::Failed(e.to_string());
            }
        };

        match self.act(&resolved.element).await {
            Ok(point) => {
                info!(
                    "clicked {} '{}' at ({:.0}, {:.0})",
                    resolved.element.kind, resolved.element.text, point.x, point.y
                );
                Outcome::Acted {
                    element: resolved.element,
                    point,
                }
            }
            Err(e) => {
                warn!("click failed: {}", e);
                Outcome::Failed(e.to_string())
            }
        }
    }

    async fn act(&self, element: &PageElement) -> Result<ActionPoint> {
        let point = ViewportCoordinator::new(&self.host, &self.config.settle)
            .ensure_actionable(element)
            .await;
        if point.relocation == Relocation::Fallback {
            debug!("acting on recorded coordinates");
        }
        self.host.move_pointer(point.x, point.y).await?;
        self.host.wait_until_stable(&self.config.settle).await?;
        self.host.click_at(point.x, point.y).await?;
        Ok(point)
    }

    /// Type text or press keys in the focused element; see
    /// [`parse_keys`] for the accepted forms. Returns a summary of what was
    /// sent.
    pub async fn keyboard_action(&self, input: &str) -> Result<String> {
        let actions = parse_keys(input);
        if actions.is_empty() {
            return Ok("Nothing to type".into());
        }
        for (i, action) in actions.iter().enumerate() {
            if i > 0 {
                self.host.wait_until_stable(&self.config.settle).await?;
            }
            debug!("keyboard: {:?}", action);
            if let KeyAction::Type(text) = action {
                self.host.type_text(text).await?;
            } else if let Some(combo) = action.combo() {
                self.host.press_key(&combo).await?;
            }
        }

        let steps: Vec<String> = actions.iter().map(ToString::to_string).collect();
        Ok(match steps.as_slice() {
            [single] => single.clone(),
            _ => format!("Executed key sequence: {}", steps.join(" → ")),
        })
    }

    /// Load `url` (tidied by [`clean_url`]) and drop the snapshot.
    pub async fn navigate(&mut self, url: &str) -> Result<String> {
        let url = clean_url(url);
        info!("navigating to {}", url);
        self.invalidate();
        self.host.navigate(&url).await?;

        let current = self.host.url().await?;
        if !current.starts_with("http") || current.contains("about:blank") {
            return Err(Error::Navigation(format!("{} ended at '{}'", url, current)));
        }
        Ok(format!("Navigated to {} - Current page: {}", url, current))
    }

    /// Step back in history. The snapshot is dropped when there was somewhere
    /// to go back to.
    pub async fn go_back(&mut self) -> Result<String> {
        let before = self.host.url().await?;
        if !self.host.go_back().await? {
            return Ok("Cannot go back - no previous page in history".into());
        }
        self.invalidate();
        self.host.wait_until_stable(&self.config.settle).await?;

        let after = self.host.url().await?;
        if after == before {
            warn!("back navigation left the URL at {}", after);
            return Ok("Back navigation attempted but URL remains unchanged".into());
        }
        info!("went back to {}", after);
        Ok(format!("Navigated back to previous page: {}", after))
    }

    /// Search for `query` with the page's own search box, or with the one on
    /// `search.engine_url` when the page has none: click it, replace its
    /// contents, press Enter. The snapshot is dropped.
    pub async fn search_for(&mut self, query: &str) -> Result<String> {
        let query = query.trim();
        let tree = self.host.capture().await?;
        let (search_box, via) = match find_search_box(&tree) {
            Some(found) => (found, None),
            None => {
                let engine = self.config.search.engine_url.clone();
                info!("no search box here, searching on {}", engine);
                self.navigate(&engine).await?;
                self.host.wait_until_stable(&self.config.settle).await?;
                let tree = self.host.capture().await?;
                match find_search_box(&tree) {
                    Some(found) => (found, Some(engine)),
                    None => return Ok(format!("Could not find a search box on {}", engine)),
                }
            }
        };

        debug!("search box: {}", search_box.context.selector);
        self.act(&search_box).await?;
        self.host.press_key("Control+a").await?;
        self.host.press_key("Delete").await?;
        self.host.type_text(query).await?;
        self.host.press_key("Enter").await?;
        self.invalidate();
        self.host.wait_until_stable(&self.config.settle).await?;

        Ok(match via {
            Some(engine) => format!("Navigated to {} and searched for '{}'", engine, query),
            None => format!("Searched for '{}'", query),
        })
    }

    /// Scroll the page. One step is `scroll.page_fraction` of the viewport height.
    pub async fn scroll(&self, direction: ScrollDirection) -> Result<()> {
        let viewport = self.host.viewport().await?;
        let step = viewport.height * self.config.scroll.page_fraction;
        debug!("scroll {} ({:.0}px step)", direction, step);
        match direction {
            ScrollDirection::Up => self.host.scroll_by(0.0, -step).await,
            ScrollDirection::Down => self.host.scroll_by(0.0, step).await,
            ScrollDirection::Top => self.host.scroll_to(viewport.scroll_x, 0.0).await,
            ScrollDirection::Bottom => {
                let tree = self.host.capture().await?;
                let body = tree.node(tree.root()).rect;
                let (_, page_bottom) = tree.viewport().to_page(0.0, body.bottom());
                self.host
                    .scroll_to(viewport.scroll_x, (page_bottom - viewport.height).max(0.0))
                    .await
            }
        }
    }
}

/// Tidy an agent-supplied URL: backticks and surrounding whitespace go, a
/// doubled scheme keeps only its last occurrence, and a missing scheme
/// becomes `https://`.
pub fn clean_url(raw: &str) -> String {
    let url = raw.replace('`', "");
    let mut url = url.trim();
    if url.matches("http").count() > 1 {
        if let Some(last) = [url.rfind("http://"), url.rfind("https://")]
            .into_iter()
            .flatten()
            .max()
        {
            url = &url[last..];
        }
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// First usable search input: a well-known selector, else any text input
/// whose label mentions search.
fn find_search_box(tree: &DomTree) -> Option<PageElement> {
    let usable = |id: NodeId| {
        let node = tree.node(id);
        is_visible(node) && !is_disabled(node)
    };
    let id = SEARCH_BOX_SELECTORS
        .iter()
        .filter_map(|selector| tree.query_selector(selector))
        .find(|&id| usable(id))
        .or_else(|| {
            tree.document_order().into_iter().find(|&id| {
                usable(id)
                    && classify(tree, id) == Some(InteractionType::Input)
                    && match_text(tree, id).contains("search")
            })
        })?;
    let kind = classify(tree, id).unwrap_or(InteractionType::Input);
    let text = display_text(tree, id, kind).unwrap_or_default();
    Some(PageElement::from_node(tree, id, id.index(), kind, text, false))
}
