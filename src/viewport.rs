//! Makes a resolved element's coordinates actionable.
//!
//! A centre point recorded at capture time may be off-screen, or may have
//! moved by the time we act (sticky headers, lazy content, smooth scrolling).
//! [`ViewportCoordinator::ensure_actionable`] scrolls, re-locates the element
//! in a fresh capture and corrects once more if it is still clipped.

use serde::Serialize;
use tracing::{debug, warn};

use crate::dom::{DomTree, NodeId};
use crate::host::{PageHost, SettleConfig};
use crate::index::PageElement;
use crate::text::{match_text, normalize};
use crate::Result;

/// How the final coordinates were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relocation {
    /// The recorded centre was already inside the viewport.
    AlreadyVisible,
    /// Scrolled and re-measured. `corrected` is set when a second nudge was
    /// needed to bring the element fully into view.
    Relocated { corrected: bool },
    /// Could not re-locate the element; the recorded centre is used as is.
    Fallback,
}

/// Absolute page coordinates to act on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActionPoint {
    pub x: f64,
    pub y: f64,
    pub relocation: Relocation,
}

impl ActionPoint {
    fn new(x: f64, y: f64, relocation: Relocation) -> Self {
        Self { x, y, relocation }
    }
}

pub struct ViewportCoordinator<'a, H: PageHost> {
    host: &'a H,
    settle: &'a SettleConfig,
}

impl<'a, H: PageHost> ViewportCoordinator<'a, H> {
    pub fn new(host: &'a H, settle: &'a SettleConfig) -> Self {
        Self { host, settle }
    }

    /// Best effort: host errors degrade to the recorded coordinates.
    pub async fn ensure_actionable(&self, element: &PageElement) -> ActionPoint {
        let (x, y) = element.geometry.center();
        match self.relocate(element).await {
            Ok(point) => point,
            Err(e) => {
                warn!("viewport correction failed, using recorded position: {}", e);
                ActionPoint::new(x, y, Relocation::Fallback)
            }
        }
    }

    async fn relocate(&self, element: &PageElement) -> Result<ActionPoint> {
        let (x, y) = element.geometry.center();
        let viewport = self.host.viewport().await?;
        if viewport.contains_point(x, y) {
            return Ok(ActionPoint::new(x, y, Relocation::AlreadyVisible));
        }

        debug!("({:.0}, {:.0}) is off-screen, scrolling to centre it", x, y);
        self.host
            .scroll_to(x - viewport.width / 2.0, y - viewport.height / 2.0)
            .await?;
        self.host.wait_until_stable(self.settle).await?;

        let tree = self.host.capture().await?;
        let Some(found) = find_again(&tree, element, x, y) else {
            warn!(
                "could not re-locate {} '{}' after scrolling, using recorded position",
                element.kind, element.text
            );
            return Ok(ActionPoint::new(x, y, Relocation::Fallback));
        };

        let rect = tree.node(found).rect;
        let (vx, vy) = rect.center();
        let (cx, cy) = tree.viewport().to_page(vx, vy);
        if tree.viewport().encloses(&rect) {
            debug!("re-located at ({:.0}, {:.0})", cx, cy);
            return Ok(ActionPoint::new(cx, cy, Relocation::Relocated { corrected: false }));
        }

        // Still clipped: nudge it to the centre and measure once more.
        let vp = tree.viewport();
        self.host
            .scroll_by(vx - vp.width / 2.0, vy - vp.height / 2.0)
            .await?;
        self.host.wait_until_stable(self.settle).await?;

        let tree = self.host.capture().await?;
        match tree.find_by_tag_text(&element.context.tag, &element.text) {
            Some(node) => {
                let (vx, vy) = tree.node(node).rect.center();
                let (fx, fy) = tree.viewport().to_page(vx, vy);
                debug!("corrected to ({:.0}, {:.0})", fx, fy);
                Ok(ActionPoint::new(fx, fy, Relocation::Relocated { corrected: true }))
            }
            None => Ok(ActionPoint::new(cx, cy, Relocation::Relocated { corrected: false })),
        }
    }
}

/// Find the element again in a fresh capture: by the recorded point, then
/// by selector, then by tag and text.
fn find_again(tree: &DomTree, element: &PageElement, x: f64, y: f64) -> Option<NodeId> {
    let vp = tree.viewport();
    let (vx, vy) = vp.to_viewport(x, y);
    let by_point = (vx >= 0.0 && vx <= vp.width && vy >= 0.0 && vy <= vp.height)
        .then(|| tree.element_at_point(vx, vy))
        .flatten()
        .and_then(|hit| owning_element(tree, hit, element));
    by_point
        .or_else(|| {
            let selector = element.context.selector.as_str();
            (!selector.is_empty())
                .then(|| tree.query_selector(selector))
                .flatten()
        })
        .or_else(|| tree.find_by_tag_text(&element.context.tag, &element.text))
}

/// The hit node or its closest ancestor that still looks like `element`:
/// same tag, and its text contains the recorded text. A point that landed
/// on something else after a layout shift is rejected.
fn owning_element(tree: &DomTree, hit: NodeId, element: &PageElement) -> Option<NodeId> {
    let wanted = normalize(&element.text);
    let mut current = Some(hit);
    while let Some(id) = current {
        if tree.node(id).tag == element.context.tag {
            let text = match_text(tree, id);
            return (wanted.is_empty() || text.contains(&wanted)).then_some(id);
        }
        current = tree.parent(id);
    }
    None
}
