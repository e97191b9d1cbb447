//! [`PageHost`] over a live `eoka::Page`.

use async_trait::async_trait;
use eoka::Page;
use tracing::debug;

use crate::dom::{Capture, DomTree, Viewport};
use crate::host::PageHost;
use crate::{Error, Result};

/// Walks `<body>` in document order and returns one record per element plus
/// the viewport, as a JSON string.
const CAPTURE_JS: &str = r#"
(() => {
    const SKIP = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE']);
    const nodes = [];

    function directText(el) {
        let t = '';
        for (const c of el.childNodes) {
            if (c.nodeType === 3) t += c.textContent;
        }
        return t;
    }

    function visit(el, parent) {
        if (SKIP.has(el.tagName)) return;
        const r = el.getBoundingClientRect();
        const s = getComputedStyle(el);
        const attrs = [];
        for (const a of el.attributes) attrs.push([a.name.toLowerCase(), a.value]);
        const value = ('value' in el && typeof el.value === 'string') ? el.value : null;
        const idx = nodes.length;
        nodes.push({
            parent: parent,
            tag: el.tagName.toLowerCase(),
            attributes: attrs,
            text: directText(el),
            rect: { x: r.left, y: r.top, width: r.width, height: r.height },
            style: {
                display: s.display,
                visibility: s.visibility,
                opacity: parseFloat(s.opacity),
                cursor: s.cursor,
                z_index: parseInt(s.zIndex) || 0,
            },
            click_handler: typeof el.onclick === 'function',
            disabled: el.disabled === true || el.hasAttribute('disabled')
                || el.getAttribute('aria-disabled') === 'true',
            value: value,
        });
        for (const c of el.children) visit(c, idx);
    }

    visit(document.body, null);
    return JSON.stringify({
        viewport: {
            scroll_x: window.pageXOffset,
            scroll_y: window.pageYOffset,
            width: window.innerWidth || document.documentElement.clientWidth,
            height: window.innerHeight || document.documentElement.clientHeight,
        },
        nodes: nodes,
    });
})()
"#;

const VIEWPORT_JS: &str = r#"
JSON.stringify({
    scroll_x: window.pageXOffset,
    scroll_y: window.pageYOffset,
    width: window.innerWidth || document.documentElement.clientWidth,
    height: window.innerHeight || document.documentElement.clientHeight,
})
"#;

/// Clicks the element under a viewport point; form controls get focus first.
/// Links that would open another tab load in this page instead.
const CLICK_AT_JS: &str = r#"
(() => {
    const el = document.elementFromPoint(__x, __y);
    if (!el) return false;
    const link = el.closest('a[target], area[target]');
    if (link && link.target !== '_self') link.target = '_self';
    const tag = el.tagName.toLowerCase();
    if (tag === 'input' || tag === 'textarea' || tag === 'select') el.focus();
    el.click();
    return true;
})()
"#;

/// Pause after a history step before reading the URL again.
const HISTORY_WAIT_MS: u64 = 1500;

/// Drives an `eoka::Page`.
pub struct EokaHost {
    page: Page,
}

impl EokaHost {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait(?Send)]
impl PageHost for EokaHost {
    async fn capture(&self) -> Result<DomTree> {
        let json: String = self.page.evaluate(CAPTURE_JS).await?;
        let capture: Capture = serde_json::from_str(&json)
            .map_err(|e| Error::Script(format!("capture parse error: {}", e)))?;
        debug!("captured {} nodes", capture.nodes.len());
        DomTree::from_capture(capture)
    }

    async fn viewport(&self) -> Result<Viewport> {
        let json: String = self.page.evaluate(VIEWPORT_JS).await?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn scroll_to(&self, x: f64, y: f64) -> Result<()> {
        self.page
            .execute(&format!("window.scrollTo({}, {})", x.max(0.0), y.max(0.0)))
            .await?;
        Ok(())
    }

    async fn scroll_by(&self, dx: f64, dy: f64) -> Result<()> {
        self.page
            .execute(&format!("window.scrollBy({}, {})", dx, dy))
            .await?;
        Ok(())
    }

    async fn move_pointer(&self, x: f64, y: f64) -> Result<()> {
        let (vx, vy) = self.viewport().await?.to_viewport(x, y);
        self.page
            .session()
            .dispatch_mouse_event(eoka::cdp::MouseEventType::MouseMoved, vx, vy, None, None)
            .await?;
        Ok(())
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        let (vx, vy) = self.viewport().await?.to_viewport(x, y);
        let js = CLICK_AT_JS
            .replace("__x", &vx.to_string())
            .replace("__y", &vy.to_string());
        let clicked: bool = self.page.evaluate(&js).await?;
        if !clicked {
            return Err(Error::Script(format!(
                "no element at ({:.0}, {:.0}) to click",
                x, y
            )));
        }
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.page.human().type_text(text).await?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        if key.len() > 1 && key.contains('+') {
            self.page.press_key(key).await?;
        } else {
            self.page.human().press_key(key).await?;
        }
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn go_back(&self) -> Result<bool> {
        let has_history: bool = self.page.evaluate("window.history.length > 1").await?;
        if !has_history {
            return Ok(false);
        }
        let before = self.page.url().await?;
        self.page.back().await?;
        self.page.wait(HISTORY_WAIT_MS).await;
        if self.page.url().await? == before {
            debug!("history navigation did not change the URL, retrying via script");
            self.page.execute("window.history.back()").await?;
            self.page.wait(HISTORY_WAIT_MS).await;
        }
        Ok(true)
    }

    async fn url(&self) -> Result<String> {
        Ok(self.page.url().await?)
    }
}
