//! The boundary to the browser: everything the locator needs from a page.
//!
//! One call at a time, each blocking until the page answers. Coordinates
//! crossing this boundary are absolute page coordinates (scroll offset
//! included); hosts convert to viewport space where their primitives need it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::dom::{DomTree, Viewport};
use crate::Result;

/// How to decide that the page has stopped moving.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Delay between polls.
    pub interval_ms: u64,
    /// Consecutive identical readings that count as settled.
    pub stable_frames: u32,
    /// Give up (and proceed) after this long.
    pub timeout_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            stable_frames: 3,
            timeout_ms: 1000,
        }
    }
}

/// Scripting capability of a page.
#[async_trait(?Send)]
pub trait PageHost {
    /// Capture the DOM under `<body>` with geometry and computed style.
    async fn capture(&self) -> Result<DomTree>;

    /// Current scroll offset and viewport size.
    async fn viewport(&self) -> Result<Viewport>;

    /// Scroll so the viewport's top-left corner sits at (`x`, `y`).
    async fn scroll_to(&self, x: f64, y: f64) -> Result<()>;

    /// Scroll by a delta.
    async fn scroll_by(&self, dx: f64, dy: f64) -> Result<()>;

    /// Move the pointer to a page point.
    async fn move_pointer(&self, x: f64, y: f64) -> Result<()>;

    /// Click whatever is at a page point.
    async fn click_at(&self, x: f64, y: f64) -> Result<()>;

    /// Type text into the focused element.
    async fn type_text(&self, text: &str) -> Result<()>;

    /// Press a key or `+`-joined combination (`Enter`, `Control+a`, `Shift+Tab`).
    async fn press_key(&self, key: &str) -> Result<()>;

    /// Load `url` in this page and wait for it.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Step back one history entry. `false` when there is none.
    async fn go_back(&self) -> Result<bool>;

    /// Address of the current document.
    async fn url(&self) -> Result<String>;

    /// Block until the viewport reports the same geometry for
    /// `stable_frames` consecutive polls. Returns `false` on timeout, which
    /// callers treat as "settled enough".
    async fn wait_until_stable(&self, settle: &SettleConfig) -> Result<bool> {
        let start = Instant::now();
        let timeout = Duration::from_millis(settle.timeout_ms);
        let interval = Duration::from_millis(settle.interval_ms);
        let mut last = self.viewport().await?;
        let mut stable = 0;
        loop {
            if stable >= settle.stable_frames {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                debug!("page did not settle within {}ms", settle.timeout_ms);
                return Ok(false);
            }
            tokio::time::sleep(interval).await;
            let now = self.viewport().await?;
            if now == last {
                stable += 1;
            } else {
                stable = 0;
                last = now;
            }
        }
    }
}
