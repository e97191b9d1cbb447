//! In-memory page host for resolution tests.
//!
//! The page is laid out once in absolute page coordinates. Captures translate
//! it by the current scroll offset, scrolls clamp to the document, and clicks
//! are hit-tested and recorded. Other pages can be registered by URL; keys,
//! typed text and history moves are recorded too.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use eoka_locator::{
    DomNode, DomTree, Error, LocatorConfig, NodeId, PageHost, Result, SettleConfig, Viewport,
};

/// Address of the page built with [`FakeHost::new`].
pub const HOME_URL: &str = "https://shop.test/";

/// A recorded click.
#[derive(Debug, Clone)]
pub struct Click {
    pub x: f64,
    pub y: f64,
    /// Viewport at the time of the click.
    pub viewport: Viewport,
    /// Tag and `id` attribute of the node that received it.
    pub tag: String,
    pub dom_id: Option<String>,
}

#[derive(Default)]
struct State {
    url: String,
    history: Vec<String>,
    scroll_x: f64,
    scroll_y: f64,
    /// Added to every node's page `y` (content inserted above).
    shift: f64,
    /// Applied on the next scroll, then cleared.
    pending_shift: Option<f64>,
    fail_capture: bool,
    captures: usize,
    scrolls: usize,
    pointer: Vec<(f64, f64)>,
    clicks: Vec<Click>,
    typed: Vec<String>,
    keys: Vec<String>,
}

pub struct FakeHost {
    layout: DomTree,
    pages: HashMap<String, DomTree>,
    width: f64,
    height: f64,
    state: Mutex<State>,
}

impl FakeHost {
    /// A `width` x `height` viewport over a body `doc_height` tall.
    pub fn new(width: f64, height: f64, doc_height: f64) -> Self {
        Self {
            layout: DomTree::new(
                Viewport::new(0.0, 0.0, width, height),
                DomNode::element("body").with_rect(0.0, 0.0, width, doc_height),
            ),
            pages: HashMap::new(),
            width,
            height,
            state: Mutex::new(State {
                url: HOME_URL.to_string(),
                ..State::default()
            }),
        }
    }

    /// Serve `page`'s layout at `url`. Unknown URLs show the home layout.
    pub fn add_page(&mut self, url: &str, page: FakeHost) {
        self.pages.insert(url.to_string(), page.layout);
    }

    pub fn root(&self) -> NodeId {
        self.layout.root()
    }

    /// Append under `<body>`; rect in page coordinates.
    pub fn add(&mut self, node: DomNode) -> NodeId {
        let root = self.layout.root();
        self.layout.append(root, node)
    }

    pub fn add_child(&mut self, parent: NodeId, node: DomNode) -> NodeId {
        self.layout.append(parent, node)
    }

    pub fn button(&mut self, text: &str, x: f64, y: f64) -> NodeId {
        self.add(DomNode::element("button").with_text(text).with_rect(x, y, 120.0, 40.0))
    }

    pub fn link(&mut self, text: &str, x: f64, y: f64) -> NodeId {
        self.add(
            DomNode::element("a")
                .with_attr("href", "#")
                .with_text(text)
                .with_rect(x, y, 120.0, 20.0),
        )
    }

    /// Shift all content down by `dy` on the next scroll.
    pub fn shift_on_next_scroll(&self, dy: f64) {
        self.state.lock().unwrap().pending_shift = Some(dy);
    }

    pub fn fail_captures(&self, fail: bool) {
        self.state.lock().unwrap().fail_capture = fail;
    }

    pub fn set_scroll(&self, x: f64, y: f64) {
        let mut state = self.state.lock().unwrap();
        state.scroll_x = x;
        state.scroll_y = y;
    }

    pub fn scroll_y(&self) -> f64 {
        self.state.lock().unwrap().scroll_y
    }

    pub fn scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls
    }

    pub fn captures(&self) -> usize {
        self.state.lock().unwrap().captures
    }

    pub fn clicks(&self) -> Vec<Click> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn pointer_moves(&self) -> Vec<(f64, f64)> {
        self.state.lock().unwrap().pointer.clone()
    }

    pub fn typed(&self) -> Vec<String> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().unwrap().keys.clone()
    }

    pub fn current_url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    fn layout(&self, state: &State) -> &DomTree {
        self.pages.get(&state.url).unwrap_or(&self.layout)
    }

    fn doc_height(&self, state: &State) -> f64 {
        let layout = self.layout(state);
        layout.node(layout.root()).rect.height
    }

    /// Show `url` from the top, as a fresh load would.
    fn load(state: &mut State, url: String) {
        state.url = url;
        state.scroll_x = 0.0;
        state.scroll_y = 0.0;
        state.shift = 0.0;
        state.pending_shift = None;
    }

    fn current_viewport(state: &State, width: f64, height: f64) -> Viewport {
        Viewport::new(state.scroll_x, state.scroll_y, width, height)
    }

    fn apply_scroll(&self, state: &mut State, x: f64, y: f64) {
        let max_y = (self.doc_height(state) - self.height).max(0.0);
        state.scroll_x = x.max(0.0);
        state.scroll_y = y.clamp(0.0, max_y);
        state.scrolls += 1;
        if let Some(dy) = state.pending_shift.take() {
            state.shift += dy;
        }
    }

    /// The layout as seen through the current viewport.
    fn render(&self, state: &State) -> DomTree {
        let viewport = Self::current_viewport(state, self.width, self.height);
        let mut tree = self.layout(state).clone();
        tree.set_viewport(viewport);
        let root = tree.root();
        for id in tree.document_order() {
            let shift = if id == root { 0.0 } else { state.shift };
            let rect = &mut tree.node_mut(id).rect;
            rect.x -= state.scroll_x;
            rect.y += shift - state.scroll_y;
        }
        tree
    }
}

#[async_trait(?Send)]
impl PageHost for FakeHost {
    async fn capture(&self) -> Result<DomTree> {
        let mut state = self.state.lock().unwrap();
        if state.fail_capture {
            return Err(Error::Script("Execution context was destroyed".into()));
        }
        state.captures += 1;
        Ok(self.render(&state))
    }

    async fn viewport(&self) -> Result<Viewport> {
        let state = self.state.lock().unwrap();
        Ok(Self::current_viewport(&state, self.width, self.height))
    }

    async fn scroll_to(&self, x: f64, y: f64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.apply_scroll(&mut state, x, y);
        Ok(())
    }

    async fn scroll_by(&self, dx: f64, dy: f64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let (x, y) = (state.scroll_x + dx, state.scroll_y + dy);
        self.apply_scroll(&mut state, x, y);
        Ok(())
    }

    async fn move_pointer(&self, x: f64, y: f64) -> Result<()> {
        self.state.lock().unwrap().pointer.push((x, y));
        Ok(())
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let tree = self.render(&state);
        let viewport = *tree.viewport();
        let (vx, vy) = viewport.to_viewport(x, y);
        let hit = tree
            .element_at_point(vx, vy)
            .ok_or_else(|| Error::Script(format!("no element at ({}, {})", x, y)))?;
        let node = tree.node(hit);
        state.clicks.push(Click {
            x,
            y,
            viewport,
            tag: node.tag.clone(),
            dom_id: node.dom_id().map(String::from),
        });
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.state.lock().unwrap().typed.push(text.to_string());
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.state.lock().unwrap().keys.push(key.to_string());
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let previous = std::mem::take(&mut state.url);
        state.history.push(previous);
        Self::load(&mut state, url.to_string());
        Ok(())
    }

    async fn go_back(&self) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.history.pop() {
            Some(url) => {
                Self::load(&mut state, url);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }
}

/// Config with settle polling fast enough for tests.
pub fn fast_config() -> LocatorConfig {
    LocatorConfig {
        settle: SettleConfig {
            interval_ms: 1,
            stable_frames: 1,
            timeout_ms: 50,
        },
        ..LocatorConfig::default()
    }
}
