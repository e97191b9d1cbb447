//! # eoka-locator
//!
//! Page indexing and element resolution for browser agents. Turns a live page
//! into a numbered list of interactive elements, then resolves loose target
//! descriptions (`{"type":"button","text":"submit"}`, `[3][link]Pricing`, or
//! free text) to on-screen coordinates an input primitive can act on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eoka_locator::{EokaHost, PageSession};
//!
//! # #[tokio::main]
//! # async fn main() -> eoka_locator::Result<()> {
//! let browser = eoka::Browser::launch().await?;
//! let page = browser.new_page("https://example.com").await?;
//!
//! let mut session = PageSession::new(EokaHost::new(page));
//!
//! // Analyze → read the `[id][type]text` report → act by id, type or text
//! println!("{}", session.analyze_page().await);
//! let outcome = session.resolve_and_act(r#"{"type":"link","text":"more information"}"#).await;
//! println!("{}", outcome);
//!
//! browser.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod dom;
mod eoka_host;
pub mod host;
pub mod index;
pub mod keyboard;
pub mod matcher;
pub mod session;
pub mod target;
pub mod text;
pub mod viewport;

pub use classify::InteractionType;
pub use config::{LocatorConfig, ReportConfig, ScrollConfig, SearchConfig};
pub use dom::{DomNode, DomTree, NodeId, Rect, Viewport};
pub use eoka_host::EokaHost;
pub use host::{PageHost, SettleConfig};
pub use index::{Geometry, OutlineItem, PageElement, PageIndex};
pub use keyboard::{parse_keys, KeyAction};
pub use matcher::{Alternative, Candidate, MatchMode, ScoringWeights};
pub use session::{
    clean_url, MatchSource, Outcome, PageSession, Resolution, ResolvedElement, ScrollDirection,
};
pub use target::TargetSpec;
pub use viewport::{ActionPoint, Relocation, ViewportCoordinator};

/// Result type for eoka-locator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at the host boundary or while loading configuration.
///
/// Resolution misses are not errors: they come back as [`Resolution::NotFound`]
/// and [`Outcome::NotFound`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
