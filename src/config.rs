//! YAML configuration for indexing, scoring and pacing.
//!
//! Every field has a default, so an empty document is a valid config:
//!
//! ```yaml
//! scoring:
//!   text_exact: 500
//! settle:
//!   timeout_ms: 2000
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::host::SettleConfig;
use crate::matcher::ScoringWeights;
use crate::{Error, Result};

/// Top-level config structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocatorConfig {
    /// Scoring constants for the fuzzy search.
    pub scoring: ScoringWeights,

    /// Layout-settle polling after scrolls and pointer moves.
    pub settle: SettleConfig,

    /// Line coalescing for the analysis report.
    pub report: ReportConfig,

    /// Scroll increments.
    pub scroll: ScrollConfig,

    /// Where `search_for` goes when the page has no search box.
    pub search: SearchConfig,
}

impl LocatorConfig {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse config from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: LocatorConfig = if yaml.trim().is_empty() {
            LocatorConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the config.
    fn validate(&self) -> Result<()> {
        if self.settle.stable_frames == 0 {
            return Err(Error::Config("settle.stable_frames must be at least 1".into()));
        }
        if self.settle.timeout_ms < self.settle.interval_ms {
            return Err(Error::Config(
                "settle.timeout_ms must not be shorter than settle.interval_ms".into(),
            ));
        }
        if self.report.fragment_max == 0 || self.report.line_max < self.report.fragment_max {
            return Err(Error::Config(
                "report: need 0 < fragment_max <= line_max".into(),
            ));
        }
        if !(self.scroll.page_fraction > 0.0 && self.scroll.page_fraction <= 1.5) {
            return Err(Error::Config(
                "scroll.page_fraction must be in (0, 1.5]".into(),
            ));
        }
        if !self.search.engine_url.starts_with("http://")
            && !self.search.engine_url.starts_with("https://")
        {
            return Err(Error::Config(
                "search.engine_url must be an http(s) URL".into(),
            ));
        }
        if self.scoring.corner_size < 0.0 {
            return Err(Error::Config("scoring.corner_size must not be negative".into()));
        }
        Ok(())
    }
}

/// Report line coalescing thresholds, in characters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Fragments shorter than this may join the current line.
    pub fragment_max: usize,
    /// A joined line stays shorter than this.
    pub line_max: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            fragment_max: 30,
            line_max: 80,
        }
    }
}

/// Scroll behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// One page increment as a fraction of the viewport height.
    pub page_fraction: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self { page_fraction: 0.8 }
    }
}

/// Search fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page whose search box is used when the current page has none.
    pub engine_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engine_url: "https://www.google.com".into(),
        }
    }
}
