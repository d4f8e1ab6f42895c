//! Page extractors and site dispatch
//!
//! # Dispatch
//! The registry holds handlers in registration order and hands out the first
//! one whose URL predicate matches. A URL no handler matches is a skip, not
//! an error.
//!
//! # Handlers
//! - **metrolyrics** - `#lyrics-body-text` paragraphs
//! - **lyricscom** - `#lyrics`
//! - **lyricsmode** - `#lyrics_text`
//! - **azlyrics** - first unclassed `div` after `.lyricsh`
//!
//! Handlers are stateless and shared across workers behind `Arc`.

pub mod sites;

pub use sites::Site;

use crate::error::{HarvestError, Result};
use std::sync::Arc;
use tracing::warn;

/// Site-specific page extractor
pub trait PageExtractor: Send + Sync {
    /// Stable handler name used in logs and config
    fn name(&self) -> &str;

    /// Whether this handler can parse pages at `url`
    fn matches(&self, url: &str) -> bool;

    /// Raw lyrics text from a page, or None when the content region is
    /// absent or empty
    fn extract(&self, html: &str) -> Option<String>;
}

/// Ordered set of page extractors
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    handlers: Vec<Arc<dyn PageExtractor>>,
}

impl ExtractorRegistry {
    /// Registry with no handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in sites by config name, in the given order
    pub fn from_site_names(names: &[String]) -> Result<Self> {
        let mut registry = Self::new();
        let mut enabled: Vec<Site> = Vec::new();
        for name in names {
            let site: Site = name.parse().map_err(HarvestError::Config)?;
            if enabled.contains(&site) {
                warn!(site = %site, "Site listed twice - ignoring repeat");
                continue;
            }
            enabled.push(site);
            registry.register(Arc::new(site));
        }
        if registry.is_empty() {
            warn!("No extraction sites enabled; every track will be skipped");
        }
        Ok(registry)
    }

    pub fn register(&mut self, handler: Arc<dyn PageExtractor>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    /// First registered handler matching `url`
    pub fn select(&self, url: &str) -> Option<&Arc<dyn PageExtractor>> {
        self.handlers.iter().find(|h| h.matches(url))
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
