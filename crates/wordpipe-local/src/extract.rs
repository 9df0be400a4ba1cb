//! Article text extraction from HTML.
//!
//! Non-content elements are detached from the parsed tree first, then an ordered
//! chain of [`ExtractStrategy`] tiers is tried; the first tier with any text wins.

use html_scraper::{ElementRef, Html, Selector};
use tracing::debug;
use wordpipe_core::{Error, ExtractTier, ExtractedText, Result};

/// Elements whose text never counts as article content.
pub const NON_CONTENT_SELECTOR: &str =
    "script, style, nav, footer, aside, header, noscript, template";

/// One extraction tier: "try this document, return text or nothing".
pub trait ExtractStrategy: Send + Sync {
    fn tier(&self) -> ExtractTier;
    fn extract(&self, doc: &Html) -> Option<String>;
}

/// Strategy backed by a CSS selector plus an element filter.
#[derive(Clone, Copy)]
pub struct SelectorStrategy {
    tier: ExtractTier,
    selector: &'static str,
    accept: fn(&ElementRef<'_>) -> bool,
}

impl SelectorStrategy {
    /// Tier 1: elements explicitly marked as articles.
    pub fn article() -> Self {
        Self {
            tier: ExtractTier::Article,
            selector: "article",
            accept: |_| true,
        }
    }

    /// Tier 2: `div`s whose class mentions "content" or "article".
    pub fn content_container() -> Self {
        Self {
            tier: ExtractTier::ContentContainer,
            selector: "div[class]",
            accept: class_looks_like_content,
        }
    }

    /// Tier 3: every paragraph.
    pub fn paragraph() -> Self {
        Self {
            tier: ExtractTier::Paragraph,
            selector: "p",
            accept: |_| true,
        }
    }
}

fn class_looks_like_content(el: &ElementRef<'_>) -> bool {
    el.value().attr("class").is_some_and(|c| {
        let c = c.to_lowercase();
        c.contains("content") || c.contains("article")
    })
}

impl ExtractStrategy for SelectorStrategy {
    fn tier(&self) -> ExtractTier {
        self.tier
    }

    fn extract(&self, doc: &Html) -> Option<String> {
        let sel = Selector::parse(self.selector).ok()?;
        // `Html::select` also visits detached nodes; start from the root instead.
        let mut parts: Vec<String> = Vec::new();
        for el in doc.root_element().select(&sel).filter(|el| (self.accept)(el)) {
            let text = el.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }
        let joined = parts.join("\n");
        (!joined.is_empty()).then_some(joined)
    }
}

/// Detach script/style/navigation chrome so its text cannot leak into any tier.
pub fn prune_non_content(doc: &mut Html) {
    let Ok(sel) = Selector::parse(NON_CONTENT_SELECTOR) else {
        return;
    };
    let ids: Vec<_> = doc.root_element().select(&sel).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

pub struct Extractor {
    strategies: Vec<Box<dyn ExtractStrategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(SelectorStrategy::article()),
            Box::new(SelectorStrategy::content_container()),
            Box::new(SelectorStrategy::paragraph()),
        ])
    }
}

impl Extractor {
    pub fn new(strategies: Vec<Box<dyn ExtractStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn extract(&self, html: &str) -> Result<ExtractedText> {
        let mut doc = Html::parse_document(html);
        prune_non_content(&mut doc);

        let mut tried: Vec<&'static str> = Vec::new();
        for s in &self.strategies {
            tried.push(s.tier().as_str());
            if let Some(text) = s.extract(&doc) {
                debug!(tier = %s.tier(), chars = text.chars().count(), "extracted article text");
                return Ok(ExtractedText {
                    tier: s.tier(),
                    text,
                });
            }
        }
        Err(Error::Extraction {
            tried: tried.join(", "),
        })
    }
}

/// Extract with the default tier chain (article → content container → paragraph).
pub fn extract_article(html: &str) -> Result<ExtractedText> {
    Extractor::default().extract(html)
}
