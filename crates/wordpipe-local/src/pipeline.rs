//! fetch → extract → clean → tokenize → aggregate, then filter/rank.
//!
//! The expensive half ([`Analyzer::analyze`]) yields an [`Analysis`] holding the
//! frequency table; the cheap half ([`Analysis::report`]) can be re-run on it with
//! different thresholds without fetching or segmenting again.

use crate::clean::clean;
use crate::extract::Extractor;
use crate::rank::rank;
use crate::stopwords::Stopwords;
use crate::tokenize::Tokenizer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use wordpipe_core::{
    ChartKind, Document, ExtractTier, FetchBackend, FetchRequest, FrequencyTable, MinFreq,
    Result, Segmenter, TermCount, COMPACT_TOP, DISPLAY_TOP,
};

/// Result of the expensive stage for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub url: String,
    pub final_url: String,
    pub encoding: String,
    pub tier: ExtractTier,
    /// Characters of extracted article text, before cleaning.
    pub extracted_chars: usize,
    pub normalized_chars: usize,
    /// Valid tokens (length of the filtered token stream).
    pub token_count: usize,
    pub segmenter: String,
    pub stopwords_fingerprint: String,
    pub table: FrequencyTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSlice {
    pub kind: ChartKind,
    pub items: Vec<TermCount>,
}

/// What the visualization side receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub url: String,
    pub final_url: String,
    pub tier: ExtractTier,
    pub encoding: String,
    pub min_freq: MinFreq,
    pub extracted_chars: usize,
    pub token_count: usize,
    pub unique_tokens: usize,
    /// Terms meeting `min_freq` before truncation.
    pub retained: usize,
    /// Up to `DISPLAY_TOP` terms.
    pub top: Vec<TermCount>,
    /// Up to `COMPACT_TOP` terms, for charts that cannot render more.
    pub compact: Vec<TermCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSlice>,
}

impl Analysis {
    pub fn unique_tokens(&self) -> usize {
        self.table.len()
    }

    pub fn report(&self, min_freq: MinFreq, chart: Option<ChartKind>) -> Result<Report> {
        let ranked = rank(&self.table, min_freq, DISPLAY_TOP)?;
        let chart = chart.map(|kind| ChartSlice {
            kind,
            items: ranked.head(kind.limit()).to_vec(),
        });
        Ok(Report {
            url: self.url.clone(),
            final_url: self.final_url.clone(),
            tier: self.tier,
            encoding: self.encoding.clone(),
            min_freq,
            extracted_chars: self.extracted_chars,
            token_count: self.token_count,
            unique_tokens: self.unique_tokens(),
            retained: ranked.retained,
            compact: ranked.head(COMPACT_TOP).to_vec(),
            top: ranked.items,
            chart,
        })
    }
}

pub struct Analyzer {
    fetcher: Arc<dyn FetchBackend>,
    extractor: Extractor,
    tokenizer: Tokenizer,
    stopwords: Arc<Stopwords>,
}

impl Analyzer {
    /// `stopwords` must be fully loaded; it is shared read-only from here on.
    pub fn new(
        fetcher: Arc<dyn FetchBackend>,
        segmenter: Arc<dyn Segmenter>,
        stopwords: Arc<Stopwords>,
    ) -> Self {
        Self {
            fetcher,
            extractor: Extractor::default(),
            tokenizer: Tokenizer::new(segmenter, stopwords.clone()),
            stopwords,
        }
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn stopwords(&self) -> &Stopwords {
        &self.stopwords
    }

    pub fn segmenter_name(&self) -> &'static str {
        self.tokenizer.segmenter_name()
    }

    /// Fetch the page and run every CPU-bound stage up to the frequency table.
    pub async fn analyze(&self, req: &FetchRequest) -> Result<Analysis> {
        let doc = self.fetcher.fetch(req).await?;
        self.analyze_document(&doc)
    }

    pub fn analyze_document(&self, doc: &Document) -> Result<Analysis> {
        let extracted = self.extractor.extract(&doc.text)?;
        let normalized = clean(&extracted.text);
        debug!(
            tier = %extracted.tier,
            extracted_chars = extracted.text.chars().count(),
            normalized_chars = normalized.chars().count(),
            "cleaned article text"
        );
        let tokens = self.tokenizer.tokenize(&normalized);
        let table = FrequencyTable::from_tokens(&tokens);
        info!(
            url = %doc.final_url,
            tokens = tokens.len(),
            unique = table.len(),
            "analysis complete"
        );
        Ok(Analysis {
            url: doc.url.clone(),
            final_url: doc.final_url.clone(),
            encoding: doc.encoding.clone(),
            tier: extracted.tier,
            extracted_chars: extracted.text.chars().count(),
            normalized_chars: normalized.chars().count(),
            token_count: tokens.len(),
            segmenter: self.segmenter_name().to_string(),
            stopwords_fingerprint: self.stopwords.fingerprint(),
            table,
        })
    }
}
