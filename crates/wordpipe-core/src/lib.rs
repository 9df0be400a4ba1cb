use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),
    #[error("no content found (tried: {tried})")]
    Extraction { tried: String },
    #[error(
        "no term occurs at least {min_freq} times (highest count is {max_count}); lower min_freq and re-rank"
    )]
    EmptyAfterFilter { min_freq: u32, max_count: usize },
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
    #[error("stopwords error: {0}")]
    Stopwords(String),
    #[error("cache error: {0}")]
    Cache(String),
}

impl Error {
    /// Stable machine-readable code for envelopes and exit handling.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Network(_) => "network_error",
            Error::Extraction { .. } => "extraction_error",
            Error::EmptyAfterFilter { .. } => "empty_after_filter",
            Error::InvalidParam(_) => "invalid_param",
            Error::Stopwords(_) => "stopwords_error",
            Error::Cache(_) => "cache_error",
        }
    }

    /// `EmptyAfterFilter` only ends the ranking stage; everything upstream is still valid.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::EmptyAfterFilter { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Default request timeout for a page fetch.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Default cap on bytes read from a response body.
pub const DEFAULT_MAX_BYTES: u64 = 5_000_000;
/// Ranked entries shown in the general display.
pub const DISPLAY_TOP: usize = 20;
/// Ranked entries for charts that cannot render more.
pub const COMPACT_TOP: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the whole request (connect + body).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
    /// Extra headers to send on top of the fetcher's defaults.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: Some(DEFAULT_TIMEOUT_MS),
            max_bytes: Some(DEFAULT_MAX_BYTES),
            headers: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// URL validation belongs to the transport layer, so a bad URL is a network error.
    pub fn parse_url(&self) -> Result<url::Url> {
        let url = url::Url::parse(self.url.trim())
            .map_err(|e| Error::Network(format!("invalid url {:?}: {e}", self.url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::Network(format!("unsupported url scheme: {other}"))),
        }
    }
}

/// A fetched page, decoded to text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// Charset named by the server, if any. Kept for diagnostics only.
    pub declared_charset: Option<String>,
    /// Encoding actually used to decode `text`.
    pub encoding: String,
    pub text: String,
    pub truncated: bool,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<Document>;
}

/// Word-boundary capability. Implementations split text into candidate tokens,
/// in order; filtering is the caller's job.
pub trait Segmenter: Send + Sync {
    fn name(&self) -> &'static str;
    fn segment(&self, text: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExtractTier {
    Article,
    ContentContainer,
    Paragraph,
}

impl ExtractTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractTier::Article => "article",
            ExtractTier::ContentContainer => "content_container",
            ExtractTier::Paragraph => "paragraph",
        }
    }
}

impl fmt::Display for ExtractTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedText {
    pub tier: ExtractTier,
    pub text: String,
}

/// Minimum occurrence count a term needs to be ranked. Always within `1..=20`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "u32", into = "u32")]
pub struct MinFreq(u32);

impl MinFreq {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 20;

    pub fn new(v: u32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&v) {
            Ok(Self(v))
        } else {
            Err(Error::InvalidParam(format!(
                "min_freq must be within {}..={} (got {v})",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for MinFreq {
    fn default() -> Self {
        Self(2)
    }
}

impl TryFrom<u32> for MinFreq {
    type Error = Error;
    fn try_from(v: u32) -> Result<Self> {
        Self::new(v)
    }
}

impl From<MinFreq> for u32 {
    fn from(v: MinFreq) -> u32 {
        v.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermCount {
    pub token: String,
    pub count: usize,
}

/// Token occurrence counts.
///
/// Entries are kept in order of first occurrence in the token stream, which is
/// what the ranker uses to break ties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TermCount>", into = "Vec<TermCount>")]
pub struct FrequencyTable {
    entries: Vec<TermCount>,
    index: HashMap<String, usize>,
    total: usize,
}

impl FrequencyTable {
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut t = Self::default();
        for tok in tokens {
            t.add(tok.as_ref());
        }
        t
    }

    fn add(&mut self, token: &str) {
        self.total += 1;
        if let Some(&i) = self.index.get(token) {
            self.entries[i].count += 1;
            return;
        }
        self.index.insert(token.to_string(), self.entries.len());
        self.entries.push(TermCount {
            token: token.to_string(),
            count: 1,
        });
    }

    /// Number of unique tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts (length of the producing token stream).
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn get(&self, token: &str) -> Option<usize> {
        self.index.get(token).map(|&i| self.entries[i].count)
    }

    /// Position of the token's first occurrence among unique tokens.
    pub fn first_seen(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn max_count(&self) -> usize {
        self.entries.iter().map(|e| e.count).max().unwrap_or(0)
    }

    /// Entries in first-occurrence order.
    pub fn iter(&self) -> impl Iterator<Item = &TermCount> {
        self.entries.iter()
    }
}

impl From<Vec<TermCount>> for FrequencyTable {
    fn from(entries: Vec<TermCount>) -> Self {
        let mut t = Self::default();
        for e in entries {
            if e.count == 0 {
                continue;
            }
            t.total += e.count;
            if let Some(&i) = t.index.get(&e.token) {
                t.entries[i].count += e.count;
            } else {
                t.index.insert(e.token.clone(), t.entries.len());
                t.entries.push(e);
            }
        }
        t
    }
}

impl From<FrequencyTable> for Vec<TermCount> {
    fn from(t: FrequencyTable) -> Self {
        t.entries
    }
}

/// Terms ordered by count (descending), ties by first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedList {
    pub min_freq: MinFreq,
    /// Entries meeting `min_freq` before truncation.
    pub retained: usize,
    pub items: Vec<TermCount>,
}

impl RankedList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn head(&self, n: usize) -> &[TermCount] {
        &self.items[..n.min(self.items.len())]
    }
}

/// Chart families the visualization side offers, with how many terms each can show.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    WordCloud,
    Bar,
    Line,
    Pie,
    Radar,
    Scatter,
    Funnel,
    Gauge,
}

impl ChartKind {
    pub const ALL: [ChartKind; 8] = [
        ChartKind::WordCloud,
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Pie,
        ChartKind::Radar,
        ChartKind::Scatter,
        ChartKind::Funnel,
        ChartKind::Gauge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::WordCloud => "word_cloud",
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Radar => "radar",
            ChartKind::Scatter => "scatter",
            ChartKind::Funnel => "funnel",
            ChartKind::Gauge => "gauge",
        }
    }

    pub fn limit(self) -> usize {
        match self {
            ChartKind::Radar => COMPACT_TOP,
            // A gauge shows a single value: the top term.
            ChartKind::Gauge => 1,
            _ => DISPLAY_TOP,
        }
    }
}

impl FromStr for ChartKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let k = s.trim().to_ascii_lowercase().replace('-', "_");
        match k.as_str() {
            "word_cloud" | "wordcloud" => Ok(ChartKind::WordCloud),
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "pie" => Ok(ChartKind::Pie),
            "radar" => Ok(ChartKind::Radar),
            "scatter" => Ok(ChartKind::Scatter),
            "funnel" => Ok(ChartKind::Funnel),
            "gauge" => Ok(ChartKind::Gauge),
            _ => Err(Error::InvalidParam(format!("unknown chart kind: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn min_freq_accepts_only_1_through_20() {
        assert!(MinFreq::new(0).is_err());
        assert_eq!(MinFreq::new(1).unwrap().get(), 1);
        assert_eq!(MinFreq::new(20).unwrap().get(), 20);
        let e = MinFreq::new(21).unwrap_err();
        assert_eq!(e.kind(), "invalid_param");
        assert_eq!(MinFreq::default().get(), 2);
    }

    #[test]
    fn min_freq_deserialization_is_validated() {
        assert!(serde_json::from_str::<MinFreq>("3").is_ok());
        assert!(serde_json::from_str::<MinFreq>("42").is_err());
    }

    #[test]
    fn frequency_table_counts_in_first_occurrence_order() {
        let t = FrequencyTable::from_tokens(&["A", "A", "B", "B", "B", "C"]);
        assert_eq!(t.len(), 3);
        assert_eq!(t.total(), 6);
        assert_eq!(t.get("A"), Some(2));
        assert_eq!(t.get("B"), Some(3));
        assert_eq!(t.get("C"), Some(1));
        assert_eq!(t.get("D"), None);
        assert_eq!(t.max_count(), 3);
        let order: Vec<&str> = t.iter().map(|e| e.token.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert_eq!(t.first_seen("C"), Some(2));
    }

    #[test]
    fn frequency_table_json_keeps_order_and_total() {
        let t = FrequencyTable::from_tokens(&["数据", "分析", "数据"]);
        let s = serde_json::to_string(&t).unwrap();
        assert_eq!(
            s,
            r#"[{"token":"数据","count":2},{"token":"分析","count":1}]"#
        );
        let back: FrequencyTable = serde_json::from_str(&s).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.total(), 3);
    }

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(Error::Network("x".into()).kind(), "network_error");
        assert_eq!(
            Error::Extraction { tried: "article".into() }.kind(),
            "extraction_error"
        );
        let e = Error::EmptyAfterFilter {
            min_freq: 5,
            max_count: 4,
        };
        assert_eq!(e.kind(), "empty_after_filter");
        assert!(e.is_recoverable());
        assert!(!Error::Network("x".into()).is_recoverable());
    }

    #[test]
    fn parse_url_rejects_garbage_as_network_error() {
        let e = FetchRequest::new("not a url").parse_url().unwrap_err();
        assert_eq!(e.kind(), "network_error");
        let e = FetchRequest::new("ftp://example.com/a").parse_url().unwrap_err();
        assert!(e.to_string().contains("scheme"));
        assert!(FetchRequest::new(" https://example.com/a ").parse_url().is_ok());
    }

    #[test]
    fn chart_kinds_parse_and_limit() {
        assert_eq!("radar".parse::<ChartKind>().unwrap().limit(), COMPACT_TOP);
        assert_eq!("Word-Cloud".parse::<ChartKind>().unwrap(), ChartKind::WordCloud);
        assert_eq!(ChartKind::Gauge.limit(), 1);
        assert_eq!(ChartKind::Bar.limit(), DISPLAY_TOP);
        assert!("sankey".parse::<ChartKind>().is_err());
        assert_eq!("wordcloud".parse::<ChartKind>().unwrap(), ChartKind::WordCloud);
        for k in ChartKind::ALL {
            assert_eq!(k.as_str().parse::<ChartKind>().unwrap(), k);
            assert_eq!(serde_json::to_value(k).unwrap(), serde_json::json!(k.as_str()));
        }
        assert_eq!(ChartKind::WordCloud.as_str(), "word_cloud");
    }

    #[test]
    fn ranked_list_head_is_bounded() {
        let r = RankedList {
            min_freq: MinFreq::default(),
            retained: 2,
            items: vec![
                TermCount { token: "甲乙".into(), count: 3 },
                TermCount { token: "丙丁".into(), count: 2 },
            ],
        };
        assert_eq!(r.head(10).len(), 2);
        assert_eq!(r.head(1)[0].token, "甲乙");
        assert!(r.head(0).is_empty());
    }

    proptest! {
        #[test]
        fn frequency_table_total_matches_stream_length(
            tokens in prop::collection::vec("[a-e]{1,2}", 0..200),
        ) {
            let t = FrequencyTable::from_tokens(&tokens);
            prop_assert_eq!(t.total(), tokens.len());
            prop_assert_eq!(t.iter().map(|e| e.count).sum::<usize>(), tokens.len());
            let again = FrequencyTable::from_tokens(&tokens);
            prop_assert_eq!(again, t);
        }
    }
}
