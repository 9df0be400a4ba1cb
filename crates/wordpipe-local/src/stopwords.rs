//! Stopword set.
//!
//! Loaded once at startup from a UTF-8 file (one term per line) or, when the file
//! does not exist, from a fixed built-in list. Never mutated after loading.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use wordpipe_core::{Error, Result};

/// File looked up in the working directory when no path is configured.
pub const DEFAULT_STOPWORDS_FILE: &str = "stopwords.txt";

/// Built-in fallback: common Chinese function words.
pub const BUILTIN_STOPWORDS: &[&str] = &[
    "的", "了", "是", "我", "你", "他", "她", "它", "们", "在", "和", "与", "或", "就", "都", "而",
    "及", "即", "也", "又", "还", "因", "为", "以", "于", "之", "这", "那", "此", "彼", "个", "些",
    "能", "可", "会", "应", "要", "将", "把", "对", "对于", "关于", "通过", "随着", "按照", "基于",
    "根据", "如果", "假如",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopwordSource {
    File { path: PathBuf },
    Builtin,
}

#[derive(Debug, Clone)]
pub struct Stopwords {
    words: HashSet<String>,
    source: StopwordSource,
}

impl Stopwords {
    pub fn builtin() -> Self {
        Self {
            words: BUILTIN_STOPWORDS.iter().map(|w| w.to_string()).collect(),
            source: StopwordSource::Builtin,
        }
    }

    /// Parse file contents: one term per line, surrounding whitespace trimmed, blank lines ignored.
    pub fn parse(contents: &str, path: PathBuf) -> Self {
        let words = contents
            .lines()
            .map(|l| l.trim().trim_start_matches('\u{feff}'))
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect();
        Self {
            words,
            source: StopwordSource::File { path },
        }
    }

    /// Load from `path`, falling back to the built-in set if the file does not exist.
    ///
    /// Any other read failure (permissions, invalid UTF-8) is an error: silently
    /// analysing with the wrong stopwords would skew every ranking.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(s) => {
                let out = Self::parse(&s, path.to_path_buf());
                info!(path = %path.display(), count = out.len(), "loaded stopwords");
                Ok(out)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    path = %path.display(),
                    "stopword file not found; using built-in default stopwords"
                );
                Ok(Self::builtin())
            }
            Err(e) => Err(Error::Stopwords(format!("{}: {e}", path.display()))),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn source(&self) -> &StopwordSource {
        &self.source
    }

    pub fn is_builtin(&self) -> bool {
        self.source == StopwordSource::Builtin
    }

    /// Order-independent digest of the set, used to key cached analyses.
    pub fn fingerprint(&self) -> String {
        let mut words: Vec<&str> = self.words.iter().map(|s| s.as_str()).collect();
        words.sort_unstable();
        let mut h = Sha256::new();
        for w in words {
            h.update(w.as_bytes());
            h.update(b"\n");
        }
        hex::encode(h.finalize())
    }
}
