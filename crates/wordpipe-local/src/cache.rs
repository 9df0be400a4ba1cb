//! On-disk store for [`Analysis`] results, so a later run can re-rank a page
//! without fetching, extracting or segmenting it again.

use crate::pipeline::Analysis;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;
use wordpipe_core::{Error, Result};

const SCHEMA_VERSION: u64 = 1;

/// Everything that changes the frequency table for a given URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey<'a> {
    pub url: &'a str,
    pub stopwords_fingerprint: &'a str,
    pub segmenter: &'a str,
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    schema_version: u64,
    stored_at_epoch_s: u64,
    analysis: Analysis,
}

#[derive(Debug, Clone)]
pub struct AnalysisCache {
    root: PathBuf,
    ttl_s: Option<u64>,
}

fn now_epoch_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

impl AnalysisCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root, ttl_s: None }
    }

    /// Entries older than `ttl_s` are treated as a miss.
    pub fn with_ttl(mut self, ttl_s: Option<u64>) -> Self {
        self.ttl_s = ttl_s;
        self
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn key(k: &CacheKey<'_>) -> String {
        let mut h = Sha256::new();
        h.update(b"url:");
        h.update(k.url.trim().as_bytes());
        h.update(b"\nstopwords:");
        h.update(k.stopwords_fingerprint.as_bytes());
        h.update(b"\nsegmenter:");
        h.update(k.segmenter.as_bytes());
        hex::encode(h.finalize())
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root
            .join(&key[0..2])
            .join(&key[2..4])
            .join(format!("{key}.json"))
    }

    pub fn get(&self, k: &CacheKey<'_>) -> Result<Option<Analysis>> {
        let p = self.path(&Self::key(k));
        let bytes = match fs::read(&p) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Cache(format!("{}: {e}", p.display()))),
        };
        let entry: Entry =
            serde_json::from_slice(&bytes).map_err(|e| Error::Cache(e.to_string()))?;
        if entry.schema_version != SCHEMA_VERSION {
            debug!(path = %p.display(), "cache entry has old schema; ignoring");
            return Ok(None);
        }
        if let Some(ttl_s) = self.ttl_s {
            if now_epoch_s().saturating_sub(entry.stored_at_epoch_s) > ttl_s {
                debug!(path = %p.display(), "cache entry expired");
                return Ok(None);
            }
        }
        let a = entry.analysis;
        if a.token_count != a.table.total() {
            return Err(Error::Cache(format!(
                "{}: token_count {} does not match table total {}",
                p.display(),
                a.token_count,
                a.table.total()
            )));
        }
        Ok(Some(a))
    }

    pub fn put(&self, analysis: &Analysis) -> Result<PathBuf> {
        let k = CacheKey {
            url: &analysis.url,
            stopwords_fingerprint: &analysis.stopwords_fingerprint,
            segmenter: &analysis.segmenter,
        };
        let p = self.path(&Self::key(&k));
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Cache(e.to_string()))?;
        }
        let entry = Entry {
            schema_version: SCHEMA_VERSION,
            stored_at_epoch_s: now_epoch_s(),
            analysis: analysis.clone(),
        };
        let bytes = serde_json::to_vec(&entry).map_err(|e| Error::Cache(e.to_string()))?;
        fs::write(&p, bytes).map_err(|e| Error::Cache(e.to_string()))?;
        Ok(p)
    }
}
