use crate::stopwords::Stopwords;
use std::sync::Arc;
use tracing::debug;
use wordpipe_core::Segmenter;

/// Chinese word segmentation backed by `jieba-rs` (default dictionary, HMM for unknown words).
pub struct JiebaSegmenter {
    jieba: jieba_rs::Jieba,
    hmm: bool,
}

impl JiebaSegmenter {
    pub fn new() -> Self {
        Self {
            jieba: jieba_rs::Jieba::new(),
            hmm: true,
        }
    }

    pub fn with_hmm(mut self, hmm: bool) -> Self {
        self.hmm = hmm;
        self
    }

    /// Segmenter name for a given HMM setting, without loading the dictionary.
    pub const fn name_for(hmm: bool) -> &'static str {
        if hmm {
            "jieba-hmm"
        } else {
            "jieba"
        }
    }
}

impl Default for JiebaSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for JiebaSegmenter {
    fn name(&self) -> &'static str {
        Self::name_for(self.hmm)
    }

    fn segment(&self, text: &str) -> Vec<String> {
        self.jieba
            .cut(text, self.hmm)
            .into_iter()
            .map(|w| w.to_string())
            .collect()
    }
}

/// Segments normalized text and drops stopwords and single-character tokens.
#[derive(Clone)]
pub struct Tokenizer {
    segmenter: Arc<dyn Segmenter>,
    stopwords: Arc<Stopwords>,
}

impl Tokenizer {
    pub fn new(segmenter: Arc<dyn Segmenter>, stopwords: Arc<Stopwords>) -> Self {
        Self {
            segmenter,
            stopwords,
        }
    }

    pub fn segmenter_name(&self) -> &'static str {
        self.segmenter.name()
    }

    /// Tokens in order of occurrence. Every returned token has more than one
    /// character and is not a stopword.
    pub fn tokenize(&self, normalized: &str) -> Vec<String> {
        let raw = self.segmenter.segment(normalized);
        let raw_len = raw.len();
        let out: Vec<String> = raw
            .into_iter()
            .filter_map(|t| {
                let t = t.trim();
                if t.chars().count() <= 1 || self.stopwords.contains(t) {
                    return None;
                }
                Some(t.to_string())
            })
            .collect();
        debug!(
            segmenter = self.segmenter.name(),
            raw = raw_len,
            kept = out.len(),
            "tokenized"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Splits on `|` so tests control segmentation exactly.
    struct PipeSegmenter;

    impl Segmenter for PipeSegmenter {
        fn name(&self) -> &'static str {
            "pipe"
        }
        fn segment(&self, text: &str) -> Vec<String> {
            text.split('|').map(|s| s.to_string()).collect()
        }
    }

    fn tokenizer(stop: &str) -> Tokenizer {
        Tokenizer::new(
            Arc::new(PipeSegmenter),
            Arc::new(Stopwords::parse(stop, PathBuf::from("test"))),
        )
    }

    #[test]
    fn drops_stopwords_single_chars_and_blanks_keeping_order() {
        let t = tokenizer("我们\n对于\n");
        let toks = t.tokenize("我们|数据|的|| |分析| 对于 |数据|，|模型 ");
        assert_eq!(toks, vec!["数据", "分析", "数据", "模型"]);
    }

    #[test]
    fn length_is_counted_in_characters_not_bytes() {
        let t = tokenizer("");
        // One CJK char is three UTF-8 bytes but still a single-character token.
        assert_eq!(t.tokenize("中|中国"), vec!["中国"]);
    }

    #[test]
    fn output_never_contains_stopwords_or_short_tokens() {
        let t = tokenizer("人工智能\n");
        let toks = t.tokenize("人工智能|是|未来|的|方向|人工智能|，|。");
        for tok in &toks {
            assert!(tok.chars().count() > 1);
            assert!(tok != "人工智能");
        }
        assert_eq!(toks, vec!["未来", "方向"]);
    }

    #[test]
    fn jieba_segmenter_covers_input_in_order() {
        let seg = JiebaSegmenter::new();
        let text = "我们在学习自然语言处理，中文分词很重要。";
        let parts = seg.segment(text);
        assert!(parts.len() > 3, "parts={parts:?}");
        assert_eq!(parts.concat(), text);
        assert_eq!(seg.name(), "jieba-hmm");
        assert_eq!(JiebaSegmenter::new().with_hmm(false).name(), "jieba");
    }

    #[test]
    fn jieba_tokenizer_filters_builtin_stopwords() {
        let t = Tokenizer::new(
            Arc::new(JiebaSegmenter::new()),
            Arc::new(Stopwords::builtin()),
        );
        let toks = t.tokenize("我们的数据分析通过模型完成，数据分析很重要。");
        assert!(!toks.is_empty());
        let sw = Stopwords::builtin();
        for tok in &toks {
            assert!(tok.chars().count() > 1, "tok={tok}");
            assert!(!sw.contains(tok), "tok={tok}");
        }
        assert!(!toks.iter().any(|t| t == "通过"));
    }
}
