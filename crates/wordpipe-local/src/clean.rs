//! Text normalization to Chinese script plus a small punctuation whitelist.
//!
//! The steps run in a fixed order. Removing ASCII alphanumerics happens before
//! the script restriction, so Latin/number noise never survives as "content".

use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("TAG_RE should compile"));
static ASCII_ALNUM_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9a-zA-Z\s+]").expect("ASCII_ALNUM_WS_RE should compile"));
static OUTSIDE_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\x{4e00}-\x{9fa5}，。！？；：、（）【】]")
        .expect("OUTSIDE_SCRIPT_RE should compile")
});

/// Full-width punctuation kept by [`restrict_script`].
pub const PUNCTUATION_WHITELIST: [char; 11] =
    ['，', '。', '！', '？', '；', '：', '、', '（', '）', '【', '】'];

pub type CleanStep = fn(&str) -> String;

/// The cleaning pipeline, in execution order.
pub const CLEAN_STEPS: [(&str, CleanStep); 3] = [
    ("strip_tags", strip_tags),
    ("strip_ascii_alnum", strip_ascii_alnum),
    ("restrict_script", restrict_script),
];

/// Remove markup-like `<...>` sequences left over after extraction.
pub fn strip_tags(s: &str) -> String {
    TAG_RE.replace_all(s, "").into_owned()
}

/// Remove ASCII letters, digits, `+` and all whitespace.
pub fn strip_ascii_alnum(s: &str) -> String {
    ASCII_ALNUM_WS_RE.replace_all(s, "").into_owned()
}

/// Keep CJK unified ideographs (U+4E00..=U+9FA5) and whitelisted punctuation only.
pub fn restrict_script(s: &str) -> String {
    OUTSIDE_SCRIPT_RE.replace_all(s, "").into_owned()
}

pub fn is_target_char(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c) || PUNCTUATION_WHITELIST.contains(&c)
}

pub fn clean(text: &str) -> String {
    CLEAN_STEPS
        .iter()
        .fold(text.to_string(), |acc, (_, step)| step(&acc))
}
