//! JSON envelopes and plain-text rendering for CLI results.

use std::path::Path;
use wordpipe_core::Error;
use wordpipe_local::pipeline::{Analysis, Report};
use wordpipe_local::stopwords::Stopwords;

fn stopwords_json(sw: &Stopwords) -> serde_json::Value {
    serde_json::json!({
        "source": sw.source(),
        "count": sw.len(),
    })
}

fn error_json(e: &Error) -> serde_json::Value {
    serde_json::json!({
        "code": e.kind(),
        "message": e.to_string(),
        "recoverable": e.is_recoverable(),
    })
}

pub(crate) fn print_report(
    report: &Report,
    stopwords: &Stopwords,
    cache_path: Option<&Path>,
    source: &'static str,
    text: bool,
) {
    if text {
        println!("wordpipe {}", report.final_url);
        println!(
            "tier: {}  encoding: {}  extracted_chars: {}",
            report.tier, report.encoding, report.extracted_chars
        );
        println!(
            "tokens: {}  unique: {}  retained: {} (min_freq={})",
            report.token_count,
            report.unique_tokens,
            report.retained,
            report.min_freq.get()
        );
        if stopwords.is_builtin() {
            println!("stopwords: built-in default ({})", stopwords.len());
        }
        for (i, e) in report.top.iter().enumerate() {
            println!("{:>3}. {}\t{}", i + 1, e.token, e.count);
        }
        return;
    }
    let v = serde_json::json!({
        "schema_version": 1,
        "kind": "analysis",
        "ok": true,
        "source": source,
        "stopwords": stopwords_json(stopwords),
        "cache_path": cache_path.map(|p| p.display().to_string()),
        "report": report,
    });
    println!("{v}");
}

pub(crate) fn print_empty(
    analysis: &Analysis,
    e: &Error,
    stopwords: &Stopwords,
    cache_path: Option<&Path>,
    source: &'static str,
    text: bool,
) {
    if text {
        println!("wordpipe {}", analysis.final_url);
        println!(
            "tokens: {}  unique: {}  highest count: {}",
            analysis.token_count,
            analysis.unique_tokens(),
            analysis.table.max_count()
        );
        println!("warning[{}]: {e}", e.kind());
        return;
    }
    let v = serde_json::json!({
        "schema_version": 1,
        "kind": "analysis",
        "ok": false,
        "source": source,
        "error": error_json(e),
        "summary": {
            "url": analysis.url,
            "final_url": analysis.final_url,
            "tier": analysis.tier,
            "extracted_chars": analysis.extracted_chars,
            "token_count": analysis.token_count,
            "unique_tokens": analysis.unique_tokens(),
            "max_count": analysis.table.max_count(),
        },
        "stopwords": stopwords_json(stopwords),
        "cache_path": cache_path.map(|p| p.display().to_string()),
    });
    println!("{v}");
}

pub(crate) fn print_error(url: &str, e: &Error, text: bool) {
    if text {
        println!("error[{}]: {e}", e.kind());
        return;
    }
    let v = serde_json::json!({
        "schema_version": 1,
        "kind": "analysis",
        "ok": false,
        "url": url,
        "error": error_json(e),
    });
    println!("{v}");
}

pub(crate) fn print_doctor_text(v: &serde_json::Value) {
    println!(
        "wordpipe {} ({})",
        v["version"].as_str().unwrap_or(""),
        if v["ok"].as_bool() == Some(true) {
            "ok"
        } else {
            "problems found"
        }
    );
    println!("checks:");
    if let Some(checks) = v["checks"].as_array() {
        for c in checks {
            let mark = if c["ok"].as_bool() == Some(true) { "ok" } else { "FAIL" };
            println!(
                "  [{mark}] {}: {}",
                c["name"].as_str().unwrap_or(""),
                c["message"].as_str().unwrap_or("")
            );
        }
    }
}
