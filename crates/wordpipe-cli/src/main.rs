use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wordpipe_core::{ChartKind, Error, FetchRequest, MinFreq, Segmenter};
use wordpipe_local::cache::{AnalysisCache, CacheKey};
use wordpipe_local::pipeline::{Analysis, Analyzer};
use wordpipe_local::stopwords::{Stopwords, DEFAULT_STOPWORDS_FILE};
use wordpipe_local::tokenize::JiebaSegmenter;
use wordpipe_local::LocalFetcher;

mod output;

#[derive(Parser, Debug)]
#[command(name = "wordpipe")]
#[command(about = "Rank the most frequent terms of a Chinese web article", long_about = None)]
struct Cli {
    /// Debug-level logs on stderr (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a page, count its terms and print the ranking (caches the counts).
    Analyze(AnalyzeCmd),
    /// Re-rank a previously analyzed page from the cache (never fetches).
    Rank(RankCmd),
    /// Diagnose configuration (stopwords, cache dir, segmenter).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug, Clone)]
struct CommonArgs {
    /// Stopword file (UTF-8, one term per line). Missing file → built-in list.
    #[arg(long, env = "WORDPIPE_STOPWORDS", default_value = DEFAULT_STOPWORDS_FILE)]
    stopwords: PathBuf,
    /// Where analyses are cached (default: user cache dir).
    #[arg(long, env = "WORDPIPE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,
    /// Use jieba's HMM for words missing from the dictionary.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    hmm: bool,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug, Clone)]
struct RankArgs {
    /// Minimum occurrences for a term to be ranked (1..=20).
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..=20))]
    min_freq: u32,
    /// Also emit the slice for this chart kind (word_cloud, bar, line, pie, radar, scatter, funnel, gauge).
    #[arg(long, value_parser = parse_chart)]
    chart: Option<ChartKind>,
}

#[derive(clap::Args, Debug)]
struct AnalyzeCmd {
    /// Article URL.
    #[arg(long)]
    url: String,
    #[command(flatten)]
    rank: RankArgs,
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, env = "WORDPIPE_TIMEOUT_MS", default_value_t = wordpipe_core::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,
    #[arg(long, env = "WORDPIPE_MAX_BYTES", default_value_t = wordpipe_core::DEFAULT_MAX_BYTES)]
    max_bytes: u64,
    /// Do not write the analysis to the cache.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_cache: bool,
}

#[derive(clap::Args, Debug)]
struct RankCmd {
    /// Article URL given to a previous `analyze`.
    #[arg(long)]
    url: String,
    #[command(flatten)]
    rank: RankArgs,
    #[command(flatten)]
    common: CommonArgs,
    /// Treat cached analyses older than this as missing.
    #[arg(long)]
    ttl_s: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn parse_chart(s: &str) -> std::result::Result<ChartKind, String> {
    s.parse::<ChartKind>().map_err(|e| e.to_string())
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("wordpipe-cache")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// `KEY=VALUE` lines from `WORDPIPE_ENV_FILE`; never overrides the process env.
fn load_env_file() {
    let Ok(p) = std::env::var("WORDPIPE_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v.trim());
        }
    }
}

impl CommonArgs {
    fn text_output(&self) -> bool {
        self.output.eq_ignore_ascii_case("text")
    }

    fn cache(&self) -> AnalysisCache {
        AnalysisCache::new(self.cache_dir.clone().unwrap_or_else(default_cache_dir))
    }
}

/// Print a ranking (or the reason there is none) and return the exit code.
fn emit_report(
    analysis: &Analysis,
    rank: &RankArgs,
    stopwords: &Stopwords,
    cache_path: Option<&Path>,
    source: &'static str,
    text: bool,
) -> Result<i32> {
    let min_freq = MinFreq::new(rank.min_freq)?;
    match analysis.report(min_freq, rank.chart) {
        Ok(report) => {
            output::print_report(&report, stopwords, cache_path, source, text);
            Ok(0)
        }
        Err(e @ Error::EmptyAfterFilter { .. }) => {
            output::print_empty(analysis, &e, stopwords, cache_path, source, text);
            Ok(0)
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_analyze(args: AnalyzeCmd) -> Result<i32> {
    let text = args.common.text_output();
    let stopwords = match Stopwords::load(&args.common.stopwords) {
        Ok(sw) => Arc::new(sw),
        Err(e) => {
            output::print_error(&args.url, &e, text);
            return Ok(1);
        }
    };
    let segmenter: Arc<dyn Segmenter> =
        Arc::new(JiebaSegmenter::new().with_hmm(args.common.hmm));
    let fetcher = match LocalFetcher::new() {
        Ok(f) => Arc::new(f),
        Err(e) => {
            output::print_error(&args.url, &e, text);
            return Ok(1);
        }
    };
    let analyzer = Analyzer::new(fetcher, segmenter, stopwords.clone());

    let req = FetchRequest {
        timeout_ms: Some(args.timeout_ms),
        max_bytes: Some(args.max_bytes),
        ..FetchRequest::new(args.url.clone())
    };
    let analysis = match analyzer.analyze(&req).await {
        Ok(a) => a,
        Err(e) => {
            output::print_error(&args.url, &e, text);
            return Ok(1);
        }
    };

    let cache_path = if args.no_cache {
        None
    } else {
        match args.common.cache().put(&analysis) {
            Ok(p) => {
                debug!(path = %p.display(), "cached analysis");
                Some(p)
            }
            Err(e) => {
                warn!(error = %e, "could not cache analysis; reporting it anyway");
                None
            }
        }
    };
    emit_report(
        &analysis,
        &args.rank,
        &stopwords,
        cache_path.as_deref(),
        "network",
        text,
    )
}

fn run_rank(args: RankCmd) -> Result<i32> {
    let text = args.common.text_output();
    let stopwords = match Stopwords::load(&args.common.stopwords) {
        Ok(sw) => sw,
        Err(e) => {
            output::print_error(&args.url, &e, text);
            return Ok(1);
        }
    };
    let fingerprint = stopwords.fingerprint();
    let cache = args.common.cache().with_ttl(args.ttl_s);
    let key = CacheKey {
        url: &args.url,
        stopwords_fingerprint: &fingerprint,
        segmenter: JiebaSegmenter::name_for(args.common.hmm),
    };
    let cached = match cache.get(&key) {
        Ok(a) => a,
        Err(e) => {
            output::print_error(&args.url, &e, text);
            return Ok(1);
        }
    };
    let Some(analysis) = cached else {
        let e = Error::Cache(format!(
            "no cached analysis for {} with these stopwords; run `wordpipe analyze --url {}` first",
            args.url, args.url
        ));
        output::print_error(&args.url, &e, text);
        return Ok(1);
    };
    info!(url = %analysis.url, unique = analysis.unique_tokens(), "re-ranking cached analysis");
    emit_report(&analysis, &args.rank, &stopwords, None, "cache", text)
}

fn run_doctor(args: DoctorCmd) -> Result<i32> {
    let t0 = std::time::Instant::now();
    let mut checks: Vec<serde_json::Value> = Vec::new();

    let stopwords = Stopwords::load(&args.common.stopwords);
    let (sw_ok, sw_msg) = match &stopwords {
        Ok(sw) if sw.is_builtin() => (
            true,
            format!(
                "{} not found; using {} built-in stopwords",
                args.common.stopwords.display(),
                sw.len()
            ),
        ),
        Ok(sw) => (true, format!("loaded {} stopwords", sw.len())),
        Err(e) => (false, e.to_string()),
    };
    checks.push(serde_json::json!({
        "name": "stopwords",
        "ok": sw_ok,
        "message": sw_msg,
        "builtin": stopwords.as_ref().map(|s| s.is_builtin()).unwrap_or(false),
    }));

    let cache_dir = args.common.cache_dir.clone().unwrap_or_else(default_cache_dir);
    let cache_ok = (|| -> anyhow::Result<()> {
        std::fs::create_dir_all(&cache_dir)?;
        let probe = cache_dir.join(format!("wordpipe-doctor-{}.probe", std::process::id()));
        std::fs::write(&probe, b"ok")?;
        let _ = std::fs::remove_file(&probe);
        Ok(())
    })()
    .is_ok();
    checks.push(serde_json::json!({
        "name": "cache_dir_writable",
        "ok": cache_ok,
        "message": if cache_ok { "cache dir is writable" } else { "cache dir is not writable" },
        "hint": if cache_ok { "" } else { "Set WORDPIPE_CACHE_DIR to a writable directory." },
    }));

    let t_seg = std::time::Instant::now();
    let seg = JiebaSegmenter::new().with_hmm(args.common.hmm);
    let parts = seg.segment("自然语言处理是人工智能的重要方向");
    let seg_ok = parts.len() > 1;
    checks.push(serde_json::json!({
        "name": "segmenter",
        "ok": seg_ok,
        "message": format!("{} produced {} segments", seg.name(), parts.len()),
        "elapsed_ms": t_seg.elapsed().as_millis(),
    }));

    let ok = checks.iter().all(|c| c["ok"].as_bool() == Some(true));
    let v = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": ok,
        "name": "wordpipe",
        "version": env!("CARGO_PKG_VERSION"),
        "elapsed_ms": t0.elapsed().as_millis(),
        "configured": {
            "stopwords_path": args.common.stopwords.display().to_string(),
            "cache_dir": cache_dir.display().to_string(),
            "hmm": args.common.hmm,
        },
        "checks": checks,
    });
    if args.common.text_output() {
        output::print_doctor_text(&v);
    } else {
        println!("{v}");
    }
    Ok(if ok { 0 } else { 1 })
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Commands::Analyze(args) => run_analyze(args).await?,
        Commands::Rank(args) => run_rank(args)?,
        Commands::Doctor(args) => run_doctor(args)?,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "wordpipe",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("wordpipe {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
            0
        }
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
